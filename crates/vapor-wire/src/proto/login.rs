//! Handshake, logon and session-lifetime payloads

use super::header::IpAddress;

/// Protocol handshake sent immediately after the transport opens
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientHello {
    #[prost(uint32, optional, tag = "1")]
    pub protocol_version: Option<u32>,
}

/// Classic logon request, used here only for token finalization
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientLogon {
    #[prost(uint32, optional, tag = "1")]
    pub protocol_version: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub cell_id: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub client_package_version: Option<u32>,
    #[prost(string, optional, tag = "6")]
    pub client_language: Option<String>,
    #[prost(uint32, optional, tag = "7")]
    pub client_os_type: Option<u32>,
    #[prost(bool, optional, tag = "8")]
    pub should_remember_password: Option<bool>,
    #[prost(message, optional, tag = "11")]
    pub obfuscated_private_ip: Option<IpAddress>,
    #[prost(uint32, optional, tag = "21")]
    pub qos_level: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "30")]
    pub machine_id: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "33")]
    pub chat_mode: Option<u32>,
    #[prost(string, optional, tag = "50")]
    pub account_name: Option<String>,
    #[prost(int32, optional, tag = "82")]
    pub eresult_sentryfile: Option<i32>,
    #[prost(string, optional, tag = "96")]
    pub machine_name: Option<String>,
    #[prost(bool, optional, tag = "102")]
    pub supports_rate_limit_response: Option<bool>,
    #[prost(string, optional, tag = "108")]
    pub access_token: Option<String>,
}

/// Result of a classic logon attempt
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientLogonResponse {
    #[prost(int32, optional, tag = "1")]
    pub eresult: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub heartbeat_seconds: Option<i32>,
    #[prost(uint32, optional, tag = "7")]
    pub cell_id: Option<u32>,
    #[prost(int32, optional, tag = "10")]
    pub eresult_extended: Option<i32>,
    #[prost(uint64, optional, tag = "20")]
    pub client_supplied_steamid: Option<u64>,
}

/// Keep-alive sent at the server-provided interval
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientHeartBeat {
    #[prost(bool, optional, tag = "1")]
    pub send_reply: Option<bool>,
}

/// Client-initiated logoff, carries no fields
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientLogOff {}

/// Server-initiated logoff notification
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientLoggedOff {
    #[prost(int32, optional, tag = "1")]
    pub eresult: Option<i32>,
}

/// Own-account metadata pushed after logon
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientAccountInfo {
    #[prost(string, optional, tag = "1")]
    pub persona_name: Option<String>,
}
