//! Frame routing header and the multi envelope

use crate::result_code::ResultCode;

/// Routing header preceding every frame body.
///
/// Job ids use 10/11 deliberately: a response addressed to a pending
/// job carries that job's id in `target_job_id`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FrameHeader {
    /// Full 64-bit account identity, mask-only when unauthenticated
    #[prost(fixed64, optional, tag = "1")]
    pub steam_id: Option<u64>,
    /// Session id assigned by the server after logon
    #[prost(int32, optional, tag = "2")]
    pub session_id: Option<i32>,
    /// Job id assigned by the sender of this frame
    #[prost(fixed64, optional, tag = "10")]
    pub source_job_id: Option<u64>,
    /// Job id of the request this frame answers
    #[prost(fixed64, optional, tag = "11")]
    pub target_job_id: Option<u64>,
    /// Named-service method this frame targets
    #[prost(string, optional, tag = "12")]
    pub target_job_name: Option<String>,
    /// Result code for response frames
    #[prost(int32, optional, tag = "13")]
    pub eresult: Option<i32>,
    /// Human-readable error detail, rarely set
    #[prost(string, optional, tag = "14")]
    pub error_message: Option<String>,
}

impl FrameHeader {
    /// Result code of this header, `Invalid` when absent.
    pub fn result(&self) -> ResultCode {
        ResultCode::from_raw(self.eresult.unwrap_or_default())
    }

    /// Method name with the `#N` version suffix stripped.
    pub fn method_name(&self) -> Option<&str> {
        self.target_job_name
            .as_deref()
            .map(|name| name.split('#').next().unwrap_or(name))
    }
}

/// Envelope of a `Multi` frame
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Multi {
    /// Decompressed payload size; zero or absent means uncompressed
    #[prost(uint32, optional, tag = "1")]
    pub size_unzipped: Option<u32>,
    /// Concatenated `(u32 length, frame)` entries
    #[prost(bytes = "vec", optional, tag = "2")]
    pub message_body: Option<Vec<u8>>,
}

/// IPv4/IPv6 address wrapper used in logon payloads
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IpAddress {
    #[prost(oneof = "ip_address::Ip", tags = "1, 2")]
    pub ip: Option<ip_address::Ip>,
}

pub mod ip_address {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Ip {
        #[prost(uint32, tag = "1")]
        V4(u32),
        #[prost(bytes, tag = "2")]
        V6(Vec<u8>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_name_strips_version() {
        let header = FrameHeader {
            target_job_name: Some("Authentication.PollAuthSessionStatus#1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            header.method_name(),
            Some("Authentication.PollAuthSessionStatus")
        );
    }

    #[test]
    fn test_result_defaults_to_invalid() {
        let header = FrameHeader::default();
        assert_eq!(header.result(), ResultCode::Invalid);
    }
}
