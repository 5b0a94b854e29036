//! Named-service request/response payloads
//!
//! Service calls ride in `ServiceMethodCallFromClient` (or the
//! non-authed variant) with the method name in the routing header, so
//! there is no envelope message here, only the payloads themselves.

/// Method names this client calls.
pub mod methods {
    pub const GET_RSA_KEY: &str = "Authentication.GetPasswordRSAPublicKey#1";
    pub const BEGIN_AUTH_SESSION: &str = "Authentication.BeginAuthSessionViaCredentials#1";
    pub const UPDATE_AUTH_SESSION: &str = "Authentication.UpdateAuthSessionWithSteamGuardCode#1";
    pub const POLL_AUTH_SESSION: &str = "Authentication.PollAuthSessionStatus#1";
    pub const RICH_PRESENCE_LOC: &str = "Community.GetAppRichPresenceLocalization#1";
    pub const LAST_PLAYED_TIMES: &str = "Player.ClientGetLastPlayedTimes#1";
    pub const CLOUD_CONFIG_DOWNLOAD: &str = "CloudConfigStore.Download#1";
    pub const REQUEST_FRIEND_PERSONA_STATES: &str = "Chat.RequestFriendPersonaStates#1";
}

/// Second-factor mechanism offered by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardType {
    Unknown,
    None,
    EmailCode,
    DeviceCode,
    DeviceConfirmation,
    EmailConfirmation,
    MachineToken,
    LegacyMachineAuth,
}

impl GuardType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::None,
            2 => Self::EmailCode,
            3 => Self::DeviceCode,
            4 => Self::DeviceConfirmation,
            5 => Self::EmailConfirmation,
            6 => Self::MachineToken,
            7 => Self::LegacyMachineAuth,
            _ => Self::Unknown,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::None => 1,
            Self::EmailCode => 2,
            Self::DeviceCode => 3,
            Self::DeviceConfirmation => 4,
            Self::EmailConfirmation => 5,
            Self::MachineToken => 6,
            Self::LegacyMachineAuth => 7,
        }
    }
}

/// Platform announced when opening an auth session
pub const PLATFORM_TYPE_CLIENT: i32 = 1;

/// Session persistence across restarts
pub const PERSISTENCE_PERSISTENT: i32 = 1;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPasswordRsaPublicKeyRequest {
    #[prost(string, optional, tag = "1")]
    pub account_name: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPasswordRsaPublicKeyResponse {
    /// Modulus as a hex string
    #[prost(string, optional, tag = "1")]
    pub publickey_mod: Option<String>,
    /// Exponent as a hex string
    #[prost(string, optional, tag = "2")]
    pub publickey_exp: Option<String>,
    /// Key timestamp echoed back on credential submission
    #[prost(uint64, optional, tag = "3")]
    pub timestamp: Option<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceDetails {
    #[prost(string, optional, tag = "1")]
    pub device_friendly_name: Option<String>,
    #[prost(int32, optional, tag = "2")]
    pub platform_type: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub os_type: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeginAuthSessionViaCredentialsRequest {
    #[prost(string, optional, tag = "1")]
    pub device_friendly_name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub account_name: Option<String>,
    /// RSA-encrypted password, base64-encoded
    #[prost(string, optional, tag = "3")]
    pub encrypted_password: Option<String>,
    #[prost(uint64, optional, tag = "4")]
    pub encryption_timestamp: Option<u64>,
    #[prost(bool, optional, tag = "5")]
    pub remember_login: Option<bool>,
    #[prost(int32, optional, tag = "6")]
    pub platform_type: Option<i32>,
    #[prost(int32, optional, tag = "7")]
    pub persistence: Option<i32>,
    #[prost(string, optional, tag = "8")]
    pub website_id: Option<String>,
    #[prost(message, optional, tag = "9")]
    pub device_details: Option<DeviceDetails>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AllowedConfirmation {
    #[prost(int32, optional, tag = "1")]
    pub confirmation_type: Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub associated_message: Option<String>,
}

impl AllowedConfirmation {
    pub fn guard_type(&self) -> GuardType {
        GuardType::from_raw(self.confirmation_type.unwrap_or_default())
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeginAuthSessionViaCredentialsResponse {
    #[prost(uint64, optional, tag = "1")]
    pub client_id: Option<u64>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub request_id: Option<Vec<u8>>,
    /// Suggested polling interval in seconds
    #[prost(float, optional, tag = "3")]
    pub interval: Option<f32>,
    #[prost(message, repeated, tag = "4")]
    pub allowed_confirmations: Vec<AllowedConfirmation>,
    #[prost(uint64, optional, tag = "5")]
    pub steamid: Option<u64>,
    #[prost(string, optional, tag = "8")]
    pub extended_error_message: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateAuthSessionWithSteamGuardCodeRequest {
    #[prost(uint64, optional, tag = "1")]
    pub client_id: Option<u64>,
    #[prost(fixed64, optional, tag = "2")]
    pub steamid: Option<u64>,
    #[prost(string, optional, tag = "3")]
    pub code: Option<String>,
    #[prost(int32, optional, tag = "4")]
    pub code_type: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateAuthSessionWithSteamGuardCodeResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PollAuthSessionStatusRequest {
    #[prost(uint64, optional, tag = "1")]
    pub client_id: Option<u64>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub request_id: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PollAuthSessionStatusResponse {
    #[prost(uint64, optional, tag = "1")]
    pub new_client_id: Option<u64>,
    #[prost(string, optional, tag = "3")]
    pub refresh_token: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub access_token: Option<String>,
    #[prost(bool, optional, tag = "5")]
    pub had_remote_interaction: Option<bool>,
    #[prost(string, optional, tag = "6")]
    pub account_name: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLastPlayedTimesRequest {
    #[prost(uint32, optional, tag = "1")]
    pub min_last_played: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLastPlayedTimesResponse {
    #[prost(message, repeated, tag = "1")]
    pub games: Vec<get_last_played_times_response::Game>,
}

pub mod get_last_played_times_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Game {
        #[prost(int32, optional, tag = "1")]
        pub appid: Option<i32>,
        #[prost(uint32, optional, tag = "2")]
        pub last_playtime: Option<u32>,
        #[prost(uint32, optional, tag = "3")]
        pub playtime_2weeks: Option<u32>,
        #[prost(uint32, optional, tag = "4")]
        pub playtime_forever: Option<u32>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CloudConfigDownloadRequest {
    #[prost(message, repeated, tag = "1")]
    pub versions: Vec<cloud_config::NamespaceVersion>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CloudConfigDownloadResponse {
    #[prost(message, repeated, tag = "1")]
    pub data: Vec<cloud_config::NamespaceData>,
}

pub mod cloud_config {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct NamespaceVersion {
        #[prost(uint32, optional, tag = "1")]
        pub enamespace: Option<u32>,
        #[prost(uint64, optional, tag = "2")]
        pub version: Option<u64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct NamespaceData {
        #[prost(uint32, optional, tag = "1")]
        pub enamespace: Option<u32>,
        #[prost(uint64, optional, tag = "2")]
        pub version: Option<u64>,
        #[prost(message, repeated, tag = "3")]
        pub entries: Vec<Entry>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Entry {
        #[prost(string, optional, tag = "1")]
        pub key: Option<String>,
        #[prost(bool, optional, tag = "2")]
        pub is_deleted: Option<bool>,
        #[prost(uint64, optional, tag = "3")]
        pub timestamp: Option<u64>,
        #[prost(string, optional, tag = "4")]
        pub value: Option<String>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetAppRichPresenceLocalizationRequest {
    #[prost(int32, optional, tag = "1")]
    pub appid: Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub language: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetAppRichPresenceLocalizationResponse {
    #[prost(int32, optional, tag = "1")]
    pub appid: Option<i32>,
    #[prost(message, repeated, tag = "2")]
    pub token_lists: Vec<rich_presence::TokenList>,
}

pub mod rich_presence {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TokenList {
        #[prost(string, optional, tag = "1")]
        pub language: Option<String>,
        #[prost(message, repeated, tag = "2")]
        pub tokens: Vec<Token>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Token {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub value: Option<String>,
    }
}

/// Re-request persona states for all friends, empty payload
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestFriendPersonaStatesRequest {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_type_round_trip() {
        for raw in 1..=7 {
            assert_eq!(GuardType::from_raw(raw).as_raw(), raw);
        }
    }

    #[test]
    fn test_guard_type_unknown_collapses() {
        assert_eq!(GuardType::from_raw(42), GuardType::Unknown);
        assert_eq!(GuardType::from_raw(-1), GuardType::Unknown);
    }
}
