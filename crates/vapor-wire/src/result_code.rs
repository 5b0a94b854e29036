//! Protocol result codes
//!
//! Only the codes the client branches on get named variants; everything
//! else survives as `Unknown` and falls into the generic backend-error
//! bucket during translation.

use std::fmt;

/// Result code carried in response headers and logon responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Invalid,
    Ok,
    Fail,
    NoConnection,
    InvalidPassword,
    LoggedInElsewhere,
    InvalidParam,
    FileNotFound,
    Busy,
    InvalidState,
    AccessDenied,
    Timeout,
    Banned,
    AccountNotFound,
    ServiceUnavailable,
    NotLoggedOn,
    Pending,
    InsufficientPrivilege,
    LimitExceeded,
    Revoked,
    Expired,
    DuplicateRequest,
    IpNotFound,
    LogonSessionReplaced,
    ConnectFailed,
    HandshakeFailed,
    IoFailure,
    RemoteDisconnect,
    Blocked,
    Ignored,
    AccountDisabled,
    TryAnotherCm,
    Suspended,
    Cancelled,
    DataCorruption,
    RemoteCallFailed,
    AccountLogonDenied,
    InvalidLoginAuthCode,
    ExpiredLoginAuthCode,
    AccountLockedDown,
    BadResponse,
    Disabled,
    RateLimitExceeded,
    AccountLoginDeniedNeedTwoFactor,
    AccountLoginDeniedThrottle,
    TwoFactorCodeMismatch,
    Unknown(i32),
}

impl ResultCode {
    /// Maps a raw result value to a code, preserving unknown values.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Invalid,
            1 => Self::Ok,
            2 => Self::Fail,
            3 => Self::NoConnection,
            5 => Self::InvalidPassword,
            6 => Self::LoggedInElsewhere,
            8 => Self::InvalidParam,
            9 => Self::FileNotFound,
            10 => Self::Busy,
            11 => Self::InvalidState,
            15 => Self::AccessDenied,
            16 => Self::Timeout,
            17 => Self::Banned,
            18 => Self::AccountNotFound,
            20 => Self::ServiceUnavailable,
            21 => Self::NotLoggedOn,
            22 => Self::Pending,
            24 => Self::InsufficientPrivilege,
            25 => Self::LimitExceeded,
            26 => Self::Revoked,
            27 => Self::Expired,
            29 => Self::DuplicateRequest,
            31 => Self::IpNotFound,
            34 => Self::LogonSessionReplaced,
            35 => Self::ConnectFailed,
            36 => Self::HandshakeFailed,
            37 => Self::IoFailure,
            38 => Self::RemoteDisconnect,
            40 => Self::Blocked,
            41 => Self::Ignored,
            43 => Self::AccountDisabled,
            48 => Self::TryAnotherCm,
            51 => Self::Suspended,
            52 => Self::Cancelled,
            53 => Self::DataCorruption,
            55 => Self::RemoteCallFailed,
            63 => Self::AccountLogonDenied,
            65 => Self::InvalidLoginAuthCode,
            71 => Self::ExpiredLoginAuthCode,
            73 => Self::AccountLockedDown,
            76 => Self::BadResponse,
            80 => Self::Disabled,
            84 => Self::RateLimitExceeded,
            85 => Self::AccountLoginDeniedNeedTwoFactor,
            87 => Self::AccountLoginDeniedThrottle,
            88 => Self::TwoFactorCodeMismatch,
            other => Self::Unknown(other),
        }
    }

    /// Returns the raw wire value of this code.
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Invalid => 0,
            Self::Ok => 1,
            Self::Fail => 2,
            Self::NoConnection => 3,
            Self::InvalidPassword => 5,
            Self::LoggedInElsewhere => 6,
            Self::InvalidParam => 8,
            Self::FileNotFound => 9,
            Self::Busy => 10,
            Self::InvalidState => 11,
            Self::AccessDenied => 15,
            Self::Timeout => 16,
            Self::Banned => 17,
            Self::AccountNotFound => 18,
            Self::ServiceUnavailable => 20,
            Self::NotLoggedOn => 21,
            Self::Pending => 22,
            Self::InsufficientPrivilege => 24,
            Self::LimitExceeded => 25,
            Self::Revoked => 26,
            Self::Expired => 27,
            Self::DuplicateRequest => 29,
            Self::IpNotFound => 31,
            Self::LogonSessionReplaced => 34,
            Self::ConnectFailed => 35,
            Self::HandshakeFailed => 36,
            Self::IoFailure => 37,
            Self::RemoteDisconnect => 38,
            Self::Blocked => 40,
            Self::Ignored => 41,
            Self::AccountDisabled => 43,
            Self::TryAnotherCm => 48,
            Self::Suspended => 51,
            Self::Cancelled => 52,
            Self::DataCorruption => 53,
            Self::RemoteCallFailed => 55,
            Self::AccountLogonDenied => 63,
            Self::InvalidLoginAuthCode => 65,
            Self::ExpiredLoginAuthCode => 71,
            Self::AccountLockedDown => 73,
            Self::BadResponse => 76,
            Self::Disabled => 80,
            Self::RateLimitExceeded => 84,
            Self::AccountLoginDeniedNeedTwoFactor => 85,
            Self::AccountLoginDeniedThrottle => 87,
            Self::TwoFactorCodeMismatch => 88,
            Self::Unknown(raw) => raw,
        }
    }

    /// True for the success code.
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "Unknown({raw})"),
            other => write!(f, "{other:?}"),
        }
    }
}
