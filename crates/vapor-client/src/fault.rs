//! Backend fault taxonomy
//!
//! Collapses the wire's result codes and the lower-layer error types
//! into the handful of categories the reconnect policy and the host
//! branch on. Codes without a named bucket land in [`BackendFault::Backend`].

use thiserror::Error;
use vapor_wire::ResultCode;

/// Category of a failed backend interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum BackendFault {
    /// Account name, password or second-factor code rejected
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Connection-level failure before or during the session
    #[error("network failure")]
    Network,
    /// The backend is overloaded or asked for a retry elsewhere
    #[error("backend unavailable")]
    Unavailable,
    /// A request or connect attempt ran out of time
    #[error("backend timeout")]
    Timeout,
    /// Rate limit hit or the account is temporarily locked
    #[error("temporarily blocked")]
    TemporarilyBlocked,
    /// The account is barred from the service
    #[error("account banned")]
    Banned,
    /// The account may not perform the requested operation
    #[error("access denied")]
    AccessDenied,
    /// The session's authentication is no longer valid
    #[error("authentication lost")]
    AuthenticationLost,
    /// Any other backend-reported failure
    #[error("backend error")]
    Backend,
}

impl BackendFault {
    /// Buckets a result code.
    #[must_use]
    pub fn from_result_code(code: ResultCode) -> Self {
        match code {
            ResultCode::InvalidPassword
            | ResultCode::AccountNotFound
            | ResultCode::InvalidLoginAuthCode
            | ResultCode::ExpiredLoginAuthCode
            | ResultCode::TwoFactorCodeMismatch
            | ResultCode::AccountLogonDenied => Self::InvalidCredentials,
            ResultCode::NoConnection
            | ResultCode::ConnectFailed
            | ResultCode::HandshakeFailed
            | ResultCode::IoFailure
            | ResultCode::RemoteDisconnect => Self::Network,
            ResultCode::Busy
            | ResultCode::ServiceUnavailable
            | ResultCode::Pending
            | ResultCode::IpNotFound
            | ResultCode::TryAnotherCm
            | ResultCode::Cancelled => Self::Unavailable,
            ResultCode::Timeout => Self::Timeout,
            ResultCode::RateLimitExceeded
            | ResultCode::LimitExceeded
            | ResultCode::Suspended
            | ResultCode::AccountLockedDown
            | ResultCode::AccountLoginDeniedThrottle => Self::TemporarilyBlocked,
            ResultCode::Banned | ResultCode::AccountDisabled => Self::Banned,
            ResultCode::AccessDenied
            | ResultCode::InsufficientPrivilege
            | ResultCode::LogonSessionReplaced
            | ResultCode::Blocked => Self::AccessDenied,
            ResultCode::LoggedInElsewhere => Self::AuthenticationLost,
            _ => Self::Backend,
        }
    }

    /// Buckets a session-layer error.
    #[must_use]
    pub fn from_protocol(error: &vapor_protocol::Error) -> Self {
        match error {
            vapor_protocol::Error::Transport(_)
            | vapor_protocol::Error::ClosedWithError { .. }
            | vapor_protocol::Error::Closed => Self::Network,
            vapor_protocol::Error::ConnectTimeout { .. }
            | vapor_protocol::Error::JobTimeout { .. } => Self::Timeout,
            vapor_protocol::Error::Wire(_)
            | vapor_protocol::Error::MessageTooLarge { .. }
            | vapor_protocol::Error::MalformedBody { .. } => Self::Backend,
        }
    }

    /// Buckets a login-driver error.
    #[must_use]
    pub fn from_auth(error: &vapor_auth::Error) -> Self {
        match error {
            vapor_auth::Error::Protocol(protocol) => Self::from_protocol(protocol),
            vapor_auth::Error::UnexpectedResult { code, .. } => Self::from_result_code(*code),
            _ => Self::Backend,
        }
    }

    /// True when retrying against another server could help.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Unavailable | Self::Timeout | Self::Backend)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_result_code_translation_table() {
        let table = [
            (ResultCode::InvalidPassword, BackendFault::InvalidCredentials),
            (ResultCode::AccountNotFound, BackendFault::InvalidCredentials),
            (ResultCode::TwoFactorCodeMismatch, BackendFault::InvalidCredentials),
            (ResultCode::ConnectFailed, BackendFault::Network),
            (ResultCode::IoFailure, BackendFault::Network),
            (ResultCode::RemoteDisconnect, BackendFault::Network),
            (ResultCode::Busy, BackendFault::Unavailable),
            (ResultCode::ServiceUnavailable, BackendFault::Unavailable),
            (ResultCode::Pending, BackendFault::Unavailable),
            (ResultCode::IpNotFound, BackendFault::Unavailable),
            (ResultCode::TryAnotherCm, BackendFault::Unavailable),
            (ResultCode::Cancelled, BackendFault::Unavailable),
            (ResultCode::Timeout, BackendFault::Timeout),
            (ResultCode::RateLimitExceeded, BackendFault::TemporarilyBlocked),
            (ResultCode::LimitExceeded, BackendFault::TemporarilyBlocked),
            (ResultCode::Suspended, BackendFault::TemporarilyBlocked),
            (ResultCode::AccountLockedDown, BackendFault::TemporarilyBlocked),
            (ResultCode::Banned, BackendFault::Banned),
            (ResultCode::AccessDenied, BackendFault::AccessDenied),
            (ResultCode::InsufficientPrivilege, BackendFault::AccessDenied),
            (ResultCode::LogonSessionReplaced, BackendFault::AccessDenied),
            (ResultCode::Blocked, BackendFault::AccessDenied),
            (ResultCode::LoggedInElsewhere, BackendFault::AuthenticationLost),
            (ResultCode::DataCorruption, BackendFault::Backend),
            (ResultCode::BadResponse, BackendFault::Backend),
            (ResultCode::Fail, BackendFault::Backend),
            (ResultCode::Unknown(999), BackendFault::Backend),
        ];
        for (code, fault) in table {
            assert_eq!(BackendFault::from_result_code(code), fault, "code {code}");
        }
    }

    #[test]
    fn test_protocol_errors_bucket_by_layer() {
        assert_eq!(
            BackendFault::from_protocol(&vapor_protocol::Error::ConnectTimeout {
                address: "wss://cm.example/cmsocket/".to_string(),
                timeout_secs: 5,
            }),
            BackendFault::Timeout
        );
        assert_eq!(
            BackendFault::from_protocol(&vapor_protocol::Error::JobTimeout { job_id: 4 }),
            BackendFault::Timeout
        );
        assert_eq!(
            BackendFault::from_protocol(&vapor_protocol::Error::Closed),
            BackendFault::Network
        );
        assert_eq!(
            BackendFault::from_protocol(&vapor_protocol::Error::MessageTooLarge { len: 1 }),
            BackendFault::Backend
        );
    }

    #[test]
    fn test_auth_errors_pass_through_the_code() {
        let error = vapor_auth::Error::UnexpectedResult {
            operation: "logon",
            code: ResultCode::TryAnotherCm,
        };
        assert_eq!(BackendFault::from_auth(&error), BackendFault::Unavailable);
        assert_eq!(
            BackendFault::from_auth(&vapor_auth::Error::NoPendingAuth),
            BackendFault::Backend
        );
    }

    #[test]
    fn test_retryable_buckets() {
        assert!(BackendFault::Unavailable.is_retryable());
        assert!(BackendFault::Timeout.is_retryable());
        assert!(!BackendFault::InvalidCredentials.is_retryable());
        assert!(!BackendFault::Banned.is_retryable());
    }
}
