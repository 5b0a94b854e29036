//! Error types for the login driver

use thiserror::Error;
use vapor_wire::ResultCode;

/// Error types that can occur while driving a login
#[derive(Debug, Error)]
pub enum Error {
    /// Session-level failure (transport, job timeout, teardown)
    #[error("Protocol error: {0}")]
    Protocol(#[from] vapor_protocol::Error),

    /// Password key material did not parse
    #[error("Malformed password key: bad {field}")]
    MalformedKey {
        /// Offending key field
        field: &'static str,
    },

    /// RSA encryption failed
    #[error("Encryption error: {0}")]
    Encrypt(#[from] rsa::Error),

    /// A response body failed protobuf decoding
    #[error("Malformed response body: {0}")]
    Response(#[from] prost::DecodeError),

    /// The backend answered with a code the flow cannot recover from
    #[error("{operation} failed with {code}")]
    UnexpectedResult {
        /// Operation that observed the code
        operation: &'static str,
        /// Backend result code
        code: ResultCode,
    },

    /// A code or poll was submitted without an open auth session
    #[error("No authentication attempt in progress")]
    NoPendingAuth,

    /// Credential store I/O failure
    #[error("Credential store error: {0}")]
    Store(#[from] std::io::Error),

    /// Credential store contents did not parse
    #[error("Credential store format error: {0}")]
    StoreFormat(#[from] serde_json::Error),
}

/// Result type alias using the login Error type
pub type Result<T> = std::result::Result<T, Error>;
