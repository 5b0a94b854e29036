//! Error types for the client shell

use thiserror::Error;

use crate::fault::BackendFault;

/// Error types that can surface from the client shell
#[derive(Debug, Error)]
pub enum Error {
    /// Connection-manager discovery failed
    #[error("Directory error: {0}")]
    Directory(#[from] vapor_directory::Error),

    /// Session-level failure
    #[error("Protocol error: {0}")]
    Protocol(#[from] vapor_protocol::Error),

    /// Login driver failure
    #[error("Authentication error: {0}")]
    Auth(#[from] vapor_auth::Error),

    /// Classified backend failure surfaced to the host
    #[error("Backend fault: {0}")]
    Fault(BackendFault),

    /// Every directory candidate was rejected or unreachable
    #[error("No usable connection-manager candidates")]
    NoCandidates,

    /// An operation needs a live session and none is up
    #[error("Not connected")]
    NotConnected,
}

/// Result type alias using the client Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Fault category of this error, for hosts that only branch on
    /// the coarse taxonomy.
    #[must_use]
    pub fn fault(&self) -> BackendFault {
        match self {
            Self::Directory(_) | Self::NoCandidates | Self::NotConnected => BackendFault::Network,
            Self::Protocol(protocol) => BackendFault::from_protocol(protocol),
            Self::Auth(auth) => BackendFault::from_auth(auth),
            Self::Fault(fault) => *fault,
        }
    }
}
