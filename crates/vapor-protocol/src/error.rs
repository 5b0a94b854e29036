//! Error types for the protocol session

use thiserror::Error;
use vapor_wire::MsgKind;

/// Error types that can occur while running a protocol session
#[derive(Debug, Error)]
pub enum Error {
    /// Frame-level encode/decode failure
    #[error("Wire error: {0}")]
    Wire(#[from] vapor_wire::Error),

    /// Transport-level failure (handshake, socket, protocol violation)
    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connect attempt did not complete within the timeout
    #[error("Connect timed out after {timeout_secs}s to {address}")]
    ConnectTimeout {
        /// Transport URL of the candidate
        address: String,
        /// Timeout in seconds
        timeout_secs: u64,
    },

    /// Peer closed the connection with a non-normal close code
    #[error("Connection closed with code {code}")]
    ClosedWithError {
        /// WebSocket close code
        code: u16,
    },

    /// Inbound message exceeds the protocol size ceiling
    #[error("Inbound message too large: {len} bytes")]
    MessageTooLarge {
        /// Observed payload size
        len: usize,
    },

    /// A frame body failed protobuf decoding
    #[error("Malformed {kind} body: {source}")]
    MalformedBody {
        /// Kind of the offending frame
        kind: MsgKind,
        #[source]
        source: prost::DecodeError,
    },

    /// A correlated request was not answered in time
    #[error("Job {job_id} timed out")]
    JobTimeout {
        /// Id of the abandoned job
        job_id: u64,
    },

    /// The session was closed while requests were still pending
    #[error("Session closed")]
    Closed,
}

/// Result type alias using the protocol Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when the peer asked us to pick a different server or the
    /// close was otherwise not initiated by this client.
    pub fn is_abnormal_close(&self) -> bool {
        matches!(self, Self::ClosedWithError { .. })
    }
}
