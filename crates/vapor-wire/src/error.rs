//! Error types for the wire layer

use thiserror::Error;

/// Error types that can occur while encoding or decoding frames
#[derive(Debug, Error)]
pub enum Error {
    /// Frame is shorter than the fixed 8-byte prefix or its declared
    /// header length overruns the buffer
    #[error("Truncated frame: {len} bytes")]
    Truncated {
        /// Observed length of the offending buffer
        len: usize,
    },

    /// The kind field does not carry the protobuf flag
    #[error("Frame is not protobuf-encoded (raw kind {raw:#x})")]
    NotProtobuf {
        /// Raw kind word as read from the wire
        raw: u32,
    },

    /// Protobuf decoding of a header or body failed
    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Decompressing a multi payload failed
    #[error("Decompression error: {0}")]
    Decompress(#[from] std::io::Error),

    /// Decompressed multi payload does not match its declared size
    #[error("Decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Size declared by the multi envelope
        expected: usize,
        /// Size actually produced by decompression
        actual: usize,
    },

    /// A key-values buffer is malformed
    #[error("KeyValues parse error: {0}")]
    KeyValues(String),
}

/// Result type alias using the wire Error type
pub type Result<T> = std::result::Result<T, Error>;
