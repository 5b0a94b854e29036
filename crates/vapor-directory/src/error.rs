//! Error types for connection-manager discovery

use thiserror::Error;

/// Error types that can occur while discovering servers
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request to the directory endpoint failed
    #[error("Directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Directory endpoint answered but flagged the query as failed
    #[error("Directory lookup unsuccessful: {message}")]
    LookupFailed {
        /// Message returned by the endpoint, often empty
        message: String,
    },

    /// Directory returned no usable candidates
    #[error("Directory returned no servers for cell {cell_id}")]
    NoServers {
        /// Cell id the query was scoped to
        cell_id: u32,
    },

    /// A returned endpoint could not be turned into a transport URL
    #[error("Invalid endpoint address {address:?}: {source}")]
    InvalidAddress {
        /// Endpoint string as returned by the directory
        address: String,
        #[source]
        source: url::ParseError,
    },
}

/// Result type alias using the directory Error type
pub type Result<T> = std::result::Result<T, Error>;
