//! Connection-manager discovery for the protocol client
//!
//! Queries the public directory endpoint for candidate servers, ranks
//! them by measured connect latency and filters out endpoints that
//! recently failed.

pub mod blacklist;
pub mod directory;
pub mod error;
pub mod lookup;
pub mod ranking;

pub use blacklist::Blacklist;
pub use directory::{DirectoryConfig, ServerDirectory, ServerRecord};
pub use error::{Error, Result};
pub use lookup::{DirectoryLookup, WebDirectoryLookup};
