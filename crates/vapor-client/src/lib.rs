//! Client shell for the connection-manager protocol
//!
//! Ties the lower crates together: discovers servers through
//! `vapor-directory`, runs the session from `vapor-protocol`, drives
//! logins with `vapor-auth` and fills the `vapor-cache` resolution
//! caches from a single dispatch task. The host talks to
//! [`VaporClient`] and gets failures classified into the
//! [`BackendFault`] taxonomy.

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod fault;
pub mod observer;
pub mod shell;

pub use config::ClientConfig;
pub use controller::{ActiveSession, ExitStatus, RetryAction, SessionController, classify_exit};
pub use dispatch::{CacheSet, Dispatcher, Outbound, SessionState};
pub use error::{Error, Result};
pub use fault::BackendFault;
pub use observer::{CacheObserver, NullObserver};
pub use shell::{CacheKind, CredentialSubmission, Entitlements, VaporClient};

pub use vapor_auth::{
    AuthConfig, AuthOutcome, ConfirmationMethod, CredentialStore, Identity, JsonFileStore,
    MemoryStore,
};
pub use vapor_cache::{Achievement, App, AppKind, Friend, GameStats, Playtime};
pub use vapor_directory::{DirectoryConfig, DirectoryLookup, WebDirectoryLookup};
