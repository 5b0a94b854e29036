//! Login orchestration for the connection-manager protocol
//!
//! Drives the credential flow on top of a protocol session: RSA key
//! retrieval, encrypted credential submission, the ranked second-factor
//! branch, status polling and classic-logon finalization. Returning
//! identities skip straight to finalization with their stored refresh
//! token.

pub mod error;
pub mod flow;
pub mod identity;
pub mod machine;

pub use error::{Error, Result};
pub use flow::{AuthConfig, AuthFlow, AuthOutcome, ConfirmationMethod};
pub use identity::{CredentialStore, Identity, JsonFileStore, MemoryStore, StoredState};
