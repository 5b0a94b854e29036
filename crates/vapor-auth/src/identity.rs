//! Stored identity and the persistence seam
//!
//! The login driver only talks to [`CredentialStore`]; hosts decide
//! where the state actually lives.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Credentials of a successfully authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Login name
    pub account_name: String,
    /// Full 64-bit steam id
    pub steam_id: u64,
    /// Long-lived token exchanged during logon
    pub refresh_token: String,
    /// Short-lived token subordinate to the refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Display name, filled in once account info arrives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_name: Option<String>,
}

impl Identity {
    /// Low 32 bits of the steam id.
    #[must_use]
    pub fn account_id(&self) -> u32 {
        (self.steam_id & 0xFFFF_FFFF) as u32
    }
}

/// Everything the login driver persists between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    /// Base64 of the random machine id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
}

impl StoredState {
    /// Decoded machine id, if one has been stored and decodes cleanly.
    #[must_use]
    pub fn machine_id_bytes(&self) -> Option<Vec<u8>> {
        self.machine_id
            .as_deref()
            .and_then(|encoded| STANDARD.decode(encoded).ok())
    }

    pub fn set_machine_id(&mut self, bytes: &[u8]) {
        self.machine_id = Some(STANDARD.encode(bytes));
    }
}

/// Persistence seam for the login driver
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<StoredState>;
    async fn save(&self, state: &StoredState) -> Result<()>;
}

/// In-memory store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoredState>,
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<StoredState> {
        Ok(self.state.lock().clone())
    }

    async fn save(&self, state: &StoredState) -> Result<()> {
        *self.state.lock() = state.clone();
        Ok(())
    }
}

/// Stores the state as pretty-printed JSON at a fixed path.
///
/// A missing file loads as the default state, so first runs need no
/// setup.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn load(&self) -> Result<StoredState> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(StoredState::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, state: &StoredState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample_identity() -> Identity {
        Identity {
            account_name: "gamer".to_string(),
            steam_id: 76_561_198_000_000_001,
            refresh_token: "refresh".to_string(),
            access_token: Some("access".to_string()),
            persona_name: None,
        }
    }

    #[test]
    fn test_account_id_is_low_word() {
        assert_eq!(sample_identity().account_id(), 39_734_273);
    }

    #[test]
    fn test_machine_id_round_trips_through_base64() {
        let mut state = StoredState::default();
        state.set_machine_id(&[7u8; 32]);
        assert_eq!(state.machine_id_bytes(), Some(vec![7u8; 32]));
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::default();
        let state = StoredState {
            identity: Some(sample_identity()),
            machine_id: None,
        };
        store.save(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("credentials.json"));
        let mut state = StoredState {
            identity: Some(sample_identity()),
            machine_id: None,
        };
        state.set_machine_id(&[3u8; 32]);
        store.save(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().await.unwrap(), StoredState::default());
    }
}
