//! Client shell configuration

use std::time::Duration;

use vapor_auth::AuthConfig;
use vapor_directory::DirectoryConfig;

/// Knobs for the session controller and the crates below it
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Cell id used for directory queries and logon
    pub cell_id: u32,
    /// Language reported to the backend
    pub language: String,
    /// Machine name reported on logon
    pub machine_name: String,
    /// Per-candidate connect timeout
    pub connect_timeout: Duration,
    /// Sleep before retrying after a network-level failure
    pub reconnect_interval: Duration,
    /// Connection-manager discovery settings
    pub directory: DirectoryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cell_id: 0,
            language: "english".to_string(),
            machine_name: "vapor".to_string(),
            connect_timeout: Duration::from_secs(5),
            reconnect_interval: Duration::from_secs(20),
            directory: DirectoryConfig::default(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cell_id(mut self, cell_id: u32) -> Self {
        self.cell_id = cell_id;
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    #[must_use]
    pub fn with_machine_name(mut self, machine_name: impl Into<String>) -> Self {
        self.machine_name = machine_name.into();
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect_interval(mut self, reconnect_interval: Duration) -> Self {
        self.reconnect_interval = reconnect_interval;
        self
    }

    #[must_use]
    pub fn with_directory(mut self, directory: DirectoryConfig) -> Self {
        self.directory = directory;
        self
    }

    /// Login-driver settings derived from this configuration.
    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::default()
            .with_cell_id(self.cell_id)
            .with_language(self.language.clone())
            .with_machine_name(self.machine_name.clone())
    }
}
