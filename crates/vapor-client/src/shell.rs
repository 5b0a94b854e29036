//! Host-facing surface
//!
//! One object ties the directory, the protocol session, the login
//! driver and the resolution caches together. Hosts call
//! [`VaporClient::tick`] periodically; everything else is
//! request/response.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};
use vapor_auth::{AuthFlow, AuthOutcome, CredentialStore};
use vapor_cache::{App, Friend, GameStats, Playtime};
use vapor_directory::DirectoryLookup;
use vapor_protocol::SessionHandle;

use crate::config::ClientConfig;
use crate::controller::{ActiveSession, RetryAction, SessionController, classify_exit};
use crate::dispatch::CacheSet;
use crate::error::{Error, Result};
use crate::fault::BackendFault;
use crate::observer::CacheObserver;

/// Cache a readiness wait targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Games,
    Friends,
    Stats,
    Playtime,
}

/// One step of the credential flow, as submitted by the host
#[derive(Debug, Clone)]
pub enum CredentialSubmission {
    /// Fresh login from account name and password
    AccountPassword {
        account_name: String,
        password: String,
    },
    /// Second-factor code for the pending attempt
    GuardCode(String),
}

/// Resolved entitlement view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entitlements {
    /// Games owned by this account
    pub games: Vec<App>,
    /// DLC owned by this account
    pub dlc: Vec<App>,
    /// Games borrowed through family sharing
    pub shared: Vec<App>,
}

/// The client shell
pub struct VaporClient<L: DirectoryLookup> {
    controller: SessionController<L>,
    config: ClientConfig,
    caches: Arc<CacheSet>,
    observer: Arc<dyn CacheObserver>,
    store: Arc<dyn CredentialStore>,
    active: Option<ActiveSession>,
    flow: Option<AuthFlow>,
    retry_at: Option<Instant>,
}

impl<L: DirectoryLookup> VaporClient<L> {
    pub fn new(
        config: ClientConfig,
        lookup: L,
        store: Arc<dyn CredentialStore>,
        observer: Arc<dyn CacheObserver>,
    ) -> Self {
        let controller = SessionController::new(lookup, config.clone());
        Self {
            controller,
            config,
            caches: Arc::new(CacheSet::new()),
            observer,
            store,
            active: None,
            flow: None,
            retry_at: None,
        }
    }

    /// True while a session is up and its receive loop is running.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.active.as_ref().is_some_and(|active| !active.is_finished())
    }

    /// Connects if needed and restores the stored identity.
    ///
    /// [`AuthOutcome::Expired`] is also returned when nothing is
    /// stored, so the host prompts for credentials either way.
    pub async fn authenticate(&mut self) -> Result<AuthOutcome> {
        self.ensure_connected().await?;
        let flow = self.flow.as_mut().ok_or(Error::NotConnected)?;
        match flow.resume().await? {
            Some(outcome) => Ok(outcome),
            None => Ok(AuthOutcome::Expired),
        }
    }

    /// Submits one step of the credential flow.
    pub async fn submit_credentials(
        &mut self,
        submission: CredentialSubmission,
    ) -> Result<AuthOutcome> {
        self.ensure_connected().await?;
        let flow = self.flow.as_mut().ok_or(Error::NotConnected)?;
        let outcome = match submission {
            CredentialSubmission::AccountPassword {
                account_name,
                password,
            } => flow.login(&account_name, &password).await?,
            CredentialSubmission::GuardCode(code) => flow.submit_code(&code).await?,
        };
        Ok(outcome)
    }

    /// Polls until a device confirmation is acted on or expires.
    pub async fn await_confirmation(&mut self) -> Result<AuthOutcome> {
        let flow = self.flow.as_mut().ok_or(Error::NotConnected)?;
        Ok(flow.await_confirmation().await?)
    }

    /// Waits until the given cache reports fully resolved.
    ///
    /// Returns false when the timeout elapses first; in-flight imports
    /// are left untouched either way.
    pub async fn wait_ready(&self, cache: CacheKind, timeout: Duration) -> bool {
        let wait = async {
            match cache {
                CacheKind::Games => self.caches.games.wait_ready().await,
                CacheKind::Friends => self.caches.friends.wait_ready().await,
                CacheKind::Stats => self.caches.stats.wait_ready().await,
                CacheKind::Playtime => self.caches.playtime.wait_ready().await,
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Fully resolved friends, in stable order.
    #[must_use]
    pub fn get_friends(&self) -> Vec<Friend> {
        self.caches.friends.friends()
    }

    /// Nickname this account gave a friend, if any.
    #[must_use]
    pub fn nickname(&self, steam_id: u64) -> Option<String> {
        self.caches.friends.nickname(steam_id)
    }

    /// Resolved games, DLC and shared titles.
    #[must_use]
    pub fn get_owned_entitlements(&self) -> Entitlements {
        Entitlements {
            games: self.caches.games.owned_games(),
            dlc: self.caches.games.dlcs(),
            shared: self.caches.games.shared_games(),
        }
    }

    /// Imported stats and achievements for one game.
    #[must_use]
    pub fn game_stats(&self, app_id: u32) -> Option<GameStats> {
        self.caches.stats.stats(app_id)
    }

    /// Recorded play times, in stable app-id order.
    #[must_use]
    pub fn playtimes(&self) -> Vec<(u32, Playtime)> {
        self.caches.playtime.all()
    }

    /// Own display name, once account info has arrived.
    #[must_use]
    pub fn persona_name(&self) -> Option<String> {
        self.active.as_ref().and_then(ActiveSession::persona_name)
    }

    /// Requests stats and achievements for the given games. Responses
    /// are applied by the dispatch task as they arrive.
    pub async fn refresh_stats(&self, app_ids: &[u32]) -> Result<()> {
        let session = self.session()?;
        self.caches.stats.start_import(app_ids);
        for app_id in app_ids {
            session.request_user_stats(u64::from(*app_id)).await?;
        }
        Ok(())
    }

    /// Fetches the full played-times map and returns the fresh view.
    pub async fn refresh_playtime(&self) -> Result<Vec<(u32, Playtime)>> {
        let session = self.session()?;
        self.caches.playtime.start_import();
        let response = session.request_last_played_times().await?;
        self.caches.playtime.import_times(&response);
        Ok(self.caches.playtime.all())
    }

    /// Drives the reconnect policy one step. Hosts call this
    /// periodically; a healthy session makes it near-free.
    pub async fn tick(&mut self) -> Result<()> {
        if let Some(retry_at) = self.retry_at {
            if Instant::now() < retry_at {
                return Ok(());
            }
            self.retry_at = None;
            return self.reconnect_or_backoff().await;
        }

        let finished = self.active.as_ref().is_some_and(ActiveSession::is_finished);
        if !finished {
            let name = self.active.as_ref().and_then(ActiveSession::persona_name);
            if let (Some(name), Some(flow)) = (name, self.flow.as_mut()) {
                flow.update_persona_name(&name).await?;
            }
            return Ok(());
        }

        let Some(active) = self.active.take() else {
            return Ok(());
        };
        let endpoint = active.endpoint.clone();
        let status = active.into_exit_status().await;
        debug!(?status, endpoint, "session ended");
        match classify_exit(&status) {
            RetryAction::Stop => {
                self.flow = None;
                Ok(())
            }
            RetryAction::Reconnect => {
                self.flow = None;
                self.reconnect_or_backoff().await
            }
            RetryAction::BlacklistReconnect => {
                self.flow = None;
                self.controller.blacklist(&endpoint);
                self.reconnect_or_backoff().await
            }
            RetryAction::DelayedReconnect => {
                self.flow = None;
                self.retry_at = Some(Instant::now() + self.config.reconnect_interval);
                debug!(
                    "reconnecting in {}s",
                    self.config.reconnect_interval.as_secs()
                );
                Ok(())
            }
            RetryAction::Reauthenticate => {
                if let Some(flow) = self.flow.as_mut() {
                    if let Err(err) = flow.invalidate_identity().await {
                        warn!(%err, "failed to drop the stored identity");
                    }
                }
                self.flow = None;
                Err(Error::Fault(BackendFault::AuthenticationLost))
            }
            RetryAction::Fail(fault) => {
                self.flow = None;
                Err(Error::Fault(fault))
            }
        }
    }

    /// Closes the session and stops the background tasks.
    pub async fn shutdown(&mut self) {
        self.retry_at = None;
        self.flow = None;
        if let Some(active) = self.active.take() {
            active.session.close().await;
            let status = active.into_exit_status().await;
            debug!(?status, "session shut down");
        }
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }
        let active = self
            .controller
            .establish(Arc::clone(&self.caches), Arc::clone(&self.observer))
            .await?;
        let flow = AuthFlow::new(
            Arc::clone(&active.session),
            Arc::clone(&self.store),
            self.config.auth_config(),
        )
        .await?;
        self.flow = Some(flow);
        self.active = Some(active);
        Ok(())
    }

    /// Reconnects now, or arms the retry timer when every known
    /// candidate is currently excluded.
    async fn reconnect_or_backoff(&mut self) -> Result<()> {
        match self.reconnect().await {
            Err(Error::NoCandidates) => {
                self.retry_at = Some(Instant::now() + self.config.reconnect_interval);
                debug!(
                    "no usable endpoints, retrying in {}s",
                    self.config.reconnect_interval.as_secs()
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Re-establishes the session and restores the stored identity.
    async fn reconnect(&mut self) -> Result<()> {
        self.ensure_connected().await?;
        let flow = self.flow.as_mut().ok_or(Error::NotConnected)?;
        match flow.resume().await? {
            Some(AuthOutcome::Authenticated(identity)) => {
                debug!(account = %identity.account_name, "session restored");
                Ok(())
            }
            _ => Err(Error::Fault(BackendFault::AuthenticationLost)),
        }
    }

    fn session(&self) -> Result<&SessionHandle> {
        self.active
            .as_ref()
            .map(|active| &active.session)
            .ok_or(Error::NotConnected)
    }
}
