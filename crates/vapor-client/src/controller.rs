//! Connection lifecycle
//!
//! Picks candidates from the directory, stands up the protocol session
//! with its receive loop and dispatch task, and classifies how a
//! session ended into the retry policy the shell executes.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use vapor_directory::{DirectoryLookup, ServerDirectory};
use vapor_protocol::{ProtocolSession, SessionHandle};
use vapor_wire::ResultCode;

use crate::config::ClientConfig;
use crate::dispatch::{CacheSet, Dispatcher, SessionState};
use crate::error::{Error, Result};
use crate::fault::BackendFault;
use crate::observer::CacheObserver;

/// One established session and the tasks keeping it alive
pub struct ActiveSession {
    pub session: SessionHandle,
    /// Directory endpoint this session is connected to
    pub endpoint: String,
    run: JoinHandle<vapor_protocol::Result<()>>,
    dispatch: JoinHandle<()>,
    state: Arc<SessionState>,
}

impl ActiveSession {
    /// True once the receive loop has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.run.is_finished()
    }

    /// Own display name, once account info has arrived.
    #[must_use]
    pub fn persona_name(&self) -> Option<String> {
        self.state.persona_name.lock().clone()
    }

    /// Collects how the session ended. A server-initiated logoff takes
    /// precedence over the transport error that usually follows it.
    pub async fn into_exit_status(self) -> ExitStatus {
        let logged_off = *self.state.logged_off.lock();
        self.dispatch.abort();
        let run_result = match self.run.await {
            Ok(result) => result,
            Err(join_error) => {
                warn!(%join_error, "receive loop task did not finish cleanly");
                Err(vapor_protocol::Error::Closed)
            }
        };
        if let Some(code) = logged_off {
            return ExitStatus::LoggedOff(code);
        }
        match run_result {
            Ok(()) => ExitStatus::CleanClose,
            Err(error) => ExitStatus::Failed(error),
        }
    }
}

/// How a session ended
#[derive(Debug)]
pub enum ExitStatus {
    /// The transport closed without an error or logoff
    CleanClose,
    /// The receive loop returned an error
    Failed(vapor_protocol::Error),
    /// The server logged the session off with the given code
    LoggedOff(ResultCode),
}

/// What the shell should do after a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// The close was requested; stay down
    Stop,
    /// Reconnect right away, same candidate pool
    Reconnect,
    /// Blacklist the current endpoint, then reconnect
    BlacklistReconnect,
    /// Wait out the reconnect interval, then reconnect
    DelayedReconnect,
    /// Drop the stored identity and start login over
    Reauthenticate,
    /// Surface the fault and stay down
    Fail(BackendFault),
}

/// Maps a session exit to the action the shell takes next.
#[must_use]
pub fn classify_exit(status: &ExitStatus) -> RetryAction {
    match status {
        ExitStatus::CleanClose => RetryAction::Stop,
        ExitStatus::Failed(error) if error.is_abnormal_close() => RetryAction::Reconnect,
        ExitStatus::Failed(error) => action_for(BackendFault::from_protocol(error)),
        ExitStatus::LoggedOff(code) => action_for(BackendFault::from_result_code(*code)),
    }
}

fn action_for(fault: BackendFault) -> RetryAction {
    match fault {
        BackendFault::Unavailable | BackendFault::Timeout | BackendFault::Backend => {
            RetryAction::BlacklistReconnect
        }
        BackendFault::Network => RetryAction::DelayedReconnect,
        BackendFault::AuthenticationLost => RetryAction::Reauthenticate,
        BackendFault::InvalidCredentials
        | BackendFault::TemporarilyBlocked
        | BackendFault::Banned
        | BackendFault::AccessDenied => RetryAction::Fail(fault),
    }
}

/// Stands sessions up against the best available candidate.
pub struct SessionController<L: DirectoryLookup> {
    directory: ServerDirectory<L>,
    config: ClientConfig,
}

impl<L: DirectoryLookup> SessionController<L> {
    pub fn new(lookup: L, config: ClientConfig) -> Self {
        let directory = ServerDirectory::new(lookup, config.directory.clone());
        Self { directory, config }
    }

    /// Connects to the first reachable candidate, greets the server
    /// and starts the receive loop and the dispatch task.
    ///
    /// Candidates that fail to connect are blacklisted before the next
    /// one is tried.
    pub async fn establish(
        &self,
        caches: Arc<CacheSet>,
        observer: Arc<dyn CacheObserver>,
    ) -> Result<ActiveSession> {
        let candidates = self.directory.list(self.config.cell_id).await?;
        for candidate in candidates {
            let connected =
                ProtocolSession::connect(&candidate.address, self.config.connect_timeout).await;
            let (session, events) = match connected {
                Ok(connected) => connected,
                Err(err) => {
                    warn!(endpoint = %candidate.endpoint, %err, "candidate unreachable");
                    self.directory.blacklist(&candidate.endpoint);
                    continue;
                }
            };
            if let Err(err) = session.hello().await {
                warn!(endpoint = %candidate.endpoint, %err, "greeting failed");
                self.directory.blacklist(&candidate.endpoint);
                session.close().await;
                continue;
            }
            let state = Arc::new(SessionState::default());
            let dispatcher = Dispatcher::new(
                Arc::clone(&session),
                caches,
                observer,
                Arc::clone(&state),
            );
            let run = tokio::spawn({
                let session = Arc::clone(&session);
                async move { session.run().await }
            });
            let dispatch = tokio::spawn(dispatcher.run(events));
            info!(endpoint = %candidate.endpoint, "connected");
            return Ok(ActiveSession {
                session,
                endpoint: candidate.endpoint,
                run,
                dispatch,
                state,
            });
        }
        Err(Error::NoCandidates)
    }

    /// Blacklists the endpoint of a session that just failed.
    pub fn blacklist(&self, endpoint: &str) {
        self.directory.blacklist(endpoint);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_clean_close_stops() {
        assert_eq!(classify_exit(&ExitStatus::CleanClose), RetryAction::Stop);
    }

    #[test]
    fn test_abnormal_close_reconnects_immediately() {
        let status = ExitStatus::Failed(vapor_protocol::Error::ClosedWithError { code: 1006 });
        assert_eq!(classify_exit(&status), RetryAction::Reconnect);
    }

    #[test]
    fn test_timeouts_blacklist_the_endpoint() {
        let status = ExitStatus::Failed(vapor_protocol::Error::JobTimeout { job_id: 9 });
        assert_eq!(classify_exit(&status), RetryAction::BlacklistReconnect);
    }

    #[test]
    fn test_transport_errors_wait_before_reconnecting() {
        let status = ExitStatus::Failed(vapor_protocol::Error::Closed);
        assert_eq!(classify_exit(&status), RetryAction::DelayedReconnect);
    }

    #[test]
    fn test_try_another_cm_blacklists() {
        let status = ExitStatus::LoggedOff(ResultCode::TryAnotherCm);
        assert_eq!(classify_exit(&status), RetryAction::BlacklistReconnect);
    }

    #[test]
    fn test_logged_in_elsewhere_restarts_login() {
        let status = ExitStatus::LoggedOff(ResultCode::LoggedInElsewhere);
        assert_eq!(classify_exit(&status), RetryAction::Reauthenticate);
    }

    #[test]
    fn test_account_faults_surface() {
        let status = ExitStatus::LoggedOff(ResultCode::Banned);
        assert_eq!(
            classify_exit(&status),
            RetryAction::Fail(BackendFault::Banned)
        );
        let status = ExitStatus::LoggedOff(ResultCode::AccessDenied);
        assert_eq!(
            classify_exit(&status),
            RetryAction::Fail(BackendFault::AccessDenied)
        );
    }
}
