//! Login state machine
//!
//! One driver call covers one user-visible step: `login` submits
//! credentials and either finishes or reports the second factor the
//! backend wants, `submit_code`/`await_confirmation` complete that
//! factor, and `resume` finalizes directly from a stored refresh
//! token. Recoverable decisions come back as [`AuthOutcome`] values;
//! transport failures and unexpected result codes propagate as errors
//! for the session controller to classify.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use prost::Message;
use tracing::{debug, info, warn};
use vapor_protocol::{JobOptions, SessionHandle};
use vapor_wire::proto::header::{FrameHeader, IpAddress, ip_address};
use vapor_wire::proto::login::{ClientLogon, ClientLogonResponse};
use vapor_wire::proto::service::{
    AllowedConfirmation, BeginAuthSessionViaCredentialsRequest,
    BeginAuthSessionViaCredentialsResponse, DeviceDetails, GetPasswordRsaPublicKeyRequest,
    GetPasswordRsaPublicKeyResponse, GuardType, PERSISTENCE_PERSISTENT, PLATFORM_TYPE_CLIENT,
    PollAuthSessionStatusRequest, PollAuthSessionStatusResponse,
    UpdateAuthSessionWithSteamGuardCodeRequest, UpdateAuthSessionWithSteamGuardCodeResponse,
    methods,
};
use vapor_wire::{CLIENT_PACKAGE_VERSION, MsgKind, PROTOCOL_VERSION, ResultCode};

use crate::error::{Error, Result};
use crate::identity::{CredentialStore, Identity, StoredState};
use crate::machine::{self, PasswordKey};

/// Second-factor branch, ranked for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationMethod {
    /// Approve the login in the mobile app
    DeviceConfirmation,
    /// Enter a code from the mobile authenticator
    DeviceCode,
    /// Enter a code sent by email
    EmailCode,
    /// No second factor required
    None,
}

impl ConfirmationMethod {
    fn from_guard(guard: GuardType) -> Option<Self> {
        match guard {
            GuardType::DeviceConfirmation => Some(Self::DeviceConfirmation),
            GuardType::DeviceCode => Some(Self::DeviceCode),
            GuardType::EmailCode => Some(Self::EmailCode),
            GuardType::None => Some(Self::None),
            _ => None,
        }
    }

    fn guard_type(self) -> GuardType {
        match self {
            Self::DeviceConfirmation => GuardType::DeviceConfirmation,
            Self::DeviceCode => GuardType::DeviceCode,
            Self::EmailCode => GuardType::EmailCode,
            Self::None => GuardType::None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::DeviceConfirmation => 0,
            Self::DeviceCode => 1,
            Self::EmailCode => 2,
            Self::None => 3,
        }
    }

    /// True when the caller must collect a code from the user.
    #[must_use]
    pub fn needs_code(self) -> bool {
        matches!(self, Self::DeviceCode | Self::EmailCode)
    }
}

/// Terminal answer of one driver call
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// Login finished and the identity has been persisted
    Authenticated(Identity),
    /// The backend wants a second factor before polling can succeed
    ConfirmationRequired {
        method: ConfirmationMethod,
        /// Hint for the user, such as a masked email address
        message: String,
    },
    /// Credentials or code rejected; the same step can be retried
    InvalidAuthData,
    /// The confirmation window closed; restart from credentials
    Expired,
}

/// Knobs for the login driver
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Cell id reported on logon, usually from the directory lookup
    pub cell_id: u32,
    pub language: String,
    pub machine_name: String,
    pub device_friendly_name: String,
    /// Upper bound on waiting for a confirmation to be acted on
    pub poll_deadline: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cell_id: 0,
            language: "english".to_string(),
            machine_name: "vapor".to_string(),
            device_friendly_name: "vapor client".to_string(),
            poll_deadline: Duration::from_secs(180),
        }
    }
}

impl AuthConfig {
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
    pub fn with_poll_deadline(mut self, poll_deadline: Duration) -> Self {
        self.poll_deadline = poll_deadline;
        self
    }
}

/// State carried between credential submission and finalization
#[derive(Debug, Clone)]
struct PendingAuth {
    client_id: u64,
    steam_id: u64,
    request_id: Vec<u8>,
    interval: Duration,
    methods: Vec<(ConfirmationMethod, String)>,
    account_name: String,
}

/// Drives one account's login against a live session.
pub struct AuthFlow {
    session: SessionHandle,
    store: Arc<dyn CredentialStore>,
    config: AuthConfig,
    machine_id: Vec<u8>,
    identity: Option<Identity>,
    pending: Option<PendingAuth>,
}

impl AuthFlow {
    /// Loads persisted state and generates the machine id on first use.
    pub async fn new(
        session: SessionHandle,
        store: Arc<dyn CredentialStore>,
        config: AuthConfig,
    ) -> Result<Self> {
        let mut state = store.load().await?;
        let machine_id = match state.machine_id_bytes() {
            Some(id) => id,
            None => {
                let id = machine::generate_machine_id();
                state.set_machine_id(&id);
                store.save(&state).await?;
                info!("generated new machine id");
                id
            }
        };
        Ok(Self {
            session,
            store,
            config,
            machine_id,
            identity: state.identity,
            pending: None,
        })
    }

    /// Identity from a previous run, when one is stored.
    #[must_use]
    pub fn stored_identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Finalizes directly from the stored refresh token. Returns
    /// `None` when no identity is stored and credentials are needed.
    pub async fn resume(&mut self) -> Result<Option<AuthOutcome>> {
        let Some(identity) = self.identity.clone() else {
            return Ok(None);
        };
        info!(account_name = %identity.account_name, "resuming with stored identity");
        Ok(Some(self.logon(identity).await?))
    }

    /// Submits account credentials and drives the flow as far as it
    /// can go without user interaction.
    pub async fn login(&mut self, account_name: &str, password: &str) -> Result<AuthOutcome> {
        self.pending = None;
        debug!(account_name, "requesting password key");
        let request = GetPasswordRsaPublicKeyRequest {
            account_name: Some(account_name.to_string()),
        };
        let (header, key_response): (FrameHeader, GetPasswordRsaPublicKeyResponse) = self
            .session
            .service_call(methods::GET_RSA_KEY, &request)
            .await?;
        let code = header.result();
        if code != ResultCode::Ok {
            return Err(Error::UnexpectedResult {
                operation: "password key retrieval",
                code,
            });
        }
        let key = PasswordKey::from_hex(
            key_response.publickey_mod.as_deref().unwrap_or_default(),
            key_response.publickey_exp.as_deref().unwrap_or_default(),
            key_response.timestamp.unwrap_or_default(),
        )?;
        let encrypted_password = key.encrypt(password)?;

        let request = BeginAuthSessionViaCredentialsRequest {
            device_friendly_name: Some(self.config.device_friendly_name.clone()),
            account_name: Some(account_name.to_string()),
            encrypted_password: Some(encrypted_password),
            encryption_timestamp: Some(key.timestamp),
            remember_login: None,
            platform_type: Some(PLATFORM_TYPE_CLIENT),
            persistence: Some(PERSISTENCE_PERSISTENT),
            website_id: Some("Client".to_string()),
            device_details: Some(DeviceDetails {
                device_friendly_name: Some(self.config.device_friendly_name.clone()),
                platform_type: Some(PLATFORM_TYPE_CLIENT),
                os_type: Some(machine::os_type() as i32),
            }),
        };
        let (header, response): (FrameHeader, BeginAuthSessionViaCredentialsResponse) = self
            .session
            .service_call(methods::BEGIN_AUTH_SESSION, &request)
            .await?;
        match header.result() {
            ResultCode::Ok => {}
            code @ (ResultCode::InvalidPassword
            | ResultCode::InvalidParam
            | ResultCode::AccountNotFound
            | ResultCode::InvalidLoginAuthCode) => {
                debug!(%code, "credentials rejected");
                return Ok(AuthOutcome::InvalidAuthData);
            }
            code => {
                return Err(Error::UnexpectedResult {
                    operation: "credential submission",
                    code,
                });
            }
        }
        if let Some(extended) = response
            .extended_error_message
            .as_deref()
            .filter(|m| !m.is_empty())
        {
            debug!(extended, "credential submission carried extended error");
        }

        let ranked = rank_confirmations(&response.allowed_confirmations);
        let Some((method, message)) = ranked.first().cloned() else {
            warn!("no usable confirmation method offered");
            return Ok(AuthOutcome::InvalidAuthData);
        };
        self.pending = Some(PendingAuth {
            client_id: response.client_id.unwrap_or_default(),
            steam_id: response.steamid.unwrap_or_default(),
            request_id: response.request_id.clone().unwrap_or_default(),
            interval: poll_interval(response.interval),
            methods: ranked,
            account_name: account_name.to_string(),
        });
        if method == ConfirmationMethod::None {
            return self.poll_and_finalize(false).await;
        }
        Ok(AuthOutcome::ConfirmationRequired { method, message })
    }

    /// Submits a second-factor code for the pending attempt.
    pub async fn submit_code(&mut self, code: &str) -> Result<AuthOutcome> {
        let pending = self.pending.as_ref().ok_or(Error::NoPendingAuth)?;
        let Some(method) = pending
            .methods
            .iter()
            .find(|(method, _)| method.needs_code())
            .map(|&(method, _)| method)
        else {
            return Ok(AuthOutcome::InvalidAuthData);
        };
        let request = UpdateAuthSessionWithSteamGuardCodeRequest {
            client_id: Some(pending.client_id),
            steamid: Some(pending.steam_id),
            code: Some(code.to_string()),
            code_type: Some(method.guard_type().as_raw()),
        };
        let (header, _response): (FrameHeader, UpdateAuthSessionWithSteamGuardCodeResponse) = self
            .session
            .service_call(methods::UPDATE_AUTH_SESSION, &request)
            .await?;
        match header.result() {
            ResultCode::Ok | ResultCode::DuplicateRequest => self.poll_and_finalize(false).await,
            ResultCode::Expired => {
                self.pending = None;
                Ok(AuthOutcome::Expired)
            }
            ResultCode::InvalidLoginAuthCode | ResultCode::TwoFactorCodeMismatch => {
                // Pending state stays so the caller can retry with a
                // fresh code.
                debug!("second-factor code rejected");
                Ok(AuthOutcome::InvalidAuthData)
            }
            code => Err(Error::UnexpectedResult {
                operation: "second-factor update",
                code,
            }),
        }
    }

    /// Waits for a device confirmation to be acted on, polling until
    /// the configured deadline.
    pub async fn await_confirmation(&mut self) -> Result<AuthOutcome> {
        self.poll_and_finalize(true).await
    }

    /// Drops the stored identity after an authentication loss so the
    /// next attempt starts from credentials.
    pub async fn invalidate_identity(&mut self) -> Result<()> {
        if self.identity.is_some() {
            info!("invalidating stored identity");
            self.persist_identity(None).await?;
        }
        Ok(())
    }

    /// Records the display name pushed in account info.
    pub async fn update_persona_name(&mut self, persona_name: &str) -> Result<()> {
        if let Some(identity) = self.identity.clone() {
            if identity.persona_name.as_deref() != Some(persona_name) {
                let identity = Identity {
                    persona_name: Some(persona_name.to_string()),
                    ..identity
                };
                self.persist_identity(Some(identity)).await?;
            }
        }
        Ok(())
    }

    async fn poll_and_finalize(&mut self, is_confirm: bool) -> Result<AuthOutcome> {
        let pending = self.pending.clone().ok_or(Error::NoPendingAuth)?;
        let deadline = tokio::time::Instant::now() + self.config.poll_deadline;
        let mut client_id = pending.client_id;
        loop {
            let request = PollAuthSessionStatusRequest {
                client_id: Some(client_id),
                request_id: Some(pending.request_id.clone()),
            };
            let (header, response): (FrameHeader, PollAuthSessionStatusResponse) = self
                .session
                .service_call(methods::POLL_AUTH_SESSION, &request)
                .await?;
            match header.result() {
                ResultCode::Ok => {
                    if let Some(new_id) = response.new_client_id.filter(|&id| id != 0) {
                        client_id = new_id;
                    }
                    // Ok only confirms the poll itself; login is done
                    // once a refresh token is present.
                    if let Some(refresh_token) =
                        response.refresh_token.filter(|token| !token.is_empty())
                    {
                        let account_name = response
                            .account_name
                            .filter(|name| !name.is_empty())
                            .unwrap_or_else(|| pending.account_name.clone());
                        let identity = Identity {
                            account_name,
                            steam_id: pending.steam_id,
                            refresh_token,
                            access_token: response.access_token.filter(|token| !token.is_empty()),
                            persona_name: None,
                        };
                        self.pending = None;
                        return self.logon(identity).await;
                    }
                }
                ResultCode::Expired => {
                    self.pending = None;
                    return Ok(AuthOutcome::Expired);
                }
                // Shows up while a device confirmation has not been
                // acted on yet; anywhere else the window is gone.
                ResultCode::FileNotFound if is_confirm => {}
                ResultCode::FileNotFound => {
                    self.pending = None;
                    return Ok(AuthOutcome::Expired);
                }
                code => {
                    warn!(%code, "status poll failed");
                    self.pending = None;
                    return Ok(AuthOutcome::InvalidAuthData);
                }
            }
            if tokio::time::Instant::now() + pending.interval > deadline {
                debug!("confirmation window elapsed without a token");
                self.pending = None;
                return Ok(AuthOutcome::Expired);
            }
            tokio::time::sleep(pending.interval).await;
        }
    }

    /// Classic token logon, the final step of every path.
    async fn logon(&mut self, identity: Identity) -> Result<AuthOutcome> {
        let previously_authenticated = self.identity.is_some();
        self.session.adopt_steam_id(identity.steam_id);
        let message = ClientLogon {
            protocol_version: Some(PROTOCOL_VERSION),
            cell_id: Some(self.config.cell_id),
            client_package_version: Some(CLIENT_PACKAGE_VERSION),
            client_language: Some(self.config.language.clone()),
            client_os_type: Some(machine::os_type()),
            should_remember_password: Some(true),
            obfuscated_private_ip: self.obfuscated_ip(),
            qos_level: Some(3),
            machine_id: Some(self.machine_id.clone()),
            chat_mode: None,
            account_name: Some(identity.account_name.clone()),
            eresult_sentryfile: Some(ResultCode::FileNotFound.as_raw()),
            machine_name: Some(self.config.machine_name.clone()),
            supports_rate_limit_response: Some(true),
            access_token: Some(identity.refresh_token.clone()),
        };
        debug!("sending token logon");
        let reply = self
            .session
            .send_job(
                MsgKind::ClientLogon,
                &message,
                JobOptions::expect_kind(MsgKind::ClientLogOnResponse).unsolicited_fallback(),
            )
            .await?;
        let response = ClientLogonResponse::decode(reply.body.as_ref())?;
        let code = ResultCode::from_raw(response.eresult.unwrap_or_default());
        match code {
            ResultCode::Ok => {
                let steam_id = response
                    .client_supplied_steamid
                    .filter(|&id| id != 0)
                    .unwrap_or(identity.steam_id);
                self.session.mark_authenticated(steam_id);
                if let Some(secs) = response.heartbeat_seconds.filter(|&s| s > 0) {
                    self.session.start_heartbeat(Duration::from_secs(secs as u64));
                }
                let identity = Identity {
                    steam_id,
                    ..identity
                };
                self.persist_identity(Some(identity.clone())).await?;
                info!(steam_id, "logon complete");
                Ok(AuthOutcome::Authenticated(identity))
            }
            ResultCode::AccessDenied => {
                warn!("logon token rejected");
                self.session.reset_steam_id();
                if previously_authenticated {
                    self.persist_identity(None).await?;
                }
                Ok(AuthOutcome::InvalidAuthData)
            }
            code => {
                warn!(%code, extended = ?response.eresult_extended, "logon failed");
                self.session.reset_steam_id();
                if previously_authenticated {
                    self.persist_identity(None).await?;
                }
                Err(Error::UnexpectedResult {
                    operation: "token logon",
                    code,
                })
            }
        }
    }

    async fn persist_identity(&mut self, identity: Option<Identity>) -> Result<()> {
        self.identity = identity;
        let mut state = StoredState {
            identity: self.identity.clone(),
            machine_id: None,
        };
        state.set_machine_id(&self.machine_id);
        self.store.save(&state).await
    }

    fn obfuscated_ip(&self) -> Option<IpAddress> {
        let addr = self.session.local_addr()?;
        let IpAddr::V4(v4) = addr.ip() else {
            return None;
        };
        Some(IpAddress {
            ip: Some(ip_address::Ip::V4(machine::obfuscate_ipv4(v4))),
        })
    }
}

/// Orders the offered confirmation methods by preference, dropping
/// the kinds this client cannot complete.
fn rank_confirmations(
    confirmations: &[AllowedConfirmation],
) -> Vec<(ConfirmationMethod, String)> {
    let mut ranked: Vec<(ConfirmationMethod, String)> = confirmations
        .iter()
        .filter_map(|confirmation| {
            ConfirmationMethod::from_guard(confirmation.guard_type()).map(|method| {
                (
                    method,
                    confirmation.associated_message.clone().unwrap_or_default(),
                )
            })
        })
        .collect();
    ranked.sort_by_key(|&(method, _)| method.rank());
    ranked
}

fn poll_interval(raw: Option<f32>) -> Duration {
    match raw {
        Some(secs) if secs.is_finite() && secs >= 0.5 => Duration::from_secs_f32(secs),
        _ => Duration::from_secs(5),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn confirmation(guard: GuardType, message: &str) -> AllowedConfirmation {
        AllowedConfirmation {
            confirmation_type: Some(guard.as_raw()),
            associated_message: Some(message.to_string()),
        }
    }

    #[test]
    fn test_device_confirmation_ranks_first() {
        let ranked = rank_confirmations(&[
            confirmation(GuardType::EmailCode, "g***@example.com"),
            confirmation(GuardType::DeviceConfirmation, ""),
            confirmation(GuardType::DeviceCode, ""),
        ]);
        let methods: Vec<ConfirmationMethod> =
            ranked.iter().map(|&(method, _)| method).collect();
        assert_eq!(
            methods,
            vec![
                ConfirmationMethod::DeviceConfirmation,
                ConfirmationMethod::DeviceCode,
                ConfirmationMethod::EmailCode,
            ]
        );
    }

    #[test]
    fn test_unsupported_methods_are_dropped() {
        let ranked = rank_confirmations(&[
            confirmation(GuardType::MachineToken, ""),
            confirmation(GuardType::LegacyMachineAuth, ""),
            confirmation(GuardType::Unknown, ""),
        ]);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_none_ranks_below_codes() {
        let ranked = rank_confirmations(&[
            confirmation(GuardType::None, ""),
            confirmation(GuardType::EmailCode, "g***@example.com"),
        ]);
        assert_eq!(ranked[0].0, ConfirmationMethod::EmailCode);
        assert_eq!(ranked[0].1, "g***@example.com");
    }

    #[test]
    fn test_code_entry_detection() {
        assert!(ConfirmationMethod::DeviceCode.needs_code());
        assert!(ConfirmationMethod::EmailCode.needs_code());
        assert!(!ConfirmationMethod::DeviceConfirmation.needs_code());
        assert!(!ConfirmationMethod::None.needs_code());
    }

    #[test]
    fn test_poll_interval_falls_back_on_nonsense() {
        assert_eq!(poll_interval(Some(5.0)), Duration::from_secs(5));
        assert_eq!(poll_interval(Some(0.0)), Duration::from_secs(5));
        assert_eq!(poll_interval(Some(f32::NAN)), Duration::from_secs(5));
        assert_eq!(poll_interval(None), Duration::from_secs(5));
        assert_eq!(poll_interval(Some(2.5)), Duration::from_millis(2500));
    }
}
