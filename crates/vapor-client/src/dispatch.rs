//! Single-writer dispatch of session events into the caches
//!
//! One task consumes the unsolicited event stream and is the only
//! writer of the resolution caches. Chained lookups (package and app
//! metadata, persona facets) are issued from here, so ordering between
//! an import and the requests it spawns is fixed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use vapor_cache::{Friend, FriendsCache, FriendsEvent, GamesCache, PlaytimeCache, StatsCache};
use vapor_protocol::{ProtocolSession, SessionEvent};
use vapor_wire::ResultCode;
use vapor_wire::proto::friends::ClientPersonaState;
use vapor_wire::proto::service::GetAppRichPresenceLocalizationResponse;

use crate::observer::CacheObserver;

/// Persona state broadcast once the roster snapshot arrives. The
/// client never appears online to other users.
const PERSONA_STATE_INVISIBLE: u32 = 7;

/// Language requested for rich-presence token translations
const RICH_PRESENCE_LANGUAGE: &str = "english";

/// Outbound requests the dispatch task chains off inbound events
#[async_trait]
pub trait Outbound: Send + Sync {
    fn steam_id(&self) -> u64;
    async fn request_package_info(&self, packages: &[(u32, u64)]) -> vapor_protocol::Result<()>;
    async fn request_app_info(&self, app_ids: &[u32]) -> vapor_protocol::Result<()>;
    async fn set_persona_state(&self, state: u32) -> vapor_protocol::Result<()>;
    async fn request_friend_persona_states(
        &self,
        user_ids: &[u64],
    ) -> vapor_protocol::Result<()>;
    async fn request_rich_presence_localization(
        &self,
        app_id: i32,
        language: &str,
    ) -> vapor_protocol::Result<GetAppRichPresenceLocalizationResponse>;
}

#[async_trait]
impl Outbound for ProtocolSession {
    fn steam_id(&self) -> u64 {
        ProtocolSession::steam_id(self)
    }

    async fn request_package_info(&self, packages: &[(u32, u64)]) -> vapor_protocol::Result<()> {
        ProtocolSession::request_package_info(self, packages).await
    }

    async fn request_app_info(&self, app_ids: &[u32]) -> vapor_protocol::Result<()> {
        ProtocolSession::request_app_info(self, app_ids).await
    }

    async fn set_persona_state(&self, state: u32) -> vapor_protocol::Result<()> {
        ProtocolSession::set_persona_state(self, state).await
    }

    async fn request_friend_persona_states(
        &self,
        user_ids: &[u64],
    ) -> vapor_protocol::Result<()> {
        ProtocolSession::request_friend_persona_states(self, user_ids).await
    }

    async fn request_rich_presence_localization(
        &self,
        app_id: i32,
        language: &str,
    ) -> vapor_protocol::Result<GetAppRichPresenceLocalizationResponse> {
        ProtocolSession::request_rich_presence_localization(self, app_id, language).await
    }
}

/// The four resolution caches, shared between dispatch and the shell
#[derive(Debug, Default)]
pub struct CacheSet {
    pub games: GamesCache,
    pub friends: FriendsCache,
    pub stats: StatsCache,
    pub playtime: PlaytimeCache,
}

impl CacheSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Session-scoped facts the dispatch task records for the controller
#[derive(Debug, Default)]
pub struct SessionState {
    /// Result code of a server-initiated logoff, once one arrives
    pub logged_off: Mutex<Option<ResultCode>>,
    /// Own display name from account info
    pub persona_name: Mutex<Option<String>>,
}

/// Consumes session events and applies them to the caches.
pub struct Dispatcher<O: Outbound> {
    session: Arc<O>,
    caches: Arc<CacheSet>,
    observer: Arc<dyn CacheObserver>,
    state: Arc<SessionState>,
    entitlements_announced: bool,
    /// Rich-presence token translations, fetched once per app id
    rp_tokens: HashMap<u32, HashMap<String, String>>,
}

impl<O: Outbound> Dispatcher<O> {
    pub fn new(
        session: Arc<O>,
        caches: Arc<CacheSet>,
        observer: Arc<dyn CacheObserver>,
        state: Arc<SessionState>,
    ) -> Self {
        Self {
            session,
            caches,
            observer,
            state,
            entitlements_announced: false,
            rp_tokens: HashMap::new(),
        }
    }

    /// Runs until the session drops its event channel.
    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("event channel closed, dispatch ending");
    }

    async fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::LicenseList(list) => {
                let own_account_id = (self.session.steam_id() & 0xFFFF_FFFF) as u32;
                let requests = self.caches.games.import_licenses(own_account_id, &list);
                if !requests.is_empty() {
                    let packages: Vec<(u32, u64)> = requests
                        .iter()
                        .map(|request| (request.package_id, request.access_token))
                        .collect();
                    if let Err(err) = self.session.request_package_info(&packages).await {
                        warn!(%err, "package info request failed");
                    }
                }
                self.announce_entitlements().await;
            }
            SessionEvent::ProductInfo(response) => {
                let missing_apps = self.caches.games.import_product_info(&response);
                if !missing_apps.is_empty() {
                    if let Err(err) = self.session.request_app_info(&missing_apps).await {
                        warn!(%err, "app info request failed");
                    }
                }
                self.announce_entitlements().await;
            }
            SessionEvent::FriendsList(list) => {
                let snapshot = !list.bincremental.unwrap_or(false);
                let delta = self
                    .caches
                    .friends
                    .import_roster(self.session.steam_id(), &list);
                if snapshot {
                    if let Err(err) =
                        self.session.set_persona_state(PERSONA_STATE_INVISIBLE).await
                    {
                        warn!(%err, "persona state change failed");
                    }
                }
                if !delta.needs_persona.is_empty() {
                    if let Err(err) = self
                        .session
                        .request_friend_persona_states(&delta.needs_persona)
                        .await
                    {
                        warn!(%err, "persona facet request failed");
                    }
                }
                self.emit_friend_events(delta.events).await;
            }
            SessionEvent::PersonaState(message) => {
                self.fetch_rich_presence_localizations(&message).await;
                let events = self.caches.friends.apply_persona(&message);
                self.emit_friend_events(events).await;
            }
            SessionEvent::NicknameList(message) => {
                self.caches.friends.import_nicknames(&message);
            }
            SessionEvent::UserStats(response) => {
                let app_id = (response.game_id.unwrap_or_default() & 0xFFFF_FFFF) as u32;
                self.caches.stats.import_stats(&response);
                self.observer.stats_imported(app_id).await;
            }
            SessionEvent::AccountInfo(info) => {
                if let Some(name) = info.persona_name.filter(|name| !name.is_empty()) {
                    *self.state.persona_name.lock() = Some(name.clone());
                    self.observer.persona_name_changed(name).await;
                }
            }
            SessionEvent::LoggedOff(code) => {
                warn!(%code, "server logged the session off");
                *self.state.logged_off.lock() = Some(code);
            }
            SessionEvent::LogonResponse(response) => {
                let code = ResultCode::from_raw(response.eresult.unwrap_or_default());
                debug!(%code, "unsolicited logon response");
            }
            SessionEvent::ServiceMethod { method, .. } => {
                trace!(method, "ignoring server-initiated service message");
            }
            SessionEvent::Unhandled { kind } => {
                trace!(?kind, "skipping unhandled message kind");
            }
        }
    }

    /// Fires the entitlements hook on the not-ready to ready edge.
    async fn announce_entitlements(&mut self) {
        let ready = self.caches.games.is_ready();
        if ready && !self.entitlements_announced {
            self.observer.entitlements_resolved().await;
        }
        self.entitlements_announced = ready;
    }

    /// Fetches token translations for apps whose rich presence carries
    /// a '#'-prefixed display token. One fetch per app id; a failed
    /// fetch is recorded as empty so updates keep flowing untranslated.
    async fn fetch_rich_presence_localizations(&mut self, message: &ClientPersonaState) {
        for user in &message.friends {
            let Some(app_id) = user.game_played_app_id.filter(|id| *id != 0) else {
                continue;
            };
            let wants_translation = user.rich_presence.iter().any(|kv| {
                matches!(kv.key.as_deref(), Some("status" | "steam_display"))
                    && kv.value.as_deref().is_some_and(|value| value.starts_with('#'))
            });
            if !wants_translation || self.rp_tokens.contains_key(&app_id) {
                continue;
            }
            let tokens = match self
                .session
                .request_rich_presence_localization(app_id.cast_signed(), RICH_PRESENCE_LANGUAGE)
                .await
            {
                Ok(response) => flatten_tokens(response),
                Err(err) => {
                    warn!(app_id, %err, "rich presence localization failed");
                    HashMap::new()
                }
            };
            debug!(app_id, count = tokens.len(), "rich presence tokens cached");
            self.rp_tokens.insert(app_id, tokens);
        }
    }

    fn translate_rich_presence(&self, friend: &mut Friend) {
        let Some(app_id) = friend.game_played_app_id else {
            return;
        };
        let Some(tokens) = self.rp_tokens.get(&app_id) else {
            return;
        };
        for key in ["status", "steam_display"] {
            let Some(translated) = friend
                .rich_presence
                .get(key)
                .and_then(|value| tokens.get(value))
                .cloned()
            else {
                continue;
            };
            friend.rich_presence.insert(key.to_string(), translated);
        }
    }

    async fn emit_friend_events(&self, events: Vec<FriendsEvent>) {
        for event in events {
            match event {
                FriendsEvent::Added(mut friend) => {
                    self.translate_rich_presence(&mut friend);
                    self.observer.friend_added(friend).await;
                }
                FriendsEvent::Updated(mut friend) => {
                    self.translate_rich_presence(&mut friend);
                    self.observer.friend_updated(friend).await;
                }
                FriendsEvent::Removed(steam_id) => self.observer.friend_removed(steam_id).await,
            }
        }
    }
}

fn flatten_tokens(response: GetAppRichPresenceLocalizationResponse) -> HashMap<String, String> {
    response
        .token_lists
        .into_iter()
        .flat_map(|list| list.tokens)
        .filter_map(|token| Some((token.name?, token.value?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use vapor_wire::proto::entitlements::{ClientLicenseList, client_license_list};
    use vapor_wire::proto::friends::{ClientFriendsList, ClientPersonaState, client_friends_list, client_persona_state};
    use vapor_wire::proto::login::ClientAccountInfo;
    use vapor_wire::proto::service::rich_presence;
    use vapor_wire::proto::stats::ClientGetUserStatsResponse;

    use super::*;

    const OWN_STEAM_ID: u64 = 0x0110_0001_0000_2222;

    #[derive(Debug, PartialEq)]
    enum Sent {
        Packages(Vec<(u32, u64)>),
        Apps(Vec<u32>),
        Persona(u32),
        FriendData(Vec<u64>),
        RichPresence(i32, String),
    }

    #[derive(Default)]
    struct RecordingOutbound {
        sent: Mutex<Vec<Sent>>,
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        fn steam_id(&self) -> u64 {
            OWN_STEAM_ID
        }

        async fn request_package_info(
            &self,
            packages: &[(u32, u64)],
        ) -> vapor_protocol::Result<()> {
            self.sent.lock().push(Sent::Packages(packages.to_vec()));
            Ok(())
        }

        async fn request_app_info(&self, app_ids: &[u32]) -> vapor_protocol::Result<()> {
            self.sent.lock().push(Sent::Apps(app_ids.to_vec()));
            Ok(())
        }

        async fn set_persona_state(&self, state: u32) -> vapor_protocol::Result<()> {
            self.sent.lock().push(Sent::Persona(state));
            Ok(())
        }

        async fn request_friend_persona_states(
            &self,
            user_ids: &[u64],
        ) -> vapor_protocol::Result<()> {
            self.sent.lock().push(Sent::FriendData(user_ids.to_vec()));
            Ok(())
        }

        async fn request_rich_presence_localization(
            &self,
            app_id: i32,
            language: &str,
        ) -> vapor_protocol::Result<GetAppRichPresenceLocalizationResponse> {
            self.sent
                .lock()
                .push(Sent::RichPresence(app_id, language.to_string()));
            Ok(GetAppRichPresenceLocalizationResponse {
                appid: Some(app_id),
                token_lists: vec![rich_presence::TokenList {
                    language: Some(language.to_string()),
                    tokens: vec![rich_presence::Token {
                        name: Some("#Playing".to_string()),
                        value: Some("Playing a match".to_string()),
                    }],
                }],
            })
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CacheObserver for RecordingObserver {
        async fn friend_added(&self, friend: vapor_cache::Friend) {
            let mut line = format!("added {}", friend.steam_id);
            if let Some(status) = friend.rich_presence.get("status") {
                line.push_str(&format!(" status={status}"));
            }
            self.seen.lock().push(line);
        }

        async fn friend_updated(&self, friend: vapor_cache::Friend) {
            self.seen.lock().push(format!("updated {}", friend.steam_id));
        }

        async fn friend_removed(&self, steam_id: u64) {
            self.seen.lock().push(format!("removed {steam_id}"));
        }

        async fn persona_name_changed(&self, persona_name: String) {
            self.seen.lock().push(format!("name {persona_name}"));
        }

        async fn entitlements_resolved(&self) {
            self.seen.lock().push("entitlements".to_string());
        }

        async fn stats_imported(&self, app_id: u32) {
            self.seen.lock().push(format!("stats {app_id}"));
        }
    }

    struct Fixture {
        dispatcher: Dispatcher<RecordingOutbound>,
        session: Arc<RecordingOutbound>,
        caches: Arc<CacheSet>,
        observer: Arc<RecordingObserver>,
        state: Arc<SessionState>,
    }

    fn fixture() -> Fixture {
        let session = Arc::new(RecordingOutbound::default());
        let caches = Arc::new(CacheSet::new());
        let observer = Arc::new(RecordingObserver::default());
        let state = Arc::new(SessionState::default());
        let dispatcher = Dispatcher::new(
            Arc::clone(&session),
            Arc::clone(&caches),
            Arc::clone(&observer) as Arc<dyn CacheObserver>,
            Arc::clone(&state),
        );
        Fixture {
            dispatcher,
            session,
            caches,
            observer,
            state,
        }
    }

    fn license_list(entries: &[(u32, u32, u64)]) -> ClientLicenseList {
        ClientLicenseList {
            eresult: Some(1),
            licenses: entries
                .iter()
                .map(|&(package_id, owner_id, access_token)| client_license_list::License {
                    package_id: Some(package_id),
                    flags: Some(0),
                    owner_id: Some(owner_id),
                    access_token: Some(access_token),
                })
                .collect(),
        }
    }

    fn roster(incremental: bool, ids: &[u64]) -> ClientFriendsList {
        ClientFriendsList {
            bincremental: Some(incremental),
            friends: ids
                .iter()
                .map(|&id| client_friends_list::Friend {
                    ulfriendid: Some(id),
                    efriendrelationship: Some(3),
                })
                .collect(),
        }
    }

    fn persona(id: u64, name: &str, state: u32) -> ClientPersonaState {
        ClientPersonaState {
            status_flags: Some(vapor_wire::PERSONA_STATE_FLAGS),
            friends: vec![client_persona_state::Friend {
                friendid: Some(id),
                persona_state: Some(state),
                game_played_app_id: None,
                player_name: Some(name.to_string()),
                avatar_hash: None,
                game_name: None,
                rich_presence: vec![],
            }],
        }
    }

    fn playing_persona(id: u64, name: &str, app_id: u32, status: &str) -> ClientPersonaState {
        ClientPersonaState {
            status_flags: Some(vapor_wire::PERSONA_STATE_FLAGS),
            friends: vec![client_persona_state::Friend {
                friendid: Some(id),
                persona_state: Some(1),
                game_played_app_id: Some(app_id),
                player_name: Some(name.to_string()),
                avatar_hash: None,
                game_name: Some("Game".to_string()),
                rich_presence: vec![client_persona_state::RichPresenceEntry {
                    key: Some("status".to_string()),
                    value: Some(status.to_string()),
                }],
            }],
        }
    }

    #[tokio::test]
    async fn test_license_list_chains_package_requests() {
        let mut fx = fixture();
        let own_account = (OWN_STEAM_ID & 0xFFFF_FFFF) as u32;
        fx.dispatcher
            .handle(SessionEvent::LicenseList(license_list(&[
                (10, own_account, 77),
                (20, own_account, 0),
            ])))
            .await;
        assert_eq!(
            *fx.session.sent.lock(),
            vec![Sent::Packages(vec![(10, 77), (20, 0)])]
        );
        assert!(!fx.caches.games.is_ready());
    }

    #[tokio::test]
    async fn test_empty_license_list_resolves_entitlements_once() {
        let mut fx = fixture();
        fx.dispatcher
            .handle(SessionEvent::LicenseList(license_list(&[])))
            .await;
        fx.dispatcher
            .handle(SessionEvent::LicenseList(license_list(&[])))
            .await;
        assert!(fx.caches.games.is_ready());
        assert_eq!(*fx.observer.seen.lock(), vec!["entitlements".to_string()]);
    }

    #[tokio::test]
    async fn test_roster_snapshot_goes_invisible_and_asks_for_personas() {
        let mut fx = fixture();
        fx.dispatcher
            .handle(SessionEvent::FriendsList(roster(false, &[301, 302])))
            .await;
        assert_eq!(
            *fx.session.sent.lock(),
            vec![
                Sent::Persona(PERSONA_STATE_INVISIBLE),
                Sent::FriendData(vec![301, 302]),
            ]
        );
    }

    #[tokio::test]
    async fn test_persona_promotion_reaches_the_observer() {
        let mut fx = fixture();
        fx.dispatcher
            .handle(SessionEvent::FriendsList(roster(false, &[301])))
            .await;
        fx.dispatcher
            .handle(SessionEvent::PersonaState(persona(301, "gordon", 1)))
            .await;
        assert_eq!(*fx.observer.seen.lock(), vec!["added 301".to_string()]);
        assert!(fx.caches.friends.is_ready());
    }

    #[tokio::test]
    async fn test_rich_presence_token_translated_and_fetched_once() {
        let mut fx = fixture();
        fx.dispatcher
            .handle(SessionEvent::FriendsList(roster(false, &[301])))
            .await;
        fx.dispatcher
            .handle(SessionEvent::PersonaState(playing_persona(
                301, "gordon", 440, "#Playing",
            )))
            .await;
        fx.dispatcher
            .handle(SessionEvent::PersonaState(playing_persona(
                301, "gordon", 440, "#Playing",
            )))
            .await;
        assert_eq!(
            *fx.session.sent.lock(),
            vec![
                Sent::Persona(PERSONA_STATE_INVISIBLE),
                Sent::FriendData(vec![301]),
                Sent::RichPresence(440, "english".to_string()),
            ]
        );
        assert_eq!(
            *fx.observer.seen.lock(),
            vec!["added 301 status=Playing a match".to_string()]
        );
    }

    #[tokio::test]
    async fn test_user_stats_import_notifies_with_app_id() {
        let mut fx = fixture();
        fx.caches.stats.start_import(&[440]);
        fx.dispatcher
            .handle(SessionEvent::UserStats(ClientGetUserStatsResponse {
                game_id: Some(440),
                eresult: Some(1),
                crc_stats: Some(0),
                schema: None,
                stats: vec![],
                achievement_blocks: vec![],
            }))
            .await;
        assert_eq!(*fx.observer.seen.lock(), vec!["stats 440".to_string()]);
        assert!(fx.caches.stats.is_ready());
    }

    #[tokio::test]
    async fn test_logged_off_is_recorded_for_the_controller() {
        let mut fx = fixture();
        fx.dispatcher
            .handle(SessionEvent::LoggedOff(ResultCode::LoggedInElsewhere))
            .await;
        assert_eq!(
            *fx.state.logged_off.lock(),
            Some(ResultCode::LoggedInElsewhere)
        );
    }

    #[tokio::test]
    async fn test_account_info_records_persona_name() {
        let mut fx = fixture();
        fx.dispatcher
            .handle(SessionEvent::AccountInfo(ClientAccountInfo {
                persona_name: Some("Gordon".to_string()),
            }))
            .await;
        assert_eq!(*fx.state.persona_name.lock(), Some("Gordon".to_string()));
        assert_eq!(*fx.observer.seen.lock(), vec!["name Gordon".to_string()]);
    }
}
