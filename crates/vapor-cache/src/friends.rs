//! Friend roster resolution
//!
//! Persona data for a user arrives as two independently timed facets,
//! the name/info facet and the state facet. An entry only surfaces
//! once both have been seen at least once, so consumers never observe
//! half-built users. Nicknames are kept as their own map.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;
use vapor_wire::proto::friends::{
    ClientFriendsList, ClientPersonaState, ClientPlayerNicknameList,
};

use crate::readiness::Readiness;

/// Wire value for an established friendship
const RELATIONSHIP_FRIEND: u32 = 3;
/// Wire value for a dissolved or absent relationship
const RELATIONSHIP_NONE: u32 = 0;

/// Persona data tracked per friend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Friend {
    pub steam_id: u64,
    pub persona_name: Option<String>,
    /// Raw persona-state value, present once the state facet arrived
    pub state: Option<u32>,
    pub game_played_app_id: Option<u32>,
    pub game_name: Option<String>,
    pub avatar_hash: Option<Vec<u8>>,
    pub rich_presence: HashMap<String, String>,
}

/// Observable roster change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendsEvent {
    /// Entry became fully resolved for the first time
    Added(Friend),
    /// An already-resolved entry changed
    Updated(Friend),
    /// Friend left the roster; only fired for resolved entries
    Removed(u64),
}

/// Result of applying a friends-list message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDelta {
    /// Users whose persona facets should be requested
    pub needs_persona: Vec<u64>,
    /// Removals observed while reconciling the roster
    pub events: Vec<FriendsEvent>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Facets {
    info: bool,
    state: bool,
}

impl Facets {
    fn complete(self) -> bool {
        self.info && self.state
    }
}

#[derive(Debug, Default)]
struct Inner {
    started: bool,
    friends: HashMap<u64, Friend>,
    pending: HashMap<u64, Facets>,
    nicknames: HashMap<u64, String>,
}

impl Inner {
    fn add(&mut self, steam_id: u64) -> bool {
        if self.friends.contains_key(&steam_id) {
            return false;
        }
        self.pending.insert(steam_id, Facets::default());
        self.friends.insert(
            steam_id,
            Friend {
                steam_id,
                ..Friend::default()
            },
        );
        true
    }

    fn remove(&mut self, steam_id: u64) -> Option<FriendsEvent> {
        let pending = self.pending.remove(&steam_id);
        let entry = self.friends.remove(&steam_id)?;
        // Entries still waiting on a facet were never announced, so
        // their removal is silent.
        if pending.is_none() {
            Some(FriendsEvent::Removed(entry.steam_id))
        } else {
            None
        }
    }

    fn is_ready(&self) -> bool {
        self.started && self.pending.is_empty()
    }
}

/// Roster plus per-friend persona data merged from both facets
#[derive(Debug, Default)]
pub struct FriendsCache {
    inner: RwLock<Inner>,
    readiness: Readiness,
}

impl FriendsCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciles the roster against a snapshot or delta.
    ///
    /// A snapshot replaces the whole roster and asks for persona data
    /// on every member; a delta only adds established friendships and
    /// removes dissolved ones. The own account id is never tracked.
    pub fn import_roster(&self, own_steam_id: u64, list: &ClientFriendsList) -> RosterDelta {
        let incremental = list.bincremental.unwrap_or(false);
        let mut inner = self.inner.write();
        let mut delta = RosterDelta::default();

        if incremental {
            for friend in &list.friends {
                let steam_id = friend.ulfriendid.unwrap_or_default();
                if steam_id == own_steam_id {
                    continue;
                }
                match friend.efriendrelationship.unwrap_or(RELATIONSHIP_NONE) {
                    RELATIONSHIP_FRIEND => {
                        if inner.add(steam_id) {
                            delta.needs_persona.push(steam_id);
                        }
                    }
                    RELATIONSHIP_NONE => {
                        if let Some(event) = inner.remove(steam_id) {
                            delta.events.push(event);
                        }
                    }
                    other => {
                        debug!("ignoring relationship {other} for {steam_id}");
                    }
                }
            }
        } else {
            let roster: HashSet<u64> = list
                .friends
                .iter()
                .filter(|friend| {
                    friend.efriendrelationship.unwrap_or(RELATIONSHIP_NONE)
                        == RELATIONSHIP_FRIEND
                })
                .filter_map(|friend| friend.ulfriendid)
                .filter(|steam_id| *steam_id != own_steam_id)
                .collect();
            let current: Vec<u64> = inner.friends.keys().copied().collect();
            for steam_id in current {
                if !roster.contains(&steam_id) {
                    if let Some(event) = inner.remove(steam_id) {
                        delta.events.push(event);
                    }
                }
            }
            for steam_id in &roster {
                inner.add(*steam_id);
            }
            delta.needs_persona.extend(roster);
            delta.needs_persona.sort_unstable();
            inner.started = true;
        }

        let ready = inner.is_ready();
        drop(inner);
        self.readiness.publish(ready);
        delta
    }

    /// Merges persona facets into tracked entries.
    ///
    /// Updates for users outside the roster are dropped. A pending
    /// entry that has now seen both facets fires exactly one `Added`;
    /// later changes to a resolved entry fire `Updated`.
    pub fn apply_persona(&self, message: &ClientPersonaState) -> Vec<FriendsEvent> {
        let mut inner = self.inner.write();
        let mut events = Vec::new();

        for user in &message.friends {
            let steam_id = user.friendid.unwrap_or_default();
            let Some(entry) = inner.friends.get_mut(&steam_id) else {
                debug!("persona update for untracked user {steam_id}");
                continue;
            };

            let mut changed = false;
            if let Some(name) = &user.player_name {
                if entry.persona_name.as_deref() != Some(name) {
                    entry.persona_name = Some(name.clone());
                    changed = true;
                }
            }
            if let Some(state) = user.persona_state {
                if entry.state != Some(state) {
                    entry.state = Some(state);
                    changed = true;
                }
            }
            if let Some(app_id) = user.game_played_app_id {
                let playing = (app_id != 0).then_some(app_id);
                if entry.game_played_app_id != playing {
                    entry.game_played_app_id = playing;
                    changed = true;
                }
            }
            if let Some(game_name) = &user.game_name {
                let name = (!game_name.is_empty()).then(|| game_name.clone());
                if entry.game_name != name {
                    entry.game_name = name;
                    changed = true;
                }
            }
            if let Some(hash) = &user.avatar_hash {
                if entry.avatar_hash.as_deref() != Some(hash) {
                    entry.avatar_hash = Some(hash.clone());
                    changed = true;
                }
            }
            if !user.rich_presence.is_empty() {
                let presence: HashMap<String, String> = user
                    .rich_presence
                    .iter()
                    .filter_map(|kv| Some((kv.key.clone()?, kv.value.clone()?)))
                    .collect();
                if entry.rich_presence != presence {
                    entry.rich_presence = presence;
                    changed = true;
                }
            }
            let snapshot = entry.clone();

            if let Some(facets) = inner.pending.get_mut(&steam_id) {
                if user.player_name.is_some() {
                    facets.info = true;
                }
                if user.persona_state.is_some() {
                    facets.state = true;
                }
                if facets.complete() {
                    inner.pending.remove(&steam_id);
                    events.push(FriendsEvent::Added(snapshot));
                }
            } else if changed {
                events.push(FriendsEvent::Updated(snapshot));
            }
        }

        let ready = inner.is_ready();
        drop(inner);
        self.readiness.publish(ready);
        events
    }

    /// Applies a nickname snapshot or delta.
    pub fn import_nicknames(&self, message: &ClientPlayerNicknameList) {
        let removal = message.removal.unwrap_or(false);
        let incremental = message.incremental.unwrap_or(false);
        let mut inner = self.inner.write();
        if !removal && !incremental {
            inner.nicknames.clear();
        }
        for entry in &message.nicknames {
            let steam_id = entry.steamid.unwrap_or_default();
            if removal {
                inner.nicknames.remove(&steam_id);
            } else if let Some(nickname) = &entry.nickname {
                inner.nicknames.insert(steam_id, nickname.clone());
            }
        }
    }

    /// Fully resolved friends, in stable id order.
    #[must_use]
    pub fn friends(&self) -> Vec<Friend> {
        let inner = self.inner.read();
        let mut out: Vec<Friend> = inner
            .friends
            .values()
            .filter(|friend| !inner.pending.contains_key(&friend.steam_id))
            .cloned()
            .collect();
        out.sort_by_key(|friend| friend.steam_id);
        out
    }

    #[must_use]
    pub fn friend(&self, steam_id: u64) -> Option<Friend> {
        let inner = self.inner.read();
        if inner.pending.contains_key(&steam_id) {
            return None;
        }
        inner.friends.get(&steam_id).cloned()
    }

    #[must_use]
    pub fn nickname(&self, steam_id: u64) -> Option<String> {
        self.inner.read().nicknames.get(&steam_id).cloned()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    #[must_use]
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.readiness.subscribe()
    }

    /// Blocks until every roster member has both facets.
    pub async fn wait_ready(&self) {
        self.readiness.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use vapor_wire::proto::friends::client_friends_list::Friend as WireFriend;
    use vapor_wire::proto::friends::client_persona_state::{Friend as PersonaFriend, RichPresenceEntry};

    use super::*;

    const OWN_ID: u64 = 100;

    fn roster(incremental: bool, friends: Vec<(u64, u32)>) -> ClientFriendsList {
        ClientFriendsList {
            bincremental: Some(incremental),
            friends: friends
                .into_iter()
                .map(|(steam_id, relationship)| WireFriend {
                    ulfriendid: Some(steam_id),
                    efriendrelationship: Some(relationship),
                })
                .collect(),
        }
    }

    fn persona(friends: Vec<PersonaFriend>) -> ClientPersonaState {
        ClientPersonaState {
            status_flags: Some(1106),
            friends,
        }
    }

    fn name_facet(steam_id: u64, name: &str) -> PersonaFriend {
        PersonaFriend {
            friendid: Some(steam_id),
            player_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn state_facet(steam_id: u64, state: u32) -> PersonaFriend {
        PersonaFriend {
            friendid: Some(steam_id),
            persona_state: Some(state),
            ..Default::default()
        }
    }

    #[test]
    fn test_snapshot_requests_persona_for_all_members() {
        let cache = FriendsCache::new();
        let delta = cache.import_roster(
            OWN_ID,
            &roster(false, vec![(201, RELATIONSHIP_FRIEND), (202, RELATIONSHIP_FRIEND)]),
        );
        assert_eq!(delta.needs_persona, vec![201, 202]);
        assert_eq!(delta.events, vec![]);
        assert!(!cache.is_ready());
    }

    #[test]
    fn test_own_id_is_never_tracked() {
        let cache = FriendsCache::new();
        let delta = cache.import_roster(
            OWN_ID,
            &roster(false, vec![(OWN_ID, RELATIONSHIP_FRIEND), (201, RELATIONSHIP_FRIEND)]),
        );
        assert_eq!(delta.needs_persona, vec![201]);
    }

    #[test]
    fn test_entry_promotes_once_both_facets_arrive() {
        let cache = FriendsCache::new();
        cache.import_roster(OWN_ID, &roster(false, vec![(201, RELATIONSHIP_FRIEND)]));

        let events = cache.apply_persona(&persona(vec![name_facet(201, "gordon")]));
        assert_eq!(events, vec![]);
        assert!(!cache.is_ready());
        assert_eq!(cache.friend(201), None);

        let events = cache.apply_persona(&persona(vec![state_facet(201, 1)]));
        assert_eq!(events.len(), 1);
        let FriendsEvent::Added(added) = &events[0] else {
            panic!("expected an added event, got {events:?}");
        };
        assert_eq!(added.persona_name.as_deref(), Some("gordon"));
        assert_eq!(added.state, Some(1));
        assert!(cache.is_ready());
    }

    #[test]
    fn test_resolved_entry_changes_fire_updated() {
        let cache = FriendsCache::new();
        cache.import_roster(OWN_ID, &roster(false, vec![(201, RELATIONSHIP_FRIEND)]));
        cache.apply_persona(&persona(vec![PersonaFriend {
            friendid: Some(201),
            player_name: Some("gordon".to_string()),
            persona_state: Some(1),
            ..Default::default()
        }]));

        let events = cache.apply_persona(&persona(vec![state_facet(201, 3)]));
        assert_eq!(
            events,
            vec![FriendsEvent::Updated(Friend {
                steam_id: 201,
                persona_name: Some("gordon".to_string()),
                state: Some(3),
                ..Friend::default()
            })]
        );
    }

    #[test]
    fn test_unchanged_update_is_silent() {
        let cache = FriendsCache::new();
        cache.import_roster(OWN_ID, &roster(false, vec![(201, RELATIONSHIP_FRIEND)]));
        cache.apply_persona(&persona(vec![PersonaFriend {
            friendid: Some(201),
            player_name: Some("gordon".to_string()),
            persona_state: Some(1),
            ..Default::default()
        }]));

        let events = cache.apply_persona(&persona(vec![state_facet(201, 1)]));
        assert_eq!(events, vec![]);
    }

    #[test]
    fn test_untracked_persona_updates_are_dropped() {
        let cache = FriendsCache::new();
        cache.import_roster(OWN_ID, &roster(false, vec![]));
        let events = cache.apply_persona(&persona(vec![name_facet(999, "stranger")]));
        assert_eq!(events, vec![]);
        assert!(cache.is_ready());
    }

    #[test]
    fn test_pending_removal_is_silent_ready_removal_fires() {
        let cache = FriendsCache::new();
        cache.import_roster(
            OWN_ID,
            &roster(false, vec![(201, RELATIONSHIP_FRIEND), (202, RELATIONSHIP_FRIEND)]),
        );
        cache.apply_persona(&persona(vec![PersonaFriend {
            friendid: Some(201),
            player_name: Some("gordon".to_string()),
            persona_state: Some(1),
            ..Default::default()
        }]));

        let delta = cache.import_roster(
            OWN_ID,
            &roster(
                true,
                vec![(201, RELATIONSHIP_NONE), (202, RELATIONSHIP_NONE)],
            ),
        );
        assert_eq!(delta.events, vec![FriendsEvent::Removed(201)]);
        assert!(cache.is_ready());
    }

    #[test]
    fn test_incremental_add_asks_for_persona() {
        let cache = FriendsCache::new();
        cache.import_roster(OWN_ID, &roster(false, vec![]));
        assert!(cache.is_ready());

        let delta = cache.import_roster(OWN_ID, &roster(true, vec![(300, RELATIONSHIP_FRIEND)]));
        assert_eq!(delta.needs_persona, vec![300]);
        assert!(!cache.is_ready());
    }

    #[test]
    fn test_rich_presence_and_game_fields_merge() {
        let cache = FriendsCache::new();
        cache.import_roster(OWN_ID, &roster(false, vec![(201, RELATIONSHIP_FRIEND)]));
        cache.apply_persona(&persona(vec![PersonaFriend {
            friendid: Some(201),
            player_name: Some("gordon".to_string()),
            persona_state: Some(1),
            game_played_app_id: Some(440),
            game_name: Some("Team Fortress 2".to_string()),
            rich_presence: vec![RichPresenceEntry {
                key: Some("status".to_string()),
                value: Some("Capture the Flag".to_string()),
            }],
            ..Default::default()
        }]));

        let friend = cache.friend(201).unwrap();
        assert_eq!(friend.game_played_app_id, Some(440));
        assert_eq!(friend.game_name.as_deref(), Some("Team Fortress 2"));
        assert_eq!(
            friend.rich_presence.get("status").map(String::as_str),
            Some("Capture the Flag")
        );
    }

    #[test]
    fn test_nickname_snapshot_and_removal() {
        let cache = FriendsCache::new();
        cache.import_nicknames(&ClientPlayerNicknameList {
            removal: Some(false),
            incremental: Some(false),
            nicknames: vec![nickname(201, "gordo"), nickname(202, "barney")],
        });
        assert_eq!(cache.nickname(201).as_deref(), Some("gordo"));

        cache.import_nicknames(&ClientPlayerNicknameList {
            removal: Some(true),
            incremental: Some(true),
            nicknames: vec![nickname(201, "gordo")],
        });
        assert_eq!(cache.nickname(201), None);
        assert_eq!(cache.nickname(202).as_deref(), Some("barney"));
    }

    fn nickname(
        steam_id: u64,
        nickname: &str,
    ) -> vapor_wire::proto::friends::client_player_nickname_list::PlayerNickname {
        vapor_wire::proto::friends::client_player_nickname_list::PlayerNickname {
            steamid: Some(steam_id),
            nickname: Some(nickname.to_string()),
        }
    }
}
