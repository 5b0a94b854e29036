//! Played-time import tracking
//!
//! The whole map arrives in one response, so readiness is a single
//! in-flight flag: cleared when an import starts, set again when the
//! response has been applied.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;
use vapor_wire::proto::service::GetLastPlayedTimesResponse;

use crate::readiness::Readiness;

/// Recorded play time for one game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Playtime {
    /// Total minutes on record
    pub total_minutes: u32,
    /// Unix timestamp of the last session
    pub last_played: u32,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<u32, Playtime>,
    importing: bool,
}

/// Play times keyed by app id
#[derive(Debug, Default)]
pub struct PlaytimeCache {
    inner: RwLock<Inner>,
    readiness: Readiness,
}

impl PlaytimeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops previous entries and marks an import as in flight.
    pub fn start_import(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.importing = true;
        drop(inner);
        self.readiness.publish(false);
    }

    /// Applies a full played-times response and finishes the import.
    pub fn import_times(&self, response: &GetLastPlayedTimesResponse) {
        let mut inner = self.inner.write();
        for game in &response.games {
            let Some(app_id) = game.appid.and_then(|id| u32::try_from(id).ok()) else {
                continue;
            };
            inner.entries.insert(
                app_id,
                Playtime {
                    total_minutes: game.playtime_forever.unwrap_or_default(),
                    last_played: game.last_playtime.unwrap_or_default(),
                },
            );
        }
        inner.importing = false;
        debug!("imported play times for {} games", inner.entries.len());
        drop(inner);
        self.readiness.publish(true);
    }

    #[must_use]
    pub fn playtime(&self, app_id: u32) -> Option<Playtime> {
        self.inner.read().entries.get(&app_id).copied()
    }

    /// All recorded entries, in stable app-id order.
    #[must_use]
    pub fn all(&self) -> Vec<(u32, Playtime)> {
        let inner = self.inner.read();
        let mut out: Vec<(u32, Playtime)> = inner
            .entries
            .iter()
            .map(|(app_id, playtime)| (*app_id, *playtime))
            .collect();
        out.sort_by_key(|(app_id, _)| *app_id);
        out
    }

    #[must_use]
    pub fn import_in_progress(&self) -> bool {
        self.inner.read().importing
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    #[must_use]
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.readiness.subscribe()
    }

    /// Blocks until the current import has been applied.
    pub async fn wait_ready(&self) {
        self.readiness.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use vapor_wire::proto::service::get_last_played_times_response::Game;

    use super::*;

    fn game(appid: i32, playtime_forever: u32, last_playtime: u32) -> Game {
        Game {
            appid: Some(appid),
            last_playtime: Some(last_playtime),
            playtime_2weeks: None,
            playtime_forever: Some(playtime_forever),
        }
    }

    #[test]
    fn test_import_cycle() {
        let cache = PlaytimeCache::new();
        cache.start_import();
        assert!(cache.import_in_progress());
        assert!(!cache.is_ready());

        cache.import_times(&GetLastPlayedTimesResponse {
            games: vec![game(440, 120, 1_600_000_000), game(570, 0, 0)],
        });

        assert!(!cache.import_in_progress());
        assert!(cache.is_ready());
        assert_eq!(
            cache.playtime(440),
            Some(Playtime {
                total_minutes: 120,
                last_played: 1_600_000_000,
            })
        );
        assert_eq!(cache.all().len(), 2);
    }

    #[test]
    fn test_reimport_replaces_entries() {
        let cache = PlaytimeCache::new();
        cache.start_import();
        cache.import_times(&GetLastPlayedTimesResponse {
            games: vec![game(440, 120, 1)],
        });

        cache.start_import();
        assert_eq!(cache.playtime(440), None);
        cache.import_times(&GetLastPlayedTimesResponse {
            games: vec![game(570, 30, 2)],
        });

        assert_eq!(cache.playtime(440), None);
        assert_eq!(
            cache.playtime(570),
            Some(Playtime {
                total_minutes: 30,
                last_played: 2,
            })
        );
    }

    #[test]
    fn test_negative_app_ids_are_skipped() {
        let cache = PlaytimeCache::new();
        cache.start_import();
        cache.import_times(&GetLastPlayedTimesResponse {
            games: vec![game(-1, 5, 5), game(10, 5, 5)],
        });
        assert_eq!(cache.all().len(), 1);
    }
}
