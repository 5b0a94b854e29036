//! Per-game stats and achievement resolution
//!
//! Imports are tracked by an explicit in-flight set of game ids. A
//! response whose checksum matches the previously imported data is
//! treated as a no-op and only marks the game done. Achievement
//! unlocks arrive packed in 32-bit blocks and are unpacked against the
//! schema blob shipped in the same response.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, warn};
use vapor_wire::proto::stats::ClientGetUserStatsResponse;
use vapor_wire::vdf::{self, KeyValues};

use crate::readiness::Readiness;

/// One unlocked achievement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Achievement {
    /// Index derived from the 32-bit unlock blocks
    pub id: u32,
    /// Unix timestamp of the unlock
    pub unlock_time: u32,
    /// Display name from the schema blob
    pub name: String,
}

/// Stats and unlocked achievements for one game
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameStats {
    /// Stat values keyed by stat id
    pub stats: HashMap<u32, u32>,
    pub achievements: Vec<Achievement>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<u32, GameStats>,
    checksums: HashMap<u32, u32>,
    in_flight: HashSet<u32>,
}

/// Stats keyed by app id, ready once no import is outstanding
#[derive(Debug, Default)]
pub struct StatsCache {
    inner: RwLock<Inner>,
    readiness: Readiness,
}

impl StatsCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the given games as awaiting a stats response.
    pub fn start_import(&self, app_ids: &[u32]) {
        let mut inner = self.inner.write();
        for app_id in app_ids {
            inner.in_flight.insert(*app_id);
            inner.entries.entry(*app_id).or_default();
        }
        let ready = inner.in_flight.is_empty();
        drop(inner);
        self.readiness.publish(ready);
    }

    /// Records one stats response and clears its in-flight entry.
    pub fn import_stats(&self, response: &ClientGetUserStatsResponse) {
        let game_id = response.game_id.unwrap_or_default();
        // The low half of a game id is the app id.
        let app_id = (game_id & 0xFFFF_FFFF) as u32;
        let mut inner = self.inner.write();

        let crc = response.crc_stats.unwrap_or_default();
        if crc != 0 && inner.checksums.get(&app_id) == Some(&crc) {
            debug!("stats for {app_id} unchanged, keeping cached data");
            inner.in_flight.remove(&app_id);
            let ready = inner.in_flight.is_empty();
            drop(inner);
            self.readiness.publish(ready);
            return;
        }

        let schema = response.schema.as_deref().and_then(|buffer| {
            match vdf::parse_binary(buffer) {
                Ok(schema) => Some(schema),
                Err(err) => {
                    warn!("dropping malformed stats schema for {app_id}: {err}");
                    None
                }
            }
        });

        let mut entry = GameStats::default();
        for stat in &response.stats {
            entry
                .stats
                .insert(stat.stat_id.unwrap_or_default(), stat.stat_value.unwrap_or_default());
        }
        for block in &response.achievement_blocks {
            let block_id = block.achievement_id.unwrap_or_default();
            if block_id == 0 {
                continue;
            }
            for (bit, unlock_time) in block.unlock_time.iter().enumerate() {
                if *unlock_time == 0 {
                    continue;
                }
                let Some(name) = schema
                    .as_ref()
                    .and_then(|schema| achievement_name(schema, app_id, block_id, bit))
                else {
                    warn!("no schema entry for achievement bit {bit} in block {block_id} of {app_id}");
                    continue;
                };
                entry.achievements.push(Achievement {
                    id: 32 * (block_id - 1) + bit as u32,
                    unlock_time: *unlock_time,
                    name,
                });
            }
        }

        inner.entries.insert(app_id, entry);
        inner.checksums.insert(app_id, crc);
        inner.in_flight.remove(&app_id);
        let ready = inner.in_flight.is_empty();
        drop(inner);
        self.readiness.publish(ready);
    }

    #[must_use]
    pub fn stats(&self, app_id: u32) -> Option<GameStats> {
        self.inner.read().entries.get(&app_id).cloned()
    }

    /// All imported entries, in stable app-id order.
    #[must_use]
    pub fn all(&self) -> Vec<(u32, GameStats)> {
        let inner = self.inner.read();
        let mut out: Vec<(u32, GameStats)> = inner
            .entries
            .iter()
            .map(|(app_id, stats)| (*app_id, stats.clone()))
            .collect();
        out.sort_by_key(|(app_id, _)| *app_id);
        out
    }

    #[must_use]
    pub fn import_in_progress(&self) -> bool {
        !self.inner.read().in_flight.is_empty()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    #[must_use]
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.readiness.subscribe()
    }

    /// Blocks until every started import has a recorded response.
    pub async fn wait_ready(&self) {
        self.readiness.wait().await;
    }
}

/// Schema path: `<app>/stats/<block>/bits/<bit>/display/name`, where
/// the name leaf is either a plain string or a localization table.
fn achievement_name(
    schema: &KeyValues,
    app_id: u32,
    block_id: u32,
    bit: usize,
) -> Option<String> {
    let app_key = app_id.to_string();
    let block_key = block_id.to_string();
    let bit_key = bit.to_string();
    let name = schema.get_path(&[&app_key, "stats", &block_key, "bits", &bit_key, "display", "name"])?;
    match name {
        KeyValues::String(name) => Some(name.clone()),
        localized => localized
            .get("english")
            .and_then(KeyValues::as_str)
            .map(str::to_string),
    }
}
