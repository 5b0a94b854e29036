//! Resolution caches over the connection-manager session
//!
//! Each cache ingests unsolicited messages from the dispatch task and
//! publishes a precise readiness condition: ready exactly when nothing
//! it has been told about is still unresolved. Any number of waiters
//! can block on that condition without polling. Malformed payloads are
//! logged and dropped, never surfaced as errors.

pub mod friends;
pub mod games;
pub mod playtime;
pub mod readiness;
pub mod stats;

pub use friends::{Friend, FriendsCache, FriendsEvent, RosterDelta};
pub use games::{App, AppKind, GamesCache, License, PackageRequest};
pub use playtime::{Playtime, PlaytimeCache};
pub use readiness::Readiness;
pub use stats::{Achievement, GameStats, StatsCache};
