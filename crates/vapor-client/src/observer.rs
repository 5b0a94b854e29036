//! Host notification seam
//!
//! The dispatch task calls these hooks as cache state changes. Every
//! method has an empty default body, so hosts implement only what they
//! display.

use async_trait::async_trait;
use vapor_cache::Friend;

/// Sink for cache change notifications
#[async_trait]
pub trait CacheObserver: Send + Sync {
    /// A friend became fully resolved for the first time.
    async fn friend_added(&self, _friend: Friend) {}

    /// A resolved friend's persona data changed.
    async fn friend_updated(&self, _friend: Friend) {}

    /// A resolved friend left the roster.
    async fn friend_removed(&self, _steam_id: u64) {}

    /// The own account's display name arrived or changed.
    async fn persona_name_changed(&self, _persona_name: String) {}

    /// Every owned license has resolved package and app metadata.
    async fn entitlements_resolved(&self) {}

    /// Stats and achievements for one game finished importing.
    async fn stats_imported(&self, _app_id: u32) {}
}

/// Observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

#[async_trait]
impl CacheObserver for NullObserver {}
