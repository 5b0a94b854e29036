//! Readiness signalling shared by the resolution caches
//!
//! Each cache tracks a set of outstanding lookups; every mutation
//! recomputes whether that set is empty and publishes the result here.
//! Waiters block on the watch channel instead of polling.

use tokio::sync::watch;

/// Publish side of a cache readiness condition
#[derive(Debug)]
pub struct Readiness {
    sender: watch::Sender<bool>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    /// A fresh condition starts not ready; the first recompute after a
    /// mutation publishes the real state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Publishes the condition. Waiters are only woken on transitions.
    pub fn publish(&self, ready: bool) {
        self.sender.send_if_modified(|current| {
            if *current == ready {
                false
            } else {
                *current = ready;
                true
            }
        });
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.sender.borrow()
    }

    /// Receiver usable from other tasks, delivering every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Blocks until the condition reports ready.
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender outlives this borrow, so the channel cannot close
        // mid-wait.
        let _ = receiver.wait_for(|ready| *ready).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_starts_not_ready() {
        let readiness = Readiness::new();
        assert!(!readiness.is_ready());
    }

    #[test]
    fn test_publish_transitions() {
        let readiness = Readiness::new();
        readiness.publish(true);
        assert!(readiness.is_ready());
        readiness.publish(false);
        assert!(!readiness.is_ready());
    }

    #[test]
    fn test_republishing_same_state_is_silent() {
        let readiness = Readiness::new();
        let mut receiver = readiness.subscribe();
        assert_eq!(receiver.has_changed().ok(), Some(false));
        readiness.publish(false);
        assert_eq!(receiver.has_changed().ok(), Some(false));
        readiness.publish(true);
        assert_eq!(receiver.has_changed().ok(), Some(true));
    }

    #[tokio::test]
    async fn test_wait_wakes_on_ready() {
        let readiness = Arc::new(Readiness::new());
        let publisher = Arc::clone(&readiness);
        let handle = tokio::spawn(async move {
            publisher.publish(true);
        });
        readiness.wait().await;
        assert!(readiness.is_ready());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_ready() {
        let readiness = Readiness::new();
        readiness.publish(true);
        readiness.wait().await;
    }
}
