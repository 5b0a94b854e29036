//! Request/response correlation
//!
//! Outgoing requests get a monotonically increasing job id. Responses
//! carry that id in `target_job_id`. A pending job is fulfilled at most
//! once; responses that do not match a pending job's expectation are
//! handed back to the caller for the unsolicited path.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use vapor_wire::frame::Frame;
use vapor_wire::proto::header::FrameHeader;
use vapor_wire::MsgKind;

/// Expectations attached to an outgoing request
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Response kind this job accepts
    pub expected_kind: Option<MsgKind>,
    /// Named-service method this job accepts
    pub expected_method: Option<String>,
    /// Allow a response without a target job id to fulfill this job
    /// when its kind matches. Classic logon responses arrive this way.
    pub match_unsolicited: bool,
}

impl JobOptions {
    /// Expect a specific response kind.
    #[must_use]
    pub fn expect_kind(kind: MsgKind) -> Self {
        Self {
            expected_kind: Some(kind),
            ..Self::default()
        }
    }

    /// Expect a named-service response for the given method.
    #[must_use]
    pub fn expect_service(method: &str) -> Self {
        Self {
            expected_kind: Some(MsgKind::ServiceMethodResponse),
            expected_method: Some(method.to_string()),
            match_unsolicited: false,
        }
    }

    #[must_use]
    pub fn unsolicited_fallback(mut self) -> Self {
        self.match_unsolicited = true;
        self
    }
}

/// Delivered response of a fulfilled job
#[derive(Debug)]
pub struct JobReply {
    pub header: FrameHeader,
    pub body: Bytes,
}

#[derive(Debug)]
struct PendingJob {
    sent_kind: MsgKind,
    options: JobOptions,
    tx: oneshot::Sender<JobReply>,
}

/// Arena of pending jobs indexed by id, with explicit removal on
/// fulfillment, abandonment and teardown.
#[derive(Debug, Default)]
pub struct JobCorrelator {
    next_id: AtomicU64,
    pending: DashMap<u64, PendingJob>,
}

impl JobCorrelator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: DashMap::new(),
        }
    }

    /// Allocates the next job id and registers a pending job.
    pub fn register(
        &self,
        sent_kind: MsgKind,
        options: JobOptions,
    ) -> (u64, oneshot::Receiver<JobReply>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingJob {
                sent_kind,
                options,
                tx,
            },
        );
        (id, rx)
    }

    /// Attempts to deliver a frame to the pending job it addresses.
    ///
    /// Returns the frame back when no pending job matches, so the
    /// caller can route it as unsolicited. A kind or method mismatch
    /// leaves the job pending.
    pub fn resolve(&self, frame: Frame) -> Option<Frame> {
        let Some(job_id) = frame.header.target_job_id.filter(|&id| id != 0) else {
            return self.resolve_unsolicited(frame);
        };
        let Some(entry) = self.pending.get(&job_id) else {
            debug!(job_id, kind = %frame.kind, "response for unknown job");
            return Some(frame);
        };
        if !Self::matches(&entry.options, &frame) {
            warn!(
                job_id,
                kind = %frame.kind,
                method = frame.header.method_name().unwrap_or_default(),
                sent = %entry.sent_kind,
                "response does not match job expectation, treating as unsolicited"
            );
            drop(entry);
            return Some(frame);
        }
        drop(entry);
        // Remove only after the expectation check so a mismatched
        // response cannot consume the job.
        if let Some((_, job)) = self.pending.remove(&job_id) {
            let reply = JobReply {
                header: frame.header,
                body: frame.body,
            };
            if job.tx.send(reply).is_err() {
                debug!(job_id, "job waiter went away before the response");
            }
            return None;
        }
        Some(frame)
    }

    fn resolve_unsolicited(&self, frame: Frame) -> Option<Frame> {
        let candidate = self.pending.iter().find_map(|entry| {
            (entry.options.match_unsolicited
                && entry.options.expected_kind == Some(frame.kind))
            .then_some(*entry.key())
        });
        let Some(job_id) = candidate else {
            return Some(frame);
        };
        if let Some((_, job)) = self.pending.remove(&job_id) {
            debug!(job_id, kind = %frame.kind, "fulfilling job from unsolicited message");
            let reply = JobReply {
                header: frame.header,
                body: frame.body,
            };
            if job.tx.send(reply).is_err() {
                debug!(job_id, "job waiter went away before the response");
            }
            return None;
        }
        Some(frame)
    }

    fn matches(options: &JobOptions, frame: &Frame) -> bool {
        // Inbound service messages normalize to the response kind.
        let kind = if frame.kind == MsgKind::ServiceMethod {
            MsgKind::ServiceMethodResponse
        } else {
            frame.kind
        };
        if let Some(expected) = options.expected_kind {
            if expected != kind {
                return false;
            }
        }
        if let Some(expected) = options.expected_method.as_deref() {
            let expected_base = expected.split('#').next().unwrap_or(expected);
            if frame.header.method_name() != Some(expected_base) {
                return false;
            }
        }
        true
    }

    /// Removes a job the waiter has given up on.
    pub fn abandon(&self, job_id: u64) {
        self.pending.remove(&job_id);
    }

    /// Fails every pending job. Waiters observe a closed channel.
    pub fn fail_all(&self) {
        let count = self.pending.len();
        if count > 0 {
            debug!(count, "cancelling pending jobs");
        }
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use vapor_wire::proto::header::FrameHeader;

    use super::*;

    fn response_frame(kind: MsgKind, target_job_id: u64, method: Option<&str>) -> Frame {
        Frame {
            kind,
            header: FrameHeader {
                target_job_id: Some(target_job_id),
                target_job_name: method.map(str::to_string),
                ..Default::default()
            },
            body: Bytes::from_static(b"body"),
        }
    }

    #[test]
    fn test_ids_are_monotonic_from_one() {
        let correlator = JobCorrelator::new();
        let (first, _rx1) = correlator.register(MsgKind::ClientHello, JobOptions::default());
        let (second, _rx2) = correlator.register(MsgKind::ClientHello, JobOptions::default());
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_matching_response_fulfills_job() {
        let correlator = JobCorrelator::new();
        let (id, rx) = correlator.register(
            MsgKind::ServiceMethodCallFromClientNonAuthed,
            JobOptions::expect_service("Authentication.PollAuthSessionStatus#1"),
        );
        let frame = response_frame(
            MsgKind::ServiceMethodResponse,
            id,
            Some("Authentication.PollAuthSessionStatus#1"),
        );
        assert!(correlator.resolve(frame).is_none());
        let reply = rx.await.unwrap();
        assert_eq!(reply.body.as_ref(), b"body");
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_service_method_kind_normalized() {
        let correlator = JobCorrelator::new();
        let (id, rx) = correlator.register(
            MsgKind::ServiceMethodCallFromClient,
            JobOptions::expect_service("Player.ClientGetLastPlayedTimes#1"),
        );
        let frame = response_frame(
            MsgKind::ServiceMethod,
            id,
            Some("Player.ClientGetLastPlayedTimes#1"),
        );
        assert!(correlator.resolve(frame).is_none());
        assert!(rx.await.is_ok());
    }

    #[test]
    fn test_method_mismatch_leaves_job_pending() {
        let correlator = JobCorrelator::new();
        let (id, _rx) = correlator.register(
            MsgKind::ServiceMethodCallFromClient,
            JobOptions::expect_service("Player.ClientGetLastPlayedTimes#1"),
        );
        let frame = response_frame(
            MsgKind::ServiceMethodResponse,
            id,
            Some("CloudConfigStore.Download#1"),
        );
        let returned = correlator.resolve(frame);
        assert!(returned.is_some());
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn test_kind_mismatch_leaves_job_pending() {
        let correlator = JobCorrelator::new();
        let (id, _rx) = correlator.register(
            MsgKind::ClientGetUserStats,
            JobOptions::expect_kind(MsgKind::ClientGetUserStatsResponse),
        );
        let frame = response_frame(MsgKind::ClientPersonaState, id, None);
        assert!(correlator.resolve(frame).is_some());
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn test_unknown_job_id_is_unsolicited() {
        let correlator = JobCorrelator::new();
        let frame = response_frame(MsgKind::ServiceMethodResponse, 99, None);
        assert!(correlator.resolve(frame).is_some());
    }

    #[tokio::test]
    async fn test_unsolicited_fallback_by_kind() {
        let correlator = JobCorrelator::new();
        let (_id, rx) = correlator.register(
            MsgKind::ClientLogon,
            JobOptions::expect_kind(MsgKind::ClientLogOnResponse).unsolicited_fallback(),
        );
        let frame = Frame {
            kind: MsgKind::ClientLogOnResponse,
            header: FrameHeader::default(),
            body: Bytes::new(),
        };
        assert!(correlator.resolve(frame).is_none());
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_all_closes_waiters() {
        let correlator = JobCorrelator::new();
        let (_id, rx) = correlator.register(MsgKind::ClientHello, JobOptions::default());
        correlator.fail_all();
        assert!(rx.await.is_err());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_abandon_removes_job() {
        let correlator = JobCorrelator::new();
        let (id, _rx) = correlator.register(MsgKind::ClientHello, JobOptions::default());
        correlator.abandon(id);
        assert_eq!(correlator.pending_count(), 0);
    }
}
