//! Readiness tracking for the session's current document.

use crate::{
    docstore::DocumentStore,
    metrics::SessionMetrics,
    session::state::{DocumentSession, SessionStatus},
};
use std::sync::Arc;
use tokio::sync::watch;

/// Owns the [`DocumentSession`] and applies generation-guarded transitions to it.
///
/// State lives in a `watch` channel: reads borrow the latest snapshot without IO, and every
/// transition runs inside one `send_if_modified` closure so the generation check and the update
/// cannot interleave with another caller.
pub struct ReadinessTracker {
    state: watch::Sender<DocumentSession>,
    metrics: Arc<SessionMetrics>,
}

impl ReadinessTracker {
    /// Create a tracker in the `NoDocument` state.
    pub fn new(metrics: Arc<SessionMetrics>) -> Self {
        let (state, _) = watch::channel(DocumentSession::default());
        Self { state, metrics }
    }

    /// Current status, read from memory.
    pub fn current_status(&self) -> SessionStatus {
        self.state.borrow().status.clone()
    }

    /// Full copy of the current session.
    pub fn snapshot(&self) -> DocumentSession {
        self.state.borrow().clone()
    }

    /// Generation of the latest accepted submission.
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Receiver notified after every transition.
    pub fn subscribe(&self) -> watch::Receiver<DocumentSession> {
        self.state.subscribe()
    }

    /// Ask the document service whether it already holds a ready document.
    ///
    /// Advisory only: the answer is dropped when an upload is in flight or a newer generation
    /// started while the probe was pending. A failed probe leaves the session unchanged.
    pub async fn resync(&self, store: &dyn DocumentStore) -> SessionStatus {
        let started_generation = {
            let session = self.state.borrow();
            if session.status.is_in_flight() {
                tracing::debug!(
                    generation = session.generation,
                    status = session.status.label(),
                    "Skipping resync while upload is in flight"
                );
                return session.status.clone();
            }
            session.generation
        };

        match store.has_ready_document().await {
            Ok(ready) => {
                let changed = self
                    .state
                    .send_if_modified(|session| session.apply_resync(started_generation, ready));
                if changed {
                    tracing::info!(
                        generation = started_generation,
                        ready,
                        status = self.current_status().label(),
                        "Session resynchronized with document service"
                    );
                } else {
                    tracing::debug!(
                        generation = started_generation,
                        ready,
                        "Resync left session unchanged"
                    );
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "Resync failed; keeping cached session state");
            }
        }

        self.current_status()
    }

    pub(crate) fn begin_upload(&self, source_name: &str, total_bytes: u64) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|session| {
            generation = session.begin(source_name, total_bytes);
        });
        tracing::info!(generation, document = source_name, bytes = total_bytes, "Upload started");
        generation
    }

    pub(crate) fn record_progress(&self, generation: u64, sent: u64, total: u64) {
        self.state
            .send_if_modified(|session| session.record_progress(generation, sent, total));
    }

    pub(crate) fn hand_off(&self, generation: u64) {
        if self
            .state
            .send_if_modified(|session| session.hand_off(generation))
        {
            tracing::debug!(generation, "Upload handed off; document processing");
        }
    }

    /// Apply a terminal upload outcome. Returns false when the outcome was stale.
    pub(crate) fn finish(&self, generation: u64, outcome: Result<(), String>) -> bool {
        let failure = outcome.as_ref().err().cloned();
        let applied = self
            .state
            .send_if_modified(|session| session.finish(generation, outcome));
        if applied {
            match failure {
                None => tracing::info!(generation, "Document ready"),
                Some(reason) => tracing::warn!(generation, error = %reason, "Document failed"),
            }
        } else {
            self.metrics.record_stale_outcome();
            tracing::debug!(
                generation,
                current = self.generation(),
                "Discarding outcome from superseded upload"
            );
        }
        applied
    }

    pub(crate) fn record_rejection(&self, message: &str) {
        self.state.send_modify(|session| session.reject(message));
    }

    pub(crate) fn reset(&self) {
        self.state.send_modify(DocumentSession::reset);
        tracing::info!(generation = self.generation(), "Session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::FakeDocumentStore;

    fn tracker() -> (ReadinessTracker, Arc<SessionMetrics>) {
        let metrics = Arc::new(SessionMetrics::new());
        (ReadinessTracker::new(metrics.clone()), metrics)
    }

    #[tokio::test]
    async fn resync_adopts_ready_document() {
        let (tracker, _) = tracker();
        let store = FakeDocumentStore::new().with_ready_document(true);

        assert_eq!(tracker.resync(&store).await, SessionStatus::Ready);
        assert_eq!(store.readiness_calls(), 1);
    }

    #[tokio::test]
    async fn repeated_resync_is_idempotent() {
        let (tracker, _) = tracker();
        let store = FakeDocumentStore::new().with_ready_document(true);

        let first = tracker.resync(&store).await;
        let updated_at = tracker.snapshot().updated_at;
        for _ in 0..3 {
            assert_eq!(tracker.resync(&store).await, first);
        }
        assert_eq!(tracker.snapshot().updated_at, updated_at);

        let (tracker, _) = self::tracker();
        let store = FakeDocumentStore::new();
        for _ in 0..3 {
            assert_eq!(tracker.resync(&store).await, SessionStatus::NoDocument);
        }
    }

    #[tokio::test]
    async fn resync_skips_probe_while_uploading() {
        let (tracker, _) = tracker();
        let store = FakeDocumentStore::new().with_ready_document(true);
        tracker.begin_upload("paper.pdf", 10);

        assert_eq!(tracker.resync(&store).await, SessionStatus::Uploading);
        assert_eq!(store.readiness_calls(), 0);
    }

    #[tokio::test]
    async fn failed_probe_keeps_state() {
        let (tracker, _) = tracker();
        let ready = FakeDocumentStore::new().with_ready_document(true);
        tracker.resync(&ready).await;

        let broken = FakeDocumentStore::new().with_readiness_failure();
        assert_eq!(tracker.resync(&broken).await, SessionStatus::Ready);
    }

    #[test]
    fn stale_finish_counts_discard() {
        let (tracker, metrics) = tracker();
        let first = tracker.begin_upload("a.pdf", 1);
        let second = tracker.begin_upload("b.pdf", 1);

        assert!(!tracker.finish(first, Ok(())));
        assert!(tracker.finish(second, Ok(())));
        assert_eq!(metrics.snapshot().stale_outcomes_discarded, 1);
        assert_eq!(tracker.snapshot().source_name.as_deref(), Some("b.pdf"));
    }

    #[test]
    fn subscribers_observe_transitions() {
        let (tracker, _) = tracker();
        let mut rx = tracker.subscribe();
        let generation = tracker.begin_upload("a.pdf", 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, SessionStatus::Uploading);

        tracker.hand_off(generation);
        assert_eq!(rx.borrow_and_update().status, SessionStatus::Processing);
    }
}
