use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing document session activity.
#[derive(Default)]
pub struct SessionMetrics {
    uploads_accepted: AtomicU64,
    uploads_rejected: AtomicU64,
    documents_ready: AtomicU64,
    uploads_failed: AtomicU64,
    stale_outcomes_discarded: AtomicU64,
    questions_answered: AtomicU64,
    questions_refused: AtomicU64,
    domain_errors: AtomicU64,
    transport_errors: AtomicU64,
}

impl SessionMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an upload that passed local validation and reached the document service.
    pub fn record_upload_accepted(&self) {
        self.uploads_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload refused by local validation.
    pub fn record_upload_rejected(&self) {
        self.uploads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a document that became queryable.
    pub fn record_document_ready(&self) {
        self.documents_ready.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ingest the document service could not complete.
    pub fn record_upload_failed(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an outcome dropped because a newer upload generation exists.
    pub fn record_stale_outcome(&self) {
        self.stale_outcomes_discarded
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a question that produced an answer.
    pub fn record_question_answered(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a question refused locally (empty text or no ready document).
    pub fn record_question_refused(&self) {
        self.questions_refused.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a question the document service understood but could not answer.
    pub fn record_domain_error(&self) {
        self.domain_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a question lost to a network failure or malformed response.
    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads_accepted: self.uploads_accepted.load(Ordering::Relaxed),
            uploads_rejected: self.uploads_rejected.load(Ordering::Relaxed),
            documents_ready: self.documents_ready.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            stale_outcomes_discarded: self.stale_outcomes_discarded.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            questions_refused: self.questions_refused.load(Ordering::Relaxed),
            domain_errors: self.domain_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of session counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Uploads that passed validation since startup.
    pub uploads_accepted: u64,
    /// Uploads refused by local validation.
    pub uploads_rejected: u64,
    /// Documents that reached the ready state.
    pub documents_ready: u64,
    /// Ingests that ended in failure.
    pub uploads_failed: u64,
    /// Upload outcomes dropped because they belonged to a superseded generation.
    pub stale_outcomes_discarded: u64,
    /// Questions answered by the document service.
    pub questions_answered: u64,
    /// Questions refused before reaching the document service.
    pub questions_refused: u64,
    /// Questions that came back with a domain-level error.
    pub domain_errors: u64,
    /// Questions lost to transport failures.
    pub transport_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_upload_lifecycle() {
        let metrics = SessionMetrics::new();
        metrics.record_upload_accepted();
        metrics.record_upload_accepted();
        metrics.record_upload_rejected();
        metrics.record_document_ready();
        metrics.record_stale_outcome();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.uploads_accepted, 2);
        assert_eq!(snapshot.uploads_rejected, 1);
        assert_eq!(snapshot.documents_ready, 1);
        assert_eq!(snapshot.uploads_failed, 0);
        assert_eq!(snapshot.stale_outcomes_discarded, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        let metrics = SessionMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
