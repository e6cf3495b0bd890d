//! Session snapshot and its pure transitions.
//!
//! Every mutation of [`DocumentSession`] goes through one of the methods below. The tracker
//! applies them inside a single `watch` modification, so a transition never interleaves with
//! another.

use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// Lifecycle state of the session's current document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Nothing has been submitted, or the session was reset.
    NoDocument,
    /// Bytes are being transferred to the document service.
    Uploading,
    /// The service holds the bytes and is indexing them.
    Processing,
    /// Questions may be dispatched.
    Ready,
    /// The last accepted submission failed.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
}

impl SessionStatus {
    /// True only for [`SessionStatus::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionStatus::Ready)
    }

    /// True while an accepted upload has not reached a terminal state.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SessionStatus::Uploading | SessionStatus::Processing)
    }

    /// Short lowercase label, used in logs and the tool output.
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::NoDocument => "no_document",
            SessionStatus::Uploading => "uploading",
            SessionStatus::Processing => "processing",
            SessionStatus::Ready => "ready",
            SessionStatus::Failed { .. } => "failed",
        }
    }
}

/// Bytes handed to the transport for the in-flight upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    /// Bytes written so far.
    pub bytes_sent: u64,
    /// Size of the whole document.
    pub total_bytes: u64,
}

/// Observable state of the research session.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSession {
    /// Identifier assigned when the process starts.
    pub session_id: Uuid,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// Name of the document being processed or queried.
    pub source_name: Option<String>,
    /// Last user-visible problem, cleared by a successful upload.
    pub last_error: Option<String>,
    /// Generation of the latest accepted submission.
    pub generation: u64,
    /// Transfer progress for the current generation, if any.
    pub upload_progress: Option<TransferProgress>,
    /// RFC 3339 timestamp of the last transition.
    pub updated_at: String,
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            status: SessionStatus::NoDocument,
            source_name: None,
            last_error: None,
            generation: 0,
            upload_progress: None,
            updated_at: now_timestamp(),
        }
    }
}

impl DocumentSession {
    /// Start a new upload generation and return its number.
    pub(crate) fn begin(&mut self, source_name: &str, total_bytes: u64) -> u64 {
        self.generation += 1;
        self.status = SessionStatus::Uploading;
        self.source_name = Some(source_name.to_string());
        self.last_error = None;
        self.upload_progress = Some(TransferProgress {
            bytes_sent: 0,
            total_bytes,
        });
        self.touch();
        self.generation
    }

    /// Move from Uploading to Processing once the transfer is done.
    pub(crate) fn hand_off(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.status != SessionStatus::Uploading {
            return false;
        }
        self.status = SessionStatus::Processing;
        if let Some(progress) = self.upload_progress.as_mut() {
            progress.bytes_sent = progress.total_bytes;
        }
        self.touch();
        true
    }

    pub(crate) fn record_progress(&mut self, generation: u64, sent: u64, total: u64) -> bool {
        if generation != self.generation || self.status != SessionStatus::Uploading {
            return false;
        }
        self.upload_progress = Some(TransferProgress {
            bytes_sent: sent.min(total),
            total_bytes: total,
        });
        self.touch();
        true
    }

    /// Apply the terminal outcome of `generation`. Returns false when a newer submission owns
    /// the session, in which case nothing changes.
    pub(crate) fn finish(&mut self, generation: u64, outcome: Result<(), String>) -> bool {
        if generation != self.generation || !self.status.is_in_flight() {
            return false;
        }
        match outcome {
            Ok(()) => {
                self.status = SessionStatus::Ready;
                self.last_error = None;
            }
            Err(reason) => {
                self.last_error = Some(reason.clone());
                self.status = SessionStatus::Failed { reason };
            }
        }
        self.upload_progress = None;
        self.touch();
        true
    }

    /// Record a submission refused before any transfer. Status is left alone.
    pub(crate) fn reject(&mut self, message: &str) {
        self.last_error = Some(message.to_string());
        self.touch();
    }

    /// Reconcile with the service's readiness answer for a probe started at `started_generation`.
    ///
    /// Returns true when the snapshot changed.
    pub(crate) fn apply_resync(&mut self, started_generation: u64, ready: bool) -> bool {
        if started_generation != self.generation || self.status.is_in_flight() {
            return false;
        }
        match (&self.status, ready) {
            (SessionStatus::Ready, true) => false,
            (_, true) => {
                self.status = SessionStatus::Ready;
                // The service does not report which document it holds.
                self.source_name = None;
                self.last_error = None;
                self.touch();
                true
            }
            (SessionStatus::Ready, false) => {
                self.status = SessionStatus::NoDocument;
                self.source_name = None;
                self.last_error = None;
                self.touch();
                true
            }
            (_, false) => false,
        }
    }

    /// Forget the current document. Any in-flight upload becomes stale.
    pub(crate) fn reset(&mut self) {
        self.generation += 1;
        self.status = SessionStatus::NoDocument;
        self.source_name = None;
        self.last_error = None;
        self.upload_progress = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = now_timestamp();
    }
}

fn now_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}
