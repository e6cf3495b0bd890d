//! Upload validation and ingest orchestration.

use crate::{
    config::{Config, DEFAULT_ALLOWED_EXTENSIONS, MEGABYTE, UploadPlan},
    docstore::{
        DocumentStore, DocumentStoreError, DocumentUpload, IngestReply, ProgressSink,
        UploadProgress,
    },
    metrics::SessionMetrics,
    session::tracker::ReadinessTracker,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

const FALLBACK_INGEST_FAILURE: &str = "Failed to process document";
const INGEST_TRANSPORT_FAILURE: &str = "Failed to process document. Server may be unavailable.";

/// Size and format limits applied before a document leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadPolicy {
    /// Largest accepted document, in bytes.
    pub max_bytes: u64,
    /// Lowercase extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: UploadPlan::default().max_upload_bytes(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
        }
    }
}

impl UploadPolicy {
    /// Derive the policy from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_bytes: config.effective_upload_limit(),
            allowed_extensions: config.upload_allowed_extensions.clone(),
        }
    }

    /// Human-readable limit such as `10MB`.
    pub fn limit_label(&self) -> String {
        format_limit(self.max_bytes)
    }

    fn accepts_extension(&self, name: &str) -> bool {
        let Some((_, extension)) = name.rsplit_once('.') else {
            return false;
        };
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    fn formats_label(&self) -> String {
        self.allowed_extensions
            .iter()
            .map(|ext| ext.to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check a candidate document without touching the session.
    pub fn validate(
        &self,
        name: &str,
        byte_len: u64,
        declared_size: u64,
    ) -> Result<(), UploadRejection> {
        if name.trim().is_empty() {
            return Err(UploadRejection::MissingName);
        }
        if byte_len == 0 {
            return Err(UploadRejection::EmptyDocument);
        }
        if !self.accepts_extension(name) {
            return Err(UploadRejection::UnsupportedFormat {
                name: name.to_string(),
                formats: self.formats_label(),
            });
        }
        let size = declared_size.max(byte_len);
        if size > self.max_bytes {
            return Err(UploadRejection::TooLarge {
                size,
                max_bytes: self.max_bytes,
                limit: self.limit_label(),
            });
        }
        Ok(())
    }
}

fn format_limit(bytes: u64) -> String {
    if bytes >= MEGABYTE && bytes % MEGABYTE == 0 {
        format!("{}MB", bytes / MEGABYTE)
    } else {
        format!("{bytes} bytes")
    }
}

/// Reasons a submission is refused before any transfer.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UploadRejection {
    /// No usable document name.
    #[error("A document name is required.")]
    MissingName,
    /// Zero-byte document.
    #[error("The selected file is empty.")]
    EmptyDocument,
    /// Extension outside the allowed list.
    #[error("Only {formats} files are supported.")]
    UnsupportedFormat {
        /// Submitted name.
        name: String,
        /// Allowed formats, for display.
        formats: String,
    },
    /// Declared or actual size above the limit.
    #[error("File is too large. Maximum size is {limit}.")]
    TooLarge {
        /// Size that was checked.
        size: u64,
        /// Limit in bytes.
        max_bytes: u64,
        /// Limit for display.
        limit: String,
    },
    /// URL submission that is not absolute http(s).
    #[error("Please enter a valid http(s) URL.")]
    InvalidUrl {
        /// Submitted URL.
        url: String,
    },
}

/// Result of a document or URL submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The document is indexed and questions may be asked.
    Ready {
        /// Name of the ready document.
        source_name: String,
    },
    /// The document service could not index the document.
    Failed {
        /// Reason shown to the user.
        reason: String,
    },
    /// A newer submission started before this one finished; its result was discarded.
    Superseded {
        /// Generation of the discarded submission.
        generation: u64,
    },
    /// Local validation refused the submission.
    Rejected {
        /// Which check failed.
        rejection: UploadRejection,
        /// Message shown to the user.
        message: String,
    },
}

impl UploadOutcome {
    fn rejected(rejection: UploadRejection) -> Self {
        let message = rejection.to_string();
        Self::Rejected { rejection, message }
    }
}

impl From<UploadRejection> for UploadOutcome {
    fn from(rejection: UploadRejection) -> Self {
        Self::rejected(rejection)
    }
}

/// Forwards transfer progress to the tracker for one generation.
struct GenerationProgress {
    tracker: Arc<ReadinessTracker>,
    generation: u64,
}

impl ProgressSink for GenerationProgress {
    fn bytes_sent(&self, sent: u64, total: u64) {
        self.tracker.record_progress(self.generation, sent, total);
    }

    fn handed_off(&self) {
        self.tracker.hand_off(self.generation);
    }
}

/// Validates submissions and drives them through the document service.
pub struct UploadGateway {
    policy: UploadPolicy,
    tracker: Arc<ReadinessTracker>,
    store: Arc<dyn DocumentStore>,
    metrics: Arc<SessionMetrics>,
}

impl UploadGateway {
    /// Build a gateway over shared session components.
    pub fn new(
        policy: UploadPolicy,
        tracker: Arc<ReadinessTracker>,
        store: Arc<dyn DocumentStore>,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            policy,
            tracker,
            store,
            metrics,
        }
    }

    /// Active upload policy.
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Validate and ingest a document.
    ///
    /// Rejections return before the session changes status. Accepted documents start a new
    /// generation immediately, superseding anything still in flight.
    pub async fn submit(&self, bytes: Vec<u8>, name: &str, declared_size: u64) -> UploadOutcome {
        if let Err(rejection) = self
            .policy
            .validate(name, bytes.len() as u64, declared_size)
        {
            return self.reject(name, rejection);
        }

        let total = bytes.len() as u64;
        let generation = self.tracker.begin_upload(name, total);
        self.metrics.record_upload_accepted();

        let upload = DocumentUpload {
            name: name.to_string(),
            bytes,
            generation,
        };
        let result = self.store.ingest(upload, self.progress_for(generation)).await;
        self.settle(generation, name, result)
    }

    /// Ask the document service to fetch and ingest a remote document.
    pub async fn submit_url(&self, url: &str) -> UploadOutcome {
        let url = url.trim();
        let valid = reqwest::Url::parse(url)
            .map(|parsed| matches!(parsed.scheme(), "http" | "https") && parsed.has_host())
            .unwrap_or(false);
        if !valid {
            return self.reject(
                url,
                UploadRejection::InvalidUrl {
                    url: url.to_string(),
                },
            );
        }

        let generation = self.tracker.begin_upload(url, 0);
        self.metrics.record_upload_accepted();
        let result = self.store.ingest_url(url, self.progress_for(generation)).await;
        self.settle(generation, url, result)
    }

    fn progress_for(&self, generation: u64) -> UploadProgress {
        UploadProgress::new(Arc::new(GenerationProgress {
            tracker: self.tracker.clone(),
            generation,
        }))
    }

    fn reject(&self, name: &str, rejection: UploadRejection) -> UploadOutcome {
        let outcome = UploadOutcome::rejected(rejection);
        if let UploadOutcome::Rejected { message, .. } = &outcome {
            tracing::info!(document = name, reason = %message, "Upload rejected");
            self.tracker.record_rejection(message);
        }
        self.metrics.record_upload_rejected();
        outcome
    }

    fn settle(
        &self,
        generation: u64,
        name: &str,
        result: Result<IngestReply, DocumentStoreError>,
    ) -> UploadOutcome {
        let outcome = match result {
            Ok(IngestReply { ready: true, .. }) => Ok(()),
            Ok(IngestReply { error, .. }) => Err(error
                .filter(|reason| !reason.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_INGEST_FAILURE.to_string())),
            Err(error) => {
                tracing::error!(
                    generation,
                    document = name,
                    error = %error,
                    "Ingest request failed"
                );
                Err(INGEST_TRANSPORT_FAILURE.to_string())
            }
        };

        if !self.tracker.finish(generation, outcome.clone()) {
            return UploadOutcome::Superseded { generation };
        }
        match outcome {
            Ok(()) => {
                self.metrics.record_document_ready();
                UploadOutcome::Ready {
                    source_name: name.to_string(),
                }
            }
            Err(reason) => {
                self.metrics.record_upload_failed();
                UploadOutcome::Failed { reason }
            }
        }
    }
}
