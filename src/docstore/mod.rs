//! Document service integration.
//!
//! The document service indexes uploaded documents and answers questions grounded in them. The
//! session core only sees the [`DocumentStore`] trait; [`HttpDocumentStore`] is the reqwest
//! adapter used by both binaries.

pub mod client;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;

pub use client::HttpDocumentStore;
pub use types::{AnswerReply, AnswerStatus, DocumentStoreError, DocumentUpload, IngestReply};

/// Interface implemented by document service backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Hand raw document bytes to the service and wait until it is indexed or rejected.
    async fn ingest(
        &self,
        upload: DocumentUpload,
        progress: UploadProgress,
    ) -> Result<IngestReply, DocumentStoreError>;

    /// Ask the service to fetch and index a remote document.
    async fn ingest_url(
        &self,
        url: &str,
        progress: UploadProgress,
    ) -> Result<IngestReply, DocumentStoreError>;

    /// Report whether the service already holds a queryable document.
    async fn has_ready_document(&self) -> Result<bool, DocumentStoreError>;

    /// Answer a question against the indexed document.
    async fn answer(&self, question: &str) -> Result<AnswerReply, DocumentStoreError>;
}

/// Receiver for transfer progress emitted while a document is handed to the service.
pub trait ProgressSink: Send + Sync {
    /// `sent` of `total` bytes have been written to the transport.
    fn bytes_sent(&self, sent: u64, total: u64);
    /// Every byte reached the service; indexing is now the service's job.
    fn handed_off(&self);
}

/// Cloneable handle a [`DocumentStore`] uses to report upload progress.
#[derive(Clone)]
pub struct UploadProgress {
    sink: Arc<dyn ProgressSink>,
}

impl UploadProgress {
    /// Wrap a progress sink.
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink }
    }

    /// Progress handle that drops every report.
    pub fn detached() -> Self {
        Self::new(Arc::new(NoProgress))
    }

    /// Forward a byte count to the sink.
    pub fn bytes_sent(&self, sent: u64, total: u64) {
        self.sink.bytes_sent(sent, total);
    }

    /// Signal that the transfer finished.
    pub fn handed_off(&self) {
        self.sink.handed_off();
    }
}

struct NoProgress;

impl ProgressSink for NoProgress {
    fn bytes_sent(&self, _sent: u64, _total: u64) {}

    fn handed_off(&self) {}
}
