//! Session object shared by the HTTP and MCP surfaces.

use crate::{
    config::get_config,
    docstore::{DocumentStore, DocumentStoreError, HttpDocumentStore},
    metrics::{MetricsSnapshot, SessionMetrics},
    session::{
        dispatcher::{AskOutcome, QuestionDispatcher},
        gateway::{UploadGateway, UploadOutcome, UploadPolicy},
        state::DocumentSession,
        tracker::ReadinessTracker,
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Operations the presentation surfaces depend on.
///
/// Every method returns a discriminated outcome or a snapshot; nothing here fails across the
/// boundary.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Validate and ingest a document.
    async fn submit_document(&self, name: &str, bytes: Vec<u8>, declared_size: u64)
    -> UploadOutcome;

    /// Ingest a document fetched by the service from a URL.
    async fn submit_url(&self, url: &str) -> UploadOutcome;

    /// Current session snapshot, without IO.
    fn session_status(&self) -> DocumentSession;

    /// Reconcile with the document service and return the resulting snapshot.
    async fn resync(&self) -> DocumentSession;

    /// Drop the active document and return the resulting snapshot.
    fn reset(&self) -> DocumentSession;

    /// Ask a question against the ready document.
    async fn ask_question(&self, question: &str) -> AskOutcome;

    /// Counters describing session activity.
    fn metrics_snapshot(&self) -> MetricsSnapshot;

    /// Limits applied to submissions.
    fn upload_policy(&self) -> UploadPolicy;

    /// Receiver notified after every session transition.
    fn subscribe(&self) -> watch::Receiver<DocumentSession>;
}

/// The research session: one document, its readiness, and questions against it.
///
/// Construct once near process start and share through an `Arc`.
pub struct ResearchSession {
    tracker: Arc<ReadinessTracker>,
    gateway: UploadGateway,
    dispatcher: QuestionDispatcher,
    store: Arc<dyn DocumentStore>,
    metrics: Arc<SessionMetrics>,
}

impl ResearchSession {
    /// Assemble a session over any document service.
    pub fn new(store: Arc<dyn DocumentStore>, policy: UploadPolicy) -> Self {
        let metrics = Arc::new(SessionMetrics::new());
        let tracker = Arc::new(ReadinessTracker::new(metrics.clone()));
        let gateway = UploadGateway::new(policy, tracker.clone(), store.clone(), metrics.clone());
        let dispatcher = QuestionDispatcher::new(tracker.clone(), store.clone(), metrics.clone());
        Self {
            tracker,
            gateway,
            dispatcher,
            store,
            metrics,
        }
    }

    /// Build a session over the HTTP document service using the global configuration.
    pub fn from_config() -> Result<Self, DocumentStoreError> {
        let config = get_config();
        let store = HttpDocumentStore::new()?;
        let policy = UploadPolicy::from_config(config);
        tracing::info!(
            docstore = %config.docstore_url,
            plan = config.upload_plan.label(),
            max_bytes = policy.max_bytes,
            "Research session initialized"
        );
        Ok(Self::new(Arc::new(store), policy))
    }

    /// Readiness tracker backing this session.
    pub fn tracker(&self) -> &ReadinessTracker {
        &self.tracker
    }
}

#[async_trait]
impl SessionApi for ResearchSession {
    async fn submit_document(
        &self,
        name: &str,
        bytes: Vec<u8>,
        declared_size: u64,
    ) -> UploadOutcome {
        self.gateway.submit(bytes, name, declared_size).await
    }

    async fn submit_url(&self, url: &str) -> UploadOutcome {
        self.gateway.submit_url(url).await
    }

    fn session_status(&self) -> DocumentSession {
        self.tracker.snapshot()
    }

    async fn resync(&self) -> DocumentSession {
        self.tracker.resync(self.store.as_ref()).await;
        self.tracker.snapshot()
    }

    fn reset(&self) -> DocumentSession {
        self.tracker.reset();
        self.tracker.snapshot()
    }

    async fn ask_question(&self, question: &str) -> AskOutcome {
        self.dispatcher.ask(question).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn upload_policy(&self) -> UploadPolicy {
        self.gateway.policy().clone()
    }

    fn subscribe(&self) -> watch::Receiver<DocumentSession> {
        self.tracker.subscribe()
    }
}
