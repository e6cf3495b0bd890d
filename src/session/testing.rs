//! In-memory document service for tests.
//!
//! Replies are scripted per document name, and ingest calls can be held on a [`Notify`] gate so
//! tests decide exactly when an outcome arrives.

use crate::docstore::{
    AnswerReply, DocumentStore, DocumentStoreError, DocumentUpload, IngestReply, UploadProgress,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::sync::Notify;

#[derive(Clone)]
enum Scripted<T> {
    Reply(T),
    TransportFailure,
}

impl<T> Scripted<T> {
    fn resolve(self) -> Result<T, DocumentStoreError> {
        match self {
            Scripted::Reply(value) => Ok(value),
            Scripted::TransportFailure => Err(DocumentStoreError::UnexpectedStatus {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "document service unavailable".into(),
            }),
        }
    }
}

/// Scripted [`DocumentStore`] with call counters.
pub struct FakeDocumentStore {
    ready_document: AtomicBool,
    readiness_fails: AtomicBool,
    ingest_replies: Mutex<HashMap<String, Scripted<IngestReply>>>,
    answer_reply: Mutex<Scripted<AnswerReply>>,
    transfer_gates: Mutex<HashMap<String, Arc<Notify>>>,
    processing_gates: Mutex<HashMap<String, Arc<Notify>>>,
    readiness_gate: Mutex<Option<Arc<Notify>>>,
    /// Notified once per ingest call, as soon as the call arrives.
    pub ingest_started: Arc<Notify>,
    /// Notified once per readiness probe, as soon as the call arrives.
    pub readiness_started: Arc<Notify>,
    ingest_calls: AtomicUsize,
    readiness_calls: AtomicUsize,
    answer_calls: AtomicUsize,
    ingested: Mutex<Vec<DocumentUpload>>,
    questions: Mutex<Vec<String>>,
}

impl Default for FakeDocumentStore {
    fn default() -> Self {
        Self {
            ready_document: AtomicBool::new(false),
            readiness_fails: AtomicBool::new(false),
            ingest_replies: Mutex::new(HashMap::new()),
            answer_reply: Mutex::new(Scripted::Reply(AnswerReply::answered(
                "The paper concludes that attention is sufficient.",
            ))),
            transfer_gates: Mutex::new(HashMap::new()),
            processing_gates: Mutex::new(HashMap::new()),
            readiness_gate: Mutex::new(None),
            ingest_started: Arc::new(Notify::new()),
            readiness_started: Arc::new(Notify::new()),
            ingest_calls: AtomicUsize::new(0),
            readiness_calls: AtomicUsize::new(0),
            answer_calls: AtomicUsize::new(0),
            ingested: Mutex::new(Vec::new()),
            questions: Mutex::new(Vec::new()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeDocumentStore {
    /// Store with no document, accepting every ingest and answering every question.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set what `has_ready_document` reports.
    pub fn with_ready_document(self, ready: bool) -> Self {
        self.set_ready_document(ready);
        self
    }

    /// Make `has_ready_document` fail with a transport error.
    pub fn with_readiness_failure(self) -> Self {
        self.readiness_fails.store(true, Ordering::SeqCst);
        self
    }

    /// Script the ingest reply for one document name.
    pub fn with_ingest_reply(self, name: &str, reply: IngestReply) -> Self {
        lock(&self.ingest_replies).insert(name.to_string(), Scripted::Reply(reply));
        self
    }

    /// Make ingest of one document name fail with a transport error.
    pub fn with_ingest_failure(self, name: &str) -> Self {
        lock(&self.ingest_replies).insert(name.to_string(), Scripted::TransportFailure);
        self
    }

    /// Script the reply returned for every question.
    pub fn with_answer(self, reply: AnswerReply) -> Self {
        *lock(&self.answer_reply) = Scripted::Reply(reply);
        self
    }

    /// Make every question fail with a transport error.
    pub fn with_answer_failure(self) -> Self {
        *lock(&self.answer_reply) = Scripted::TransportFailure;
        self
    }

    /// Change what `has_ready_document` reports.
    pub fn set_ready_document(&self, ready: bool) {
        self.ready_document.store(ready, Ordering::SeqCst);
    }

    /// Hold ingest of `name` before any byte is sent, keeping the session in `Uploading`.
    pub fn hold_transfer(&self, name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.transfer_gates).insert(name.to_string(), gate.clone());
        gate
    }

    /// Hold ingest of `name` after hand-off, keeping the session in `Processing`.
    pub fn hold_ingest(&self, name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.processing_gates).insert(name.to_string(), gate.clone());
        gate
    }

    /// Hold the next readiness probes until the returned gate is notified.
    pub fn hold_readiness(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.readiness_gate) = Some(gate.clone());
        gate
    }

    /// Number of ingest and ingest-url calls.
    pub fn ingest_calls(&self) -> usize {
        self.ingest_calls.load(Ordering::SeqCst)
    }

    /// Number of readiness probes.
    pub fn readiness_calls(&self) -> usize {
        self.readiness_calls.load(Ordering::SeqCst)
    }

    /// Number of questions forwarded.
    pub fn answer_calls(&self) -> usize {
        self.answer_calls.load(Ordering::SeqCst)
    }

    /// Documents received by `ingest`, in call order.
    pub fn ingested(&self) -> Vec<DocumentUpload> {
        lock(&self.ingested).clone()
    }

    /// Questions received by `answer`, in call order.
    pub fn questions(&self) -> Vec<String> {
        lock(&self.questions).clone()
    }

    async fn run_ingest(
        &self,
        name: &str,
        total: u64,
        progress: UploadProgress,
    ) -> Result<IngestReply, DocumentStoreError> {
        self.ingest_calls.fetch_add(1, Ordering::SeqCst);
        self.ingest_started.notify_one();

        let transfer_gate = lock(&self.transfer_gates).get(name).cloned();
        if let Some(gate) = transfer_gate {
            gate.notified().await;
        }
        progress.bytes_sent(total / 2, total);
        progress.bytes_sent(total, total);
        progress.handed_off();

        let processing_gate = lock(&self.processing_gates).get(name).cloned();
        if let Some(gate) = processing_gate {
            gate.notified().await;
        }

        let reply = lock(&self.ingest_replies)
            .get(name)
            .cloned()
            .unwrap_or(Scripted::Reply(IngestReply::ready()));
        let result = reply.resolve();
        if matches!(result, Ok(IngestReply { ready: true, .. })) {
            self.set_ready_document(true);
        }
        result
    }
}

#[async_trait]
impl DocumentStore for FakeDocumentStore {
    async fn ingest(
        &self,
        upload: DocumentUpload,
        progress: UploadProgress,
    ) -> Result<IngestReply, DocumentStoreError> {
        let name = upload.name.clone();
        let total = upload.bytes.len() as u64;
        lock(&self.ingested).push(upload);
        self.run_ingest(&name, total, progress).await
    }

    async fn ingest_url(
        &self,
        url: &str,
        progress: UploadProgress,
    ) -> Result<IngestReply, DocumentStoreError> {
        self.run_ingest(url, 0, progress).await
    }

    async fn has_ready_document(&self) -> Result<bool, DocumentStoreError> {
        self.readiness_calls.fetch_add(1, Ordering::SeqCst);
        self.readiness_started.notify_one();
        let gate = lock(&self.readiness_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.readiness_fails.load(Ordering::SeqCst) {
            return Scripted::<bool>::TransportFailure.resolve();
        }
        Ok(self.ready_document.load(Ordering::SeqCst))
    }

    async fn answer(&self, question: &str) -> Result<AnswerReply, DocumentStoreError> {
        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.questions).push(question.to_string());
        lock(&self.answer_reply).clone().resolve()
    }
}
