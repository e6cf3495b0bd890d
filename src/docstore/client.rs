//! HTTP client wrapper for the document service.

use crate::config::get_config;
use crate::docstore::{
    DocumentStore, UploadProgress,
    types::{
        AnswerReply, CheckDocumentsReply, DocumentStoreError, DocumentUpload, IngestReply,
        StatusReply,
    },
};
use async_trait::async_trait;
use futures_core::Stream;
use reqwest::{
    Body, Client, Method,
    header::CONTENT_TYPE,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::Duration;

const UPLOAD_PATH: &str = "upload-pdf-qa";
const UPLOAD_URL_PATH: &str = "upload-url-qa";
const CHECK_DOCUMENTS_PATH: &str = "check-documents";
const ASK_PATH: &str = "api/questions/ask";
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// reqwest-backed [`DocumentStore`].
pub struct HttpDocumentStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl HttpDocumentStore {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, DocumentStoreError> {
        let config = get_config();
        Self::with_settings(
            &config.docstore_url,
            config.docstore_api_key.clone(),
            config.docstore_request_timeout_secs.map(Duration::from_secs),
        )
    }

    /// Construct a client against an explicit base URL.
    pub fn with_settings(
        base_url: &str,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, DocumentStoreError> {
        let mut builder =
            Client::builder().user_agent(concat!("research-buddy/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        let base_url = normalize_base_url(base_url).map_err(DocumentStoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            timeout_secs = ?timeout.map(|value| value.as_secs()),
            "Initialized document service client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.bearer_auth(api_key);
        }
        req
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn ingest(
        &self,
        upload: DocumentUpload,
        progress: UploadProgress,
    ) -> Result<IngestReply, DocumentStoreError> {
        let DocumentUpload {
            name,
            bytes,
            generation,
        } = upload;
        let total = bytes.len() as u64;
        let key = idempotency_key(generation, &document_digest(&bytes));
        let mime = mime_for(&name);
        tracing::debug!(
            document = %name,
            bytes = total,
            generation,
            "Sending document to document service"
        );

        let body = Body::wrap_stream(chunked_body(bytes, progress));
        let part = Part::stream_with_length(body, total)
            .file_name(name)
            .mime_str(mime)?;
        let form = Form::new().part("file", part);

        let response = self
            .request(Method::POST, UPLOAD_PATH)
            .header("Idempotency-Key", key)
            .multipart(form)
            .send()
            .await?;

        let reply: StatusReply = decode_structured(response, UPLOAD_PATH).await?;
        Ok(reply.into_ingest_reply())
    }

    async fn ingest_url(
        &self,
        url: &str,
        progress: UploadProgress,
    ) -> Result<IngestReply, DocumentStoreError> {
        let payload = json!({ "url": url }).to_string().into_bytes();
        let response = self
            .request(Method::POST, UPLOAD_URL_PATH)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::wrap_stream(handoff_body(payload, progress)))
            .send()
            .await?;

        let reply: StatusReply = decode_structured(response, UPLOAD_URL_PATH).await?;
        Ok(reply.into_ingest_reply())
    }

    async fn has_ready_document(&self) -> Result<bool, DocumentStoreError> {
        let response = self
            .request(Method::GET, CHECK_DOCUMENTS_PATH)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = DocumentStoreError::UnexpectedStatus { status, body };
            tracing::warn!(error = %error, "Document readiness probe failed");
            return Err(error);
        }

        let reply: CheckDocumentsReply = decode_structured(response, CHECK_DOCUMENTS_PATH).await?;
        Ok(reply.status == super::AnswerStatus::Success && reply.has_documents)
    }

    async fn answer(&self, question: &str) -> Result<AnswerReply, DocumentStoreError> {
        let response = self
            .request(Method::POST, ASK_PATH)
            .json(&json!({ "question": question }))
            .send()
            .await?;

        decode_structured(response, ASK_PATH).await
    }
}

/// Decode a structured body regardless of HTTP status.
///
/// The document service reports domain failures as `{ "status": "error", ... }` with 4xx/5xx
/// codes, so a parsable body wins over the status line. Unparsable bodies become
/// `UnexpectedStatus` on error codes and `Malformed` on success codes.
async fn decode_structured<T: DeserializeOwned>(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<T, DocumentStoreError> {
    let status = response.status();
    let body = response.text().await?;
    match serde_json::from_str::<T>(&body) {
        Ok(value) => Ok(value),
        Err(_) if !status.is_success() => {
            let error = DocumentStoreError::UnexpectedStatus { status, body };
            tracing::error!(endpoint, error = %error, "Document service request failed");
            Err(error)
        }
        Err(err) => {
            let error = DocumentStoreError::Malformed {
                endpoint: endpoint.to_string(),
                detail: err.to_string(),
            };
            tracing::error!(endpoint, error = %error, "Document service response did not decode");
            Err(error)
        }
    }
}

/// Stream document bytes in fixed-size chunks, reporting progress as the transport pulls them.
fn chunked_body(
    bytes: Vec<u8>,
    progress: UploadProgress,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    async_stream::stream! {
        let total = bytes.len() as u64;
        let mut sent = 0_u64;
        for chunk in bytes.chunks(UPLOAD_CHUNK_BYTES) {
            sent += chunk.len() as u64;
            yield Ok::<Vec<u8>, std::io::Error>(chunk.to_vec());
            progress.bytes_sent(sent, total);
        }
        progress.handed_off();
    }
}

/// Single-chunk body that signals the hand-off once the transport has taken every byte.
fn handoff_body(
    payload: Vec<u8>,
    progress: UploadProgress,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    async_stream::stream! {
        yield Ok::<Vec<u8>, std::io::Error>(payload);
        progress.handed_off();
    }
}

/// Compute a deterministic SHA-256 digest for document bytes.
pub fn document_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Idempotency key sent with an ingest so a retried transfer of the same generation is deduped.
pub(crate) fn idempotency_key(generation: u64, digest: &str) -> String {
    format!("upload:{generation}:{digest}")
}

fn mime_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::{AnswerStatus, ProgressSink};
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    };

    fn store(server: &MockServer, api_key: Option<&str>) -> HttpDocumentStore {
        HttpDocumentStore {
            client: Client::builder()
                .user_agent("research-buddy-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: api_key.map(str::to_string),
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        sent: Mutex<Vec<(u64, u64)>>,
        handed_off: AtomicBool,
    }

    impl ProgressSink for RecordingProgress {
        fn bytes_sent(&self, sent: u64, total: u64) {
            self.sent.lock().expect("progress lock").push((sent, total));
        }

        fn handed_off(&self) {
            self.handed_off.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn ingest_streams_multipart_and_reports_progress() {
        let server = MockServer::start_async().await;
        let bytes = vec![b'x'; UPLOAD_CHUNK_BYTES + 10];
        let expected_key = idempotency_key(3, &document_digest(&bytes));

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/upload-pdf-qa")
                    .header("Idempotency-Key", expected_key.as_str())
                    .body_contains("filename=\"paper.pdf\"");
                then.status(200).json_body(json!({
                    "status": "success",
                    "message": "Document processed successfully"
                }));
            })
            .await;

        let recorder = Arc::new(RecordingProgress::default());
        let reply = store(&server, None)
            .ingest(
                DocumentUpload {
                    name: "paper.pdf".into(),
                    bytes,
                    generation: 3,
                },
                UploadProgress::new(recorder.clone()),
            )
            .await
            .expect("ingest reply");

        mock.assert();
        assert_eq!(reply, IngestReply::ready());
        assert!(recorder.handed_off.load(Ordering::SeqCst));
        let sent = recorder.sent.lock().expect("progress lock").clone();
        let total = (UPLOAD_CHUNK_BYTES + 10) as u64;
        assert_eq!(sent.last().copied(), Some((total, total)));
    }

    #[tokio::test]
    async fn ingest_error_body_on_server_error_is_a_failed_reply() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/upload-pdf-qa");
                then.status(500).json_body(json!({
                    "status": "error",
                    "message": "corrupt file"
                }));
            })
            .await;

        let reply = store(&server, None)
            .ingest(
                DocumentUpload {
                    name: "paper.pdf".into(),
                    bytes: b"%PDF-1.4".to_vec(),
                    generation: 1,
                },
                UploadProgress::detached(),
            )
            .await
            .expect("structured reply");

        assert_eq!(reply, IngestReply::failed("corrupt file"));
    }

    #[tokio::test]
    async fn ingest_url_posts_json_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/upload-url-qa")
                    .json_body(json!({ "url": "https://arxiv.org/pdf/1706.03762" }));
                then.status(200).json_body(json!({ "status": "success" }));
            })
            .await;

        let reply = store(&server, None)
            .ingest_url("https://arxiv.org/pdf/1706.03762", UploadProgress::detached())
            .await
            .expect("ingest reply");

        mock.assert();
        assert!(reply.ready);
    }

    #[tokio::test]
    async fn ingest_url_hands_off_before_service_responds() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/upload-url-qa")
                    .header("content-type", "application/json");
                then.status(200)
                    .delay(Duration::from_millis(1500))
                    .json_body(json!({ "status": "success" }));
            })
            .await;

        let recorder = Arc::new(RecordingProgress::default());
        let client = store(&server, None);
        let progress = UploadProgress::new(recorder.clone());
        let request = tokio::spawn(async move {
            client
                .ingest_url("https://arxiv.org/pdf/1706.03762", progress)
                .await
        });

        let handed_off = || recorder.handed_off.load(Ordering::SeqCst);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while !handed_off() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(handed_off());
        assert!(!request.is_finished());

        let reply = request.await.expect("join").expect("ingest reply");
        assert!(reply.ready);
    }

    #[tokio::test]
    async fn readiness_probe_reads_has_documents_flag() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/check-documents")
                    .header("authorization", "Bearer secret");
                then.status(200).json_body(json!({
                    "status": "success",
                    "has_documents": true
                }));
            })
            .await;

        let ready = store(&server, Some("secret"))
            .has_ready_document()
            .await
            .expect("probe");

        mock.assert();
        assert!(ready);
    }

    #[tokio::test]
    async fn readiness_probe_rejects_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/check-documents");
                then.status(503).body("down for maintenance");
            })
            .await;

        let error = store(&server, None)
            .has_ready_document()
            .await
            .expect_err("probe should fail");

        assert!(matches!(
            error,
            DocumentStoreError::UnexpectedStatus { status, .. } if status.as_u16() == 503
        ));
    }

    #[tokio::test]
    async fn answer_keeps_domain_errors_structured() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/questions/ask")
                    .json_body(json!({ "question": "What is the conclusion?" }));
                then.status(400).json_body(json!({
                    "status": "error",
                    "message": "No relevant content found"
                }));
            })
            .await;

        let reply = store(&server, None)
            .answer("What is the conclusion?")
            .await
            .expect("structured reply");

        assert_eq!(reply.status, AnswerStatus::Error);
        assert_eq!(reply.message.as_deref(), Some("No relevant content found"));
    }

    #[tokio::test]
    async fn answer_with_garbage_body_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/questions/ask");
                then.status(200).body("<html>proxy page</html>");
            })
            .await;

        let error = store(&server, None)
            .answer("Anything?")
            .await
            .expect_err("malformed body");

        assert!(matches!(
            error,
            DocumentStoreError::Malformed { endpoint, .. } if endpoint == ASK_PATH
        ));
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for("Paper.PDF"), "application/pdf");
        assert_eq!(mime_for("notes"), "application/octet-stream");
    }

    #[test]
    fn endpoint_formatting_handles_slashes() {
        assert_eq!(
            format_endpoint("http://localhost:5000/", "/check-documents"),
            "http://localhost:5000/check-documents"
        );
        assert_eq!(
            normalize_base_url("http://localhost:5000/api/").unwrap(),
            "http://localhost:5000/api"
        );
    }
}
