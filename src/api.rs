//! HTTP surface for Research Buddy.
//!
//! This module exposes a compact Axum router over a single research session:
//!
//! - `POST /documents` – Multipart upload (`file` field, optional `declared_size`). Returns an
//!   upload outcome (`ready`, `failed`, `superseded`, `rejected`).
//! - `POST /documents/url` – Ask the document service to ingest a remote document.
//! - `GET /session` – Current session snapshot; no IO.
//! - `POST /session/resync` – Reconcile with the document service and return the snapshot.
//! - `POST /session/reset` – Drop the active document.
//! - `GET /session/events` – Server-sent events carrying a snapshot after every transition.
//! - `POST /questions` – Ask a question against the ready document.
//! - `GET /metrics` – Session counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Bodies are always the structured outcome; the status code mirrors it so clients can branch
//! without parsing.

use crate::session::{AskOutcome, DocumentSession, SessionApi, UploadOutcome, UploadRejection};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{convert::Infallible, sync::Arc, time::Duration};

const SSE_KEEP_ALIVE_SECS: u64 = 15;

/// Build the HTTP router exposing the session API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: SessionApi + 'static,
{
    Router::new()
        .route(
            "/documents",
            // The handler stops buffering past the upload limit and lets the gateway reject it.
            post(upload_document::<S>).layer(DefaultBodyLimit::disable()),
        )
        .route("/documents/url", post(upload_url::<S>))
        .route("/session", get(get_session::<S>))
        .route("/session/resync", post(resync_session::<S>))
        .route("/session/reset", post(reset_session::<S>))
        .route("/session/events", get(session_events::<S>))
        .route("/questions", post(ask_question::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Accept a multipart document upload.
///
/// Reads the `file` field chunk by chunk. Bytes beyond the upload limit are counted but not kept,
/// so oversized uploads reach the gateway as a size rejection instead of exhausting memory.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Response, AppError>
where
    S: SessionApi,
{
    let limit = service.upload_policy().max_bytes;
    let mut file: Option<(String, Vec<u8>, u64)> = None;
    let mut declared_size: Option<u64> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let mut bytes = Vec::new();
                let mut seen = 0_u64;
                while let Some(chunk) = field.chunk().await? {
                    seen += chunk.len() as u64;
                    if bytes.len() as u64 <= limit {
                        bytes.extend_from_slice(&chunk);
                    }
                }
                file = Some((name, bytes, seen));
            }
            Some("declared_size") => {
                let text = field.text().await?;
                let size = text.trim().parse::<u64>().map_err(|_| {
                    AppError::bad_request(format!(
                        "`declared_size` must be a byte count, got `{text}`"
                    ))
                })?;
                declared_size = Some(size);
            }
            _ => {}
        }
    }

    let Some((name, bytes, seen)) = file else {
        return Err(AppError::bad_request("Missing `file` field"));
    };
    let declared = declared_size.unwrap_or(seen).max(seen);
    let outcome = service.submit_document(&name, bytes, declared).await;
    tracing::info!(document = %name, bytes = seen, outcome = ?outcome, "Upload request completed");
    Ok(upload_response(outcome))
}

/// Request body for `POST /documents/url`.
#[derive(Deserialize)]
struct UrlRequest {
    url: String,
}

async fn upload_url<S>(State(service): State<Arc<S>>, Json(request): Json<UrlRequest>) -> Response
where
    S: SessionApi,
{
    let outcome = service.submit_url(&request.url).await;
    tracing::info!(url = %request.url, outcome = ?outcome, "URL upload request completed");
    upload_response(outcome)
}

fn upload_response(outcome: UploadOutcome) -> Response {
    let status = match &outcome {
        UploadOutcome::Ready { .. } => StatusCode::OK,
        UploadOutcome::Failed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        UploadOutcome::Superseded { .. } => StatusCode::CONFLICT,
        UploadOutcome::Rejected { rejection, .. } => match rejection {
            UploadRejection::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadRejection::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            UploadRejection::MissingName
            | UploadRejection::EmptyDocument
            | UploadRejection::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
        },
    };
    (status, Json(outcome)).into_response()
}

async fn get_session<S>(State(service): State<Arc<S>>) -> Json<DocumentSession>
where
    S: SessionApi,
{
    Json(service.session_status())
}

async fn resync_session<S>(State(service): State<Arc<S>>) -> Json<DocumentSession>
where
    S: SessionApi,
{
    Json(service.resync().await)
}

async fn reset_session<S>(State(service): State<Arc<S>>) -> Json<DocumentSession>
where
    S: SessionApi,
{
    Json(service.reset())
}

/// Stream the session snapshot now and after every transition.
async fn session_events<S>(
    State(service): State<Arc<S>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: SessionApi,
{
    let mut rx = service.subscribe();
    let stream = async_stream::stream! {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            match Event::default().event("session").json_data(&snapshot) {
                Ok(event) => yield Ok::<Event, Infallible>(event),
                Err(err) => tracing::warn!(error = %err, "Failed to encode session event"),
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
            .text("ping"),
    )
}

/// Request body for `POST /questions`.
#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn ask_question<S>(State(service): State<Arc<S>>, Json(request): Json<AskRequest>) -> Response
where
    S: SessionApi,
{
    let outcome = service.ask_question(&request.question).await;
    let status = match &outcome {
        AskOutcome::Answered { .. } => StatusCode::OK,
        AskOutcome::DomainError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AskOutcome::TransportError { .. } => StatusCode::BAD_GATEWAY,
        AskOutcome::NotReady { .. } => StatusCode::CONFLICT,
        AskOutcome::InvalidQuestion { .. } => StatusCode::BAD_REQUEST,
    };
    (status, Json(outcome)).into_response()
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Response
where
    S: SessionApi,
{
    Json(service.metrics_snapshot()).into_response()
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload_document",
                method: "POST",
                path: "/documents",
                description: "Upload a document as multipart form data (`file`, optional `declared_size`). Response carries { \"outcome\": \"ready\" | \"failed\" | \"superseded\" | \"rejected\" }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "upload_url",
                method: "POST",
                path: "/documents/url",
                description: "Have the document service fetch and index a remote document.",
                request_example: Some(json!({ "url": "https://arxiv.org/pdf/1706.03762" })),
            },
            CommandDescriptor {
                name: "session",
                method: "GET",
                path: "/session",
                description: "Return the current session snapshot (status, source name, last error, generation).",
                request_example: None,
            },
            CommandDescriptor {
                name: "resync",
                method: "POST",
                path: "/session/resync",
                description: "Ask the document service whether a ready document already exists and return the snapshot.",
                request_example: None,
            },
            CommandDescriptor {
                name: "reset",
                method: "POST",
                path: "/session/reset",
                description: "Discard the active document and any upload still in flight.",
                request_example: None,
            },
            CommandDescriptor {
                name: "session_events",
                method: "GET",
                path: "/session/events",
                description: "Server-sent events stream emitting a `session` event after every transition.",
                request_example: None,
            },
            CommandDescriptor {
                name: "ask",
                method: "POST",
                path: "/questions",
                description: "Ask a question against the ready document. Refused with 409 until a document is ready.",
                request_example: Some(json!({ "question": "What is the conclusion?" })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return session counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Request-level failure that never reached the session.
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        Self {
            status: inner.status(),
            message: inner.body_text(),
        }
    }
}
