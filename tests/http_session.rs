use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, BodyDataStream, to_bytes},
    http::{Method, Request, StatusCode},
};
use futures_util::StreamExt;
use httpmock::{Method::GET, Method::POST, MockServer};
use regex::Regex;
use research_buddy::{
    api::create_router,
    docstore::HttpDocumentStore,
    session::{
        ResearchSession, SessionApi, SessionStatus, UploadOutcome, UploadPolicy,
        testing::FakeDocumentStore,
    },
};
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "research-buddy-boundary";

fn http_session(server: &MockServer) -> Arc<ResearchSession> {
    let store = HttpDocumentStore::with_settings(
        &server.base_url(),
        Some("secret-token".into()),
        Some(Duration::from_secs(5)),
    )
    .expect("document client");
    Arc::new(ResearchSession::new(Arc::new(store), UploadPolicy::default()))
}

fn upload_request(file_name: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .method(Method::POST)
        .uri("/documents")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn json_request(method: Method, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, serde_json::from_slice(&body).expect("json body"))
}

#[tokio::test]
async fn upload_and_ask_through_document_service() {
    let server = MockServer::start_async().await;
    let upload_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/upload-pdf-qa")
                .header("authorization", "Bearer secret-token")
                .header_exists("idempotency-key")
                .body_contains("%PDF-1.7 conclusion");
            then.status(200)
                .json_body(json!({ "status": "success", "message": "Document processed" }));
        })
        .await;
    let ask_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path_matches(Regex::new(r"^/api/questions/ask$").unwrap())
                .json_body_partial(r#"{ "question": "What is the conclusion?" }"#);
            then.status(200)
                .json_body(json!({ "status": "success", "answer": "Attention suffices." }));
        })
        .await;

    let session = http_session(&server);
    let app = create_router(session.clone());

    let (status, body) = send(
        app.clone(),
        upload_request("paper.pdf", b"%PDF-1.7 conclusion"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "unexpected body {body}");
    assert_eq!(body["outcome"], "ready");
    upload_mock.assert_async().await;

    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/questions",
            json!({ "question": "  What is the conclusion?  " }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "answered");
    assert_eq!(body["answer"], "Attention suffices.");
    ask_mock.assert_async().await;
    assert_eq!(session.metrics_snapshot().questions_answered, 1);
}

#[tokio::test]
async fn service_rejection_marks_session_failed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/upload-pdf-qa");
            then.status(500).json_body(
                json!({ "status": "error", "message": "Could not extract text from PDF" }),
            );
        })
        .await;
    let ask_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/questions/ask");
            then.status(200).json_body(json!({ "status": "success", "answer": "unused" }));
        })
        .await;

    let session = http_session(&server);
    let app = create_router(session.clone());

    let (status, body) = send(app.clone(), upload_request("scan.pdf", b"not really a pdf")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["outcome"], "failed");
    assert_eq!(body["reason"], "Could not extract text from PDF");

    let (status, body) = send(
        app.clone(),
        Request::get("/session").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["state"], "failed");
    assert_eq!(body["last_error"], "Could not extract text from PDF");

    let (status, body) = send(
        app,
        json_request(Method::POST, "/questions", json!({ "question": "Anything?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["outcome"], "not_ready");
    assert_eq!(ask_mock.hits_async().await, 0);
}

#[tokio::test]
async fn resync_route_adopts_existing_document() {
    let server = MockServer::start_async().await;
    let probe = server
        .mock_async(|when, then| {
            when.method(GET).path("/check-documents");
            then.status(200)
                .json_body(json!({ "status": "success", "has_documents": true }));
        })
        .await;

    let app = create_router(http_session(&server));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/session/resync")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["state"], "ready");
    assert_eq!(body["source_name"], Value::Null);
    probe.assert_async().await;
}

#[tokio::test]
async fn url_upload_reports_processing_while_service_fetches() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/upload-url-qa")
                .json_body(json!({ "url": "https://arxiv.org/pdf/1706.03762" }));
            then.status(200)
                .delay(Duration::from_millis(1500))
                .json_body(json!({ "status": "success", "message": "Document processed" }));
        })
        .await;

    let session = http_session(&server);
    let mut rx = session.subscribe();
    let upload = tokio::spawn({
        let session = session.clone();
        async move { session.submit_url("https://arxiv.org/pdf/1706.03762").await }
    });

    tokio::time::timeout(
        Duration::from_secs(1),
        rx.wait_for(|snapshot| snapshot.status == SessionStatus::Processing),
    )
    .await
    .expect("processing before the service responds")
    .expect("session channel open");
    assert!(!upload.is_finished());

    let outcome = upload.await.expect("join");
    assert!(matches!(outcome, UploadOutcome::Ready { .. }));
    assert_eq!(session.session_status().status, SessionStatus::Ready);
}

async fn next_state(frames: &mut BodyDataStream, data_line: &Regex) -> String {
    let mut buffer = String::new();
    loop {
        let chunk = tokio::time::timeout(Duration::from_secs(5), frames.next())
            .await
            .expect("event before timeout")
            .expect("stream open")
            .expect("chunk");
        buffer.push_str(&String::from_utf8_lossy(&chunk));
        if let Some(captures) = data_line.captures(&buffer) {
            let snapshot: Value = serde_json::from_str(&captures[1]).expect("snapshot json");
            return snapshot["status"]["state"]
                .as_str()
                .unwrap_or_default()
                .to_string();
        }
    }
}

#[tokio::test]
async fn session_events_stream_each_transition() {
    let store = Arc::new(FakeDocumentStore::new());
    let session = Arc::new(ResearchSession::new(store, UploadPolicy::default()));
    let app = create_router(session.clone());

    let response = app
        .oneshot(Request::get("/session/events").body(Body::empty()).unwrap())
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);
    let mut frames = response.into_body().into_data_stream();
    let data_line = Regex::new(r#"(?m)^data: (\{.*\})$"#).unwrap();

    assert_eq!(next_state(&mut frames, &data_line).await, "no_document");
    let outcome = session.submit_document("paper.pdf", b"%PDF-1.4".to_vec(), 8).await;
    assert!(matches!(outcome, UploadOutcome::Ready { .. }));
    assert_eq!(next_state(&mut frames, &data_line).await, "ready");
}
