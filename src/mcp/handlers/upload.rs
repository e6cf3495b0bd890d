//! MCP handlers for document submission tools.

use std::{path::PathBuf, sync::Arc};

use crate::session::{ResearchSession, SessionApi, UploadOutcome};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncReadExt;

use super::{outcome_result, parse_arguments};

/// Request payload accepted by the `upload-document` tool.
#[derive(Debug, Deserialize)]
pub(crate) struct UploadDocumentRequest {
    /// Local path of the document.
    pub(crate) path: String,
    /// Optional display name overriding the file name.
    #[serde(default)]
    pub(crate) name: Option<String>,
}

/// Request payload accepted by the `upload-url` tool.
#[derive(Debug, Deserialize)]
pub(crate) struct UploadUrlRequest {
    /// Remote document URL.
    pub(crate) url: String,
}

/// Handle the `upload-document` tool by reading a local file and submitting it.
///
/// At most one byte past the upload limit is read; the file's real size travels as the declared
/// size so an oversized file is rejected without loading it.
pub(crate) async fn handle_upload_document(
    session: &Arc<ResearchSession>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: UploadDocumentRequest = parse_arguments(arguments)?;
    let raw_path = args.path.trim();
    if raw_path.is_empty() {
        return Err(McpError::invalid_params("`path` must not be empty", None));
    }
    let path = PathBuf::from(raw_path);
    let name = args
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .or_else(|| {
            path.file_name()
                .map(|file_name| file_name.to_string_lossy().into_owned())
        })
        .unwrap_or_default();

    let unreadable = |err: std::io::Error| {
        McpError::invalid_params(format!("Cannot read `{}`: {err}", path.display()), None)
    };
    let metadata = tokio::fs::metadata(&path).await.map_err(unreadable)?;
    if !metadata.is_file() {
        return Err(McpError::invalid_params(
            format!("`{}` is not a regular file", path.display()),
            None,
        ));
    }

    let limit = session.upload_policy().max_bytes;
    let file = tokio::fs::File::open(&path).await.map_err(unreadable)?;
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .await
        .map_err(unreadable)?;

    let outcome = session.submit_document(&name, bytes, metadata.len()).await;
    tracing::info!(
        path = %path.display(),
        document = %name,
        outcome = ?outcome,
        "upload-document completed"
    );
    upload_result(session, outcome)
}

/// Handle the `upload-url` tool.
pub(crate) async fn handle_upload_url(
    session: &Arc<ResearchSession>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: UploadUrlRequest = parse_arguments(arguments)?;
    let outcome = session.submit_url(&args.url).await;
    tracing::info!(url = %args.url, outcome = ?outcome, "upload-url completed");
    upload_result(session, outcome)
}

fn upload_result(
    session: &Arc<ResearchSession>,
    outcome: UploadOutcome,
) -> Result<CallToolResult, McpError> {
    match &outcome {
        UploadOutcome::Rejected { message, .. } => Err(McpError::invalid_params(
            message.clone(),
            Some(json!({ "result": outcome })),
        )),
        UploadOutcome::Ready { .. } => {
            Ok(outcome_result(&outcome, &session.session_status(), true))
        }
        UploadOutcome::Failed { .. } | UploadOutcome::Superseded { .. } => {
            Ok(outcome_result(&outcome, &session.session_status(), false))
        }
    }
}
