//! Wire types and errors shared by document service adapters.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors returned while talking to the document service.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid document service URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a status code and no structured body.
    #[error("Unexpected document service response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The service answered successfully but the body did not match the contract.
    #[error("Malformed document service response from {endpoint}: {detail}")]
    Malformed {
        /// Endpoint path that produced the response.
        endpoint: String,
        /// Decoder diagnostic.
        detail: String,
    },
}

/// Document handed to [`super::DocumentStore::ingest`].
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    /// Display name, usually the original file name.
    pub name: String,
    /// Raw document bytes.
    pub bytes: Vec<u8>,
    /// Upload generation the bytes belong to; lets the service dedupe retried transfers.
    pub generation: u64,
}

/// Result of an ingest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReply {
    /// Whether the document is now queryable.
    pub ready: bool,
    /// Failure reason when `ready` is false.
    pub error: Option<String>,
}

impl IngestReply {
    /// Successful ingest.
    pub fn ready() -> Self {
        Self {
            ready: true,
            error: None,
        }
    }

    /// Failed ingest with a reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            ready: false,
            error: Some(reason.into()),
        }
    }
}

/// Top-level status flag carried by every document service response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    /// The request succeeded.
    Success,
    /// The service understood the request but reports a problem.
    Error,
}

/// Structured answer returned by the document service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnswerReply {
    /// Whether the service produced an answer.
    pub status: AnswerStatus,
    /// Answer text, present on success.
    #[serde(default)]
    pub answer: Option<String>,
    /// Human-readable problem description, present on error.
    #[serde(default)]
    pub message: Option<String>,
}

impl AnswerReply {
    /// Successful answer.
    pub fn answered(answer: impl Into<String>) -> Self {
        Self {
            status: AnswerStatus::Success,
            answer: Some(answer.into()),
            message: None,
        }
    }

    /// Domain-level refusal with a message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AnswerStatus::Error,
            answer: None,
            message: Some(message.into()),
        }
    }
}

/// Body returned by the upload endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusReply {
    pub(crate) status: AnswerStatus,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

impl StatusReply {
    pub(crate) fn into_ingest_reply(self) -> IngestReply {
        match self.status {
            AnswerStatus::Success => IngestReply::ready(),
            AnswerStatus::Error => IngestReply {
                ready: false,
                error: self.message.or(self.error),
            },
        }
    }
}

/// Body returned by the readiness probe.
#[derive(Debug, Deserialize)]
pub(crate) struct CheckDocumentsReply {
    pub(crate) status: AnswerStatus,
    #[serde(default)]
    pub(crate) has_documents: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_reply_prefers_message_over_error_detail() {
        let reply: StatusReply = serde_json::from_value(json!({
            "status": "error",
            "message": "corrupt file",
            "error": "Traceback ..."
        }))
        .unwrap();
        assert_eq!(reply.into_ingest_reply(), IngestReply::failed("corrupt file"));
    }

    #[test]
    fn answer_reply_rejects_unknown_status() {
        let parsed = serde_json::from_value::<AnswerReply>(json!({
            "status": "pending",
            "answer": "maybe"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn check_documents_defaults_to_not_ready() {
        let reply: CheckDocumentsReply =
            serde_json::from_value(json!({ "status": "success" })).unwrap();
        assert_eq!(reply.status, AnswerStatus::Success);
        assert!(!reply.has_documents);
    }
}
