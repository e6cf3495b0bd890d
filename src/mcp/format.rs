//! Formatting helpers shared across MCP handlers and resources.

use crate::{
    config::UploadPlan,
    session::{DocumentSession, UploadPolicy},
};
use rmcp::model::ResourceContents;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Value, json};

pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Upload limits returned by the `upload-policy` resource.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct UploadPolicySnapshot {
    /// Largest accepted document, in bytes.
    pub(crate) max_bytes: u64,
    /// Limit formatted for display, e.g. `10MB`.
    pub(crate) max_size: String,
    /// Accepted file extensions.
    pub(crate) allowed_extensions: Vec<String>,
    /// Plan tiers and their limits, for reference.
    pub(crate) plans: Vec<PlanLimit>,
}

/// One plan tier and its upload ceiling.
#[derive(Debug, Serialize, JsonSchema)]
pub(crate) struct PlanLimit {
    /// Plan label.
    pub(crate) plan: String,
    /// Upload ceiling in bytes.
    pub(crate) max_bytes: u64,
}

impl UploadPolicySnapshot {
    pub(crate) fn from_policy(policy: &UploadPolicy) -> Self {
        Self {
            max_bytes: policy.max_bytes,
            max_size: policy.limit_label(),
            allowed_extensions: policy.allowed_extensions.clone(),
            plans: [UploadPlan::Starter, UploadPlan::Lite, UploadPlan::Pro]
                .into_iter()
                .map(|plan| PlanLimit {
                    plan: plan.label().to_string(),
                    max_bytes: plan.max_upload_bytes(),
                })
                .collect(),
        }
    }
}

/// Session snapshot shaped for tool output, with camelCase keys like the other tools.
pub(crate) fn session_payload(session: &DocumentSession) -> Value {
    json!({
        "sessionId": session.session_id,
        "status": session.status.label(),
        "ready": session.status.is_ready(),
        "sourceName": session.source_name,
        "lastError": session.last_error,
        "generation": session.generation,
        "uploadProgress": session.upload_progress.map(|progress| json!({
            "bytesSent": progress.bytes_sent,
            "totalBytes": progress.total_bytes,
        })),
        "updatedAt": session.updated_at,
    })
}

/// Serialize a value to JSON, falling back to compact formatting on error.
pub(crate) fn serialize_json<T: Serialize>(value: &T, context_uri: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|error| {
        tracing::warn!(uri = context_uri, %error, "Failed to serialize JSON prettily");
        serde_json::to_string(value).unwrap_or_else(|_| "{}".into())
    })
}

/// Build JSON resource contents for MCP resource responses.
pub(crate) fn json_resource_contents(uri: &str, text: String) -> ResourceContents {
    ResourceContents::TextResourceContents {
        uri: uri.to_string(),
        mime_type: Some(APPLICATION_JSON.into()),
        text,
        meta: None,
    }
}
