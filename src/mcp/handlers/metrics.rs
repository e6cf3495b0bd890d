//! Handler for the metrics tool.

use std::sync::Arc;

use crate::session::{ResearchSession, SessionApi};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde_json::json;

/// Handle the `metrics` tool, returning the current session counters.
pub(crate) async fn handle_metrics(
    session: &Arc<ResearchSession>,
) -> Result<CallToolResult, McpError> {
    let snapshot = session.metrics_snapshot();
    Ok(CallToolResult::structured(json!({
        "uploadsAccepted": snapshot.uploads_accepted,
        "uploadsRejected": snapshot.uploads_rejected,
        "documentsReady": snapshot.documents_ready,
        "uploadsFailed": snapshot.uploads_failed,
        "staleOutcomesDiscarded": snapshot.stale_outcomes_discarded,
        "questionsAnswered": snapshot.questions_answered,
        "questionsRefused": snapshot.questions_refused,
        "domainErrors": snapshot.domain_errors,
        "transportErrors": snapshot.transport_errors,
    })))
}
