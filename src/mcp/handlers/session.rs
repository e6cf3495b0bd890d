//! Handlers for the session inspection tools.

use std::sync::Arc;

use crate::{
    mcp::format::session_payload,
    session::{ResearchSession, SessionApi},
};
use rmcp::{ErrorData as McpError, model::CallToolResult};

/// Handle `session-status`: report cached state without contacting the document service.
pub(crate) async fn handle_session_status(
    session: &Arc<ResearchSession>,
) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::structured(session_payload(
        &session.session_status(),
    )))
}

/// Handle `resync-session`.
pub(crate) async fn handle_resync(
    session: &Arc<ResearchSession>,
) -> Result<CallToolResult, McpError> {
    let snapshot = session.resync().await;
    Ok(CallToolResult::structured(session_payload(&snapshot)))
}

/// Handle `reset-session`.
pub(crate) async fn handle_reset(
    session: &Arc<ResearchSession>,
) -> Result<CallToolResult, McpError> {
    let snapshot = session.reset();
    Ok(CallToolResult::structured(session_payload(&snapshot)))
}
