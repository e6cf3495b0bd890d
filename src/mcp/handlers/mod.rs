//! Tool handlers for the MCP server.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{mcp::format::session_payload, session::DocumentSession};

pub mod ask;
pub mod metrics;
pub mod session;
pub mod upload;

/// Parse structured arguments supplied to a tool invocation.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    let value = arguments
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(JsonObject::new()));
    serde_json::from_value(value)
        .map_err(|err| McpError::invalid_params(format!("Invalid arguments: {err}"), None))
}

/// Wrap an outcome and the resulting session into a tool result.
///
/// `succeeded` selects between a regular and an error-flagged result; the payload shape is the
/// same either way so hosts can read `outcome` without branching.
pub(crate) fn outcome_result<T: Serialize>(
    outcome: &T,
    session: &DocumentSession,
    succeeded: bool,
) -> CallToolResult {
    let payload = json!({
        "result": outcome,
        "session": session_payload(session),
    });
    if succeeded {
        CallToolResult::structured(payload)
    } else {
        CallToolResult::structured_error(payload)
    }
}
