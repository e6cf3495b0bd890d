//! Handler for the ask-question tool.

use std::sync::Arc;

use crate::session::{AskOutcome, ResearchSession, SessionApi};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;

use super::{outcome_result, parse_arguments};

/// Request payload accepted by the `ask-question` tool.
#[derive(Debug, Deserialize)]
pub(crate) struct AskQuestionRequest {
    /// Question about the ready document.
    pub(crate) question: String,
}

/// Handle the `ask-question` tool. Only an answered question yields a non-error result.
pub(crate) async fn handle_ask_question(
    session: &Arc<ResearchSession>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: AskQuestionRequest = parse_arguments(arguments)?;
    let outcome = session.ask_question(&args.question).await;
    let snapshot = session.session_status();
    match &outcome {
        AskOutcome::InvalidQuestion { message } => {
            Err(McpError::invalid_params(message.clone(), None))
        }
        AskOutcome::Answered { .. } => Ok(outcome_result(&outcome, &snapshot, true)),
        AskOutcome::DomainError { .. }
        | AskOutcome::TransportError { .. }
        | AskOutcome::NotReady { .. } => Ok(outcome_result(&outcome, &snapshot, false)),
    }
}
