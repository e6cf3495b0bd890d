//! MCP server entrypoint (stdio transport).
//!
//! Exposes the research session's tools and resources over stdio for editor and agent hosts.
//! Shares all runtime configuration with the HTTP binary; logs go to the log file only because
//! stdout carries protocol frames.
use anyhow::{Context, Result};
use research_buddy::{
    config, logging,
    mcp::ResearchBuddyMcpServer,
    session::{ResearchSession, SessionApi},
};
use rmcp::{service::ServiceExt, transport::stdio};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    config::init_config();
    logging::init_tracing_with(false);

    let session = Arc::new(
        ResearchSession::from_config().context("failed to build document client")?,
    );
    session.resync().await;
    let server = ResearchBuddyMcpServer::new(session);

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server over stdio")?;

    service
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}
