//! Model Context Protocol (MCP) integration for Research Buddy.
//!
//! This module exposes the research session to editors and agent hosts over stdio. The surface
//! area consists of:
//!
//! - Tools: `upload-document`, `upload-url`, `session-status`, `resync-session`,
//!   `reset-session`, `ask-question`, and `metrics`.
//! - Resources: `mcp://research-buddy/upload-policy` and `mcp://research-buddy/usage`.
//!
//! Handlers, schemas, and formatting helpers are kept in focused submodules to make tests and
//! reviews small and targeted.

mod format;
pub mod handlers;
mod registry;
mod schemas;
mod server;

pub use server::ResearchBuddyMcpServer;
