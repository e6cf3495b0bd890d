#![deny(missing_docs)]

//! Core library for Research Buddy, a document-grounded question answering service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Document service client and its trait seam.
pub mod docstore;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Session counters.
pub mod metrics;
/// Upload, readiness, and question handling for the single-document session.
pub mod session;
