//! Document-grounded question answering session.
//!
//! A session holds at most one document. [`gateway::UploadGateway`] validates submissions and
//! hands them to the document service, [`tracker::ReadinessTracker`] records whether the document
//! is queryable, and [`dispatcher::QuestionDispatcher`] only forwards questions while it is.
//! [`service::ResearchSession`] ties the three together for the HTTP and MCP surfaces.

pub mod dispatcher;
pub mod gateway;
pub mod service;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tracker;

pub use dispatcher::{AskOutcome, QuestionDispatcher};
pub use gateway::{UploadGateway, UploadOutcome, UploadPolicy, UploadRejection};
pub use service::{ResearchSession, SessionApi};
pub use state::{DocumentSession, SessionStatus, TransferProgress};
pub use tracker::ReadinessTracker;
