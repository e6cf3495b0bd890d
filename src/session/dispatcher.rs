//! Question dispatch behind the readiness gate.

use crate::{
    docstore::{AnswerReply, AnswerStatus, DocumentStore},
    metrics::SessionMetrics,
    session::tracker::ReadinessTracker,
};
use serde::Serialize;
use std::sync::Arc;

const EMPTY_QUESTION: &str = "Please enter a question.";
const NOT_READY: &str = "Please upload and process a document first.";
const TRANSPORT_FAILURE: &str =
    "Failed to fetch answer. Please check your connection and try again.";
const FALLBACK_DOMAIN_ERROR: &str = "Failed to get answer";

/// Result of one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AskOutcome {
    /// The document service answered.
    Answered {
        /// Answer text.
        answer: String,
    },
    /// The service understood the question but could not answer it.
    DomainError {
        /// Service message, passed through verbatim.
        message: String,
    },
    /// The service was unreachable or replied with something unusable.
    TransportError {
        /// Generic retry hint.
        message: String,
    },
    /// No ready document; the service was not contacted.
    NotReady {
        /// Hint for the user.
        message: String,
    },
    /// The question was empty; the service was not contacted.
    InvalidQuestion {
        /// Hint for the user.
        message: String,
    },
}

/// Forwards questions to the document service once a document is ready.
pub struct QuestionDispatcher {
    tracker: Arc<ReadinessTracker>,
    store: Arc<dyn DocumentStore>,
    metrics: Arc<SessionMetrics>,
}

impl QuestionDispatcher {
    /// Build a dispatcher over shared session components.
    pub fn new(
        tracker: Arc<ReadinessTracker>,
        store: Arc<dyn DocumentStore>,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            tracker,
            store,
            metrics,
        }
    }

    /// Ask one question. Never retries and never changes the session.
    pub async fn ask(&self, question: &str) -> AskOutcome {
        let question = question.trim();
        if question.is_empty() {
            self.metrics.record_question_refused();
            return AskOutcome::InvalidQuestion {
                message: EMPTY_QUESTION.into(),
            };
        }

        let status = self.tracker.current_status();
        if !status.is_ready() {
            self.metrics.record_question_refused();
            tracing::debug!(status = status.label(), "Question refused; no ready document");
            return AskOutcome::NotReady {
                message: NOT_READY.into(),
            };
        }

        let outcome = match self.store.answer(question).await {
            Ok(reply) => map_reply(reply),
            Err(error) => {
                tracing::error!(error = %error, "Question request failed");
                AskOutcome::TransportError {
                    message: TRANSPORT_FAILURE.into(),
                }
            }
        };

        match &outcome {
            AskOutcome::Answered { .. } => self.metrics.record_question_answered(),
            AskOutcome::DomainError { message } => {
                tracing::info!(error = %message, "Document service could not answer");
                self.metrics.record_domain_error();
            }
            AskOutcome::TransportError { .. } => self.metrics.record_transport_error(),
            AskOutcome::NotReady { .. } | AskOutcome::InvalidQuestion { .. } => {}
        }
        outcome
    }
}

fn map_reply(reply: AnswerReply) -> AskOutcome {
    match reply {
        AnswerReply {
            status: AnswerStatus::Success,
            answer: Some(answer),
            ..
        } => AskOutcome::Answered { answer },
        AnswerReply {
            status: AnswerStatus::Success,
            answer: None,
            ..
        } => {
            tracing::warn!("Successful answer reply carried no answer text");
            AskOutcome::TransportError {
                message: TRANSPORT_FAILURE.into(),
            }
        }
        AnswerReply {
            status: AnswerStatus::Error,
            message,
            ..
        } => AskOutcome::DomainError {
            message: message
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_DOMAIN_ERROR.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{state::SessionStatus, testing::FakeDocumentStore};

    fn dispatcher(
        store: FakeDocumentStore,
        ready: bool,
    ) -> (
        QuestionDispatcher,
        Arc<FakeDocumentStore>,
        Arc<ReadinessTracker>,
    ) {
        let metrics = Arc::new(SessionMetrics::new());
        let tracker = Arc::new(ReadinessTracker::new(metrics.clone()));
        if ready {
            let generation = tracker.begin_upload("paper.pdf", 1);
            tracker.finish(generation, Ok(()));
        }
        let store = Arc::new(store);
        (
            QuestionDispatcher::new(tracker.clone(), store.clone(), metrics),
            store,
            tracker,
        )
    }

    #[tokio::test]
    async fn empty_question_never_reaches_service() {
        for ready in [true, false] {
            let (dispatcher, store, _) = dispatcher(FakeDocumentStore::new(), ready);
            assert_eq!(
                dispatcher.ask("   \n\t").await,
                AskOutcome::InvalidQuestion {
                    message: EMPTY_QUESTION.into()
                }
            );
            assert_eq!(store.answer_calls(), 0);
        }
    }

    #[tokio::test]
    async fn not_ready_never_calls_answer() {
        let (dispatcher, store, tracker) = dispatcher(FakeDocumentStore::new(), false);
        assert!(matches!(
            dispatcher.ask("What is the conclusion?").await,
            AskOutcome::NotReady { .. }
        ));

        tracker.begin_upload("paper.pdf", 1);
        assert!(matches!(
            dispatcher.ask("What is the conclusion?").await,
            AskOutcome::NotReady { .. }
        ));
        assert_eq!(store.answer_calls(), 0);
    }

    #[tokio::test]
    async fn question_is_trimmed_before_forwarding() {
        let (dispatcher, store, _) = dispatcher(FakeDocumentStore::new(), true);
        let outcome = dispatcher.ask("  What is the conclusion?  ").await;
        assert!(matches!(outcome, AskOutcome::Answered { .. }));
        assert_eq!(store.questions(), vec!["What is the conclusion?".to_string()]);
    }

    #[tokio::test]
    async fn domain_error_is_passed_through() {
        let (dispatcher, _, tracker) = dispatcher(
            FakeDocumentStore::new().with_answer(AnswerReply::error("No relevant content found")),
            true,
        );
        assert_eq!(
            dispatcher.ask("Who funded it?").await,
            AskOutcome::DomainError {
                message: "No relevant content found".into()
            }
        );
        assert_eq!(tracker.current_status(), SessionStatus::Ready);
    }

    #[test]
    fn error_reply_without_message_uses_fallback() {
        let reply = AnswerReply {
            status: AnswerStatus::Error,
            answer: None,
            message: None,
        };
        assert_eq!(
            map_reply(reply),
            AskOutcome::DomainError {
                message: FALLBACK_DOMAIN_ERROR.into()
            }
        );
    }

    #[test]
    fn success_without_answer_is_transport_error() {
        let reply = AnswerReply {
            status: AnswerStatus::Success,
            answer: None,
            message: None,
        };
        assert!(matches!(map_reply(reply), AskOutcome::TransportError { .. }));
    }
}
