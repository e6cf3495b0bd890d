use std::{env, sync::Once};

use research_buddy::{
    config,
    docstore::{DocumentStore, HttpDocumentStore},
    session::{ResearchSession, SessionApi},
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("DOCSTORE_URL", "http://127.0.0.1:8000");
        config::init_config();
    });
}

#[tokio::test]
#[ignore = "Requires a live document service"]
async fn live_readiness_probe_responds() {
    init_config_once();
    let store = HttpDocumentStore::new().expect("document client");
    let ready = store
        .has_ready_document()
        .await
        .expect("readiness probe should reach the document service");
    eprintln!("document service reports ready document: {ready}");
}

#[tokio::test]
#[ignore = "Requires a live document service holding a ready document"]
async fn live_question_is_answered_after_resync() {
    init_config_once();
    let session = ResearchSession::from_config().expect("session");
    let snapshot = session.resync().await;
    assert!(
        snapshot.status.is_ready(),
        "document service should hold a ready document: {snapshot:?}"
    );
    let outcome = session.ask_question("What is this document about?").await;
    assert!(
        matches!(outcome, research_buddy::session::AskOutcome::Answered { .. }),
        "expected an answer, got {outcome:?}"
    );
}
