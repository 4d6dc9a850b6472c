//! End-to-end age gate scenarios against an on-disk SQLite account store
//!
//! The platform UI is replaced by a `CallbackPresenter` whose responders are
//! handed to the test, so each test decides when and how the "user" answers.

use futures_util::future::join_all;
use shelf_core::age_gate::{AgeDecision, AgeGate, AgePrompt, CallbackPresenter, PromptResponder};
use shelf_core::config::AgeGateConfig;
use shelf_core::storage::{accounts, Account, Database, NewAccount, SqliteAccountStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

const ACCOUNT_ID: &str = "29010002345678";

/// Presenter handing every prompt to the test
fn recording_presenter() -> (
    Arc<CallbackPresenter>,
    mpsc::UnboundedReceiver<(AgePrompt, PromptResponder)>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let presenter = CallbackPresenter::new(move |prompt, responder| {
        let _ = tx.send((prompt, responder));
    });
    (Arc::new(presenter), rx)
}

async fn open_with_gated_account(path: &Path) -> Database {
    let db = Database::new(path).await.unwrap();
    let account = NewAccount::new(
        ACCOUNT_ID.to_string(),
        "Brooklyn Public Library".to_string(),
        true,
    );
    accounts::save_account(db.pool(), &account).await.unwrap();
    accounts::set_current_account(db.pool(), Some(ACCOUNT_ID))
        .await
        .unwrap();
    db
}

fn start_gate(db: &Database, presenter: Arc<CallbackPresenter>) -> AgeGate {
    let store = Arc::new(SqliteAccountStore::new(db.clone()));
    AgeGate::new(store, presenter, AgeGateConfig::default())
}

async fn stored(db: &Database) -> Account {
    accounts::get_account(db.pool(), ACCOUNT_ID)
        .await
        .unwrap()
        .unwrap()
}

async fn wait_for_pending(gate: &AgeGate, expected: usize) {
    for _ in 0..500 {
        let status = gate.status().await.unwrap();
        if status.presenting && status.pending == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("gate never reached {} pending callers", expected);
}

/// Fire `n` concurrent checks and return the handle awaiting all of them
fn concurrent_checks(gate: &AgeGate, n: usize) -> tokio::task::JoinHandle<Vec<bool>> {
    let checks: Vec<_> = (0..n)
        .map(|_| {
            let gate = gate.clone();
            async move { gate.check().await }
        })
        .collect();
    tokio::spawn(join_all(checks))
}

#[tokio::test]
async fn test_three_callers_one_prompt_answered_yes() {
    let dir = TempDir::new().unwrap();
    let db = open_with_gated_account(&dir.path().join("shelf.db")).await;
    let (presenter, mut prompts) = recording_presenter();
    let gate = start_gate(&db, presenter);

    let results = concurrent_checks(&gate, 3);
    let (prompt, responder) = prompts.recv().await.unwrap();
    assert_eq!(prompt.minimum_age, 13);

    wait_for_pending(&gate, 3).await;
    responder.answer(true);

    assert_eq!(results.await.unwrap(), vec![true, true, true]);
    assert!(prompts.try_recv().is_err(), "prompt shown more than once");

    let account = stored(&db).await;
    assert_eq!(account.age_decision, AgeDecision::Allowed);
    assert!(account.age_prompted);
}

#[tokio::test]
async fn test_decline_is_final_for_the_session() {
    let dir = TempDir::new().unwrap();
    let db = open_with_gated_account(&dir.path().join("shelf.db")).await;
    let (presenter, mut prompts) = recording_presenter();
    let gate = start_gate(&db, presenter);

    let results = concurrent_checks(&gate, 3);
    let (_, responder) = prompts.recv().await.unwrap();
    wait_for_pending(&gate, 3).await;
    responder.answer(false);

    assert_eq!(results.await.unwrap(), vec![false, false, false]);

    let account = stored(&db).await;
    assert_eq!(account.age_decision, AgeDecision::Denied);
    assert!(account.age_prompted);

    assert!(!gate.check().await);
    assert!(prompts.try_recv().is_err());
}

#[tokio::test]
async fn test_presenter_failure_allows_retry() {
    let dir = TempDir::new().unwrap();
    let db = open_with_gated_account(&dir.path().join("shelf.db")).await;
    let (presenter, mut prompts) = recording_presenter();
    let gate = start_gate(&db, presenter);

    let first = concurrent_checks(&gate, 1);
    let (_, responder) = prompts.recv().await.unwrap();
    responder.fail("no window to present on");
    assert_eq!(first.await.unwrap(), vec![false]);

    let account = stored(&db).await;
    assert!(!account.age_prompted);

    // Dropping the responder is also a failure
    let second = concurrent_checks(&gate, 1);
    let (_, responder) = prompts.recv().await.unwrap();
    drop(responder);
    assert_eq!(second.await.unwrap(), vec![false]);
    assert!(!stored(&db).await.age_prompted);

    let third = concurrent_checks(&gate, 1);
    let (_, responder) = prompts.recv().await.unwrap();
    responder.answer(true);
    assert_eq!(third.await.unwrap(), vec![true]);
}

#[tokio::test]
async fn test_allowed_answer_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shelf.db");

    {
        let db = open_with_gated_account(&path).await;
        let (presenter, mut prompts) = recording_presenter();
        let gate = start_gate(&db, presenter);

        let results = concurrent_checks(&gate, 1);
        let (_, responder) = prompts.recv().await.unwrap();
        responder.answer(true);
        assert_eq!(results.await.unwrap(), vec![true]);
        db.close().await.unwrap();
    }

    let db = Database::new(&path).await.unwrap();
    let (presenter, mut prompts) = recording_presenter();
    let gate = start_gate(&db, presenter);

    assert!(gate.check().await);
    assert!(gate.check().await);
    assert!(prompts.try_recv().is_err(), "prompted again after restart");
}

#[tokio::test]
async fn test_sign_out_and_in_clears_a_decline() {
    let dir = TempDir::new().unwrap();
    let db = open_with_gated_account(&dir.path().join("shelf.db")).await;
    accounts::update_age_state(db.pool(), ACCOUNT_ID, AgeDecision::Denied, true)
        .await
        .unwrap();

    let (presenter, mut prompts) = recording_presenter();
    let gate = start_gate(&db, presenter);
    assert!(!gate.check().await);

    assert_eq!(accounts::sign_out(db.pool()).await.unwrap(), ACCOUNT_ID);
    accounts::set_current_account(db.pool(), Some(ACCOUNT_ID))
        .await
        .unwrap();

    let results = concurrent_checks(&gate, 1);
    let (_, responder) = prompts.recv().await.unwrap();
    responder.answer(true);
    assert_eq!(results.await.unwrap(), vec![true]);
}

#[tokio::test]
async fn test_switching_accounts_keeps_allowed() {
    let dir = TempDir::new().unwrap();
    let db = open_with_gated_account(&dir.path().join("shelf.db")).await;
    let other = NewAccount::new("29010009999999".to_string(), "Bookmobile".to_string(), true);
    accounts::save_account(db.pool(), &other).await.unwrap();

    let (presenter, mut prompts) = recording_presenter();
    let gate = start_gate(&db, presenter);

    let results = concurrent_checks(&gate, 1);
    let (_, responder) = prompts.recv().await.unwrap();
    responder.answer(true);
    assert_eq!(results.await.unwrap(), vec![true]);

    accounts::set_current_account(db.pool(), Some(&other.account_id))
        .await
        .unwrap();
    accounts::set_current_account(db.pool(), Some(ACCOUNT_ID))
        .await
        .unwrap();

    assert!(gate.check().await);
    assert!(prompts.try_recv().is_err(), "switching back asked again");
    assert_eq!(stored(&db).await.age_decision, AgeDecision::Allowed);
}

#[tokio::test]
async fn test_signed_out_is_denied_without_prompt() {
    let dir = TempDir::new().unwrap();
    let db = open_with_gated_account(&dir.path().join("shelf.db")).await;
    accounts::set_current_account(db.pool(), None).await.unwrap();

    let (presenter, mut prompts) = recording_presenter();
    let gate = start_gate(&db, presenter);

    assert!(!gate.check().await);
    assert!(prompts.try_recv().is_err());
}
