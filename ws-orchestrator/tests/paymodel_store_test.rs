mod common;

use common::{file_store, open_store, record, resolver};
use tokio_test::{assert_err, assert_ok};
use ws_orchestrator::{CurrentSelection, OrchestratorError, PayModelStore};

#[tokio::test]
async fn test_records_survive_reopening_the_database() {
    let (dir, store) = file_store().await;
    assert_ok!(store.upsert(&record("alice", "pm-1", true)).await);
    drop(store);

    let reopened = open_store(&dir).await;
    let current = assert_ok!(reopened.list_current("alice").await);
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id, "pm-1");
}

#[tokio::test]
async fn test_concurrent_switches_leave_exactly_one_current() {
    let (_dir, store) = file_store().await;
    for id in ["pm-1", "pm-2", "pm-3", "pm-4"] {
        assert_ok!(store.upsert(&record("alice", id, id == "pm-1")).await);
    }
    let resolver = resolver(&store);

    let mut handles = Vec::new();
    for round in 0..16 {
        let resolver = resolver.clone();
        let id = format!("pm-{}", round % 4 + 1);
        handles.push(tokio::spawn(async move {
            resolver.set_current("alice", &id).await
        }));
    }
    for handle in handles {
        assert_ok!(handle.await.expect("task panicked"));
    }

    let current = assert_ok!(store.list_current("alice").await);
    assert_eq!(current.len(), 1);
    assert!(matches!(
        assert_ok!(resolver.current_selection("alice").await),
        CurrentSelection::Current(_)
    ));
}

#[tokio::test]
async fn test_switching_one_user_leaves_others_alone() {
    let (_dir, store) = file_store().await;
    assert_ok!(store.upsert(&record("alice", "pm-a", false)).await);
    assert_ok!(store.upsert(&record("bob", "pm-b", true)).await);
    let resolver = resolver(&store);

    let selected = assert_ok!(resolver.set_current("alice", "pm-a").await);
    assert!(selected.current);

    let err = assert_err!(resolver.set_current("alice", "pm-b").await);
    assert!(matches!(err, OrchestratorError::UnknownPayModel(_)));

    assert_ok!(resolver.reset_current("alice").await);
    assert_eq!(
        assert_ok!(resolver.get_current("bob").await).map(|p| p.id),
        Some("pm-b".to_string())
    );
}

#[tokio::test]
async fn test_summary_lists_every_selectable_paymodel() {
    let (_dir, store) = file_store().await;
    assert_ok!(store.upsert(&record("alice", "pm-1", true)).await);
    let mut over = record("alice", "pm-2", false);
    over.status = "above limit".into();
    assert_ok!(store.upsert(&over).await);
    let mut pending = record("alice", "pm-3", false);
    pending.status = "pending".into();
    assert_ok!(store.upsert(&pending).await);

    let summary = assert_ok!(resolver(&store).get_for_user("alice").await).expect("summary");
    assert_eq!(summary.current_paymodel.map(|p| p.id), Some("pm-1".to_string()));
    let ids: Vec<_> = summary.all_paymodels.into_iter().map(|p| p.id).collect();
    assert_eq!(ids, ["pm-1", "pm-2"]);
}
