//! Behaviour shared by every Store implementation.

use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::types::Json;
use stately_store::{
  Error, ExecutionRecord, ExecutionStatus, HistoryEntry, MemoryStore, SqliteStore, Store,
};

fn entry(execution_id: &str, event_id: i64, event_type: &str) -> HistoryEntry {
  HistoryEntry {
    execution_id: execution_id.to_string(),
    event_id,
    event_type: event_type.to_string(),
    timestamp: Utc::now(),
    details: Json(json!({"type": event_type})),
  }
}

async fn check_execution_lifecycle(store: &dyn Store) {
  let mut record = ExecutionRecord::running("orders:run-1", "run-1", "orders", json!({"id": 1}));
  store.create_execution(&record).await.unwrap();

  let stored = store.get_execution("orders:run-1").await.unwrap();
  assert_eq!(stored.status, ExecutionStatus::Running);
  assert_eq!(stored.input, Json(json!({"id": 1})));

  record.status = ExecutionStatus::Failed;
  record.error = Some("Boom".to_string());
  record.cause = Some("bad input".to_string());
  record.stopped_at = Some(Utc::now());
  store.update_execution(&record).await.unwrap();

  let stored = store.get_execution("orders:run-1").await.unwrap();
  assert_eq!(stored.status, ExecutionStatus::Failed);
  assert_eq!(stored.error.as_deref(), Some("Boom"));
  assert_eq!(stored.cause.as_deref(), Some("bad input"));
  assert!(stored.stopped_at.is_some());
}

async fn check_missing_execution(store: &dyn Store) {
  assert!(matches!(
    store.get_execution("nope").await,
    Err(Error::NotFound(_))
  ));
  let record = ExecutionRecord::running("nope", "nope", "orders", json!(null));
  assert!(matches!(
    store.update_execution(&record).await,
    Err(Error::NotFound(_))
  ));
}

async fn check_duplicate_execution(store: &dyn Store) {
  let first = ExecutionRecord::running("dup:x", "x", "dup", json!({"n": 1}));
  store.create_execution(&first).await.unwrap();

  let second = ExecutionRecord::running("dup:x", "x", "dup", json!({"n": 2}));
  assert!(matches!(
    store.create_execution(&second).await,
    Err(Error::AlreadyExists(id)) if id == "dup:x"
  ));
  let stored = store.get_execution("dup:x").await.unwrap();
  assert_eq!(stored.input, Json(json!({"n": 1})));
}

async fn check_list_newest_first(store: &dyn Store) {
  let mut older = ExecutionRecord::running("m:a", "a", "m", json!({}));
  older.started_at = Utc::now() - Duration::seconds(10);
  let newer = ExecutionRecord::running("m:b", "b", "m", json!({}));
  let other = ExecutionRecord::running("other:c", "c", "other", json!({}));
  for record in [&older, &newer, &other] {
    store.create_execution(record).await.unwrap();
  }

  let ids: Vec<String> = store
    .list_executions("m")
    .await
    .unwrap()
    .into_iter()
    .map(|r| r.execution_id)
    .collect();
  assert_eq!(ids, vec!["m:b", "m:a"]);
}

async fn check_history_order(store: &dyn Store) {
  store
    .append_history(&[entry("h:1", 1, "ExecutionStarted"), entry("h:1", 2, "StateEntered")])
    .await
    .unwrap();
  store
    .append_history(&[entry("h:1", 3, "ExecutionSucceeded"), entry("h:2", 1, "ExecutionStarted")])
    .await
    .unwrap();

  let types: Vec<String> = store
    .get_history("h:1")
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.event_type)
    .collect();
  assert_eq!(types, vec!["ExecutionStarted", "StateEntered", "ExecutionSucceeded"]);
  assert!(store.get_history("unknown").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_memory_store() {
  let store = MemoryStore::new();
  check_execution_lifecycle(&store).await;
  check_missing_execution(&store).await;
  check_duplicate_execution(&store).await;
  check_list_newest_first(&store).await;
  check_history_order(&store).await;
}

#[tokio::test]
async fn test_sqlite_store() {
  let dir = tempfile::tempdir().unwrap();
  let store = SqliteStore::open(dir.path().join("stately.db")).await.unwrap();
  check_execution_lifecycle(&store).await;
  check_missing_execution(&store).await;
  check_duplicate_execution(&store).await;
  check_list_newest_first(&store).await;
  check_history_order(&store).await;
}

#[tokio::test]
async fn test_sqlite_store_reopens_existing_file() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("stately.db");
  {
    let store = SqliteStore::open(&path).await.unwrap();
    let record = ExecutionRecord::running("m:keep", "keep", "m", json!([1, 2]));
    store.create_execution(&record).await.unwrap();
  }

  let store = SqliteStore::open(&path).await.unwrap();
  let record = store.get_execution("m:keep").await.unwrap();
  assert_eq!(record.input, Json(json!([1, 2])));
}
