//! Integration tests for the sqlite store against a temp database file.

use chrono::Utc;
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use trellis_store::{
  Error, ExecutionRun, NodeLogEntry, NodeLogStatus, RunStatus, SqliteStore, Store,
};

async fn fresh_store() -> (SqliteStore, tempfile::TempDir) {
  let dir = tempfile::tempdir().expect("failed to create temp dir");
  let options = SqliteConnectOptions::new()
    .filename(dir.path().join("trellis.sqlite"))
    .create_if_missing(true);
  let pool = SqlitePoolOptions::new()
    .max_connections(1)
    .connect_with(options)
    .await
    .expect("failed to open sqlite pool");
  let store = SqliteStore::new(pool);
  store.migrate().await.expect("migrations failed");
  (store, dir)
}

fn log_entry(execution_id: &str, node_id: &str, status: NodeLogStatus) -> NodeLogEntry {
  NodeLogEntry {
    log_id: uuid_like(execution_id, node_id, status),
    execution_id: execution_id.to_string(),
    node_id: node_id.to_string(),
    node_type: "task".to_string(),
    node_label: node_id.to_string(),
    status,
    input_data: Some(sqlx::types::Json(json!({ "in": 1 }))),
    output_data: match status {
      NodeLogStatus::Completed => Some(sqlx::types::Json(json!({ "out": 2 }))),
      _ => None,
    },
    error: match status {
      NodeLogStatus::Error => Some("boom".to_string()),
      _ => None,
    },
    duration_secs: match status {
      NodeLogStatus::Running => None,
      _ => Some(0.25),
    },
    timestamp: Utc::now(),
  }
}

fn uuid_like(execution_id: &str, node_id: &str, status: NodeLogStatus) -> String {
  format!("{}-{}-{:?}", execution_id, node_id, status)
}

#[tokio::test]
async fn run_lifecycle_persists() {
  let (store, _dir) = fresh_store().await;

  let run = ExecutionRun::new("run-1", "wf-1", json!({ "seed": true }));
  store.create_run(&run).await.unwrap();

  let fetched = store.get_run("run-1").await.unwrap();
  assert_eq!(fetched.status, RunStatus::Pending);
  assert_eq!(fetched.inputs.0, json!({ "seed": true }));
  assert!(!fetched.cancel_requested);

  store.mark_run_started("run-1", Utc::now()).await.unwrap();
  store.set_current_node("run-1", "node-a").await.unwrap();

  let fetched = store.get_run("run-1").await.unwrap();
  assert_eq!(fetched.status, RunStatus::Running);
  assert_eq!(fetched.current_node_id.as_deref(), Some("node-a"));

  let results = json!({ "node-a": { "success": true } });
  store
    .mark_run_finished(
      "run-1",
      RunStatus::Completed,
      None,
      Some(&results),
      Utc::now(),
    )
    .await
    .unwrap();

  let fetched = store.get_run("run-1").await.unwrap();
  assert_eq!(fetched.status, RunStatus::Completed);
  assert_eq!(fetched.node_results.unwrap().0, results);
  assert!(fetched.completed_at.is_some());
}

#[tokio::test]
async fn terminal_runs_are_immutable() {
  let (store, _dir) = fresh_store().await;
  store
    .create_run(&ExecutionRun::new("run-1", "wf-1", json!({})))
    .await
    .unwrap();
  store
    .mark_run_finished("run-1", RunStatus::Failed, Some("boom"), None, Utc::now())
    .await
    .unwrap();

  let err = store
    .mark_run_finished("run-1", RunStatus::Completed, None, None, Utc::now())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyTerminal { .. }));
}

#[tokio::test]
async fn cancellation_flag_round_trips() {
  let (store, _dir) = fresh_store().await;
  store
    .create_run(&ExecutionRun::new("run-1", "wf-1", json!({})))
    .await
    .unwrap();

  store.request_cancellation("run-1").await.unwrap();
  assert!(store.get_run("run-1").await.unwrap().cancel_requested);

  // terminal runs ignore further requests
  store
    .mark_run_finished("run-1", RunStatus::Cancelled, None, None, Utc::now())
    .await
    .unwrap();
  store.request_cancellation("run-1").await.unwrap();
}

#[tokio::test]
async fn node_logs_append_in_order() {
  let (store, _dir) = fresh_store().await;
  store
    .create_run(&ExecutionRun::new("run-1", "wf-1", json!({})))
    .await
    .unwrap();

  store
    .append_node_log(&log_entry("run-1", "a", NodeLogStatus::Running))
    .await
    .unwrap();
  store
    .append_node_log(&log_entry("run-1", "a", NodeLogStatus::Completed))
    .await
    .unwrap();
  store
    .append_node_log(&log_entry("run-1", "b", NodeLogStatus::Error))
    .await
    .unwrap();
  store
    .append_node_log(&log_entry("run-2", "c", NodeLogStatus::Running))
    .await
    .unwrap();

  let logs = store.list_node_logs("run-1").await.unwrap();
  assert_eq!(logs.len(), 3);
  assert_eq!(logs[0].node_id, "a");
  assert_eq!(logs[0].status, NodeLogStatus::Running);
  assert_eq!(logs[1].status, NodeLogStatus::Completed);
  assert_eq!(logs[1].output_data.as_ref().unwrap().0, json!({ "out": 2 }));
  assert_eq!(logs[2].error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn list_runs_is_scoped_and_newest_first() {
  let (store, _dir) = fresh_store().await;

  let mut first = ExecutionRun::new("run-1", "wf-1", json!({}));
  first.created_at = Utc::now() - chrono::Duration::seconds(10);
  store.create_run(&first).await.unwrap();
  store
    .create_run(&ExecutionRun::new("run-2", "wf-1", json!({})))
    .await
    .unwrap();
  store
    .create_run(&ExecutionRun::new("other", "wf-2", json!({})))
    .await
    .unwrap();

  let runs = store.list_runs("wf-1").await.unwrap();
  assert_eq!(runs.len(), 2);
  assert_eq!(runs[0].execution_id, "run-2");
  assert_eq!(runs[1].execution_id, "run-1");
}
