use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{Error, ExecutionRun, NodeLogEntry, RunStatus, Store};

/// In-memory store for tests and ephemeral CLI runs.
///
/// Same contract as [`crate::SqliteStore`], nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
  runs: HashMap<String, ExecutionRun>,
  logs: Vec<NodeLogEntry>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn create_run(&self, run: &ExecutionRun) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    inner.runs.insert(run.execution_id.clone(), run.clone());
    Ok(())
  }

  async fn get_run(&self, execution_id: &str) -> Result<ExecutionRun, Error> {
    let inner = self.inner.read().await;
    inner
      .runs
      .get(execution_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))
  }

  async fn mark_run_started(
    &self,
    execution_id: &str,
    started_at: DateTime<Utc>,
  ) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    let run = inner
      .runs
      .get_mut(execution_id)
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))?;
    run.status = RunStatus::Running;
    run.started_at = Some(started_at);
    Ok(())
  }

  async fn mark_run_finished(
    &self,
    execution_id: &str,
    status: RunStatus,
    error: Option<&str>,
    node_results: Option<&serde_json::Value>,
    completed_at: DateTime<Utc>,
  ) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    let run = inner
      .runs
      .get_mut(execution_id)
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))?;
    if run.status.is_terminal() {
      return Err(Error::AlreadyTerminal {
        execution_id: execution_id.to_string(),
        status: run.status,
      });
    }
    run.status = status;
    run.error = error.map(|e| e.to_string());
    run.node_results = node_results.map(|v| sqlx::types::Json(v.clone()));
    run.completed_at = Some(completed_at);
    Ok(())
  }

  async fn set_current_node(&self, execution_id: &str, node_id: &str) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    let run = inner
      .runs
      .get_mut(execution_id)
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))?;
    run.current_node_id = Some(node_id.to_string());
    Ok(())
  }

  async fn request_cancellation(&self, execution_id: &str) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    let run = inner
      .runs
      .get_mut(execution_id)
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))?;
    if !run.status.is_terminal() {
      run.cancel_requested = true;
    }
    Ok(())
  }

  async fn append_node_log(&self, entry: &NodeLogEntry) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    inner.logs.push(entry.clone());
    Ok(())
  }

  async fn list_node_logs(&self, execution_id: &str) -> Result<Vec<NodeLogEntry>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .logs
        .iter()
        .filter(|l| l.execution_id == execution_id)
        .cloned()
        .collect(),
    )
  }

  async fn list_runs(&self, workflow_id: &str) -> Result<Vec<ExecutionRun>, Error> {
    let inner = self.inner.read().await;
    let mut runs: Vec<ExecutionRun> = inner
      .runs
      .values()
      .filter(|r| r.workflow_id == workflow_id)
      .cloned()
      .collect();
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(runs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn run_lifecycle_round_trips() {
    let store = MemoryStore::new();
    let run = ExecutionRun::new("run-1", "wf-1", json!({ "x": 1 }));
    store.create_run(&run).await.unwrap();

    store.mark_run_started("run-1", Utc::now()).await.unwrap();
    let fetched = store.get_run("run-1").await.unwrap();
    assert_eq!(fetched.status, RunStatus::Running);
    assert!(fetched.started_at.is_some());

    store
      .mark_run_finished("run-1", RunStatus::Completed, None, None, Utc::now())
      .await
      .unwrap();
    let fetched = store.get_run("run-1").await.unwrap();
    assert_eq!(fetched.status, RunStatus::Completed);
  }

  #[tokio::test]
  async fn terminal_runs_reject_further_transitions() {
    let store = MemoryStore::new();
    store
      .create_run(&ExecutionRun::new("run-1", "wf-1", json!({})))
      .await
      .unwrap();
    store
      .mark_run_finished("run-1", RunStatus::Cancelled, None, None, Utc::now())
      .await
      .unwrap();

    let err = store
      .mark_run_finished("run-1", RunStatus::Completed, None, None, Utc::now())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::AlreadyTerminal { .. }));

    // cancellation requests against a terminal run are a no-op
    store.request_cancellation("run-1").await.unwrap();
    assert!(!store.get_run("run-1").await.unwrap().cancel_requested);
  }

  #[tokio::test]
  async fn missing_run_is_not_found() {
    let store = MemoryStore::new();
    assert!(matches!(
      store.get_run("ghost").await,
      Err(Error::NotFound(_))
    ));
  }
}
