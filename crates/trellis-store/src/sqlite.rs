use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::types::Json;

use crate::{Error, ExecutionRun, NodeLogEntry, RunStatus, Store};

/// SQLite-backed store.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }

  /// Fetch the current status, for terminal-transition guarding.
  async fn status_of(&self, execution_id: &str) -> Result<RunStatus, Error> {
    let status: Option<(RunStatus,)> =
      sqlx::query_as("SELECT status FROM workflow_executions WHERE execution_id = ?")
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await?;
    status
      .map(|(s,)| s)
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn create_run(&self, run: &ExecutionRun) -> Result<(), Error> {
    sqlx::query(
      r#"
      INSERT INTO workflow_executions
        (execution_id, workflow_id, status, inputs, cancel_requested, created_at,
         started_at, completed_at, current_node_id, error, node_results)
      VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
      "#,
    )
    .bind(&run.execution_id)
    .bind(&run.workflow_id)
    .bind(run.status)
    .bind(&run.inputs)
    .bind(run.cancel_requested)
    .bind(run.created_at)
    .bind(run.started_at)
    .bind(run.completed_at)
    .bind(&run.current_node_id)
    .bind(&run.error)
    .bind(&run.node_results)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_run(&self, execution_id: &str) -> Result<ExecutionRun, Error> {
    sqlx::query_as(
      r#"
      SELECT execution_id, workflow_id, status, inputs, cancel_requested, created_at,
             started_at, completed_at, current_node_id, error, node_results
      FROM workflow_executions
      WHERE execution_id = ?
      "#,
    )
    .bind(execution_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(execution_id.to_string()))
  }

  async fn mark_run_started(
    &self,
    execution_id: &str,
    started_at: DateTime<Utc>,
  ) -> Result<(), Error> {
    let result = sqlx::query(
      r#"
      UPDATE workflow_executions
      SET status = ?, started_at = ?
      WHERE execution_id = ?
      "#,
    )
    .bind(RunStatus::Running)
    .bind(started_at)
    .bind(execution_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(execution_id.to_string()));
    }
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
    let current = self.status_of(execution_id).await?;
    if current.is_terminal() {
      return Err(Error::AlreadyTerminal {
        execution_id: execution_id.to_string(),
        status: current,
      });
    }

    sqlx::query(
      r#"
      UPDATE workflow_executions
      SET status = ?, error = ?, node_results = ?, completed_at = ?
      WHERE execution_id = ?
      "#,
    )
    .bind(status)
    .bind(error)
    .bind(node_results.map(|v| Json(v.clone())))
    .bind(completed_at)
    .bind(execution_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn set_current_node(&self, execution_id: &str, node_id: &str) -> Result<(), Error> {
    sqlx::query(
      r#"
      UPDATE workflow_executions
      SET current_node_id = ?
      WHERE execution_id = ?
      "#,
    )
    .bind(node_id)
    .bind(execution_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn request_cancellation(&self, execution_id: &str) -> Result<(), Error> {
    let current = self.status_of(execution_id).await?;
    if current.is_terminal() {
      return Ok(());
    }

    sqlx::query(
      r#"
      UPDATE workflow_executions
      SET cancel_requested = 1
      WHERE execution_id = ?
      "#,
    )
    .bind(execution_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn append_node_log(&self, entry: &NodeLogEntry) -> Result<(), Error> {
    sqlx::query(
      r#"
      INSERT INTO execution_logs
        (log_id, execution_id, node_id, node_type, node_label, status,
         input_data, output_data, error, duration_secs, timestamp)
      VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
      "#,
    )
    .bind(&entry.log_id)
    .bind(&entry.execution_id)
    .bind(&entry.node_id)
    .bind(&entry.node_type)
    .bind(&entry.node_label)
    .bind(entry.status)
    .bind(&entry.input_data)
    .bind(&entry.output_data)
    .bind(&entry.error)
    .bind(entry.duration_secs)
    .bind(entry.timestamp)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn list_node_logs(&self, execution_id: &str) -> Result<Vec<NodeLogEntry>, Error> {
    Ok(
      sqlx::query_as(
        r#"
        SELECT log_id, execution_id, node_id, node_type, node_label, status,
               input_data, output_data, error, duration_secs, timestamp
        FROM execution_logs
        WHERE execution_id = ?
        ORDER BY timestamp, log_id
        "#,
      )
      .bind(execution_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn list_runs(&self, workflow_id: &str) -> Result<Vec<ExecutionRun>, Error> {
    Ok(
      sqlx::query_as(
        r#"
        SELECT execution_id, workflow_id, status, inputs, cancel_requested, created_at,
               started_at, completed_at, current_node_id, error, node_results
        FROM workflow_executions
        WHERE workflow_id = ?
        ORDER BY created_at DESC
        "#,
      )
      .bind(workflow_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }
}
