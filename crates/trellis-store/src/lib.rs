//! Trellis Store
//!
//! Durable record of workflow runs and per-node execution logs. The
//! scheduling core never touches storage directly; all side effects go
//! through the narrow [`Store`] trait:
//!
//! - run lifecycle (create, start, finish, cancellation flag)
//! - append-only node execution logs
//! - poll surface (get run, list runs, list logs)
//!
//! [`SqliteStore`] persists via sqlx; [`MemoryStore`] backs tests and
//! ephemeral CLI runs.

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use sqlx::types::Json;
pub use types::{ExecutionRun, NodeLogEntry, NodeLogStatus, RunStatus};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// An attempted transition out of a terminal run status.
  #[error("run {execution_id} is already terminal ({status:?})")]
  AlreadyTerminal {
    execution_id: String,
    status: RunStatus,
  },

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

/// Storage trait for workflow runs and node logs.
///
/// Run status writes are serialized per run by the coordinator (single
/// writer at a time); node logs are append-only, so implementations need no
/// cross-node locking discipline beyond that.
#[async_trait]
pub trait Store: Send + Sync {
  /// Create a new run record (status `Pending`).
  async fn create_run(&self, run: &ExecutionRun) -> Result<(), Error>;

  /// Get a run by execution id.
  async fn get_run(&self, execution_id: &str) -> Result<ExecutionRun, Error>;

  /// Transition a run to `Running`, recording its start time.
  async fn mark_run_started(
    &self,
    execution_id: &str,
    started_at: DateTime<Utc>,
  ) -> Result<(), Error>;

  /// Transition a run to a terminal status with its final fields.
  ///
  /// Fails with [`Error::AlreadyTerminal`] if the run already settled.
  async fn mark_run_finished(
    &self,
    execution_id: &str,
    status: RunStatus,
    error: Option<&str>,
    node_results: Option<&serde_json::Value>,
    completed_at: DateTime<Utc>,
  ) -> Result<(), Error>;

  /// Record the advisory last-started node id.
  async fn set_current_node(&self, execution_id: &str, node_id: &str) -> Result<(), Error>;

  /// Flag a run for cooperative cancellation; honored at the next layer
  /// boundary. No-op once the run is terminal.
  async fn request_cancellation(&self, execution_id: &str) -> Result<(), Error>;

  /// Append a node execution log entry.
  async fn append_node_log(&self, entry: &NodeLogEntry) -> Result<(), Error>;

  /// All log entries for a run, oldest first.
  async fn list_node_logs(&self, execution_id: &str) -> Result<Vec<NodeLogEntry>, Error>;

  /// Runs for a workflow, newest first.
  async fn list_runs(&self, workflow_id: &str) -> Result<Vec<ExecutionRun>, Error>;
}
