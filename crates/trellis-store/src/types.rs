use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Status of a workflow run.
///
/// Lifecycle: `Pending -> Running -> {Completed, Failed, Cancelled}`.
/// Terminal statuses are never transitioned again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RunStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Cancelled,
}

impl RunStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
  }
}

/// Status of a single node-execution log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NodeLogStatus {
  Running,
  Completed,
  Error,
}

/// A workflow run as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExecutionRun {
  pub execution_id: String,
  pub workflow_id: String,
  pub status: RunStatus,
  /// Top-level run inputs, fed to layer-0 nodes.
  pub inputs: Json<serde_json::Value>,
  /// Set by the cancellation surface; honored at the next layer boundary.
  pub cancel_requested: bool,
  pub created_at: DateTime<Utc>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  /// Advisory: last node handed to the dispatcher.
  pub current_node_id: Option<String>,
  /// Fatal validation message, or an aggregate naming every failed node.
  pub error: Option<String>,
  /// Final per-node results, keyed by node id. Set at termination.
  pub node_results: Option<Json<serde_json::Value>>,
}

impl ExecutionRun {
  /// A fresh `Pending` run.
  pub fn new(
    execution_id: impl Into<String>,
    workflow_id: impl Into<String>,
    inputs: serde_json::Value,
  ) -> Self {
    Self {
      execution_id: execution_id.into(),
      workflow_id: workflow_id.into(),
      status: RunStatus::Pending,
      inputs: Json(inputs),
      cancel_requested: false,
      created_at: Utc::now(),
      started_at: None,
      completed_at: None,
      current_node_id: None,
      error: None,
      node_results: None,
    }
  }
}

/// Append-only record of one node attempt within a run.
///
/// Written only by the task dispatcher: one `Running` entry at dispatch,
/// one terminal entry (`Completed` / `Error`) when the node settles. Never
/// mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NodeLogEntry {
  pub log_id: String,
  pub execution_id: String,
  pub node_id: String,
  pub node_type: String,
  pub node_label: String,
  pub status: NodeLogStatus,
  pub input_data: Option<Json<serde_json::Value>>,
  pub output_data: Option<Json<serde_json::Value>>,
  pub error: Option<String>,
  /// Dispatch start to terminal result, in seconds.
  pub duration_secs: Option<f64>,
  pub timestamp: DateTime<Utc>,
}
