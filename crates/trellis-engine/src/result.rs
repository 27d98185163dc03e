use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use trellis_store::RunStatus;

/// Terminal result of a single node within a run.
///
/// Produced exactly once per node per run; internal dispatcher retries are
/// invisible at this level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
  pub node_id: String,
  pub success: bool,
  /// Payload fed downstream. Any JSON shape.
  pub output_data: serde_json::Value,
  /// Present only for branching nodes.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub condition_result: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  /// Dispatch start to terminal result, in seconds.
  pub duration_secs: f64,
}

impl NodeResult {
  pub fn failure(node_id: impl Into<String>, error: impl Into<String>, duration_secs: f64) -> Self {
    Self {
      node_id: node_id.into(),
      success: false,
      output_data: serde_json::Value::Null,
      condition_result: None,
      error: Some(error.into()),
      duration_secs,
    }
  }
}

/// Terminal outcome of a complete run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
  pub execution_id: String,
  pub status: RunStatus,
  /// Fatal validation message or an aggregate naming every failed node.
  pub error: Option<String>,
  /// Results of every dispatched node, keyed by node id.
  pub node_results: HashMap<String, NodeResult>,
}

impl RunOutcome {
  /// Ids of nodes that failed, sorted.
  pub fn failed_node_ids(&self) -> Vec<&str> {
    let mut ids: Vec<&str> = self
      .node_results
      .values()
      .filter(|r| !r.success)
      .map(|r| r.node_id.as_str())
      .collect();
    ids.sort();
    ids
  }
}
