use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::connection::ConnectionSpec;
use crate::error::WorkflowError;
use crate::graph::DependencyGraph;
use crate::node::{NodeSpec, node_types};

/// A workflow definition ready for execution.
///
/// Created from a stored definition at run start and read-only for the
/// duration of a run; the only permitted pre-run mutation is
/// [`WorkflowGraph::seed_manual_inputs`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowGraph {
  pub workflow_id: String,
  pub name: String,
  pub nodes: Vec<NodeSpec>,
  #[serde(default)]
  pub connections: Vec<ConnectionSpec>,
}

impl WorkflowGraph {
  /// Check structural invariants: unique node ids, edge endpoints exist.
  pub fn validate(&self) -> Result<(), WorkflowError> {
    let mut seen = HashSet::new();
    for node in &self.nodes {
      if !seen.insert(node.id.as_str()) {
        return Err(WorkflowError::GraphValidation(format!(
          "duplicate node id '{}'",
          node.id
        )));
      }
    }

    for conn in &self.connections {
      for endpoint in [&conn.from_node_id, &conn.to_node_id] {
        if !seen.contains(endpoint.as_str()) {
          return Err(WorkflowError::GraphValidation(format!(
            "connection references unknown node '{}' (edge {} -> {})",
            endpoint, conn.from_node_id, conn.to_node_id
          )));
        }
      }
    }

    Ok(())
  }

  /// Build the dependency structure for traversal.
  pub fn graph(&self) -> DependencyGraph {
    DependencyGraph::new(&self.nodes, &self.connections)
  }

  /// Get a node by id.
  pub fn get_node(&self, node_id: &str) -> Option<&NodeSpec> {
    self.nodes.iter().find(|n| n.id == node_id)
  }

  /// Connections feeding into a node, in declaration order.
  pub fn incoming(&self, node_id: &str) -> Vec<&ConnectionSpec> {
    self
      .connections
      .iter()
      .filter(|c| c.to_node_id == node_id)
      .collect()
  }

  /// Connections leaving a node, in declaration order.
  pub fn outgoing(&self, node_id: &str) -> Vec<&ConnectionSpec> {
    self
      .connections
      .iter()
      .filter(|c| c.from_node_id == node_id)
      .collect()
  }

  /// Seed manual-input nodes' config from run inputs keyed by node id.
  ///
  /// This is the only mutation allowed between loading a definition and
  /// starting a run.
  pub fn seed_manual_inputs(&mut self, inputs: &Map<String, Value>) {
    for node in &mut self.nodes {
      if node.node_type == node_types::MANUAL_INPUT
        && let Some(value) = inputs.get(&node.id)
      {
        node
          .config
          .insert("inputVarValue".to_string(), value.clone());
      }
    }
  }
}
