//! Layer planning and entry-point selection.
//!
//! Layers are computed with an iterative Kahn-style batching: a layer is
//! every remaining node whose full parent set has already been planned.
//! Nodes within one layer have no dependency on each other and may run
//! concurrently; for every edge u -> v, u's layer index is strictly less
//! than v's.

use std::collections::HashSet;

use crate::error::WorkflowError;
use crate::node::{NodeSpec, node_types};
use crate::workflow::WorkflowGraph;

impl WorkflowGraph {
  /// Group nodes into ordered execution layers.
  ///
  /// Layer membership is deterministic for a given graph; ids within a
  /// layer are sorted so repeated planning yields identical output. An
  /// empty candidate layer with nodes still remaining means the connection
  /// set induces a cycle, which aborts before any node executes.
  pub fn execution_layers(&self) -> Result<Vec<Vec<String>>, WorkflowError> {
    let graph = self.graph();
    let mut layers: Vec<Vec<String>> = Vec::new();
    let mut processed: HashSet<String> = HashSet::new();
    let mut remaining: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();

    while !remaining.is_empty() {
      let mut current: Vec<String> = remaining
        .iter()
        .filter(|id| graph.parents(id).iter().all(|p| processed.contains(p)))
        .cloned()
        .collect();

      if current.is_empty() {
        let mut unresolvable: Vec<String> = remaining.into_iter().collect();
        unresolvable.sort();
        return Err(WorkflowError::CycleDetected {
          remaining: unresolvable,
        });
      }

      current.sort();
      for id in &current {
        processed.insert(id.clone());
        remaining.remove(id);
      }
      layers.push(current);
    }

    Ok(layers)
  }

  /// Select the nodes a run would start from.
  ///
  /// Priority: a `trigger` node, then a `webhook` node, then every root
  /// node that is not a `comment`, then every `manualInput` node. Used to
  /// reject graphs with no entry point before execution begins; layering
  /// itself does not depend on this choice.
  pub fn starting_nodes(&self) -> Result<Vec<&NodeSpec>, WorkflowError> {
    if let Some(trigger) = self
      .nodes
      .iter()
      .find(|n| n.node_type == node_types::TRIGGER)
    {
      return Ok(vec![trigger]);
    }

    if let Some(webhook) = self
      .nodes
      .iter()
      .find(|n| n.node_type == node_types::WEBHOOK)
    {
      return Ok(vec![webhook]);
    }

    let has_incoming: HashSet<&str> = self
      .connections
      .iter()
      .map(|c| c.to_node_id.as_str())
      .collect();
    let roots: Vec<&NodeSpec> = self
      .nodes
      .iter()
      .filter(|n| !has_incoming.contains(n.id.as_str()) && n.node_type != node_types::COMMENT)
      .collect();
    if !roots.is_empty() {
      return Ok(roots);
    }

    let manual: Vec<&NodeSpec> = self
      .nodes
      .iter()
      .filter(|n| n.node_type == node_types::MANUAL_INPUT)
      .collect();
    if !manual.is_empty() {
      return Ok(manual);
    }

    Err(WorkflowError::NoEntryPoint)
  }
}
