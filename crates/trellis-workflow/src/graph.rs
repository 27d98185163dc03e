use std::collections::{HashMap, HashSet};

use crate::connection::ConnectionSpec;
use crate::node::NodeSpec;

/// Dependency structure of a workflow, for traversal and analysis.
///
/// Built once per run from the node and connection lists; connection
/// declaration order is preserved in the adjacency lists because the input
/// merger's shallow-merge policy is order-sensitive.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
  /// node_id -> downstream node_ids.
  children: HashMap<String, Vec<String>>,
  /// node_id -> upstream node_ids (direct parents).
  parents: HashMap<String, Vec<String>>,
  /// Nodes with no incoming edges.
  roots: Vec<String>,
  /// Nodes with multiple incoming edges (join points).
  join_points: HashSet<String>,
}

impl DependencyGraph {
  /// Build the dependency maps from nodes and connections.
  ///
  /// Assumes the graph has already been validated; edges referencing
  /// unknown ids are ignored here rather than re-reported.
  pub fn new(nodes: &[NodeSpec], connections: &[ConnectionSpec]) -> Self {
    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    let mut parents: HashMap<String, Vec<String>> = HashMap::new();

    for node in nodes {
      children.entry(node.id.clone()).or_default();
      parents.entry(node.id.clone()).or_default();
    }

    for conn in connections {
      if !children.contains_key(&conn.from_node_id) || !children.contains_key(&conn.to_node_id) {
        continue;
      }
      children
        .entry(conn.from_node_id.clone())
        .or_default()
        .push(conn.to_node_id.clone());
      parents
        .entry(conn.to_node_id.clone())
        .or_default()
        .push(conn.from_node_id.clone());
    }

    let mut roots: Vec<String> = nodes
      .iter()
      .filter(|n| parents.get(&n.id).is_none_or(|v| v.is_empty()))
      .map(|n| n.id.clone())
      .collect();
    roots.sort();

    let join_points: HashSet<String> = parents
      .iter()
      .filter(|(_, incoming)| incoming.len() > 1)
      .map(|(id, _)| id.clone())
      .collect();

    Self {
      children,
      parents,
      roots,
      join_points,
    }
  }

  /// Nodes with no incoming edges, sorted by id.
  pub fn roots(&self) -> &[String] {
    &self.roots
  }

  /// Direct parents of a node, in connection declaration order.
  pub fn parents(&self, node_id: &str) -> &[String] {
    self
      .parents
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Direct children of a node, in connection declaration order.
  pub fn children(&self, node_id: &str) -> &[String] {
    self
      .children
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Whether a node has more than one incoming edge.
  pub fn is_join_point(&self, node_id: &str) -> bool {
    self.join_points.contains(node_id)
  }

  /// Full dependency map: node id -> parent ids.
  pub fn dependency_map(&self) -> &HashMap<String, Vec<String>> {
    &self.parents
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
    let nodes: Vec<NodeSpec> = nodes.iter().map(|id| NodeSpec::new(*id, "task")).collect();
    let connections: Vec<ConnectionSpec> = edges
      .iter()
      .map(|(from, to)| ConnectionSpec::new(*from, *to))
      .collect();
    DependencyGraph::new(&nodes, &connections)
  }

  #[test]
  fn parents_reflect_incoming_edges() {
    let g = graph(&["a", "b", "c"], &[("a", "c"), ("b", "c")]);
    assert_eq!(g.parents("a"), &[] as &[String]);
    assert_eq!(g.parents("c"), &["a".to_string(), "b".to_string()]);
  }

  #[test]
  fn roots_and_join_points() {
    let g = graph(&["a", "b", "c"], &[("a", "c"), ("b", "c")]);
    assert_eq!(g.roots(), &["a".to_string(), "b".to_string()]);
    assert!(g.is_join_point("c"));
    assert!(!g.is_join_point("a"));
  }

  #[test]
  fn edges_to_unknown_nodes_are_ignored() {
    let g = graph(&["a"], &[("a", "ghost")]);
    assert_eq!(g.children("a"), &[] as &[String]);
  }
}
