//! Multi-parent input merging.
//!
//! Resolves the input payload for a node from the results of its parents,
//! honoring the branch filter: an edge whose source branch did not select
//! it contributes nothing, and a failed parent's payload is never merged.

use std::collections::HashMap;

use serde_json::{Map, Value};
use trellis_workflow::WorkflowGraph;

use crate::branch::connection_fires;
use crate::result::NodeResult;

/// Resolve the input payload for `node_id`.
///
/// - zero declared incoming connections: the run's top-level inputs for a
///   layer-0 node, an empty object otherwise;
/// - one incoming connection: the parent's output verbatim, whatever its
///   shape, when the parent succeeded and the edge fired;
/// - multiple: an object assembled per edge in declaration order;
///   `output_type "A"` lands under `inputA`, `"B"` under `inputB`, and an
///   unlabeled edge's object payload is shallow-merged field by field,
///   later edges overwriting earlier ones on key collision.
pub fn merge_inputs(
  node_id: &str,
  layer_index: usize,
  run_inputs: &Value,
  workflow: &WorkflowGraph,
  results: &HashMap<String, NodeResult>,
) -> Value {
  let incoming = workflow.incoming(node_id);

  if incoming.is_empty() {
    return if layer_index == 0 {
      run_inputs.clone()
    } else {
      Value::Object(Map::new())
    };
  }

  // A parent contributes only if it succeeded and its branch selected
  // this edge.
  let contribution = |conn: &trellis_workflow::ConnectionSpec| -> Option<Value> {
    let parent = results.get(&conn.from_node_id)?;
    if !parent.success || !connection_fires(conn, parent.condition_result) {
      return None;
    }
    Some(parent.output_data.clone())
  };

  if let [only] = incoming.as_slice() {
    return contribution(only).unwrap_or_else(|| Value::Object(Map::new()));
  }

  let mut merged = Map::new();
  for conn in incoming {
    let Some(output) = contribution(conn) else {
      continue;
    };
    match conn.output_type.as_deref() {
      Some("A") => {
        merged.insert("inputA".to_string(), output);
      }
      Some("B") => {
        merged.insert("inputB".to_string(), output);
      }
      _ => {
        if let Value::Object(fields) = output {
          for (key, value) in fields {
            merged.insert(key, value);
          }
        }
      }
    }
  }
  Value::Object(merged)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use trellis_workflow::{ConnectionSpec, NodeSpec};

  fn workflow(edges: Vec<ConnectionSpec>) -> WorkflowGraph {
    let mut ids: Vec<String> = Vec::new();
    for conn in &edges {
      for id in [&conn.from_node_id, &conn.to_node_id] {
        if !ids.contains(id) {
          ids.push(id.clone());
        }
      }
    }
    WorkflowGraph {
      workflow_id: "wf".to_string(),
      name: "Test".to_string(),
      nodes: ids.into_iter().map(|id| NodeSpec::new(id, "task")).collect(),
      connections: edges,
    }
  }

  fn ok(node_id: &str, output: Value) -> NodeResult {
    NodeResult {
      node_id: node_id.to_string(),
      success: true,
      output_data: output,
      condition_result: None,
      error: None,
      duration_secs: 0.0,
    }
  }

  fn failed(node_id: &str) -> NodeResult {
    NodeResult::failure(node_id, "boom", 0.0)
  }

  #[test]
  fn no_parents_layer_zero_gets_run_inputs() {
    // standalone node, no declared edges at all
    let wf = WorkflowGraph {
      workflow_id: "wf".to_string(),
      name: "Test".to_string(),
      nodes: vec![NodeSpec::new("solo", "task")],
      connections: vec![],
    };
    let inputs = json!({ "city": "Oslo" });
    assert_eq!(
      merge_inputs("solo", 0, &inputs, &wf, &HashMap::new()),
      inputs
    );
    assert_eq!(
      merge_inputs("solo", 3, &inputs, &wf, &HashMap::new()),
      json!({})
    );
  }

  #[test]
  fn single_parent_passes_output_through_verbatim() {
    let wf = workflow(vec![ConnectionSpec::new("b", "c")]);
    let mut results = HashMap::new();
    results.insert("b".to_string(), ok("b", json!({ "x": 1 })));
    assert_eq!(merge_inputs("c", 1, &json!({}), &wf, &results), json!({ "x": 1 }));

    // non-object shapes survive untouched
    results.insert("b".to_string(), ok("b", json!([1, 2, 3])));
    assert_eq!(merge_inputs("c", 1, &json!({}), &wf, &results), json!([1, 2, 3]));
  }

  #[test]
  fn single_failed_parent_yields_empty_object() {
    let wf = workflow(vec![ConnectionSpec::new("b", "c")]);
    let mut results = HashMap::new();
    results.insert("b".to_string(), failed("b"));
    assert_eq!(merge_inputs("c", 1, &json!({}), &wf, &results), json!({}));
  }

  #[test]
  fn labeled_join_lands_under_input_a_and_b() {
    let wf = workflow(vec![
      ConnectionSpec::new("a", "j").with_output_type("A"),
      ConnectionSpec::new("b", "j").with_output_type("B"),
    ]);
    let mut results = HashMap::new();
    results.insert("a".to_string(), ok("a", json!({ "v": 1 })));
    results.insert("b".to_string(), ok("b", json!({ "v": 2 })));
    assert_eq!(
      merge_inputs("j", 1, &json!({}), &wf, &results),
      json!({ "inputA": { "v": 1 }, "inputB": { "v": 2 } })
    );
  }

  #[test]
  fn unlabeled_parents_shallow_merge_in_declaration_order() {
    let wf = workflow(vec![
      ConnectionSpec::new("a", "m"),
      ConnectionSpec::new("b", "m"),
    ]);
    let mut results = HashMap::new();
    results.insert("a".to_string(), ok("a", json!({ "x": 1, "shared": "a" })));
    results.insert("b".to_string(), ok("b", json!({ "y": 2, "shared": "b" })));
    // later-declared edge wins on collision
    assert_eq!(
      merge_inputs("m", 1, &json!({}), &wf, &results),
      json!({ "x": 1, "y": 2, "shared": "b" })
    );
  }

  #[test]
  fn failed_parents_are_skipped_in_merges() {
    let wf = workflow(vec![
      ConnectionSpec::new("a", "m").with_output_type("A"),
      ConnectionSpec::new("b", "m").with_output_type("B"),
    ]);
    let mut results = HashMap::new();
    results.insert("a".to_string(), ok("a", json!({ "v": 1 })));
    results.insert("b".to_string(), failed("b"));
    assert_eq!(
      merge_inputs("m", 1, &json!({}), &wf, &results),
      json!({ "inputA": { "v": 1 } })
    );
  }

  #[test]
  fn filtered_out_branch_edge_contributes_nothing() {
    let wf = workflow(vec![
      ConnectionSpec::new("cond", "m").with_port("false"),
      ConnectionSpec::new("other", "m"),
    ]);
    let mut results = HashMap::new();
    let mut branch = ok("cond", json!({ "c": 1 }));
    branch.condition_result = Some(true); // "false" edge does not fire
    results.insert("cond".to_string(), branch);
    results.insert("other".to_string(), ok("other", json!({ "o": 2 })));
    assert_eq!(
      merge_inputs("m", 1, &json!({}), &wf, &results),
      json!({ "o": 2 })
    );
  }

  #[test]
  fn non_object_payload_on_unlabeled_join_edge_is_dropped() {
    let wf = workflow(vec![
      ConnectionSpec::new("a", "m"),
      ConnectionSpec::new("b", "m"),
    ]);
    let mut results = HashMap::new();
    results.insert("a".to_string(), ok("a", json!([1, 2])));
    results.insert("b".to_string(), ok("b", json!({ "y": 2 })));
    assert_eq!(
      merge_inputs("m", 1, &json!({}), &wf, &results),
      json!({ "y": 2 })
    );
  }
}
