//! Conditional branch filtering.
//!
//! A branching node declares a boolean `condition_result`; its outgoing
//! edges are labeled with a `from_port` of `"true"` or `"false"`. An edge
//! fires when its port matches the outcome. Unlabeled (default) edges
//! always fire, and a node without a condition result fans out to every
//! outgoing edge unconditionally.

use trellis_workflow::ConnectionSpec;

use crate::result::NodeResult;

/// Whether an edge carries data given its source node's branch outcome.
pub fn connection_fires(conn: &ConnectionSpec, condition_result: Option<bool>) -> bool {
  match condition_result {
    None => true,
    Some(outcome) => match conn.from_port.as_deref() {
      Some("true") => outcome,
      Some("false") => !outcome,
      _ => true,
    },
  }
}

/// The subset of a node's outgoing connections selected by its result.
///
/// A downstream node reachable only through filtered-out edges is still
/// scheduled; filtering gates data flow, not scheduling.
pub fn filter_outgoing<'a>(
  result: &NodeResult,
  outgoing: &[&'a ConnectionSpec],
) -> Vec<&'a ConnectionSpec> {
  outgoing
    .iter()
    .filter(|conn| connection_fires(conn, result.condition_result))
    .copied()
    .collect()
}
