use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  /// A connection references a node id that does not exist, or node ids
  /// collide. Fatal; the run never starts executing nodes.
  #[error("invalid workflow graph: {0}")]
  GraphValidation(String),

  /// The connection set induces a cycle among node ids.
  #[error("cycle detected in workflow graph (unresolvable nodes: {remaining:?})")]
  CycleDetected { remaining: Vec<String> },

  /// No trigger, webhook, root, or manual-input node to start from.
  #[error("no entry point found in workflow")]
  NoEntryPoint,

  #[error("node not found: {0}")]
  NodeNotFound(String),
}
