use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use trellis_workflow::NodeSpec;

use crate::error::HandlerError;

/// What a handler declares when it finishes successfully.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutput {
  /// Payload fed to downstream nodes. Any JSON shape.
  pub output_data: Value,
  /// Present only for branching nodes; drives the branch filter.
  pub condition_result: Option<bool>,
  /// Optional human-readable summary for logs.
  pub message: Option<String>,
}

impl HandlerOutput {
  pub fn with_data(output_data: Value) -> Self {
    Self {
      output_data,
      condition_result: None,
      message: None,
    }
  }
}

/// Per-invocation context handed to a handler.
#[derive(Debug, Clone)]
pub struct HandlerContext {
  pub run_id: String,
  pub node_id: String,
  pub layer_index: usize,
}

/// The behavior behind one node type.
///
/// Implementations must be cheap to share; the registry hands out
/// `Arc<dyn NodeHandler>` and the dispatcher may invoke the same handler
/// concurrently for sibling nodes in a layer.
#[async_trait]
pub trait NodeHandler: Send + Sync {
  async fn execute(
    &self,
    node: &NodeSpec,
    input: &Value,
    ctx: &HandlerContext,
  ) -> Result<HandlerOutput, HandlerError>;
}

/// Capability-keyed registry: node type tag -> handler.
///
/// A lookup miss is surfaced by the dispatcher as an unknown-node-type
/// failure; the registry itself never substitutes a pass-through.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
  handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a handler for a node type, replacing any previous one.
  pub fn register(&mut self, node_type: impl Into<String>, handler: Arc<dyn NodeHandler>) {
    let node_type = node_type.into();
    tracing::debug!(node_type, "handler registered");
    self.handlers.insert(node_type, handler);
  }

  /// Resolve a node type to its handler.
  pub fn get(&self, node_type: &str) -> Option<Arc<dyn NodeHandler>> {
    self.handlers.get(node_type).cloned()
  }

  /// Registered type tags, sorted.
  pub fn registered_types(&self) -> Vec<&str> {
    let mut types: Vec<&str> = self.handlers.keys().map(|k| k.as_str()).collect();
    types.sort();
    types
  }
}

impl std::fmt::Debug for HandlerRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HandlerRegistry")
      .field("types", &self.registered_types())
      .finish()
  }
}
