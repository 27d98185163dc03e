use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node type tags with scheduling significance.
///
/// Every other type tag is opaque to the graph model and only meaningful to
/// the handler registry.
pub mod node_types {
  /// Initiates a workflow; preferred entry point.
  pub const TRIGGER: &str = "trigger";
  /// Receives external data; second-priority entry point.
  pub const WEBHOOK: &str = "webhook";
  /// Static value provided at run start.
  pub const MANUAL_INPUT: &str = "manualInput";
  /// Annotation only; never an entry point.
  pub const COMMENT: &str = "comment";
}

/// A single typed unit of work in a workflow graph.
///
/// The `config` map is opaque to the scheduling core and passed verbatim to
/// the node's handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
  /// Unique within a workflow.
  pub id: String,
  /// Type tag selecting a handler.
  #[serde(rename = "type")]
  pub node_type: String,
  /// Display name; falls back to the type tag.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(default)]
  pub config: Map<String, Value>,
}

impl NodeSpec {
  pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      node_type: node_type.into(),
      label: None,
      config: Map::new(),
    }
  }

  /// Display label, defaulting to the type tag.
  pub fn display_label(&self) -> &str {
    self.label.as_deref().unwrap_or(&self.node_type)
  }
}
