use serde::{Deserialize, Serialize};

/// A directed data-flow edge from one node's output to another's input.
///
/// `from_port` labels conditional branch edges (`"true"` / `"false"`); an
/// absent or otherwise-labeled port is a default edge that fires regardless
/// of a branch outcome. `output_type` (`"A"` / `"B"`) disambiguates the two
/// sides of a join when the target has multiple parents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSpec {
  pub from_node_id: String,
  pub to_node_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub from_port: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_type: Option<String>,
}

impl ConnectionSpec {
  pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      from_node_id: from.into(),
      to_node_id: to.into(),
      from_port: None,
      output_type: None,
    }
  }

  /// Label this edge with a branch port (`"true"` / `"false"`).
  pub fn with_port(mut self, port: impl Into<String>) -> Self {
    self.from_port = Some(port.into());
    self
  }

  /// Label this edge for join disambiguation (`"A"` / `"B"`).
  pub fn with_output_type(mut self, output_type: impl Into<String>) -> Self {
    self.output_type = Some(output_type.into());
    self
  }
}
