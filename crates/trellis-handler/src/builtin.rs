//! Built-in node handlers.
//!
//! These are the pure in-memory node types: entry points, data transforms,
//! and branching. Their semantics are part of the engine's contract;
//! anything that talks to the network registers itself from outside.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use trellis_workflow::NodeSpec;

use crate::error::HandlerError;
use crate::registry::{HandlerContext, HandlerOutput, HandlerRegistry, NodeHandler};

/// Build a registry with every built-in handler registered.
pub fn builtin_registry() -> HandlerRegistry {
  let mut registry = HandlerRegistry::new();
  registry.register("trigger", Arc::new(TriggerHandler));
  registry.register("webhook", Arc::new(WebhookHandler));
  registry.register("manualInput", Arc::new(ManualInputHandler));
  registry.register("output", Arc::new(OutputHandler));
  registry.register("condition", Arc::new(ConditionHandler));
  registry.register("addField", Arc::new(AddFieldHandler));
  registry.register("join", Arc::new(JoinHandler));
  registry.register("comment", Arc::new(CommentHandler));
  registry
}

fn config_str<'a>(node: &'a NodeSpec, key: &str) -> Option<&'a str> {
  node.config.get(key).and_then(|v| v.as_str())
}

/// Entry point: passes the run inputs through unchanged.
struct TriggerHandler;

#[async_trait]
impl NodeHandler for TriggerHandler {
  async fn execute(
    &self,
    _node: &NodeSpec,
    input: &Value,
    _ctx: &HandlerContext,
  ) -> Result<HandlerOutput, HandlerError> {
    Ok(HandlerOutput {
      output_data: input.clone(),
      condition_result: None,
      message: Some("workflow triggered".to_string()),
    })
  }
}

/// Entry point for externally delivered payloads. Falls back to the
/// `webhookData` configured on the node when the run carries no payload.
struct WebhookHandler;

#[async_trait]
impl NodeHandler for WebhookHandler {
  async fn execute(
    &self,
    node: &NodeSpec,
    input: &Value,
    _ctx: &HandlerContext,
  ) -> Result<HandlerOutput, HandlerError> {
    let data = match input {
      Value::Object(map) if map.is_empty() => node
        .config
        .get("webhookData")
        .cloned()
        .unwrap_or_else(|| json!({})),
      Value::Null => node
        .config
        .get("webhookData")
        .cloned()
        .unwrap_or_else(|| json!({})),
      other => other.clone(),
    };
    Ok(HandlerOutput::with_data(data))
  }
}

/// Emits a single configured variable as `{ name: value }`.
struct ManualInputHandler;

#[async_trait]
impl NodeHandler for ManualInputHandler {
  async fn execute(
    &self,
    node: &NodeSpec,
    _input: &Value,
    _ctx: &HandlerContext,
  ) -> Result<HandlerOutput, HandlerError> {
    let name = config_str(node, "inputVarName")
      .or_else(|| config_str(node, "variableName"))
      .unwrap_or("input")
      .to_string();
    let value = node
      .config
      .get("inputVarValue")
      .or_else(|| node.config.get("variableValue"))
      .cloned()
      .unwrap_or_else(|| json!(""));

    let mut out = Map::new();
    let message = format!("set {} = {}", name, value);
    out.insert(name, value);
    Ok(HandlerOutput {
      output_data: Value::Object(out),
      condition_result: None,
      message: Some(message),
    })
  }
}

/// Marks a terminal output; passes its input through unchanged.
struct OutputHandler;

#[async_trait]
impl NodeHandler for OutputHandler {
  async fn execute(
    &self,
    _node: &NodeSpec,
    input: &Value,
    _ctx: &HandlerContext,
  ) -> Result<HandlerOutput, HandlerError> {
    Ok(HandlerOutput {
      output_data: input.clone(),
      condition_result: None,
      message: Some("output received".to_string()),
    })
  }
}

/// Annotation node; no operation.
struct CommentHandler;

#[async_trait]
impl NodeHandler for CommentHandler {
  async fn execute(
    &self,
    _node: &NodeSpec,
    input: &Value,
    _ctx: &HandlerContext,
  ) -> Result<HandlerOutput, HandlerError> {
    Ok(HandlerOutput::with_data(input.clone()))
  }
}

/// Branching node: evaluates `conditionField <operator> conditionValue`
/// against the input and declares a `condition_result`.
///
/// In `perRow` mode a list input is split; matching records flow out as the
/// payload and the condition is true when any record matched.
struct ConditionHandler;

fn scalar_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn scalar_number(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn is_empty_value(value: Option<&Value>) -> bool {
  match value {
    None | Some(Value::Null) => true,
    Some(Value::String(s)) => s.is_empty(),
    Some(Value::Array(a)) => a.is_empty(),
    Some(Value::Object(o)) => o.is_empty(),
    _ => false,
  }
}

fn evaluate(actual: Option<&Value>, operator: &str, expected: Option<&Value>) -> bool {
  match operator {
    "isEmpty" => is_empty_value(actual),
    "isNotEmpty" => !is_empty_value(actual),
    "contains" => match (actual, expected) {
      (Some(a), Some(e)) => scalar_text(a).contains(&scalar_text(e)),
      _ => false,
    },
    "greaterThan" | "lessThan" => match (actual.and_then(scalar_number), expected.and_then(scalar_number)) {
      (Some(a), Some(e)) if operator == "greaterThan" => a > e,
      (Some(a), Some(e)) => a < e,
      _ => false,
    },
    "notEquals" => match (actual, expected) {
      (Some(a), Some(e)) => scalar_text(a) != scalar_text(e),
      _ => true,
    },
    // "equals" and anything unrecognized compare as text
    _ => match (actual, expected) {
      (Some(a), Some(e)) => scalar_text(a) == scalar_text(e),
      _ => false,
    },
  }
}

#[async_trait]
impl NodeHandler for ConditionHandler {
  async fn execute(
    &self,
    node: &NodeSpec,
    input: &Value,
    _ctx: &HandlerContext,
  ) -> Result<HandlerOutput, HandlerError> {
    let field = config_str(node, "conditionField")
      .ok_or_else(|| HandlerError::InvalidConfig("conditionField is required".to_string()))?
      .to_string();
    let operator = config_str(node, "conditionOperator").unwrap_or("equals");
    let expected = node.config.get("conditionValue");
    let per_row = config_str(node, "processingMode") == Some("perRow");

    if per_row && let Value::Array(records) = input {
      let (matched, rest): (Vec<&Value>, Vec<&Value>) = records
        .iter()
        .partition(|r| evaluate(r.get(&field), operator, expected));
      let condition = !matched.is_empty();
      return Ok(HandlerOutput {
        output_data: json!(matched),
        condition_result: Some(condition),
        message: Some(format!(
          "filtered: {} matched, {} did not",
          matched.len(),
          rest.len()
        )),
      });
    }

    // Batch mode tests a single representative value.
    let actual = match input {
      Value::Array(records) => records.first().and_then(|r| r.get(&field)),
      Value::Object(_) => input.get(&field),
      _ => None,
    };
    let result = evaluate(actual, operator, expected);

    Ok(HandlerOutput {
      output_data: input.clone(),
      condition_result: Some(result),
      message: Some(format!("condition {} {} = {}", field, operator, result)),
    })
  }
}

/// Adds a configured field to an object input, or to every record of a
/// list input.
struct AddFieldHandler;

#[async_trait]
impl NodeHandler for AddFieldHandler {
  async fn execute(
    &self,
    node: &NodeSpec,
    input: &Value,
    _ctx: &HandlerContext,
  ) -> Result<HandlerOutput, HandlerError> {
    let name = config_str(node, "fieldName").unwrap_or("newField").to_string();
    let value = node
      .config
      .get("fieldValue")
      .cloned()
      .unwrap_or_else(|| json!(""));

    let output = match input {
      Value::Array(records) => {
        let updated: Vec<Value> = records
          .iter()
          .map(|record| match record {
            Value::Object(map) => {
              let mut map = map.clone();
              map.insert(name.clone(), value.clone());
              Value::Object(map)
            }
            other => other.clone(),
          })
          .collect();
        json!(updated)
      }
      Value::Object(map) => {
        let mut map = map.clone();
        map.insert(name.clone(), value.clone());
        Value::Object(map)
      }
      _ => {
        let mut map = Map::new();
        map.insert(name.clone(), value.clone());
        Value::Object(map)
      }
    };

    Ok(HandlerOutput {
      output_data: output,
      condition_result: None,
      message: Some(format!("added field '{}'", name)),
    })
  }
}

/// Combines the labeled `inputA` / `inputB` sides of a join.
///
/// Strategies: `concat` (default) appends the two lists; `mergeByKey`
/// merges each A record with the first B record sharing `joinKey`.
struct JoinHandler;

fn side(input: &Value, key: &str) -> Vec<Value> {
  match input.get(key) {
    Some(Value::Array(items)) => items.clone(),
    Some(Value::Null) | None => Vec::new(),
    Some(other) => vec![other.clone()],
  }
}

#[async_trait]
impl NodeHandler for JoinHandler {
  async fn execute(
    &self,
    node: &NodeSpec,
    input: &Value,
    _ctx: &HandlerContext,
  ) -> Result<HandlerOutput, HandlerError> {
    let strategy = config_str(node, "joinStrategy").unwrap_or("concat");
    let join_key = config_str(node, "joinKey");

    let data_a = side(input, "inputA");
    let data_b = side(input, "inputB");
    let (len_a, len_b) = (data_a.len(), data_b.len());

    let result: Vec<Value> = match (strategy, join_key) {
      ("mergeByKey", Some(key)) => data_a
        .into_iter()
        .map(|a| {
          let matched = data_b
            .iter()
            .find(|b| a.get(key).is_some() && b.get(key) == a.get(key));
          match (a, matched) {
            (Value::Object(mut merged), Some(Value::Object(b))) => {
              for (k, v) in b {
                merged.insert(k.clone(), v.clone());
              }
              Value::Object(merged)
            }
            (a, _) => a,
          }
        })
        .collect(),
      _ => data_a.into_iter().chain(data_b).collect(),
    };

    Ok(HandlerOutput {
      output_data: json!(result),
      condition_result: None,
      message: Some(format!("joined {} + {} = {} records", len_a, len_b, result.len())),
    })
  }
}
