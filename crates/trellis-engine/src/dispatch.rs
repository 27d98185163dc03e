//! Per-node task dispatch.
//!
//! The dispatcher resolves a node's type against the handler registry and
//! drives one node to a terminal [`NodeResult`]: bounded retries with a
//! fixed backoff, a per-invocation timeout, timing, and the append-only
//! running/terminal log entries in the store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use trellis_handler::{HandlerContext, HandlerError, HandlerRegistry};
use trellis_store::{Json, NodeLogEntry, NodeLogStatus, Store};
use trellis_workflow::NodeSpec;

use crate::config::{EngineConfig, UnknownNodePolicy};
use crate::error::EngineError;
use crate::result::NodeResult;

/// Why a single handler invocation failed.
///
/// Any of these consumes one attempt from the node type's retry budget;
/// after the budget is exhausted the last one becomes the node's error.
#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("no handler registered for node type '{0}'")]
  UnknownNodeType(String),

  #[error("handler timed out after {0:?}")]
  Timeout(Duration),

  #[error(transparent)]
  Handler(#[from] HandlerError),
}

/// Resolves node types to handlers and executes single nodes.
///
/// Shared by the run coordinator (one dispatch per node per layer) and the
/// single-node debug surface, which bypasses the coordinator entirely.
pub struct TaskDispatcher {
  registry: HandlerRegistry,
  store: Arc<dyn Store>,
  config: EngineConfig,
}

impl TaskDispatcher {
  pub fn new(registry: HandlerRegistry, store: Arc<dyn Store>, config: EngineConfig) -> Self {
    Self {
      registry,
      store,
      config,
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Execute one node to a terminal result.
  ///
  /// Handler failures, timeouts, and registry misses become a failed
  /// `NodeResult`; only store writes can raise `EngineError`. Exactly one
  /// `Running` and one terminal log entry are written per call.
  #[instrument(
    name = "node_dispatch",
    skip(self, node, input),
    fields(run_id = %run_id, node_id = %node.id, node_type = %node.node_type)
  )]
  pub async fn dispatch(
    &self,
    node: &NodeSpec,
    input: serde_json::Value,
    run_id: &str,
    layer_index: usize,
  ) -> Result<NodeResult, EngineError> {
    let started = Instant::now();

    self
      .append_log(node, run_id, NodeLogStatus::Running, Some(&input), None, None, None)
      .await?;

    info!(input = %input, "node started");

    let outcome = self.run_attempts(node, &input, run_id, layer_index).await;
    let duration_secs = started.elapsed().as_secs_f64();

    let result = match outcome {
      Ok((output_data, condition_result)) => {
        info!(duration_secs, "node completed");
        self
          .append_log(
            node,
            run_id,
            NodeLogStatus::Completed,
            Some(&input),
            Some(&output_data),
            None,
            Some(duration_secs),
          )
          .await?;
        NodeResult {
          node_id: node.id.clone(),
          success: true,
          output_data,
          condition_result,
          error: None,
          duration_secs,
        }
      }
      Err(e) => {
        let message = e.to_string();
        error!(error = %message, duration_secs, "node failed");
        self
          .append_log(
            node,
            run_id,
            NodeLogStatus::Error,
            Some(&input),
            None,
            Some(&message),
            Some(duration_secs),
          )
          .await?;
        NodeResult::failure(&node.id, message, duration_secs)
      }
    };

    Ok(result)
  }

  /// Invoke the handler with retries; the registry miss policy applies
  /// before the first attempt.
  async fn run_attempts(
    &self,
    node: &NodeSpec,
    input: &serde_json::Value,
    run_id: &str,
    layer_index: usize,
  ) -> Result<(serde_json::Value, Option<bool>), DispatchError> {
    let Some(handler) = self.registry.get(&node.node_type) else {
      return match self.config.unknown_node_policy {
        UnknownNodePolicy::Fail => Err(DispatchError::UnknownNodeType(node.node_type.clone())),
        UnknownNodePolicy::PassThrough => {
          warn!("no handler for node type, passing input through");
          Ok((input.clone(), None))
        }
      };
    };

    let ctx = HandlerContext {
      run_id: run_id.to_string(),
      node_id: node.id.clone(),
      layer_index,
    };
    let budget = self.config.retry_budget(&node.node_type);

    let mut attempt = 0;
    loop {
      let invocation = handler.execute(node, input, &ctx);
      let failure = match tokio::time::timeout(self.config.handler_timeout, invocation).await {
        Ok(Ok(output)) => return Ok((output.output_data, output.condition_result)),
        Ok(Err(e)) => DispatchError::Handler(e),
        Err(_) => DispatchError::Timeout(self.config.handler_timeout),
      };

      if attempt >= budget {
        return Err(failure);
      }
      attempt += 1;
      warn!(
        attempt,
        budget,
        error = %failure,
        backoff = ?self.config.retry_backoff,
        "handler attempt failed, retrying"
      );
      tokio::time::sleep(self.config.retry_backoff).await;
    }
  }

  #[allow(clippy::too_many_arguments)]
  async fn append_log(
    &self,
    node: &NodeSpec,
    run_id: &str,
    status: NodeLogStatus,
    input_data: Option<&serde_json::Value>,
    output_data: Option<&serde_json::Value>,
    error: Option<&str>,
    duration_secs: Option<f64>,
  ) -> Result<(), EngineError> {
    let entry = NodeLogEntry {
      log_id: uuid::Uuid::new_v4().to_string(),
      execution_id: run_id.to_string(),
      node_id: node.id.clone(),
      node_type: node.node_type.clone(),
      node_label: node.display_label().to_string(),
      status,
      input_data: input_data.map(|v| Json(v.clone())),
      output_data: output_data.map(|v| Json(v.clone())),
      error: error.map(|e| e.to_string()),
      duration_secs,
      timestamp: Utc::now(),
    };
    self.store.append_node_log(&entry).await?;
    Ok(())
  }
}
