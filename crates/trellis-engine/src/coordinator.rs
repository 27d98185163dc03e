//! Layered run coordination.
//!
//! The `RunCoordinator` drives one workflow run end to end: it persists the
//! run record, validates the graph, then walks the execution layers,
//! dispatching every node in a layer concurrently and waiting at the layer
//! barrier before moving on. A failed node never stops the run; its children
//! simply see no contribution from it. Cancellation is cooperative and only
//! takes effect between layers, so in-flight nodes always settle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use trellis_store::{ExecutionRun, RunStatus, Store};
use trellis_workflow::{WorkflowError, WorkflowGraph};

use crate::dispatch::TaskDispatcher;
use crate::error::EngineError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::merge::merge_inputs;
use crate::result::{NodeResult, RunOutcome};

/// Coordinates a single workflow run over a shared dispatcher and store.
///
/// Generic over `N: ExecutionNotifier` to allow different notification
/// strategies. Use `RunCoordinator::new()` for a default coordinator with
/// no-op notifications, or `with_notifier()` to provide a custom notifier.
pub struct RunCoordinator<N: ExecutionNotifier = NoopNotifier> {
  dispatcher: Arc<TaskDispatcher>,
  store: Arc<dyn Store>,
  notifier: N,
}

impl RunCoordinator<NoopNotifier> {
  /// Create a coordinator with no-op notifications.
  pub fn new(dispatcher: Arc<TaskDispatcher>, store: Arc<dyn Store>) -> Self {
    Self::with_notifier(dispatcher, store, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> RunCoordinator<N> {
  /// Create a coordinator with a custom notifier.
  pub fn with_notifier(dispatcher: Arc<TaskDispatcher>, store: Arc<dyn Store>, notifier: N) -> Self {
    Self {
      dispatcher,
      store,
      notifier,
    }
  }

  /// Execute a workflow run to a terminal status.
  ///
  /// Returns `Ok` for every run-terminal outcome (`Completed`, `Failed`,
  /// `Cancelled`); `Err` is reserved for infrastructure faults (store
  /// writes, task join errors).
  #[instrument(
    name = "workflow_run",
    skip(self, workflow, inputs, cancel),
    fields(workflow_id = %workflow.workflow_id)
  )]
  pub async fn execute(
    &self,
    workflow: &WorkflowGraph,
    inputs: serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, EngineError> {
    let execution_id = uuid::Uuid::new_v4().to_string();

    let run = ExecutionRun::new(&execution_id, &workflow.workflow_id, inputs.clone());
    self.store.create_run(&run).await?;
    self.store.mark_run_started(&execution_id, Utc::now()).await?;

    self.notifier.notify(ExecutionEvent::RunStarted {
      execution_id: execution_id.clone(),
      workflow_id: workflow.workflow_id.clone(),
    });

    info!(execution_id, "run started");

    // Any graph fault fails the run before a single node dispatches.
    let layers = match self.plan(workflow) {
      Ok(layers) => layers,
      Err(e) => {
        return self
          .finish(&execution_id, RunStatus::Failed, Some(e.to_string()), HashMap::new())
          .await;
      }
    };

    let mut workflow = workflow.clone();
    if let serde_json::Value::Object(map) = &inputs {
      workflow.seed_manual_inputs(map);
    }

    let mut results: HashMap<String, NodeResult> = HashMap::new();

    for (layer_index, layer) in layers.iter().enumerate() {
      if self.cancellation_requested(&execution_id, &cancel).await {
        info!(execution_id, layer_index, "cancellation honored at layer boundary");
        return self.finish(&execution_id, RunStatus::Cancelled, None, results).await;
      }

      let mut handles = Vec::with_capacity(layer.len());
      for node_id in layer {
        // Planner ids come from the validated graph, so the lookup holds.
        let Some(node) = workflow.get_node(node_id) else {
          continue;
        };
        let input = merge_inputs(node_id, layer_index, &inputs, &workflow, &results);

        self.store.set_current_node(&execution_id, node_id).await?;
        self.notifier.notify(ExecutionEvent::NodeStarted {
          execution_id: execution_id.clone(),
          node_id: node_id.clone(),
          layer_index,
        });

        let dispatcher = self.dispatcher.clone();
        let node = node.clone();
        let execution_id = execution_id.clone();
        handles.push(tokio::spawn(async move {
          dispatcher.dispatch(&node, input, &execution_id, layer_index).await
        }));
      }

      // Layer barrier: every node settles before the next layer is planned.
      for joined in futures::future::join_all(handles).await {
        let result = joined.map_err(|e| EngineError::JoinTask {
          message: e.to_string(),
        })??;

        match &result.error {
          None => self.notifier.notify(ExecutionEvent::NodeCompleted {
            execution_id: execution_id.clone(),
            node_id: result.node_id.clone(),
            data: result.output_data.clone(),
          }),
          Some(error) => {
            warn!(execution_id, node_id = %result.node_id, error, "node failed, run continues");
            self.notifier.notify(ExecutionEvent::NodeFailed {
              execution_id: execution_id.clone(),
              node_id: result.node_id.clone(),
              error: error.clone(),
            });
          }
        }
        results.insert(result.node_id.clone(), result);
      }
    }

    let failed = {
      let mut ids: Vec<&str> = results
        .values()
        .filter(|r| !r.success)
        .map(|r| r.node_id.as_str())
        .collect();
      ids.sort();
      ids
    };

    if failed.is_empty() {
      self.finish(&execution_id, RunStatus::Completed, None, results).await
    } else {
      let error = format!("Nodes failed: {}", failed.join(", "));
      self.finish(&execution_id, RunStatus::Failed, Some(error), results).await
    }
  }

  /// Validate the graph and compute its execution layers.
  fn plan(&self, workflow: &WorkflowGraph) -> Result<Vec<Vec<String>>, WorkflowError> {
    workflow.validate()?;
    workflow.starting_nodes()?;
    workflow.execution_layers()
  }

  /// True when either the caller's token or the stored flag asks us to stop.
  async fn cancellation_requested(&self, execution_id: &str, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
      return true;
    }
    match self.store.get_run(execution_id).await {
      Ok(run) => run.cancel_requested,
      // A read fault here must not wedge the run; the next boundary retries.
      Err(e) => {
        warn!(execution_id, error = %e, "cancellation poll failed");
        false
      }
    }
  }

  /// Persist the terminal status and emit the matching event.
  async fn finish(
    &self,
    execution_id: &str,
    status: RunStatus,
    error: Option<String>,
    results: HashMap<String, NodeResult>,
  ) -> Result<RunOutcome, EngineError> {
    let node_results = serde_json::to_value(&results).unwrap_or(serde_json::Value::Null);
    self
      .store
      .mark_run_finished(
        execution_id,
        status,
        error.as_deref(),
        Some(&node_results),
        Utc::now(),
      )
      .await?;

    let event = match status {
      RunStatus::Completed => ExecutionEvent::RunCompleted {
        execution_id: execution_id.to_string(),
      },
      RunStatus::Cancelled => ExecutionEvent::RunCancelled {
        execution_id: execution_id.to_string(),
      },
      _ => ExecutionEvent::RunFailed {
        execution_id: execution_id.to_string(),
        error: error.clone().unwrap_or_default(),
      },
    };
    self.notifier.notify(event);

    info!(execution_id, ?status, "run finished");

    Ok(RunOutcome {
      execution_id: execution_id.to_string(),
      status,
      error,
      node_results: results,
    })
  }
}
