//! Workflow runner with channel-based triggering.
//!
//! The `WorkflowRunner` owns one workflow definition and an mpsc channel of
//! trigger payloads; each arrival becomes a coordinated run under a child
//! cancellation token.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use trellis_store::RunStatus;
use trellis_workflow::WorkflowGraph;

use crate::coordinator::RunCoordinator;
use crate::error::EngineError;
use crate::events::ExecutionNotifier;
use crate::result::RunOutcome;

/// Executes one workflow in response to trigger payloads.
///
/// # Usage
///
/// ```ignore
/// let runner = WorkflowRunner::new(workflow, coordinator);
///
/// // Hand the sender to whatever produces triggers (webhooks, UI, polls).
/// let sender = runner.sender();
///
/// let cancel = CancellationToken::new();
/// runner.start(cancel).await?;
/// ```
pub struct WorkflowRunner<N: ExecutionNotifier> {
  sender: mpsc::Sender<serde_json::Value>,
  receiver: mpsc::Receiver<serde_json::Value>,
  workflow: WorkflowGraph,
  coordinator: Arc<RunCoordinator<N>>,
}

impl<N: ExecutionNotifier> WorkflowRunner<N> {
  pub fn new(workflow: WorkflowGraph, coordinator: Arc<RunCoordinator<N>>) -> Self {
    Self::with_buffer_size(workflow, coordinator, 100)
  }

  pub fn with_buffer_size(
    workflow: WorkflowGraph,
    coordinator: Arc<RunCoordinator<N>>,
    buffer_size: usize,
  ) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size);
    Self {
      sender,
      receiver,
      workflow,
      coordinator,
    }
  }

  /// A sender handle for triggering runs.
  pub fn sender(&self) -> mpsc::Sender<serde_json::Value> {
    self.sender.clone()
  }

  /// Enqueue one trigger payload.
  pub async fn run(&self, payload: serde_json::Value) -> Result<(), EngineError> {
    self
      .sender
      .send(payload)
      .await
      .map_err(|_| EngineError::ChannelClosed)
  }

  pub fn workflow(&self) -> &WorkflowGraph {
    &self.workflow
  }

  /// Run the trigger loop until the token fires or the channel closes.
  ///
  /// Each payload executes under a child token, so cancelling the runner
  /// also cancels the run in flight (at its next layer boundary).
  pub async fn start(mut self, cancel: CancellationToken) -> Result<(), EngineError> {
    info!(
        workflow_id = %self.workflow.workflow_id,
        workflow_name = %self.workflow.name,
        "starting workflow runner"
    );

    loop {
      tokio::select! {
          _ = cancel.cancelled() => {
              info!(workflow_id = %self.workflow.workflow_id, "workflow runner cancelled");
              break;
          }
          payload = self.receiver.recv() => {
              match payload {
                  Some(payload) => {
                      let exec_cancel = cancel.child_token();

                      match self.coordinator.execute(&self.workflow, payload, exec_cancel).await {
                          Ok(outcome) => {
                              let level_info = matches!(
                                outcome.status,
                                RunStatus::Completed | RunStatus::Cancelled
                              );
                              if level_info {
                                  info!(
                                      workflow_id = %self.workflow.workflow_id,
                                      execution_id = %outcome.execution_id,
                                      status = ?outcome.status,
                                      nodes_executed = outcome.node_results.len(),
                                      "run settled"
                                  );
                              } else {
                                  error!(
                                      workflow_id = %self.workflow.workflow_id,
                                      execution_id = %outcome.execution_id,
                                      error = outcome.error.as_deref().unwrap_or(""),
                                      "run failed"
                                  );
                              }
                          }
                          Err(e) => {
                              error!(
                                  workflow_id = %self.workflow.workflow_id,
                                  error = %e,
                                  "run aborted on infrastructure fault"
                              );
                          }
                      }
                  }
                  None => {
                      info!(workflow_id = %self.workflow.workflow_id, "workflow runner channel closed");
                      break;
                  }
              }
          }
      }
    }

    Ok(())
  }

  /// Execute a single run synchronously, bypassing the trigger loop.
  pub async fn execute_once(
    &self,
    payload: serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<RunOutcome, EngineError> {
    self.coordinator.execute(&self.workflow, payload, cancel).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::EngineConfig;
  use crate::dispatch::TaskDispatcher;
  use std::time::Duration;
  use trellis_handler::builtin_registry;
  use trellis_store::MemoryStore;
  use trellis_workflow::NodeSpec;

  fn test_workflow() -> WorkflowGraph {
    WorkflowGraph {
      workflow_id: "wf-runner".to_string(),
      name: "Runner Test".to_string(),
      nodes: vec![NodeSpec {
        id: "t1".to_string(),
        node_type: "trigger".to_string(),
        label: None,
        config: serde_json::Map::new(),
      }],
      connections: vec![],
    }
  }

  fn test_runner() -> WorkflowRunner<crate::events::NoopNotifier> {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(TaskDispatcher::new(
      builtin_registry(),
      store.clone(),
      EngineConfig::default(),
    ));
    let coordinator = Arc::new(RunCoordinator::new(dispatcher, store));
    WorkflowRunner::new(test_workflow(), coordinator)
  }

  #[tokio::test]
  async fn run_sends_to_channel() {
    let mut runner = test_runner();

    runner.run(serde_json::json!({"test": "data"})).await.unwrap();

    let received = runner.receiver.recv().await;
    assert!(received.is_some());
    assert_eq!(received.unwrap()["test"], "data");
  }

  #[tokio::test]
  async fn sender_cloning() {
    let runner = test_runner();

    let sender1 = runner.sender();
    let sender2 = runner.sender();

    assert!(!sender1.is_closed());
    assert!(!sender2.is_closed());
  }

  #[tokio::test]
  async fn cancellation_stops_loop() {
    let runner = test_runner();

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let handle = tokio::spawn(async move { runner.start(cancel_clone).await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();

    let result = handle.await.unwrap();
    assert!(result.is_ok());
  }

  #[tokio::test]
  async fn execute_once_completes_trigger_only_workflow() {
    let runner = test_runner();

    let outcome = runner
      .execute_once(serde_json::json!({"hello": "world"}), CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert!(outcome.node_results["t1"].success);
  }
}
