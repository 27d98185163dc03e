//! Run lifecycle events.
//!
//! The coordinator reports progress through an [`ExecutionNotifier`]: one
//! `RunStarted` per run, a started/settled pair per dispatched node, and a
//! single terminal event matching the persisted run status.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// A run has started.
  RunStarted {
    execution_id: String,
    workflow_id: String,
  },

  /// A node has started executing.
  NodeStarted {
    execution_id: String,
    node_id: String,
    layer_index: usize,
  },

  /// A node has completed successfully.
  NodeCompleted {
    execution_id: String,
    node_id: String,
    data: serde_json::Value,
  },

  /// A node has failed. The run keeps going; this does not imply `RunFailed`.
  NodeFailed {
    execution_id: String,
    node_id: String,
    error: String,
  },

  /// All layers finished with every node successful.
  RunCompleted { execution_id: String },

  /// All layers finished but one or more nodes failed.
  RunFailed { execution_id: String, error: String },

  /// The run stopped at a layer boundary after a cancellation request.
  RunCancelled { execution_id: String },
}

/// Receives events as the run coordinator emits them.
///
/// `notify` is called inline from the run loop and must return quickly;
/// implementations that do real work should hand the event off instead.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards every event. The default for `RunCoordinator::new`.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Forwards events into an mpsc channel for asynchronous consumers, such
/// as a websocket bridge or an audit writer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls the layer barrier; volume is
  // bounded at two events per node plus run start and finish.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // A closed channel only means nobody is listening anymore.
    let _ = self.sender.send(event);
  }
}
