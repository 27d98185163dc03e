//! Engine error types.
//!
//! Node-level failures (handler errors, timeouts, unknown types) are not
//! represented here: they land in a failed
//! [`crate::NodeResult`] and never unwind the run. `EngineError` covers the
//! conditions that stop a run from proceeding at all: infrastructure
//! failures and the trigger channel closing.

use thiserror::Error;
use trellis_workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum EngineError {
  /// Graph-level validation failure (also recorded on the run as `Failed`).
  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  /// The state store rejected a read or write.
  #[error("storage error: {0}")]
  Store(#[from] trellis_store::Error),

  /// A spawned node task panicked or was aborted.
  #[error("task join error: {message}")]
  JoinTask { message: String },

  /// The runner's trigger channel closed.
  #[error("workflow runner channel closed")]
  ChannelClosed,
}
