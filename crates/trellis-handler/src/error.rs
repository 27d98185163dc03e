use thiserror::Error;

/// Errors raised by node handlers.
///
/// A handler error is a failed attempt, subject to the dispatcher's retry
/// budget; it never unwinds the run.
#[derive(Debug, Error)]
pub enum HandlerError {
  /// The node config is missing or carries an unusable value.
  #[error("invalid node config: {0}")]
  InvalidConfig(String),

  /// The merged input payload has the wrong shape for this handler.
  #[error("invalid input payload: {0}")]
  InvalidInput(String),

  /// The handler's work itself failed (network error, remote rejection, ...).
  #[error("{0}")]
  Execution(String),
}
