//! Engine errors.

use stately_runtime::{RuntimeError, TokenError};

/// Errors returned by the [`ExecutionService`](crate::ExecutionService).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error("state machine '{name}' is already registered")]
  StateMachineExists { name: String },

  #[error("state machine '{arn}' not found")]
  StateMachineNotFound { arn: String },

  #[error("execution '{execution_id}' already exists")]
  ExecutionExists { execution_id: String },

  #[error("execution '{execution_id}' not found")]
  ExecutionNotFound { execution_id: String },

  /// Stop was requested for an execution that already finished.
  #[error("execution '{execution_id}' is not running")]
  ExecutionNotRunning { execution_id: String },

  /// The state machine could not be built.
  #[error(transparent)]
  Runtime(#[from] RuntimeError),

  #[error(transparent)]
  Token(#[from] TokenError),

  #[error("storage error")]
  Store(#[from] stately_store::Error),

  #[error("stored history is malformed")]
  History(#[from] serde_json::Error),

  /// The runner's channel is closed.
  #[error("execution runner channel closed")]
  RunnerClosed,
}
