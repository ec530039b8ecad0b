//! Runtime errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use stately_definition::{ValidationError, error_name};
use stately_path::PathError;

/// Errors raised while building a runtime or talking to it.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// The definition failed validation.
  #[error("invalid state machine definition: {}", summarize(.errors))]
  InvalidDefinition { errors: Vec<ValidationError> },

  /// A custom state type has no registered handler.
  #[error("state '{state}' has type '{type_name}' but no handler is registered for it")]
  MissingCustomHandler { state: String, type_name: String },
}

fn summarize(errors: &[ValidationError]) -> String {
  errors
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

/// A failure as the state machine sees it: an error name plus a cause.
///
/// This is what `Retry` and `Catch` match against and what a failed
/// execution reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "PascalCase")]
pub struct StatesError {
  pub error: String,
  pub cause: String,
}

impl StatesError {
  pub fn new(error: impl Into<String>, cause: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      cause: cause.into(),
    }
  }

  pub fn runtime(cause: impl Into<String>) -> Self {
    Self::new(error_name::RUNTIME, cause)
  }

  pub fn timeout(cause: impl Into<String>) -> Self {
    Self::new(error_name::TIMEOUT, cause)
  }

  pub fn task_failed(cause: impl Into<String>) -> Self {
    Self::new(error_name::TASK_FAILED, cause)
  }

  /// The `{"Error": ..., "Cause": ...}` object a `Catch` injects.
  pub fn to_value(&self) -> Value {
    json!({"Error": self.error, "Cause": self.cause})
  }

  /// Map a path failure in `InputPath`, `OutputPath`, `ItemsPath` and
  /// friends. These end the execution.
  pub(crate) fn from_path(err: PathError) -> Self {
    match err {
      PathError::IntrinsicFailure { .. } => Self::new(error_name::INTRINSIC_FAILURE, err.to_string()),
      PathError::ResultPathMatchFailure { .. } => {
        Self::new(error_name::RESULT_PATH_MATCH_FAILURE, err.to_string())
      }
      _ => Self::runtime(err.to_string()),
    }
  }

  /// Map a failure while building a payload from a template.
  pub(crate) fn from_template(err: PathError) -> Self {
    match err {
      PathError::PathNotFound { .. } => Self::new(error_name::PARAMETER_PATH_FAILURE, err.to_string()),
      other => Self::from_path(other),
    }
  }
}

impl fmt::Display for StatesError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.cause.is_empty() {
      write!(f, "{}", self.error)
    } else {
      write!(f, "{}: {}", self.error, self.cause)
    }
  }
}

/// Why a run stopped early.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Halt {
  Failed(StatesError),
  Aborted,
}

impl From<StatesError> for Halt {
  fn from(err: StatesError) -> Self {
    Halt::Failed(err)
  }
}

/// Errors from the task token callback API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
  /// The token was never issued, already completed, or timed out.
  #[error("task token '{token}' does not match a waiting task")]
  TaskDoesNotExist { token: String },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_states_error_value() {
    let err = StatesError::new("MyError", "it broke");
    assert_eq!(err.to_value(), json!({"Error": "MyError", "Cause": "it broke"}));
    assert_eq!(err.to_string(), "MyError: it broke");
  }

  #[test]
  fn test_path_error_mapping() {
    let missing = PathError::PathNotFound {
      path: "$.x".to_string(),
    };
    assert_eq!(StatesError::from_path(missing.clone()).error, error_name::RUNTIME);
    assert_eq!(
      StatesError::from_template(missing).error,
      error_name::PARAMETER_PATH_FAILURE
    );
  }
}
