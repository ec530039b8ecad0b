use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading or writing a definition document.
#[derive(Debug, Error)]
pub enum DefinitionError {
  #[error("invalid state machine definition: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("state machine definition failed validation: {}", join(.0))]
  Invalid(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
  errors
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

/// What kind of rule a definition broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
  MissingStartAt,
  DanglingTransition,
  CrossGraphTransition,
  DanglingCatchTarget,
  MissingChoiceDefault,
  InvalidTransition,
  DuplicateStateName,
  InvalidStateName,
  UnreachableState,
  NoTerminalReachable,
  InvalidPath,
  InvalidRetry,
  InvalidErrorEquals,
  InvalidField,
  UnsupportedStateType,
}

/// A single problem found in a definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidationError {
  /// Where the problem is, e.g. `States.Fanout.Branches[0].States.Step`.
  pub location: String,
  pub kind: ValidationErrorKind,
  pub message: String,
}

impl ValidationError {
  pub fn new(
    location: impl Into<String>,
    kind: ValidationErrorKind,
    message: impl Into<String>,
  ) -> Self {
    Self {
      location: location.into(),
      kind,
      message: message.into(),
    }
  }
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.location, self.message)
  }
}
