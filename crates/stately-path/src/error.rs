//! Path and intrinsic errors.

/// Errors raised while parsing or evaluating paths, payload templates and
/// intrinsic functions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
  /// The path expression is malformed.
  #[error("invalid path '{path}': {message}")]
  InvalidPath { path: String, message: String },

  /// The intrinsic function expression is malformed.
  #[error("invalid intrinsic function '{expression}': {message}")]
  InvalidIntrinsic { expression: String, message: String },

  /// A definite path matched nothing in the document.
  #[error("path '{path}' did not match any value in the input")]
  PathNotFound { path: String },

  /// An intrinsic function rejected its arguments at evaluation time.
  #[error("{function} failed: {message}")]
  IntrinsicFailure { function: String, message: String },

  /// A result could not be placed into the document.
  #[error("unable to apply result path '{path}': {message}")]
  ResultPathMatchFailure { path: String, message: String },
}

impl PathError {
  pub(crate) fn invalid(path: &str, message: impl Into<String>) -> Self {
    Self::InvalidPath {
      path: path.to_string(),
      message: message.into(),
    }
  }

  pub(crate) fn intrinsic(function: &str, message: impl Into<String>) -> Self {
    Self::IntrinsicFailure {
      function: function.to_string(),
      message: message.into(),
    }
  }
}
