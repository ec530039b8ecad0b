//! Predefined error names and `ErrorEquals` matching.

pub const ALL: &str = "States.ALL";
pub const RUNTIME: &str = "States.Runtime";
pub const DATA_LIMIT_EXCEEDED: &str = "States.DataLimitExceeded";
pub const HEARTBEAT_TIMEOUT: &str = "States.HeartbeatTimeout";
pub const TIMEOUT: &str = "States.Timeout";
pub const TASK_FAILED: &str = "States.TaskFailed";
pub const NO_CHOICE_MATCHED: &str = "States.NoChoiceMatched";
pub const PERMISSIONS: &str = "States.Permissions";
pub const RESULT_PATH_MATCH_FAILURE: &str = "States.ResultPathMatchFailure";
pub const PARAMETER_PATH_FAILURE: &str = "States.ParameterPathFailure";
pub const BRANCH_FAILED: &str = "States.BranchFailed";
pub const INTRINSIC_FAILURE: &str = "States.IntrinsicFailure";
pub const EXCEED_TOLERATED_FAILURE_THRESHOLD: &str = "States.ExceedToleratedFailureThreshold";
pub const ITEM_READER_FAILED: &str = "States.ItemReaderFailed";
pub const RESULT_WRITER_FAILED: &str = "States.ResultWriterFailed";

/// Errors that end the execution regardless of `Retry` and `Catch`.
pub fn is_terminal(error: &str) -> bool {
  error == RUNTIME || error == DATA_LIMIT_EXCEEDED
}

/// Whether a single `ErrorEquals` entry covers `error`.
///
/// `States.ALL` deliberately does not cover `States.NoChoiceMatched`; that
/// error is only matched by naming it.
pub fn matches(pattern: &str, error: &str) -> bool {
  if is_terminal(error) {
    return false;
  }
  match pattern {
    ALL => error != NO_CHOICE_MATCHED,
    TASK_FAILED => error != TIMEOUT && error != NO_CHOICE_MATCHED,
    exact => exact == error,
  }
}

/// Whether any entry of an `ErrorEquals` list covers `error`.
pub fn matches_any(patterns: &[String], error: &str) -> bool {
  patterns.iter().any(|p| matches(p, error))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_all_matches_user_errors() {
    assert!(matches(ALL, "MyError"));
    assert!(matches(ALL, TIMEOUT));
  }

  #[test]
  fn test_all_does_not_match_no_choice_matched() {
    assert!(!matches(ALL, NO_CHOICE_MATCHED));
    assert!(matches(NO_CHOICE_MATCHED, NO_CHOICE_MATCHED));
  }

  #[test]
  fn test_terminal_errors_never_match() {
    for pattern in [ALL, TASK_FAILED, RUNTIME, DATA_LIMIT_EXCEEDED] {
      assert!(!matches(pattern, RUNTIME));
      assert!(!matches(pattern, DATA_LIMIT_EXCEEDED));
    }
  }

  #[test]
  fn test_task_failed_excludes_timeout() {
    assert!(matches(TASK_FAILED, "Lambda.ServiceException"));
    assert!(matches(TASK_FAILED, HEARTBEAT_TIMEOUT));
    assert!(!matches(TASK_FAILED, TIMEOUT));
  }

  #[test]
  fn test_exact_match() {
    let patterns = vec!["A".to_string(), "B".to_string()];
    assert!(matches_any(&patterns, "B"));
    assert!(!matches_any(&patterns, "C"));
  }
}
