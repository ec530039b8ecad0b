use std::time::Duration;

use serde::{Deserialize, Serialize};
use stately_path::Selector;

use crate::error_name;

/// How retry delays are randomized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JitterStrategy {
  /// Multiply each delay by a uniform value in `[0, 1]`.
  Full,
  #[default]
  None,
}

/// A `Retry` entry.
///
/// Optional fields are kept as written so the definition renders back
/// unchanged; the accessor methods apply the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RetryRule {
  pub error_equals: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub interval_seconds: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_attempts: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub backoff_rate: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_delay_seconds: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub jitter_strategy: Option<JitterStrategy>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
}

impl RetryRule {
  pub const DEFAULT_INTERVAL_SECONDS: u64 = 1;
  pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
  pub const DEFAULT_BACKOFF_RATE: f64 = 2.0;

  pub fn new(error_equals: Vec<String>) -> Self {
    Self {
      error_equals,
      interval_seconds: None,
      max_attempts: None,
      backoff_rate: None,
      max_delay_seconds: None,
      jitter_strategy: None,
      comment: None,
    }
  }

  pub fn interval(&self) -> Duration {
    Duration::from_secs(
      self
        .interval_seconds
        .unwrap_or(Self::DEFAULT_INTERVAL_SECONDS),
    )
  }

  /// Retries allowed after the first attempt.
  pub fn attempts_allowed(&self) -> u32 {
    self.max_attempts.unwrap_or(Self::DEFAULT_MAX_ATTEMPTS)
  }

  pub fn backoff(&self) -> f64 {
    self.backoff_rate.unwrap_or(Self::DEFAULT_BACKOFF_RATE)
  }

  pub fn max_delay(&self) -> Option<Duration> {
    self.max_delay_seconds.map(Duration::from_secs)
  }

  pub fn jitter(&self) -> JitterStrategy {
    self.jitter_strategy.unwrap_or_default()
  }

  pub fn matches(&self, error: &str) -> bool {
    error_name::matches_any(&self.error_equals, error)
  }
}

/// A `Catch` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatchRule {
  pub error_equals: Vec<String>,
  pub next: String,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub result_path: Option<Selector>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
}

impl CatchRule {
  pub fn matches(&self, error: &str) -> bool {
    error_name::matches_any(&self.error_equals, error)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_retry_defaults() {
    let rule: RetryRule = serde_json::from_value(json!({"ErrorEquals": ["States.ALL"]})).unwrap();
    assert_eq!(rule.interval(), Duration::from_secs(1));
    assert_eq!(rule.attempts_allowed(), 3);
    assert_eq!(rule.backoff(), 2.0);
    assert_eq!(rule.max_delay(), None);
    assert_eq!(rule.jitter(), JitterStrategy::None);
    assert_eq!(
      serde_json::to_value(&rule).unwrap(),
      json!({"ErrorEquals": ["States.ALL"]})
    );
  }

  #[test]
  fn test_retry_fields() {
    let rule: RetryRule = serde_json::from_value(json!({
      "ErrorEquals": ["Timeout"],
      "IntervalSeconds": 5,
      "MaxAttempts": 0,
      "BackoffRate": 1.5,
      "MaxDelaySeconds": 30,
      "JitterStrategy": "FULL"
    }))
    .unwrap();
    assert_eq!(rule.attempts_allowed(), 0);
    assert_eq!(rule.jitter(), JitterStrategy::Full);
    assert!(rule.matches("Timeout"));
    assert!(!rule.matches("Other"));
  }

  #[test]
  fn test_catch_result_path_null_is_discard() {
    let rule: CatchRule = serde_json::from_value(json!({
      "ErrorEquals": ["States.ALL"],
      "Next": "Recover",
      "ResultPath": null
    }))
    .unwrap();
    assert_eq!(rule.result_path, Some(Selector::Discard));
  }
}
