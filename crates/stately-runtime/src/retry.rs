//! Retry decisions for one state entry.

use std::time::Duration;

use stately_definition::{JitterStrategy, RetryRule, error_name};
use stately_path::RandomSource;

/// Tracks how often each retrier of a state has fired.
///
/// Counters live for one entry into the state; re-entering the state through
/// a loop starts fresh.
#[derive(Debug)]
pub struct Retrier<'a> {
  rules: &'a [RetryRule],
  attempts: Vec<u32>,
  retries: u32,
}

impl<'a> Retrier<'a> {
  pub fn new(rules: &'a [RetryRule]) -> Self {
    Self {
      rules,
      attempts: vec![0; rules.len()],
      retries: 0,
    }
  }

  /// Retries performed so far across all rules (`$$.State.RetryCount`).
  pub fn retry_count(&self) -> u32 {
    self.retries
  }

  /// Decide whether a failure with `error` is retried.
  ///
  /// Only the first rule whose `ErrorEquals` matches is considered. Returns
  /// the delay before the next attempt, or `None` once that rule is used up.
  pub fn next_delay(&mut self, error: &str, random: &dyn RandomSource) -> Option<Duration> {
    if error_name::is_terminal(error) {
      return None;
    }
    let index = self.rules.iter().position(|rule| rule.matches(error))?;
    let rule = &self.rules[index];
    if self.attempts[index] >= rule.attempts_allowed() {
      return None;
    }
    self.attempts[index] += 1;
    self.retries += 1;
    Some(backoff_delay(rule, self.attempts[index], random))
  }
}

/// Delay before retry number `retry` (1-based) under `rule`:
/// `min(interval * rate^(retry - 1), max_delay)`, scaled by a uniform random
/// factor when jitter is `FULL`.
pub fn backoff_delay(rule: &RetryRule, retry: u32, random: &dyn RandomSource) -> Duration {
  let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
  let mut seconds = rule.interval().as_secs_f64() * rule.backoff().powi(exponent);
  if let Some(max) = rule.max_delay() {
    seconds = seconds.min(max.as_secs_f64());
  }
  if rule.jitter() == JitterStrategy::Full {
    seconds *= random.next_f64();
  }
  Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
  use super::*;
  use stately_path::FixedRandom;

  fn rule(value: serde_json::Value) -> RetryRule {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_exponential_backoff() {
    let rule = rule(serde_json::json!({
      "ErrorEquals": ["States.ALL"],
      "IntervalSeconds": 2,
      "BackoffRate": 2.0,
      "MaxAttempts": 5
    }));
    let random = FixedRandom(0.5);
    assert_eq!(backoff_delay(&rule, 1, &random), Duration::from_secs(2));
    assert_eq!(backoff_delay(&rule, 2, &random), Duration::from_secs(4));
    assert_eq!(backoff_delay(&rule, 3, &random), Duration::from_secs(8));
  }

  #[test]
  fn test_max_delay_and_jitter() {
    let rule = rule(serde_json::json!({
      "ErrorEquals": ["States.ALL"],
      "IntervalSeconds": 10,
      "BackoffRate": 3.0,
      "MaxDelaySeconds": 20,
      "JitterStrategy": "FULL"
    }));
    assert_eq!(
      backoff_delay(&rule, 4, &FixedRandom(0.5)),
      Duration::from_secs(10)
    );
    assert_eq!(backoff_delay(&rule, 4, &FixedRandom(0.0)), Duration::ZERO);
  }

  #[test]
  fn test_attempts_are_counted_per_rule() {
    let rules = vec![
      rule(serde_json::json!({"ErrorEquals": ["Flaky"], "MaxAttempts": 2, "IntervalSeconds": 1})),
      rule(serde_json::json!({"ErrorEquals": ["States.ALL"], "MaxAttempts": 1, "IntervalSeconds": 1})),
    ];
    let random = FixedRandom(0.0);
    let mut retrier = Retrier::new(&rules);

    assert!(retrier.next_delay("Flaky", &random).is_some());
    assert!(retrier.next_delay("Other", &random).is_some());
    assert!(retrier.next_delay("Flaky", &random).is_some());
    assert_eq!(retrier.next_delay("Flaky", &random), None);
    assert_eq!(retrier.next_delay("Other", &random), None);
    assert_eq!(retrier.retry_count(), 3);
  }

  #[test]
  fn test_terminal_errors_are_never_retried() {
    let rules = vec![rule(serde_json::json!({"ErrorEquals": ["States.ALL"]}))];
    let mut retrier = Retrier::new(&rules);
    assert_eq!(
      retrier.next_delay(error_name::RUNTIME, &FixedRandom(0.0)),
      None
    );
    assert_eq!(
      retrier.next_delay(error_name::DATA_LIMIT_EXCEEDED, &FixedRandom(0.0)),
      None
    );
  }

  #[test]
  fn test_zero_max_attempts() {
    let rules = vec![rule(serde_json::json!({"ErrorEquals": ["E"], "MaxAttempts": 0}))];
    let mut retrier = Retrier::new(&rules);
    assert_eq!(retrier.next_delay("E", &FixedRandom(0.0)), None);
  }
}
