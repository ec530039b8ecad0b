//! Choice rule evaluation.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use stately_definition::{ChoiceState, Comparison, Condition, Operand, Operator, error_name};

use crate::error::StatesError;

/// Pick the next state: the first matching rule, else `Default`.
pub(crate) fn choose<'a>(
  state: &'a ChoiceState,
  input: &Value,
  context: &Value,
) -> Result<&'a str, StatesError> {
  for rule in &state.choices {
    if evaluate(&rule.condition, input, context)? {
      return Ok(&rule.next);
    }
  }
  state.default.as_deref().ok_or_else(|| {
    StatesError::new(
      error_name::NO_CHOICE_MATCHED,
      "no choice rule matched and no Default is set",
    )
  })
}

pub(crate) fn evaluate(
  condition: &Condition,
  input: &Value,
  context: &Value,
) -> Result<bool, StatesError> {
  match condition {
    Condition::And(all) => {
      for c in all {
        if !evaluate(c, input, context)? {
          return Ok(false);
        }
      }
      Ok(true)
    }
    Condition::Or(any) => {
      for c in any {
        if evaluate(c, input, context)? {
          return Ok(true);
        }
      }
      Ok(false)
    }
    Condition::Not(inner) => Ok(!evaluate(inner, input, context)?),
    Condition::Compare(comparison) => compare(comparison, input, context),
  }
}

fn compare(comparison: &Comparison, input: &Value, context: &Value) -> Result<bool, StatesError> {
  let Comparison {
    variable,
    operator,
    operand,
  } = comparison;

  if *operator == Operator::IsPresent {
    let present = variable.is_present(input, context);
    return Ok(present == expected_flag(operand));
  }

  let value = variable.evaluate(input, context).map_err(StatesError::from_path)?;

  if operator.is_type_test() {
    let holds = match operator {
      Operator::IsNull => value.is_null(),
      Operator::IsNumeric => value.is_number(),
      Operator::IsString => value.is_string(),
      Operator::IsBoolean => value.is_boolean(),
      Operator::IsTimestamp => value.as_str().and_then(parse_timestamp).is_some(),
      _ => false,
    };
    return Ok(holds == expected_flag(operand));
  }

  let other = match operand {
    Operand::Literal(literal) => literal.clone(),
    Operand::Path(path) => path.evaluate(input, context).map_err(StatesError::from_path)?,
  };

  let result = match operator {
    Operator::StringEquals => ordering_str(&value, &other).map(Ordering::is_eq),
    Operator::StringLessThan => ordering_str(&value, &other).map(Ordering::is_lt),
    Operator::StringGreaterThan => ordering_str(&value, &other).map(Ordering::is_gt),
    Operator::StringLessThanEquals => ordering_str(&value, &other).map(Ordering::is_le),
    Operator::StringGreaterThanEquals => ordering_str(&value, &other).map(Ordering::is_ge),
    Operator::StringMatches => match (value.as_str(), other.as_str()) {
      (Some(text), Some(pattern)) => Some(glob_matches(pattern, text)),
      _ => None,
    },
    Operator::NumericEquals => ordering_num(&value, &other).map(Ordering::is_eq),
    Operator::NumericLessThan => ordering_num(&value, &other).map(Ordering::is_lt),
    Operator::NumericGreaterThan => ordering_num(&value, &other).map(Ordering::is_gt),
    Operator::NumericLessThanEquals => ordering_num(&value, &other).map(Ordering::is_le),
    Operator::NumericGreaterThanEquals => ordering_num(&value, &other).map(Ordering::is_ge),
    Operator::BooleanEquals => match (value.as_bool(), other.as_bool()) {
      (Some(a), Some(b)) => Some(a == b),
      _ => None,
    },
    Operator::TimestampEquals => ordering_time(&value, &other).map(Ordering::is_eq),
    Operator::TimestampLessThan => ordering_time(&value, &other).map(Ordering::is_lt),
    Operator::TimestampGreaterThan => ordering_time(&value, &other).map(Ordering::is_gt),
    Operator::TimestampLessThanEquals => ordering_time(&value, &other).map(Ordering::is_le),
    Operator::TimestampGreaterThanEquals => ordering_time(&value, &other).map(Ordering::is_ge),
    _ => None,
  };
  // Mismatched types never match.
  Ok(result.unwrap_or(false))
}

fn expected_flag(operand: &Operand) -> bool {
  match operand {
    Operand::Literal(value) => value.as_bool().unwrap_or(true),
    Operand::Path(_) => true,
  }
}

fn ordering_str(a: &Value, b: &Value) -> Option<Ordering> {
  Some(a.as_str()?.cmp(b.as_str()?))
}

fn ordering_num(a: &Value, b: &Value) -> Option<Ordering> {
  a.as_f64()?.partial_cmp(&b.as_f64()?)
}

fn ordering_time(a: &Value, b: &Value) -> Option<Ordering> {
  let a = parse_timestamp(a.as_str()?)?;
  let b = parse_timestamp(b.as_str()?)?;
  Some(a.cmp(&b))
}

fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
  DateTime::parse_from_rfc3339(text).ok()
}

/// `*` matches any run of characters; `\*` and `\\` are literal.
fn glob_matches(pattern: &str, text: &str) -> bool {
  enum Token {
    Literal(char),
    Star,
  }

  let mut tokens = Vec::new();
  let mut chars = pattern.chars();
  while let Some(c) = chars.next() {
    match c {
      '\\' => match chars.next() {
        Some(escaped) => tokens.push(Token::Literal(escaped)),
        None => tokens.push(Token::Literal('\\')),
      },
      '*' => tokens.push(Token::Star),
      other => tokens.push(Token::Literal(other)),
    }
  }

  let text: Vec<char> = text.chars().collect();
  let (mut t, mut p) = (0, 0);
  let mut backtrack: Option<(usize, usize)> = None;
  while t < text.len() {
    match tokens.get(p) {
      Some(Token::Star) => {
        backtrack = Some((p, t));
        p += 1;
      }
      Some(Token::Literal(c)) if *c == text[t] => {
        p += 1;
        t += 1;
      }
      _ => match backtrack {
        Some((star, matched)) => {
          p = star + 1;
          t = matched + 1;
          backtrack = Some((star, matched + 1));
        }
        None => return false,
      },
    }
  }
  tokens[p..].iter().all(|token| matches!(token, Token::Star))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn state(value: Value) -> ChoiceState {
    serde_json::from_value(value).unwrap()
  }

  fn holds(rule: Value, input: Value) -> Result<bool, StatesError> {
    let mut rule = rule;
    rule["Next"] = json!("X");
    let rule: stately_definition::ChoiceRule = serde_json::from_value(rule).unwrap();
    evaluate(&rule.condition, &input, &json!({}))
  }

  #[test]
  fn test_first_match_wins() {
    let choice = state(json!({
      "Choices": [
        {"Variable": "$.status", "StringEquals": "FAILED", "Next": "jobFailedState"},
        {"Variable": "$.status", "StringEquals": "SUCCEEDED", "Next": "jobSucceededState"}
      ],
      "Default": "waitState"
    }));
    let next = choose(&choice, &json!({"status": "FAILED"}), &json!({})).unwrap();
    assert_eq!(next, "jobFailedState");
    let next = choose(&choice, &json!({"status": "RUNNING"}), &json!({})).unwrap();
    assert_eq!(next, "waitState");
  }

  #[test]
  fn test_overlapping_rules_pick_first_declared() {
    let large_first = state(json!({
      "Choices": [
        {"Variable": "$.n", "NumericGreaterThan": 100, "Next": "Large"},
        {"Variable": "$.n", "NumericGreaterThan": 10, "Next": "Medium"}
      ],
      "Default": "Small"
    }));
    let medium_first = state(json!({
      "Choices": [
        {"Variable": "$.n", "NumericGreaterThan": 10, "Next": "Medium"},
        {"Variable": "$.n", "NumericGreaterThan": 100, "Next": "Large"}
      ],
      "Default": "Small"
    }));
    let input = json!({"n": 500});
    assert_eq!(choose(&large_first, &input, &json!({})).unwrap(), "Large");
    assert_eq!(choose(&medium_first, &input, &json!({})).unwrap(), "Medium");
  }

  #[test]
  fn test_disjoint_rule_order_does_not_change_choice() {
    let rules = [
      json!({"Variable": "$.status", "StringEquals": "FAILED", "Next": "Failed"}),
      json!({"Variable": "$.status", "StringEquals": "SUCCEEDED", "Next": "Succeeded"}),
      json!({"Variable": "$.status", "StringEquals": "RUNNING", "Next": "Running"}),
    ];
    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

    for (status, expected) in [
      ("FAILED", "Failed"),
      ("SUCCEEDED", "Succeeded"),
      ("RUNNING", "Running"),
      ("PENDING", "Wait"),
    ] {
      let input = json!({"status": status});
      for order in &orders {
        let choices: Vec<Value> = order.iter().map(|&i| rules[i].clone()).collect();
        let choice = state(json!({"Choices": choices, "Default": "Wait"}));
        assert_eq!(
          choose(&choice, &input, &json!({})).unwrap(),
          expected,
          "order {order:?}"
        );
      }
    }
  }

  #[test]
  fn test_no_match_without_default() {
    let choice = state(json!({
      "Choices": [{"Variable": "$.n", "NumericEquals": 1, "Next": "One"}]
    }));
    let err = choose(&choice, &json!({"n": 2}), &json!({})).unwrap_err();
    assert_eq!(err.error, error_name::NO_CHOICE_MATCHED);
  }

  #[test]
  fn test_boolean_combinators() {
    let rule = json!({
      "And": [
        {"Variable": "$.n", "NumericGreaterThanEquals": 10},
        {"Not": {"Variable": "$.tag", "StringEquals": "skip"}},
        {"Or": [
          {"Variable": "$.flag", "BooleanEquals": true},
          {"Variable": "$.n", "NumericLessThan": 0}
        ]}
      ]
    });
    assert!(holds(rule.clone(), json!({"n": 10, "tag": "go", "flag": true})).unwrap());
    assert!(!holds(rule, json!({"n": 10, "tag": "skip", "flag": true})).unwrap());
  }

  #[test]
  fn test_path_operand_and_type_mismatch() {
    let rule = json!({"Variable": "$.a", "NumericLessThanPath": "$.b"});
    assert!(holds(rule, json!({"a": 1, "b": 2})).unwrap());
    let rule = json!({"Variable": "$.a", "StringEquals": "1"});
    assert!(!holds(rule, json!({"a": 1})).unwrap());
  }

  #[test]
  fn test_type_tests() {
    assert!(holds(json!({"Variable": "$.x", "IsPresent": false}), json!({})).unwrap());
    assert!(holds(json!({"Variable": "$.x", "IsNull": true}), json!({"x": null})).unwrap());
    assert!(
      holds(
        json!({"Variable": "$.x", "IsTimestamp": true}),
        json!({"x": "2024-01-01T00:00:00Z"})
      )
      .unwrap()
    );
    assert!(holds(json!({"Variable": "$.x", "IsString": false}), json!({"x": 3})).unwrap());
  }

  #[test]
  fn test_missing_variable_is_runtime_error() {
    let err = holds(json!({"Variable": "$.missing", "StringEquals": "a"}), json!({})).unwrap_err();
    assert_eq!(err.error, error_name::RUNTIME);
  }

  #[test]
  fn test_timestamps_compare_across_offsets() {
    let rule = json!({"Variable": "$.t", "TimestampEquals": "2024-01-01T01:00:00+01:00"});
    assert!(holds(rule, json!({"t": "2024-01-01T00:00:00Z"})).unwrap());
  }

  #[test]
  fn test_glob() {
    assert!(glob_matches("log-*.txt", "log-2024.txt"));
    assert!(glob_matches("*", ""));
    assert!(glob_matches("a*b*c", "aXXbYYc"));
    assert!(!glob_matches("a*b", "aXXc"));
    assert!(glob_matches(r"literal\*", "literal*"));
    assert!(!glob_matches(r"literal\*", "literalX"));
  }
}
