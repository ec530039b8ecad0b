//! Choice rules and their boolean condition trees.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stately_path::Path;

/// Comparison operators. The `...Path` spellings are the same operator with an
/// [`Operand::Path`] operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
  StringEquals,
  StringLessThan,
  StringGreaterThan,
  StringLessThanEquals,
  StringGreaterThanEquals,
  StringMatches,
  NumericEquals,
  NumericLessThan,
  NumericGreaterThan,
  NumericLessThanEquals,
  NumericGreaterThanEquals,
  BooleanEquals,
  TimestampEquals,
  TimestampLessThan,
  TimestampGreaterThan,
  TimestampLessThanEquals,
  TimestampGreaterThanEquals,
  IsNull,
  IsPresent,
  IsNumeric,
  IsString,
  IsBoolean,
  IsTimestamp,
}

/// The literal type an operator compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
  String,
  Number,
  Boolean,
  Timestamp,
}

impl Operator {
  const ALL: [Operator; 23] = [
    Operator::StringEquals,
    Operator::StringLessThan,
    Operator::StringGreaterThan,
    Operator::StringLessThanEquals,
    Operator::StringGreaterThanEquals,
    Operator::StringMatches,
    Operator::NumericEquals,
    Operator::NumericLessThan,
    Operator::NumericGreaterThan,
    Operator::NumericLessThanEquals,
    Operator::NumericGreaterThanEquals,
    Operator::BooleanEquals,
    Operator::TimestampEquals,
    Operator::TimestampLessThan,
    Operator::TimestampGreaterThan,
    Operator::TimestampLessThanEquals,
    Operator::TimestampGreaterThanEquals,
    Operator::IsNull,
    Operator::IsPresent,
    Operator::IsNumeric,
    Operator::IsString,
    Operator::IsBoolean,
    Operator::IsTimestamp,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      Operator::StringEquals => "StringEquals",
      Operator::StringLessThan => "StringLessThan",
      Operator::StringGreaterThan => "StringGreaterThan",
      Operator::StringLessThanEquals => "StringLessThanEquals",
      Operator::StringGreaterThanEquals => "StringGreaterThanEquals",
      Operator::StringMatches => "StringMatches",
      Operator::NumericEquals => "NumericEquals",
      Operator::NumericLessThan => "NumericLessThan",
      Operator::NumericGreaterThan => "NumericGreaterThan",
      Operator::NumericLessThanEquals => "NumericLessThanEquals",
      Operator::NumericGreaterThanEquals => "NumericGreaterThanEquals",
      Operator::BooleanEquals => "BooleanEquals",
      Operator::TimestampEquals => "TimestampEquals",
      Operator::TimestampLessThan => "TimestampLessThan",
      Operator::TimestampGreaterThan => "TimestampGreaterThan",
      Operator::TimestampLessThanEquals => "TimestampLessThanEquals",
      Operator::TimestampGreaterThanEquals => "TimestampGreaterThanEquals",
      Operator::IsNull => "IsNull",
      Operator::IsPresent => "IsPresent",
      Operator::IsNumeric => "IsNumeric",
      Operator::IsString => "IsString",
      Operator::IsBoolean => "IsBoolean",
      Operator::IsTimestamp => "IsTimestamp",
    }
  }

  fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|op| op.name() == name)
  }

  /// Whether a `...Path` spelling exists.
  pub fn accepts_path(&self) -> bool {
    !self.is_type_test() && *self != Operator::StringMatches
  }

  /// `IsNull`, `IsPresent`, `IsNumeric`, ...
  pub fn is_type_test(&self) -> bool {
    matches!(
      self,
      Operator::IsNull
        | Operator::IsPresent
        | Operator::IsNumeric
        | Operator::IsString
        | Operator::IsBoolean
        | Operator::IsTimestamp
    )
  }

  pub fn operand_kind(&self) -> OperandKind {
    match self {
      Operator::StringEquals
      | Operator::StringLessThan
      | Operator::StringGreaterThan
      | Operator::StringLessThanEquals
      | Operator::StringGreaterThanEquals
      | Operator::StringMatches => OperandKind::String,
      Operator::NumericEquals
      | Operator::NumericLessThan
      | Operator::NumericGreaterThan
      | Operator::NumericLessThanEquals
      | Operator::NumericGreaterThanEquals => OperandKind::Number,
      Operator::TimestampEquals
      | Operator::TimestampLessThan
      | Operator::TimestampGreaterThan
      | Operator::TimestampLessThanEquals
      | Operator::TimestampGreaterThanEquals => OperandKind::Timestamp,
      _ => OperandKind::Boolean,
    }
  }
}

/// The right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
  Literal(Value),
  Path(Path),
}

/// A comparison leaf: `Variable <operator> operand`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
  pub variable: Path,
  pub operator: Operator,
  pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
  And(Vec<Condition>),
  Or(Vec<Condition>),
  Not(Box<Condition>),
  Compare(Comparison),
}

const RESERVED_KEYS: [&str; 3] = ["Variable", "Next", "Comment"];

impl Condition {
  pub fn from_value(value: &Value) -> Result<Self, String> {
    let map = value
      .as_object()
      .ok_or_else(|| "a choice condition must be an object".to_string())?;

    if let Some(list) = map.get("And") {
      return Self::list("And", list).map(Condition::And);
    }
    if let Some(list) = map.get("Or") {
      return Self::list("Or", list).map(Condition::Or);
    }
    if let Some(inner) = map.get("Not") {
      return Self::from_value(inner).map(|c| Condition::Not(Box::new(c)));
    }

    let variable = map
      .get("Variable")
      .and_then(Value::as_str)
      .ok_or_else(|| "a comparison needs a string \"Variable\"".to_string())?;
    let variable = Path::parse(variable).map_err(|e| e.to_string())?;

    let mut keys = map
      .keys()
      .filter(|k| !RESERVED_KEYS.contains(&k.as_str()));
    let key = keys
      .next()
      .ok_or_else(|| "a comparison needs an operator".to_string())?;
    if let Some(extra) = keys.next() {
      return Err(format!(
        "a comparison takes exactly one operator, found '{key}' and '{extra}'"
      ));
    }
    let literal = &map[key.as_str()];

    if let Some(base) = key.strip_suffix("Path")
      && let Some(operator) = Operator::from_name(base).filter(Operator::accepts_path)
    {
      let raw = literal
        .as_str()
        .ok_or_else(|| format!("'{key}' must hold a path string"))?;
      let path = Path::parse(raw).map_err(|e| e.to_string())?;
      return Ok(Condition::Compare(Comparison {
        variable,
        operator,
        operand: Operand::Path(path),
      }));
    }

    let operator =
      Operator::from_name(key).ok_or_else(|| format!("unknown comparison operator '{key}'"))?;
    check_literal(operator, literal)?;
    Ok(Condition::Compare(Comparison {
      variable,
      operator,
      operand: Operand::Literal(literal.clone()),
    }))
  }

  fn list(name: &str, value: &Value) -> Result<Vec<Condition>, String> {
    let items = value
      .as_array()
      .filter(|items| !items.is_empty())
      .ok_or_else(|| format!("'{name}' must be a non-empty array"))?;
    items.iter().map(Self::from_value).collect()
  }

  pub fn to_value(&self) -> Value {
    match self {
      Condition::And(items) => single("And", Value::Array(items.iter().map(Self::to_value).collect())),
      Condition::Or(items) => single("Or", Value::Array(items.iter().map(Self::to_value).collect())),
      Condition::Not(inner) => single("Not", inner.to_value()),
      Condition::Compare(cmp) => {
        let mut map = Map::new();
        map.insert("Variable".to_string(), Value::String(cmp.variable.to_string()));
        match &cmp.operand {
          Operand::Literal(value) => {
            map.insert(cmp.operator.name().to_string(), value.clone());
          }
          Operand::Path(path) => {
            map.insert(
              format!("{}Path", cmp.operator.name()),
              Value::String(path.to_string()),
            );
          }
        }
        Value::Object(map)
      }
    }
  }

  /// Every path the condition reads, in declaration order.
  pub fn paths(&self) -> Vec<&Path> {
    match self {
      Condition::And(items) | Condition::Or(items) => items.iter().flat_map(Self::paths).collect(),
      Condition::Not(inner) => inner.paths(),
      Condition::Compare(cmp) => {
        let mut paths = vec![&cmp.variable];
        if let Operand::Path(path) = &cmp.operand {
          paths.push(path);
        }
        paths
      }
    }
  }
}

fn single(key: &str, value: Value) -> Value {
  let mut map = Map::new();
  map.insert(key.to_string(), value);
  Value::Object(map)
}

fn check_literal(operator: Operator, literal: &Value) -> Result<(), String> {
  let ok = match operator.operand_kind() {
    OperandKind::String => literal.is_string(),
    OperandKind::Number => literal.is_number(),
    OperandKind::Boolean => literal.is_boolean(),
    OperandKind::Timestamp => literal
      .as_str()
      .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
  };
  if ok {
    Ok(())
  } else {
    Err(format!(
      "'{}' expects a {:?} operand, got {literal}",
      operator.name(),
      operator.operand_kind()
    ))
  }
}

/// A top-level entry of a Choice state's `Choices` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ChoiceRule {
  pub condition: Condition,
  pub next: String,
  pub comment: Option<String>,
}

impl TryFrom<Value> for ChoiceRule {
  type Error = String;

  fn try_from(value: Value) -> Result<Self, Self::Error> {
    let next = value
      .get("Next")
      .and_then(Value::as_str)
      .ok_or_else(|| "a choice rule needs a string \"Next\"".to_string())?
      .to_string();
    let comment = value
      .get("Comment")
      .and_then(Value::as_str)
      .map(str::to_string);
    let condition = Condition::from_value(&value)?;
    Ok(Self {
      condition,
      next,
      comment,
    })
  }
}

impl From<ChoiceRule> for Value {
  fn from(rule: ChoiceRule) -> Self {
    let mut value = rule.condition.to_value();
    if let Value::Object(map) = &mut value {
      map.insert("Next".to_string(), Value::String(rule.next));
      if let Some(comment) = rule.comment {
        map.insert("Comment".to_string(), Value::String(comment));
      }
    }
    value
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_comparison_rule() {
    let rule: ChoiceRule = serde_json::from_value(json!({
      "Variable": "$.status",
      "StringEquals": "FAILED",
      "Next": "jobFailedState"
    }))
    .unwrap();
    assert_eq!(rule.next, "jobFailedState");
    let Condition::Compare(cmp) = &rule.condition else {
      panic!("expected a comparison");
    };
    assert_eq!(cmp.operator, Operator::StringEquals);
    assert_eq!(cmp.operand, Operand::Literal(json!("FAILED")));
  }

  #[test]
  fn test_path_operand() {
    let rule: ChoiceRule = serde_json::from_value(json!({
      "Variable": "$.a",
      "NumericGreaterThanPath": "$.b",
      "Next": "X"
    }))
    .unwrap();
    let Condition::Compare(cmp) = &rule.condition else {
      panic!("expected a comparison");
    };
    assert_eq!(cmp.operator, Operator::NumericGreaterThan);
    assert_eq!(cmp.operand, Operand::Path(Path::parse("$.b").unwrap()));
  }

  #[test]
  fn test_nested_round_trip() {
    let source = json!({
      "And": [
        {"Variable": "$.n", "NumericGreaterThanEquals": 20},
        {"Not": {"Variable": "$.type", "StringMatches": "*.log"}},
        {"Or": [
          {"Variable": "$.flag", "IsPresent": true},
          {"Variable": "$.when", "TimestampLessThan": "2024-01-01T00:00:00Z"}
        ]}
      ],
      "Next": "Done",
      "Comment": "nested"
    });
    let rule: ChoiceRule = serde_json::from_value(source.clone()).unwrap();
    assert_eq!(serde_json::to_value(&rule).unwrap(), source);
    assert_eq!(rule.condition.paths().len(), 4);
  }

  #[test]
  fn test_invalid_rules() {
    let cases = [
      json!({"Variable": "$.a", "Next": "X"}),
      json!({"Variable": "$.a", "StringEquals": 1, "Next": "X"}),
      json!({"Variable": "$.a", "StringEquals": "x", "NumericEquals": 1, "Next": "X"}),
      json!({"Variable": "$.a", "Bogus": 1, "Next": "X"}),
      json!({"Variable": "$.a", "IsNullPath": "$.b", "Next": "X"}),
      json!({"Variable": "$.a", "TimestampEquals": "yesterday", "Next": "X"}),
      json!({"And": [], "Next": "X"}),
      json!({"Variable": "$.a", "StringEquals": "x"}),
    ];
    for case in cases {
      assert!(
        serde_json::from_value::<ChoiceRule>(case.clone()).is_err(),
        "{case} should be rejected"
      );
    }
  }
}
