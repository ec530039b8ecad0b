use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DefinitionError;
use crate::state::State;

/// A set of named states with an entry point: the top level of a machine,
/// a Parallel branch, or a Map item processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateGraph {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  pub start_at: String,
  pub states: BTreeMap<String, State>,
}

impl StateGraph {
  pub fn get(&self, name: &str) -> Option<&State> {
    self.states.get(name)
  }
}

/// A parsed state machine definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateMachineDefinition {
  #[serde(flatten)]
  pub graph: StateGraph,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  /// Execution-wide limit; the execution times out once it is exceeded.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_seconds: Option<u64>,
}

impl StateMachineDefinition {
  /// Parse a definition from ASL JSON text.
  pub fn from_json(text: &str) -> Result<Self, DefinitionError> {
    Ok(serde_json::from_str(text)?)
  }

  pub fn from_value(value: Value) -> Result<Self, DefinitionError> {
    Ok(serde_json::from_value(value)?)
  }

  pub fn to_value(&self) -> Result<Value, DefinitionError> {
    Ok(serde_json::to_value(self)?)
  }

  /// Render the definition back to pretty-printed ASL JSON.
  pub fn render(&self) -> Result<String, DefinitionError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn start_at(&self) -> &str {
    &self.graph.start_at
  }

  pub fn states(&self) -> &BTreeMap<String, State> {
    &self.graph.states
  }

  /// Find a state by name in the top-level graph.
  pub fn get_state(&self, name: &str) -> Option<&State> {
    self.graph.get(name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn sample() -> Value {
    json!({
      "Comment": "Order pipeline",
      "StartAt": "Validate",
      "TimeoutSeconds": 300,
      "Version": "1.0",
      "States": {
        "Validate": {
          "Type": "Task",
          "Resource": "arn:aws:states:::lambda:invoke",
          "Parameters": {"FunctionName": "validate", "Payload.$": "$"},
          "ResultSelector": {"body.$": "$.Payload"},
          "ResultPath": "$.validation",
          "Retry": [{
            "ErrorEquals": ["States.TaskFailed"],
            "IntervalSeconds": 2,
            "MaxAttempts": 4,
            "BackoffRate": 1.5,
            "JitterStrategy": "FULL"
          }],
          "Catch": [{"ErrorEquals": ["States.ALL"], "ResultPath": "$.error", "Next": "Rejected"}],
          "Next": "Route"
        },
        "Route": {
          "Type": "Choice",
          "Choices": [
            {"Variable": "$.validation.body.ok", "BooleanEquals": true, "Next": "Fanout"}
          ],
          "Default": "Rejected"
        },
        "Fanout": {
          "Type": "Parallel",
          "Branches": [
            {"StartAt": "Ship", "States": {"Ship": {"Type": "Pass", "Result": "shipped", "End": true}}},
            {"StartAt": "Bill", "States": {"Bill": {"Type": "Wait", "Seconds": 1, "End": true}}}
          ],
          "ResultPath": null,
          "Next": "Items"
        },
        "Items": {
          "Type": "Map",
          "ItemsPath": "$.items",
          "MaxConcurrency": 2,
          "ItemSelector": {"sku.$": "$$.Map.Item.Value.sku"},
          "ItemProcessor": {
            "ProcessorConfig": {"Mode": "INLINE"},
            "StartAt": "Pick",
            "States": {"Pick": {"Type": "Pass", "End": true}}
          },
          "ToleratedFailurePercentage": 10.0,
          "OutputPath": "$.items",
          "Next": "Done"
        },
        "Rejected": {"Type": "Fail", "Error": "Rejected", "CausePath": "$.error.Cause"},
        "Done": {"Type": "Succeed"}
      }
    })
  }

  #[test]
  fn test_render_parse_round_trip() {
    let source = sample();
    let definition = StateMachineDefinition::from_value(source.clone()).unwrap();
    assert_eq!(definition.to_value().unwrap(), source);

    let reparsed = StateMachineDefinition::from_json(&definition.render().unwrap()).unwrap();
    assert_eq!(reparsed, definition);
  }

  #[test]
  fn test_accessors() {
    let definition = StateMachineDefinition::from_value(sample()).unwrap();
    assert_eq!(definition.start_at(), "Validate");
    assert_eq!(definition.states().len(), 6);
    assert_eq!(definition.timeout_seconds, Some(300));
    assert_eq!(definition.get_state("Route").map(State::type_name), Some("Choice"));
  }

  #[test]
  fn test_parse_errors() {
    assert!(StateMachineDefinition::from_json("{").is_err());
    assert!(StateMachineDefinition::from_value(json!({"States": {}})).is_err());
    assert!(
      StateMachineDefinition::from_value(json!({
        "StartAt": "A",
        "States": {"A": {"Type": "Pass", "InputPath": "not-a-path", "End": true}}
      }))
      .is_err()
    );
  }
}
