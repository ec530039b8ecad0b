//! State variants.
//!
//! Each `Type` gets its own struct. [`State`] wraps them in a closed enum and
//! exposes the shared capabilities (transitions, data-flow fields, retriers,
//! catchers) through accessor methods. A `Type` outside the built-in set is
//! kept as a [`CustomState`] with its raw fields so a registered handler can
//! execute it.

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use stately_path::{Path, PayloadTemplate, Selector};

use crate::condition::ChoiceRule;
use crate::definition::StateGraph;
use crate::retry::{CatchRule, RetryRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PassState {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub input_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub output_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub result_path: Option<Selector>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parameters: Option<PayloadTemplate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskState {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  pub resource: String,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub input_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub output_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub result_path: Option<Selector>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parameters: Option<PayloadTemplate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result_selector: Option<PayloadTemplate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_seconds: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_seconds_path: Option<Path>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub heartbeat_seconds: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub heartbeat_seconds_path: Option<Path>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub retry: Vec<RetryRule>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub catch: Vec<CatchRule>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoiceState {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub input_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub output_path: Option<Selector>,
  pub choices: Vec<ChoiceRule>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitState {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub input_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub output_path: Option<Selector>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub seconds: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub seconds_path: Option<Path>,
  /// RFC 3339 instant, kept as written.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timestamp: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timestamp_path: Option<Path>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SucceedState {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub input_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub output_path: Option<Selector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FailState {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_path: Option<Path>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cause: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cause_path: Option<Path>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParallelState {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  pub branches: Vec<StateGraph>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub input_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub output_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub result_path: Option<Selector>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parameters: Option<PayloadTemplate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result_selector: Option<PayloadTemplate>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub retry: Vec<RetryRule>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub catch: Vec<CatchRule>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end: Option<bool>,
}

/// Whether Map items run inline or as child executions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessorMode {
  #[default]
  Inline,
  Distributed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionType {
  Standard,
  Express,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessorConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mode: Option<ProcessorMode>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub execution_type: Option<ExecutionType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemProcessor {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub processor_config: Option<ProcessorConfig>,
  #[serde(flatten)]
  pub graph: StateGraph,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReaderConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_items: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_items_path: Option<Path>,
}

/// Source of items for a distributed Map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemReader {
  pub resource: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parameters: Option<PayloadTemplate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reader_config: Option<ReaderConfig>,
}

/// Groups Map items into batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemBatcher {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_items_per_batch: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_items_per_batch_path: Option<Path>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub batch_input: Option<PayloadTemplate>,
}

/// Destination for the results of a distributed Map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultWriter {
  pub resource: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parameters: Option<PayloadTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MapState {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub input_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub output_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub result_path: Option<Selector>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub items_path: Option<Path>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub item_processor: Option<ItemProcessor>,
  /// Legacy spelling of `ItemProcessor`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub iterator: Option<StateGraph>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub item_selector: Option<PayloadTemplate>,
  /// Legacy spelling of `ItemSelector`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parameters: Option<PayloadTemplate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub item_reader: Option<ItemReader>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub item_batcher: Option<ItemBatcher>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result_writer: Option<ResultWriter>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_concurrency: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_concurrency_path: Option<Path>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tolerated_failure_count: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tolerated_failure_count_path: Option<Path>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tolerated_failure_percentage: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tolerated_failure_percentage_path: Option<Path>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result_selector: Option<PayloadTemplate>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub retry: Vec<RetryRule>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub catch: Vec<CatchRule>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end: Option<bool>,
}

impl MapState {
  /// The per-item sub-graph, from `ItemProcessor` or the legacy `Iterator`.
  pub fn processor(&self) -> Option<&StateGraph> {
    self
      .item_processor
      .as_ref()
      .map(|p| &p.graph)
      .or(self.iterator.as_ref())
  }

  pub fn mode(&self) -> ProcessorMode {
    self
      .item_processor
      .as_ref()
      .and_then(|p| p.processor_config.as_ref())
      .and_then(|c| c.mode)
      .unwrap_or_default()
  }

  /// `ItemSelector`, or the legacy `Parameters`.
  pub fn selector(&self) -> Option<&PayloadTemplate> {
    self.item_selector.as_ref().or(self.parameters.as_ref())
  }
}

/// A state whose `Type` is not built in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomState {
  #[serde(rename = "Type")]
  pub type_name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub input_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub output_path: Option<Selector>,
  #[serde(
    default,
    deserialize_with = "stately_path::selector::nullable",
    skip_serializing_if = "Option::is_none"
  )]
  pub result_path: Option<Selector>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end: Option<bool>,
  /// Every other field, untouched.
  #[serde(flatten)]
  pub fields: Map<String, Value>,
}

/// Where a state goes after it finishes successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<'a> {
  Next(&'a str),
  End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
  Pass(PassState),
  Task(TaskState),
  Choice(ChoiceState),
  Wait(WaitState),
  Succeed(SucceedState),
  Fail(FailState),
  Parallel(ParallelState),
  Map(MapState),
  Custom(CustomState),
}

impl State {
  pub fn type_name(&self) -> &str {
    match self {
      State::Pass(_) => "Pass",
      State::Task(_) => "Task",
      State::Choice(_) => "Choice",
      State::Wait(_) => "Wait",
      State::Succeed(_) => "Succeed",
      State::Fail(_) => "Fail",
      State::Parallel(_) => "Parallel",
      State::Map(_) => "Map",
      State::Custom(s) => &s.type_name,
    }
  }

  /// The raw `Next` and `End` fields, for states that have them.
  pub fn next_and_end(&self) -> Option<(Option<&str>, Option<bool>)> {
    let (next, end) = match self {
      State::Pass(s) => (&s.next, s.end),
      State::Task(s) => (&s.next, s.end),
      State::Wait(s) => (&s.next, s.end),
      State::Parallel(s) => (&s.next, s.end),
      State::Map(s) => (&s.next, s.end),
      State::Custom(s) => (&s.next, s.end),
      State::Choice(_) | State::Succeed(_) | State::Fail(_) => return None,
    };
    Some((next.as_deref(), end))
  }

  /// The success transition. `None` for Choice, Succeed and Fail, and for
  /// malformed states that set neither field.
  pub fn transition(&self) -> Option<Transition<'_>> {
    match self.next_and_end()? {
      (_, Some(true)) => Some(Transition::End),
      (Some(next), _) => Some(Transition::Next(next)),
      _ => None,
    }
  }

  /// Whether reaching this state can finish the graph.
  pub fn is_terminal(&self) -> bool {
    match self {
      State::Succeed(_) | State::Fail(_) => true,
      State::Choice(s) => s.default.is_none(),
      _ => self.transition() == Some(Transition::End),
    }
  }

  pub fn input_path(&self) -> Option<&Selector> {
    match self {
      State::Pass(s) => s.input_path.as_ref(),
      State::Task(s) => s.input_path.as_ref(),
      State::Choice(s) => s.input_path.as_ref(),
      State::Wait(s) => s.input_path.as_ref(),
      State::Succeed(s) => s.input_path.as_ref(),
      State::Parallel(s) => s.input_path.as_ref(),
      State::Map(s) => s.input_path.as_ref(),
      State::Custom(s) => s.input_path.as_ref(),
      State::Fail(_) => None,
    }
  }

  pub fn output_path(&self) -> Option<&Selector> {
    match self {
      State::Pass(s) => s.output_path.as_ref(),
      State::Task(s) => s.output_path.as_ref(),
      State::Choice(s) => s.output_path.as_ref(),
      State::Wait(s) => s.output_path.as_ref(),
      State::Succeed(s) => s.output_path.as_ref(),
      State::Parallel(s) => s.output_path.as_ref(),
      State::Map(s) => s.output_path.as_ref(),
      State::Custom(s) => s.output_path.as_ref(),
      State::Fail(_) => None,
    }
  }

  pub fn result_path(&self) -> Option<&Selector> {
    match self {
      State::Pass(s) => s.result_path.as_ref(),
      State::Task(s) => s.result_path.as_ref(),
      State::Parallel(s) => s.result_path.as_ref(),
      State::Map(s) => s.result_path.as_ref(),
      State::Custom(s) => s.result_path.as_ref(),
      _ => None,
    }
  }

  pub fn result_selector(&self) -> Option<&PayloadTemplate> {
    match self {
      State::Task(s) => s.result_selector.as_ref(),
      State::Parallel(s) => s.result_selector.as_ref(),
      State::Map(s) => s.result_selector.as_ref(),
      _ => None,
    }
  }

  pub fn retry(&self) -> &[RetryRule] {
    match self {
      State::Task(s) => &s.retry,
      State::Parallel(s) => &s.retry,
      State::Map(s) => &s.retry,
      _ => &[],
    }
  }

  pub fn catch(&self) -> &[CatchRule] {
    match self {
      State::Task(s) => &s.catch,
      State::Parallel(s) => &s.catch,
      State::Map(s) => &s.catch,
      _ => &[],
    }
  }

  /// Nested graphs: Parallel branches or the Map item processor.
  pub fn sub_graphs(&self) -> Vec<(String, &StateGraph)> {
    match self {
      State::Parallel(s) => s
        .branches
        .iter()
        .enumerate()
        .map(|(i, g)| (format!("Branches[{i}]"), g))
        .collect(),
      State::Map(s) => match (&s.item_processor, &s.iterator) {
        (Some(p), _) => vec![("ItemProcessor".to_string(), &p.graph)],
        (None, Some(g)) => vec![("Iterator".to_string(), g)],
        (None, None) => Vec::new(),
      },
      _ => Vec::new(),
    }
  }

  /// Every state name this state can transition to, in declaration order.
  pub fn successors(&self) -> Vec<&str> {
    let mut out = Vec::new();
    if let Some(Transition::Next(next)) = self.transition() {
      out.push(next);
    }
    if let State::Choice(choice) = self {
      out.extend(choice.choices.iter().map(|c| c.next.as_str()));
      out.extend(choice.default.as_deref());
    }
    out.extend(self.catch().iter().map(|c| c.next.as_str()));
    out
  }
}

impl<'de> Deserialize<'de> for State {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let type_name = value
      .get("Type")
      .and_then(Value::as_str)
      .ok_or_else(|| D::Error::custom("state is missing a string \"Type\""))?;

    let state = match type_name {
      "Pass" => serde_json::from_value(value).map(State::Pass),
      "Task" => serde_json::from_value(value).map(State::Task),
      "Choice" => serde_json::from_value(value).map(State::Choice),
      "Wait" => serde_json::from_value(value).map(State::Wait),
      "Succeed" => serde_json::from_value(value).map(State::Succeed),
      "Fail" => serde_json::from_value(value).map(State::Fail),
      "Parallel" => serde_json::from_value(value).map(State::Parallel),
      "Map" => serde_json::from_value(value).map(State::Map),
      _ => serde_json::from_value(value).map(State::Custom),
    };
    state.map_err(D::Error::custom)
  }
}

impl Serialize for State {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let value = match self {
      State::Pass(s) => serde_json::to_value(s),
      State::Task(s) => serde_json::to_value(s),
      State::Choice(s) => serde_json::to_value(s),
      State::Wait(s) => serde_json::to_value(s),
      State::Succeed(s) => serde_json::to_value(s),
      State::Fail(s) => serde_json::to_value(s),
      State::Parallel(s) => serde_json::to_value(s),
      State::Map(s) => serde_json::to_value(s),
      State::Custom(s) => serde_json::to_value(s),
    };
    let mut value = value.map_err(S::Error::custom)?;
    if let Value::Object(map) = &mut value {
      map.insert("Type".to_string(), Value::String(self.type_name().to_string()));
    }
    value.serialize(serializer)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_task_state() {
    let state: State = serde_json::from_value(json!({
      "Type": "Task",
      "Resource": "arn:aws:lambda:us-east-1:123:function:work",
      "ResultPath": null,
      "Retry": [{"ErrorEquals": ["States.ALL"]}],
      "Catch": [{"ErrorEquals": ["States.ALL"], "Next": "Recover"}],
      "Next": "Done"
    }))
    .unwrap();

    assert_eq!(state.type_name(), "Task");
    assert_eq!(state.result_path(), Some(&Selector::Discard));
    assert_eq!(state.input_path(), None);
    assert_eq!(state.transition(), Some(Transition::Next("Done")));
    assert_eq!(state.successors(), vec!["Done", "Recover"]);
    assert_eq!(state.retry().len(), 1);
    assert!(!state.is_terminal());
  }

  #[test]
  fn test_terminal_states() {
    let succeed: State = serde_json::from_value(json!({"Type": "Succeed"})).unwrap();
    let fail: State =
      serde_json::from_value(json!({"Type": "Fail", "Error": "E", "Cause": "C"})).unwrap();
    let end: State = serde_json::from_value(json!({"Type": "Pass", "End": true})).unwrap();
    assert!(succeed.is_terminal());
    assert!(fail.is_terminal());
    assert!(end.is_terminal());
    assert_eq!(end.transition(), Some(Transition::End));
  }

  #[test]
  fn test_choice_successors() {
    let state: State = serde_json::from_value(json!({
      "Type": "Choice",
      "Choices": [
        {"Variable": "$.a", "BooleanEquals": true, "Next": "Yes"},
        {"Variable": "$.b", "IsPresent": true, "Next": "Maybe"}
      ],
      "Default": "No"
    }))
    .unwrap();
    assert_eq!(state.successors(), vec!["Yes", "Maybe", "No"]);
    assert!(!state.is_terminal());
  }

  #[test]
  fn test_custom_state_keeps_fields() {
    let source = json!({
      "Type": "Echo",
      "Message": "hi",
      "Settings": {"loud": true},
      "Next": "After"
    });
    let state: State = serde_json::from_value(source.clone()).unwrap();
    let State::Custom(custom) = &state else {
      panic!("expected a custom state");
    };
    assert_eq!(custom.type_name, "Echo");
    assert_eq!(custom.fields.get("Message"), Some(&json!("hi")));
    assert_eq!(serde_json::to_value(&state).unwrap(), source);
  }

  #[test]
  fn test_map_legacy_fields() {
    let state: State = serde_json::from_value(json!({
      "Type": "Map",
      "ItemsPath": "$.items",
      "Parameters": {"value.$": "$$.Map.Item.Value"},
      "Iterator": {
        "StartAt": "Work",
        "States": {"Work": {"Type": "Pass", "End": true}}
      },
      "End": true
    }))
    .unwrap();
    let State::Map(map) = &state else {
      panic!("expected a map state");
    };
    assert!(map.processor().is_some());
    assert!(map.selector().is_some());
    assert_eq!(map.mode(), ProcessorMode::Inline);
    assert_eq!(state.sub_graphs().len(), 1);
  }

  #[test]
  fn test_missing_type_is_rejected() {
    assert!(serde_json::from_value::<State>(json!({"Next": "X"})).is_err());
  }
}
