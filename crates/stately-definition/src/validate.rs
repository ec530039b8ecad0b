//! Static checks over a parsed definition.
//!
//! Validation walks every graph (top level, Parallel branches, Map item
//! processors) and reports all problems at once, sorted by location so the
//! output is stable.

use std::collections::HashMap;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use stately_path::{Root, Selector};

use crate::condition::ChoiceRule;
use crate::definition::{StateGraph, StateMachineDefinition};
use crate::error::{ValidationError, ValidationErrorKind as Kind};
use crate::error_name;
use crate::graph::Graph;
use crate::retry::{CatchRule, RetryRule};
use crate::state::{MapState, ProcessorMode, State, TaskState, WaitState};

const MAX_STATE_NAME_LEN: usize = 80;

/// Switches for checks that some callers want relaxed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
  /// Accept Choice states without `Default`; they fail at runtime with
  /// `States.NoChoiceMatched` when nothing matches.
  pub allow_missing_choice_default: bool,
}

/// Validate a definition, returning every problem found.
pub fn validate(
  definition: &StateMachineDefinition,
  options: &ValidationOptions,
) -> Vec<ValidationError> {
  let mut validator = Validator {
    options,
    owners: HashMap::new(),
    errors: Vec::new(),
  };
  validator.collect_names(&definition.graph, "");
  validator.graph(&definition.graph, "");

  if definition.timeout_seconds == Some(0) {
    validator.push("TimeoutSeconds", Kind::InvalidField, "must be positive");
  }

  let mut errors = validator.errors;
  errors.sort();
  errors.dedup();
  errors
}

struct Validator<'a> {
  options: &'a ValidationOptions,
  /// State name -> location prefix of the graph that declares it.
  owners: HashMap<String, String>,
  errors: Vec<ValidationError>,
}

impl Validator<'_> {
  fn push(&mut self, location: impl Into<String>, kind: Kind, message: impl Into<String>) {
    self
      .errors
      .push(ValidationError::new(location, kind, message));
  }

  fn collect_names(&mut self, graph: &StateGraph, prefix: &str) {
    for (name, state) in &graph.states {
      let location = format!("{prefix}States.{name}");
      if let Some(first) = self.owners.get(name) {
        let message = format!("state name '{name}' is already used in {first}States");
        self.push(&location, Kind::DuplicateStateName, message);
      } else {
        self.owners.insert(name.clone(), prefix.to_string());
      }
      for (label, sub) in state.sub_graphs() {
        self.collect_names(sub, &format!("{location}.{label}."));
      }
    }
  }

  fn graph(&mut self, graph: &StateGraph, prefix: &str) {
    if graph.states.is_empty() {
      self.push(format!("{prefix}States"), Kind::MissingStartAt, "graph has no states");
      return;
    }
    self.target(
      graph,
      &format!("{prefix}StartAt"),
      &graph.start_at,
      Kind::MissingStartAt,
    );

    for (name, state) in &graph.states {
      let location = format!("{prefix}States.{name}");
      self.state(graph, &location, name, state);
      for (label, sub) in state.sub_graphs() {
        self.graph(sub, &format!("{location}.{label}."));
      }
    }

    if !graph.states.contains_key(&graph.start_at) {
      return;
    }
    let analysis = Graph::new(graph);
    let reachable = analysis.reachable();
    let can_finish = analysis.can_finish();
    for name in graph.states.keys() {
      let location = format!("{prefix}States.{name}");
      if !reachable.contains(name) {
        self.push(location, Kind::UnreachableState, "state is not reachable from StartAt");
      } else if !can_finish.contains(name) {
        self.push(
          location,
          Kind::NoTerminalReachable,
          "no terminal state is reachable from this state",
        );
      }
    }
  }

  /// Check that `target` names a state in `graph`.
  fn target(&mut self, graph: &StateGraph, location: &str, target: &str, kind: Kind) {
    if graph.states.contains_key(target) {
      return;
    }
    match self.owners.get(target).cloned() {
      Some(owner) => {
        let owner = if owner.is_empty() {
          "the top level"
        } else {
          owner.trim_end_matches('.')
        };
        let message = format!("'{target}' belongs to {owner} and cannot be reached from here");
        self.push(location, Kind::CrossGraphTransition, message);
      }
      None => self.push(location, kind, format!("'{target}' is not a defined state")),
    }
  }

  fn state(&mut self, graph: &StateGraph, location: &str, name: &str, state: &State) {
    if name.is_empty() || name.chars().count() > MAX_STATE_NAME_LEN {
      self.push(
        location,
        Kind::InvalidStateName,
        format!("state names must be 1 to {MAX_STATE_NAME_LEN} characters"),
      );
    }

    if let Some((next, end)) = state.next_and_end() {
      match (next, end) {
        (Some(_), Some(true)) => {
          self.push(location, Kind::InvalidTransition, "cannot set both Next and End")
        }
        (Some(next), _) => {
          self.target(graph, &format!("{location}.Next"), next, Kind::DanglingTransition)
        }
        (None, Some(true)) => {}
        (None, _) => self.push(location, Kind::InvalidTransition, "must set Next or End: true"),
      }
    }

    if let Some(Selector::Path(path)) = state.result_path()
      && (path.root_kind() != Root::Input || !path.is_reference())
    {
      self.push(
        format!("{location}.ResultPath"),
        Kind::InvalidPath,
        format!("'{path}' must be a reference path rooted at '$'"),
      );
    }

    self.retry(location, state.retry());
    self.catch(graph, location, state.catch());

    match state {
      State::Task(task) => self.task(location, task),
      State::Choice(choice) => {
        if choice.choices.is_empty() {
          self.push(location, Kind::InvalidField, "Choices must not be empty");
        }
        for (i, rule) in choice.choices.iter().enumerate() {
          self.choice_rule(graph, &format!("{location}.Choices[{i}]"), rule);
        }
        match &choice.default {
          Some(default) => {
            self.target(graph, &format!("{location}.Default"), default, Kind::DanglingTransition)
          }
          None if !self.options.allow_missing_choice_default => self.push(
            location,
            Kind::MissingChoiceDefault,
            "Choice has no Default; unmatched input would fail with States.NoChoiceMatched",
          ),
          None => {}
        }
      }
      State::Wait(wait) => self.wait(location, wait),
      State::Fail(fail) => {
        if fail.error.is_some() && fail.error_path.is_some() {
          self.push(location, Kind::InvalidField, "cannot set both Error and ErrorPath");
        }
        if fail.cause.is_some() && fail.cause_path.is_some() {
          self.push(location, Kind::InvalidField, "cannot set both Cause and CausePath");
        }
      }
      State::Parallel(parallel) => {
        if parallel.branches.is_empty() {
          self.push(location, Kind::InvalidField, "Branches must not be empty");
        }
      }
      State::Map(map) => self.map(location, map),
      State::Pass(_) | State::Succeed(_) | State::Custom(_) => {}
    }
  }

  fn task(&mut self, location: &str, task: &TaskState) {
    if task.resource.is_empty() {
      self.push(location, Kind::InvalidField, "Resource must not be empty");
    }
    if task.timeout_seconds.is_some() && task.timeout_seconds_path.is_some() {
      self.push(location, Kind::InvalidField, "cannot set both TimeoutSeconds and TimeoutSecondsPath");
    }
    if task.heartbeat_seconds.is_some() && task.heartbeat_seconds_path.is_some() {
      self.push(
        location,
        Kind::InvalidField,
        "cannot set both HeartbeatSeconds and HeartbeatSecondsPath",
      );
    }
    if task.timeout_seconds == Some(0) || task.heartbeat_seconds == Some(0) {
      self.push(location, Kind::InvalidField, "timeouts must be positive");
    }
    if let (Some(timeout), Some(heartbeat)) = (task.timeout_seconds, task.heartbeat_seconds)
      && heartbeat >= timeout
    {
      self.push(
        location,
        Kind::InvalidField,
        "HeartbeatSeconds must be smaller than TimeoutSeconds",
      );
    }
  }

  fn choice_rule(&mut self, graph: &StateGraph, location: &str, rule: &ChoiceRule) {
    self.target(graph, &format!("{location}.Next"), &rule.next, Kind::DanglingTransition);
    for path in rule.condition.paths() {
      if !path.is_definite() {
        self.push(
          location,
          Kind::InvalidPath,
          format!("'{path}' must select a single value"),
        );
      }
    }
  }

  fn wait(&mut self, location: &str, wait: &WaitState) {
    let set = [
      wait.seconds.is_some(),
      wait.seconds_path.is_some(),
      wait.timestamp.is_some(),
      wait.timestamp_path.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();
    if set != 1 {
      self.push(
        location,
        Kind::InvalidField,
        "exactly one of Seconds, SecondsPath, Timestamp or TimestampPath is required",
      );
    }
    if let Some(timestamp) = &wait.timestamp
      && DateTime::parse_from_rfc3339(timestamp).is_err()
    {
      self.push(
        format!("{location}.Timestamp"),
        Kind::InvalidField,
        format!("'{timestamp}' is not an RFC 3339 timestamp"),
      );
    }
  }

  fn map(&mut self, location: &str, map: &MapState) {
    if map.processor().is_none() {
      self.push(location, Kind::InvalidField, "Map requires an ItemProcessor");
    }
    if map.item_processor.is_some() && map.iterator.is_some() {
      self.push(location, Kind::InvalidField, "cannot set both ItemProcessor and Iterator");
    }
    if map.item_selector.is_some() && map.parameters.is_some() {
      self.push(location, Kind::InvalidField, "cannot set both ItemSelector and Parameters");
    }
    if map.max_concurrency.is_some() && map.max_concurrency_path.is_some() {
      self.push(
        location,
        Kind::InvalidField,
        "cannot set both MaxConcurrency and MaxConcurrencyPath",
      );
    }
    if let Some(pct) = map.tolerated_failure_percentage
      && !(0.0..=100.0).contains(&pct)
    {
      self.push(
        location,
        Kind::InvalidField,
        "ToleratedFailurePercentage must be between 0 and 100",
      );
    }
    if map.mode() == ProcessorMode::Inline {
      for (field, set) in [
        ("ItemReader", map.item_reader.is_some()),
        ("ItemBatcher", map.item_batcher.is_some()),
        ("ResultWriter", map.result_writer.is_some()),
      ] {
        if set {
          self.push(
            location,
            Kind::InvalidField,
            format!("{field} is only supported in DISTRIBUTED mode"),
          );
        }
      }
    }
    if map.item_reader.is_some() && map.items_path.is_some() {
      self.push(location, Kind::InvalidField, "cannot set both ItemReader and ItemsPath");
    }
  }

  fn retry(&mut self, location: &str, rules: &[RetryRule]) {
    for (i, rule) in rules.iter().enumerate() {
      let rule_location = format!("{location}.Retry[{i}]");
      self.error_equals(&rule_location, &rule.error_equals, i + 1 == rules.len());
      if rule.backoff() < 1.0 {
        self.push(&rule_location, Kind::InvalidRetry, "BackoffRate must be at least 1.0");
      }
      if rule.interval_seconds == Some(0) {
        self.push(&rule_location, Kind::InvalidRetry, "IntervalSeconds must be at least 1");
      }
      if rule.max_delay_seconds == Some(0) {
        self.push(&rule_location, Kind::InvalidRetry, "MaxDelaySeconds must be at least 1");
      }
    }
  }

  fn catch(&mut self, graph: &StateGraph, location: &str, rules: &[CatchRule]) {
    for (i, rule) in rules.iter().enumerate() {
      let rule_location = format!("{location}.Catch[{i}]");
      self.error_equals(&rule_location, &rule.error_equals, i + 1 == rules.len());
      self.target(
        graph,
        &format!("{rule_location}.Next"),
        &rule.next,
        Kind::DanglingCatchTarget,
      );
      if let Some(Selector::Path(path)) = &rule.result_path
        && (path.root_kind() != Root::Input || !path.is_reference())
      {
        self.push(
          format!("{rule_location}.ResultPath"),
          Kind::InvalidPath,
          format!("'{path}' must be a reference path rooted at '$'"),
        );
      }
    }
  }

  fn error_equals(&mut self, location: &str, names: &[String], is_last: bool) {
    if names.is_empty() {
      self.push(location, Kind::InvalidErrorEquals, "ErrorEquals must not be empty");
    }
    if names.iter().any(|n| n == error_name::ALL) {
      if names.len() > 1 {
        self.push(
          location,
          Kind::InvalidErrorEquals,
          "States.ALL must appear alone in ErrorEquals",
        );
      }
      if !is_last {
        self.push(
          location,
          Kind::InvalidErrorEquals,
          "a rule matching States.ALL must be the last one",
        );
      }
    }
  }
}
