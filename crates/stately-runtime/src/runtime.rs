//! State machine runtime.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use stately_definition::{State, StateGraph, StateMachineDefinition, error_name, validate};
use stately_path::{RandomSource, ThreadRandom};

use crate::config::RuntimeConfig;
use crate::context::Scope;
use crate::custom::CustomStateHandler;
use crate::error::{RuntimeError, StatesError};
use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::execution::{Execution, ExecutionOptions};
use crate::task::TaskExecutor;
use crate::token::TaskTokenRegistry;

/// Owns a validated definition and runs executions of it.
pub struct StateMachineRuntime {
  pub(crate) name: String,
  pub(crate) definition: StateMachineDefinition,
  pub(crate) executor: Arc<dyn TaskExecutor>,
  pub(crate) tokens: Arc<TaskTokenRegistry>,
  pub(crate) notifier: Arc<dyn ExecutionNotifier>,
  pub(crate) random: Arc<dyn RandomSource>,
  pub(crate) handlers: HashMap<String, Arc<dyn CustomStateHandler>>,
  pub(crate) config: RuntimeConfig,
}

impl StateMachineRuntime {
  /// Build a runtime with default settings.
  ///
  /// # Errors
  /// Returns an error if the definition fails validation.
  pub fn new(
    name: impl Into<String>,
    definition: StateMachineDefinition,
    executor: Arc<dyn TaskExecutor>,
  ) -> Result<Self, RuntimeError> {
    Self::builder(name, definition, executor).build()
  }

  pub fn builder(
    name: impl Into<String>,
    definition: StateMachineDefinition,
    executor: Arc<dyn TaskExecutor>,
  ) -> RuntimeBuilder {
    RuntimeBuilder {
      name: name.into(),
      definition,
      executor,
      tokens: None,
      notifier: None,
      random: None,
      handlers: HashMap::new(),
      config: RuntimeConfig::default(),
    }
  }

  /// Start an execution.
  ///
  /// Returns an `Execution` handle. Call `.wait()` to run it.
  pub fn execute(&self, input: Value, options: ExecutionOptions) -> Execution<'_> {
    let name = options
      .name
      .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let scope = Scope {
      execution_id: self.execution_id(&name),
      execution_name: name,
      state_machine: self.name.clone(),
      input,
      start_time: Utc::now(),
      history: options.history,
    };
    Execution::new(self, scope, options.abort)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Id of the execution named `name`: `<machine>:<name>`.
  pub fn execution_id(&self, name: &str) -> String {
    format!("{}:{name}", self.name)
  }

  pub fn definition(&self) -> &StateMachineDefinition {
    &self.definition
  }

  /// Registry for `.waitForTaskToken` callbacks.
  pub fn tokens(&self) -> &Arc<TaskTokenRegistry> {
    &self.tokens
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Fail with `States.DataLimitExceeded` when `value` serializes larger than
  /// the configured quota.
  pub(crate) fn check_size(&self, value: &Value) -> Result<(), StatesError> {
    let size = serde_json::to_vec(value)
      .map(|bytes| bytes.len())
      .map_err(|e| StatesError::runtime(format!("failed to serialize payload: {e}")))?;
    if size > self.config.max_payload_bytes {
      return Err(StatesError::new(
        error_name::DATA_LIMIT_EXCEEDED,
        format!(
          "payload of {size} bytes exceeds the limit of {} bytes",
          self.config.max_payload_bytes
        ),
      ));
    }
    Ok(())
  }
}

/// Builder for [`StateMachineRuntime`].
pub struct RuntimeBuilder {
  name: String,
  definition: StateMachineDefinition,
  executor: Arc<dyn TaskExecutor>,
  tokens: Option<Arc<TaskTokenRegistry>>,
  notifier: Option<Arc<dyn ExecutionNotifier>>,
  random: Option<Arc<dyn RandomSource>>,
  handlers: HashMap<String, Arc<dyn CustomStateHandler>>,
  config: RuntimeConfig,
}

impl RuntimeBuilder {
  pub fn config(mut self, config: RuntimeConfig) -> Self {
    self.config = config;
    self
  }

  /// Share a token registry, e.g. one registry for every machine an engine
  /// hosts.
  pub fn tokens(mut self, tokens: Arc<TaskTokenRegistry>) -> Self {
    self.tokens = Some(tokens);
    self
  }

  pub fn notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = Some(notifier);
    self
  }

  /// Randomness for jitter, `States.UUID` and `States.MathRandom`.
  pub fn random(mut self, random: Arc<dyn RandomSource>) -> Self {
    self.random = Some(random);
    self
  }

  pub fn custom_state(
    mut self,
    type_name: impl Into<String>,
    handler: Arc<dyn CustomStateHandler>,
  ) -> Self {
    self.handlers.insert(type_name.into(), handler);
    self
  }

  /// Validate the definition and build the runtime.
  pub fn build(self) -> Result<StateMachineRuntime, RuntimeError> {
    let errors = validate(&self.definition, &self.config.validation);
    if !errors.is_empty() {
      return Err(RuntimeError::InvalidDefinition { errors });
    }

    if let Some((state, type_name)) = custom_states(&self.definition.graph)
      .into_iter()
      .find(|(_, type_name)| !self.handlers.contains_key(*type_name))
    {
      return Err(RuntimeError::MissingCustomHandler {
        state: state.to_string(),
        type_name: type_name.to_string(),
      });
    }

    Ok(StateMachineRuntime {
      name: self.name,
      definition: self.definition,
      executor: self.executor,
      tokens: self.tokens.unwrap_or_default(),
      notifier: self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier)),
      random: self.random.unwrap_or_else(|| Arc::new(ThreadRandom)),
      handlers: self.handlers,
      config: self.config,
    })
  }
}

/// `(state name, type)` of every custom state, nested graphs included.
fn custom_states(graph: &StateGraph) -> Vec<(&str, &str)> {
  let mut found = Vec::new();
  for (name, state) in &graph.states {
    if let State::Custom(custom) = state {
      found.push((name.as_str(), custom.type_name.as_str()));
    }
    for (_, sub) in state.sub_graphs() {
      found.extend(custom_states(sub));
    }
  }
  found
}
