//! Control API over registered state machines and their executions.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stately_definition::StateMachineDefinition;
use stately_runtime::{
  AbortSignal, ExecutionNotifier, ExecutionOptions, ExecutionOutcome, ExecutionStatus,
  HistoryEvent, HistoryEventKind, HistoryLog, RuntimeBuilder, StateMachineRuntime, StatesError,
  TaskExecutor, TaskTokenRegistry,
};
use stately_store::{ExecutionRecord, Store};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, instrument};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::persist::{
  PersistingNotifier, from_stored, history_events, persist_children, save_outcome,
};

const ARN_PREFIX: &str = "arn:stately:states:local:stateMachine:";

/// What `describe_execution` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDescription {
  pub execution_id: String,
  pub name: String,
  pub state_machine: String,
  pub parent_execution_id: Option<String>,
  pub status: ExecutionStatus,
  pub input: Value,
  pub output: Option<Value>,
  pub error: Option<String>,
  pub cause: Option<String>,
  /// The state being run, while the execution is running.
  pub current_state: Option<String>,
  pub started_at: DateTime<Utc>,
  pub stopped_at: Option<DateTime<Utc>>,
}

impl ExecutionDescription {
  fn from_record(record: ExecutionRecord, current_state: Option<String>) -> Self {
    Self {
      execution_id: record.execution_id,
      name: record.name,
      state_machine: record.state_machine,
      parent_execution_id: record.parent_execution_id,
      status: from_stored(record.status),
      input: record.input.0,
      output: record.output.map(|json| json.0),
      error: record.error,
      cause: record.cause,
      current_state,
      started_at: record.started_at,
      stopped_at: record.stopped_at,
    }
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
  panic
    .downcast_ref::<&str>()
    .copied()
    .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
    .unwrap_or("unknown panic")
}

/// A running execution this service started.
struct Tracked {
  abort: AbortSignal,
  history: HistoryLog,
  outcome: watch::Receiver<Option<ExecutionOutcome>>,
}

impl Tracked {
  fn is_running(&self) -> bool {
    self.outcome.borrow().is_none()
  }
}

/// Registers state machines, starts executions on the Tokio runtime and
/// answers control calls about them.
///
/// Executions are written to the [`Store`] when they start and when they
/// finish; distributed Map children are written as they finish. History of a
/// running execution is served from memory.
pub struct ExecutionService {
  config: EngineConfig,
  store: Arc<dyn Store>,
  tokens: Arc<TaskTokenRegistry>,
  notifier: Arc<dyn ExecutionNotifier>,
  machines: RwLock<HashMap<String, Arc<StateMachineRuntime>>>,
  executions: Arc<Mutex<HashMap<String, Tracked>>>,
}

impl ExecutionService {
  /// Create a service. Must be called within a Tokio runtime.
  pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Self {
    Self::build(store, config, None)
  }

  /// Create a service that also forwards every runtime event to `notifier`.
  pub fn with_notifier(
    store: Arc<dyn Store>,
    config: EngineConfig,
    notifier: Arc<dyn ExecutionNotifier>,
  ) -> Self {
    Self::build(store, config, Some(notifier))
  }

  fn build(
    store: Arc<dyn Store>,
    config: EngineConfig,
    forward: Option<Arc<dyn ExecutionNotifier>>,
  ) -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    tokio::spawn(persist_children(store.clone(), receiver));
    Self {
      config,
      store,
      tokens: Arc::new(TaskTokenRegistry::new()),
      notifier: Arc::new(PersistingNotifier::new(sender, forward)),
      machines: RwLock::new(HashMap::new()),
      executions: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// A runtime builder wired to this service's config, token registry and
  /// notifier. Add custom state handlers to it, then pass it to
  /// [`register`](Self::register).
  pub fn runtime_builder(
    &self,
    name: impl Into<String>,
    definition: StateMachineDefinition,
    executor: Arc<dyn TaskExecutor>,
  ) -> RuntimeBuilder {
    StateMachineRuntime::builder(name, definition, executor)
      .config(self.config.runtime.clone())
      .tokens(self.tokens.clone())
      .notifier(self.notifier.clone())
  }

  /// Validate and register a state machine. Returns its ARN.
  pub fn register_state_machine(
    &self,
    name: impl Into<String>,
    definition: StateMachineDefinition,
    executor: Arc<dyn TaskExecutor>,
  ) -> Result<String, EngineError> {
    self.register(self.runtime_builder(name, definition, executor))
  }

  /// Build and register a runtime from [`runtime_builder`](Self::runtime_builder).
  pub fn register(&self, builder: RuntimeBuilder) -> Result<String, EngineError> {
    let runtime = builder.build()?;
    let arn = format!("{ARN_PREFIX}{}", runtime.name());

    let mut machines = self.machines.write().unwrap_or_else(|e| e.into_inner());
    if machines.contains_key(&arn) {
      return Err(EngineError::StateMachineExists {
        name: runtime.name().to_string(),
      });
    }
    info!(state_machine = %runtime.name(), arn = %arn, "state_machine_registered");
    machines.insert(arn.clone(), Arc::new(runtime));
    Ok(arn)
  }

  fn machine(&self, arn: &str) -> Result<Arc<StateMachineRuntime>, EngineError> {
    self
      .machines
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .get(arn)
      .cloned()
      .ok_or_else(|| EngineError::StateMachineNotFound {
        arn: arn.to_string(),
      })
  }

  /// Start an execution and return its id without waiting for it.
  ///
  /// `name` defaults to a UUID and must be unique per state machine.
  #[instrument(skip(self, input), fields(arn = %arn))]
  pub async fn start_execution(
    &self,
    arn: &str,
    input: Value,
    name: Option<String>,
  ) -> Result<String, EngineError> {
    let runtime = self.machine(arn)?;
    let name = name.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let execution_id = runtime.execution_id(&name);

    // The store rejects a taken id, which also settles concurrent starts.
    let record = ExecutionRecord::running(&execution_id, &name, runtime.name(), input.clone());
    match self.store.create_execution(&record).await {
      Ok(()) => {}
      Err(stately_store::Error::AlreadyExists(_)) => {
        return Err(EngineError::ExecutionExists { execution_id });
      }
      Err(err) => return Err(err.into()),
    }

    let abort = AbortSignal::new();
    let history = HistoryLog::new();
    let (done, outcome) = watch::channel(None);
    self
      .executions
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .insert(
        execution_id.clone(),
        Tracked {
          abort: abort.clone(),
          history: history.clone(),
          outcome,
        },
      );

    let store = self.store.clone();
    let executions = self.executions.clone();
    let options = ExecutionOptions {
      name: Some(name),
      abort,
      history: history.clone(),
    };
    tokio::spawn(async move {
      let run = AssertUnwindSafe(runtime.execute(input, options).wait()).catch_unwind();
      let outcome = match run.await {
        Ok(outcome) => outcome,
        Err(panic) => {
          let cause = format!("execution panicked: {}", panic_message(panic.as_ref()));
          error!(execution_id = %record.execution_id, cause = %cause, "execution_panicked");
          let error = StatesError::runtime(cause);
          history.append(HistoryEventKind::ExecutionFailed {
            error: error.error.clone(),
            cause: error.cause.clone(),
          });
          ExecutionOutcome {
            execution_id: record.execution_id,
            name: record.name,
            state_machine: record.state_machine,
            status: ExecutionStatus::Failed,
            input: record.input.0,
            output: None,
            error: Some(error),
            started_at: record.started_at,
            stopped_at: Utc::now(),
          }
        }
      };

      if let Err(err) = save_outcome(store.as_ref(), &outcome, &history.events()).await {
        error!(
          execution_id = %outcome.execution_id,
          error = %err,
          "execution_persist_failed"
        );
      }
      // Finished executions are served from the store.
      executions
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&outcome.execution_id);
      done.send_replace(Some(outcome));
    });

    Ok(execution_id)
  }

  fn current_state(&self, execution_id: &str) -> Option<String> {
    self
      .executions
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .get(execution_id)
      .filter(|tracked| tracked.is_running())
      .and_then(|tracked| tracked.history.current_state())
  }

  /// Status, input, output or error, and the current state of an execution.
  pub async fn describe_execution(
    &self,
    execution_id: &str,
  ) -> Result<ExecutionDescription, EngineError> {
    let record = self.record(execution_id).await?;
    let current_state = self.current_state(execution_id);
    Ok(ExecutionDescription::from_record(record, current_state))
  }

  async fn record(&self, execution_id: &str) -> Result<ExecutionRecord, EngineError> {
    match self.store.get_execution(execution_id).await {
      Ok(record) => Ok(record),
      Err(stately_store::Error::NotFound(_)) => Err(EngineError::ExecutionNotFound {
        execution_id: execution_id.to_string(),
      }),
      Err(err) => Err(err.into()),
    }
  }

  /// Every history event of an execution so far.
  pub async fn get_execution_history(
    &self,
    execution_id: &str,
  ) -> Result<Vec<HistoryEvent>, EngineError> {
    let live = self
      .executions
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .get(execution_id)
      .filter(|tracked| tracked.is_running())
      .map(|tracked| tracked.history.events());
    if let Some(events) = live {
      return Ok(events);
    }

    let entries = self.store.get_history(execution_id).await?;
    if entries.is_empty() {
      // Distinguish "no events yet" from "no such execution".
      self.record(execution_id).await?;
    }
    Ok(history_events(entries)?)
  }

  /// Executions of a state machine, newest first.
  pub async fn list_executions(
    &self,
    arn: &str,
  ) -> Result<Vec<ExecutionDescription>, EngineError> {
    let runtime = self.machine(arn)?;
    let records = self.store.list_executions(runtime.name()).await?;
    Ok(
      records
        .into_iter()
        .map(|record| {
          let current_state = self.current_state(&record.execution_id);
          ExecutionDescription::from_record(record, current_state)
        })
        .collect(),
    )
  }

  /// Complete a `.waitForTaskToken` task.
  pub fn send_task_success(&self, token: &str, output: Value) -> Result<(), EngineError> {
    Ok(self.tokens.send_success(token, output)?)
  }

  /// Fail a `.waitForTaskToken` task; Retry and Catch apply to `error`.
  pub fn send_task_failure(
    &self,
    token: &str,
    error: impl Into<String>,
    cause: impl Into<String>,
  ) -> Result<(), EngineError> {
    Ok(self.tokens.send_failure(token, error, cause)?)
  }

  /// Reset the `HeartbeatSeconds` timer of a `.waitForTaskToken` task.
  pub fn send_task_heartbeat(&self, token: &str) -> Result<(), EngineError> {
    Ok(self.tokens.send_heartbeat(token)?)
  }

  /// Stop a running execution. It ends `ABORTED` with the given error and
  /// cause.
  pub async fn stop_execution(
    &self,
    execution_id: &str,
    error: Option<String>,
    cause: Option<String>,
  ) -> Result<(), EngineError> {
    let abort = self
      .executions
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .get(execution_id)
      .filter(|tracked| tracked.is_running())
      .map(|tracked| tracked.abort.clone());

    match abort {
      Some(abort) => {
        info!(execution_id, "execution_stop_requested");
        abort.abort(error, cause);
        Ok(())
      }
      None => {
        self.record(execution_id).await?;
        Err(EngineError::ExecutionNotRunning {
          execution_id: execution_id.to_string(),
        })
      }
    }
  }

  /// Wait until an execution started by this service reaches a final status.
  pub async fn wait_for_execution(
    &self,
    execution_id: &str,
  ) -> Result<ExecutionDescription, EngineError> {
    let receiver = self
      .executions
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .get(execution_id)
      .map(|tracked| tracked.outcome.clone());

    if let Some(mut receiver) = receiver {
      // The sender is dropped only after publishing the outcome.
      let _ = receiver.wait_for(Option::is_some).await;
    }
    self.describe_execution(execution_id).await
  }

  /// The shared token registry.
  pub fn tokens(&self) -> &Arc<TaskTokenRegistry> {
    &self.tokens
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use stately_runtime::MockTaskExecutor;
  use stately_store::MemoryStore;

  #[tokio::test]
  async fn test_finished_executions_are_released() {
    let service = ExecutionService::new(Arc::new(MemoryStore::new()), EngineConfig::default());
    let definition = StateMachineDefinition::from_value(json!({
      "StartAt": "Echo",
      "States": {"Echo": {"Type": "Pass", "End": true}}
    }))
    .unwrap();
    let arn = service
      .register_state_machine("echo", definition, Arc::new(MockTaskExecutor::new()))
      .unwrap();

    for n in 0..3 {
      let id = service.start_execution(&arn, json!({"n": n}), None).await.unwrap();
      let description = service.wait_for_execution(&id).await.unwrap();
      assert_eq!(description.status, ExecutionStatus::Succeeded);
      assert!(!service.get_execution_history(&id).await.unwrap().is_empty());
    }
    assert!(service.executions.lock().unwrap().is_empty());
  }
}
