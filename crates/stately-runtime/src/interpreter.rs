//! The run loop: walks a state graph one state at a time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use stately_definition::{
  FailState, PassState, State, StateGraph, Transition, WaitState, error_name,
};
use stately_path::Path;
use stately_path::selector::or_root;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::choice;
use crate::context::Scope;
use crate::custom::CustomStateRequest;
use crate::error::{Halt, StatesError};
use crate::events::ExecutionEvent;
use crate::history::HistoryEventKind;
use crate::retry::Retrier;
use crate::runtime::StateMachineRuntime;

/// Where control goes after a state.
#[derive(Debug)]
pub(crate) enum Step<'a> {
  Next(&'a str, Value),
  End(Value),
}

impl<'a> Step<'a> {
  fn after(state: &'a State, output: Value) -> Result<Self, StatesError> {
    match state.transition() {
      Some(Transition::Next(next)) => Ok(Step::Next(next, output)),
      Some(Transition::End) => Ok(Step::End(output)),
      None => Err(StatesError::runtime(format!(
        "{} state has neither Next nor End",
        state.type_name()
      ))),
    }
  }

  fn output(&self) -> &Value {
    match self {
      Step::Next(_, output) | Step::End(output) => output,
    }
  }
}

impl StateMachineRuntime {
  /// Run `graph` from its `StartAt` until a terminal state.
  ///
  /// Boxed so Parallel branches and Map items can recurse into it.
  pub(crate) fn run_graph<'a>(
    &'a self,
    graph: &'a StateGraph,
    input: Value,
    scope: &'a Scope,
    cancel: &'a CancellationToken,
  ) -> BoxFuture<'a, Result<Value, Halt>> {
    Box::pin(async move {
      let mut name = graph.start_at.as_str();
      let mut input = input;
      loop {
        if cancel.is_cancelled() {
          return Err(Halt::Aborted);
        }
        let state = graph
          .get(name)
          .ok_or_else(|| StatesError::runtime(format!("state '{name}' does not exist")))?;
        match self.run_state(name, state, input, scope, cancel).await? {
          Step::Next(next, output) => {
            name = next;
            input = output;
          }
          Step::End(output) => return Ok(output),
        }
      }
    })
  }

  async fn run_state<'a>(
    &'a self,
    name: &'a str,
    state: &'a State,
    input: Value,
    scope: &'a Scope,
    cancel: &'a CancellationToken,
  ) -> Result<Step<'a>, Halt> {
    let entered = Utc::now();
    debug!(
      execution_id = %scope.execution_id,
      state = name,
      state_type = state.type_name(),
      "state_entered"
    );
    scope.history.append(HistoryEventKind::StateEntered {
      state: name.to_string(),
      state_type: state.type_name().to_string(),
      input: input.clone(),
    });
    self.notifier.notify(ExecutionEvent::StateEntered {
      execution_id: scope.execution_id.clone(),
      state: name.to_string(),
    });

    let result = match state {
      State::Pass(pass) => self.run_pass(name, pass, state, input, scope, entered),
      State::Choice(choice) => {
        let context = scope.context(name, entered, 0);
        effective_input(state, &input, &context).and_then(|effective| {
          let next = choice::choose(choice, &effective, &context)?;
          let output = state_output(state, &effective, &context)?;
          Ok(Step::Next(next, output))
        })
        .map_err(Halt::from)
      }
      State::Wait(wait) => self.run_wait(name, wait, state, input, scope, entered, cancel).await,
      State::Succeed(_) => {
        let context = scope.context(name, entered, 0);
        effective_input(state, &input, &context)
          .and_then(|effective| state_output(state, &effective, &context))
          .map(Step::End)
          .map_err(Halt::from)
      }
      State::Fail(fail) => {
        let context = scope.context(name, entered, 0);
        let err = fail_error(fail, &input, &context);
        info!(
          execution_id = %scope.execution_id,
          state = name,
          error = %err.error,
          "fail_state_reached"
        );
        Err(Halt::Failed(err))
      }
      State::Task(_) | State::Parallel(_) | State::Map(_) | State::Custom(_) => {
        self.run_with_retry(name, state, input, scope, entered, cancel).await
      }
    };

    let step = match result {
      Ok(step) => step,
      Err(halt) => {
        if let Halt::Failed(err) = &halt {
          self.notifier.notify(ExecutionEvent::StateFailed {
            execution_id: scope.execution_id.clone(),
            state: name.to_string(),
            error: err.error.clone(),
            cause: err.cause.clone(),
          });
        }
        return Err(halt);
      }
    };

    self.check_size(step.output())?;
    scope.history.append(HistoryEventKind::StateExited {
      state: name.to_string(),
      output: step.output().clone(),
    });
    self.notifier.notify(ExecutionEvent::StateExited {
      execution_id: scope.execution_id.clone(),
      state: name.to_string(),
      output: step.output().clone(),
    });
    Ok(step)
  }

  fn run_pass<'a>(
    &'a self,
    name: &str,
    pass: &PassState,
    state: &'a State,
    input: Value,
    scope: &Scope,
    entered: DateTime<Utc>,
  ) -> Result<Step<'a>, Halt> {
    let context = scope.context(name, entered, 0);
    let effective = effective_input(state, &input, &context)?;
    let result = match (&pass.result, &pass.parameters) {
      (Some(result), _) => result.clone(),
      (None, Some(template)) => template
        .resolve(&effective, &context, self.random.as_ref())
        .map_err(StatesError::from_template)?,
      (None, None) => effective,
    };
    let document = or_root(pass.result_path.as_ref())
      .inject(input, result)
      .map_err(StatesError::from_path)?;
    let output = state_output(state, &document, &context)?;
    Ok(Step::after(state, output)?)
  }

  #[allow(clippy::too_many_arguments)]
  async fn run_wait<'a>(
    &'a self,
    name: &str,
    wait: &WaitState,
    state: &'a State,
    input: Value,
    scope: &Scope,
    entered: DateTime<Utc>,
    cancel: &CancellationToken,
  ) -> Result<Step<'a>, Halt> {
    let context = scope.context(name, entered, 0);
    let effective = effective_input(state, &input, &context)?;
    let delay = wait_delay(wait, &effective, &context)?;
    scope.history.append(HistoryEventKind::WaitStarted {
      state: name.to_string(),
      delay_ms: millis(delay),
    });
    sleep(delay, cancel).await?;
    let output = state_output(state, &effective, &context)?;
    Ok(Step::after(state, output)?)
  }

  /// Run a Task, Parallel, Map or custom state under its `Retry` and `Catch`
  /// rules.
  async fn run_with_retry<'a>(
    &'a self,
    name: &'a str,
    state: &'a State,
    input: Value,
    scope: &'a Scope,
    entered: DateTime<Utc>,
    cancel: &'a CancellationToken,
  ) -> Result<Step<'a>, Halt> {
    let mut retrier = Retrier::new(state.retry());
    loop {
      let context = scope.context(name, entered, retrier.retry_count());
      let attempt = retrier.retry_count() + 1;
      let err = match self
        .attempt(name, state, &input, context, attempt, scope, cancel)
        .await
      {
        Ok(output) => return Ok(Step::after(state, output)?),
        Err(Halt::Aborted) => return Err(Halt::Aborted),
        Err(Halt::Failed(err)) => err,
      };

      if let Some(delay) = retrier.next_delay(&err.error, self.random.as_ref()) {
        info!(
          execution_id = %scope.execution_id,
          state = name,
          error = %err.error,
          retry_count = retrier.retry_count(),
          delay_ms = millis(delay),
          "state_retry_scheduled"
        );
        scope.history.append(HistoryEventKind::TaskRetryScheduled {
          state: name.to_string(),
          error: err.error.clone(),
          retry_count: retrier.retry_count(),
          delay_ms: millis(delay),
        });
        sleep(delay, cancel).await?;
        continue;
      }

      if let Some(catcher) = state.catch().iter().find(|c| c.matches(&err.error)) {
        info!(
          execution_id = %scope.execution_id,
          state = name,
          error = %err.error,
          next = %catcher.next,
          "state_error_caught"
        );
        scope.history.append(HistoryEventKind::CatchMatched {
          state: name.to_string(),
          error: err.error.clone(),
          next: catcher.next.clone(),
        });
        let document = or_root(catcher.result_path.as_ref())
          .inject(input, err.to_value())
          .map_err(StatesError::from_path)?;
        return Ok(Step::Next(&catcher.next, document));
      }

      warn!(
        execution_id = %scope.execution_id,
        state = name,
        error = %err.error,
        cause = %err.cause,
        "state_failed"
      );
      return Err(Halt::Failed(err));
    }
  }

  /// One attempt: effective input, dispatch, then `ResultSelector`,
  /// `ResultPath` and `OutputPath`.
  #[allow(clippy::too_many_arguments)]
  async fn attempt(
    &self,
    name: &str,
    state: &State,
    input: &Value,
    context: Value,
    attempt: u32,
    scope: &Scope,
    cancel: &CancellationToken,
  ) -> Result<Value, Halt> {
    let effective = effective_input(state, input, &context)?;

    let result = match state {
      State::Task(task) => {
        self
          .run_task(name, task, &effective, context.clone(), attempt, scope, cancel)
          .await?
      }
      State::Parallel(parallel) => {
        let payload = match &parallel.parameters {
          Some(template) => template
            .resolve(&effective, &context, self.random.as_ref())
            .map_err(StatesError::from_template)?,
          None => effective,
        };
        self.run_parallel(name, parallel, payload, scope, cancel).await?
      }
      State::Map(map) => self.run_map(name, map, &effective, &context, scope, cancel).await?,
      State::Custom(custom) => {
        let handler = self.handlers.get(&custom.type_name).ok_or_else(|| {
          StatesError::runtime(format!("no handler for state type '{}'", custom.type_name))
        })?;
        let request = CustomStateRequest {
          execution_id: scope.execution_id.clone(),
          state_name: name.to_string(),
          state: custom.clone(),
          input: effective,
          context: context.clone(),
        };
        tokio::select! {
          _ = cancel.cancelled() => return Err(Halt::Aborted),
          result = handler.execute(request) => result?,
        }
      }
      _ => {
        return Err(
          StatesError::runtime(format!("{} states cannot be retried", state.type_name())).into(),
        );
      }
    };

    let selected = match state.result_selector() {
      Some(template) => template
        .resolve(&result, &context, self.random.as_ref())
        .map_err(StatesError::from_template)?,
      None => result,
    };
    let document = or_root(state.result_path())
      .inject(input.clone(), selected)
      .map_err(StatesError::from_path)?;
    Ok(state_output(state, &document, &context)?)
  }
}

fn effective_input(state: &State, input: &Value, context: &Value) -> Result<Value, StatesError> {
  or_root(state.input_path())
    .select(input, context)
    .map_err(StatesError::from_path)
}

fn state_output(state: &State, document: &Value, context: &Value) -> Result<Value, StatesError> {
  or_root(state.output_path())
    .select(document, context)
    .map_err(StatesError::from_path)
}

fn fail_error(fail: &FailState, input: &Value, context: &Value) -> StatesError {
  let field = |literal: &Option<String>, path: &Option<Path>| -> Result<String, StatesError> {
    match (literal, path) {
      (Some(value), _) => Ok(value.clone()),
      (None, Some(path)) => match path.evaluate(input, context) {
        Ok(Value::String(value)) => Ok(value),
        Ok(other) => Err(StatesError::runtime(format!(
          "'{path}' selected {} instead of a string",
          stately_path::type_name(&other)
        ))),
        Err(err) => Err(StatesError::from_path(err)),
      },
      (None, None) => Ok(String::new()),
    }
  };
  let error = match field(&fail.error, &fail.error_path) {
    Ok(error) => error,
    Err(err) => return err,
  };
  match field(&fail.cause, &fail.cause_path) {
    Ok(cause) => StatesError::new(error, cause),
    Err(err) => err,
  }
}

fn wait_delay(wait: &WaitState, input: &Value, context: &Value) -> Result<Duration, StatesError> {
  if let Some(seconds) = wait.seconds {
    return Ok(Duration::from_secs(seconds));
  }
  if let Some(path) = &wait.seconds_path {
    let value = path.evaluate(input, context).map_err(StatesError::from_path)?;
    return value.as_u64().map(Duration::from_secs).ok_or_else(|| {
      StatesError::runtime(format!(
        "SecondsPath '{path}' selected {value} instead of a non-negative integer"
      ))
    });
  }
  if let Some(timestamp) = &wait.timestamp {
    return until(timestamp);
  }
  if let Some(path) = &wait.timestamp_path {
    let value = path.evaluate(input, context).map_err(StatesError::from_path)?;
    let Some(timestamp) = value.as_str() else {
      return Err(StatesError::runtime(format!(
        "TimestampPath '{path}' selected {value} instead of a timestamp string"
      )));
    };
    return until(timestamp);
  }
  Err(StatesError::runtime("Wait state has no duration"))
}

fn until(timestamp: &str) -> Result<Duration, StatesError> {
  let at = DateTime::parse_from_rfc3339(timestamp)
    .map_err(|e| StatesError::runtime(format!("'{timestamp}' is not an RFC 3339 timestamp: {e}")))?;
  // Past instants do not wait.
  Ok(
    (at.with_timezone(&Utc) - Utc::now())
      .to_std()
      .unwrap_or(Duration::ZERO),
  )
}

/// Sleep unless cancelled first.
pub(crate) async fn sleep(delay: Duration, cancel: &CancellationToken) -> Result<(), Halt> {
  tokio::select! {
    _ = cancel.cancelled() => Err(Halt::Aborted),
    _ = tokio::time::sleep(delay) => Ok(()),
  }
}

pub(crate) fn millis(delay: Duration) -> u64 {
  u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}
