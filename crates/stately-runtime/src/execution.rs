//! State machine execution.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stately_definition::error_name;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::context::Scope;
use crate::error::{Halt, StatesError};
use crate::events::ExecutionEvent;
use crate::history::{HistoryEventKind, HistoryLog};
use crate::runtime::StateMachineRuntime;

/// Lifecycle status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
  Running,
  Succeeded,
  Failed,
  Aborted,
  TimedOut,
}

impl ExecutionStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ExecutionStatus::Running => "RUNNING",
      ExecutionStatus::Succeeded => "SUCCEEDED",
      ExecutionStatus::Failed => "FAILED",
      ExecutionStatus::Aborted => "ABORTED",
      ExecutionStatus::TimedOut => "TIMED_OUT",
    }
  }

  pub fn is_terminal(&self) -> bool {
    *self != ExecutionStatus::Running
  }
}

/// Final result of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
  pub execution_id: String,
  pub name: String,
  pub state_machine: String,
  pub status: ExecutionStatus,
  pub input: Value,
  /// Set when the execution succeeded.
  pub output: Option<Value>,
  /// Set when the execution failed, was aborted or timed out.
  pub error: Option<StatesError>,
  pub started_at: DateTime<Utc>,
  pub stopped_at: DateTime<Utc>,
}

/// Stops a running execution.
///
/// Cloning shares the signal. The first reason given wins.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
  token: CancellationToken,
  reason: Arc<Mutex<Option<StatesError>>>,
}

impl AbortSignal {
  pub fn new() -> Self {
    Self::default()
  }

  /// Wrap an existing token, e.g. one derived from a runner's shutdown token.
  pub fn from_token(token: CancellationToken) -> Self {
    Self {
      token,
      reason: Arc::default(),
    }
  }

  pub fn abort(&self, error: Option<String>, cause: Option<String>) {
    {
      let mut reason = self.reason.lock().unwrap_or_else(|e| e.into_inner());
      if reason.is_none() {
        *reason = Some(StatesError::new(
          error.unwrap_or_default(),
          cause.unwrap_or_default(),
        ));
      }
    }
    self.token.cancel();
  }

  pub fn is_aborted(&self) -> bool {
    self.token.is_cancelled()
  }

  pub fn token(&self) -> &CancellationToken {
    &self.token
  }

  fn reason(&self) -> StatesError {
    self
      .reason
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
      .unwrap_or_else(|| StatesError::new("", ""))
  }
}

/// Options for starting an execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
  /// Execution name; a UUID when unset.
  pub name: Option<String>,
  pub abort: AbortSignal,
  /// Log the execution writes to. Pass a clone in to read history while the
  /// execution runs.
  pub history: HistoryLog,
}

/// A handle to an execution.
///
/// Call `.wait()` to run the execution and get its outcome.
pub struct Execution<'a> {
  runtime: &'a StateMachineRuntime,
  scope: Scope,
  abort: AbortSignal,
}

impl<'a> Execution<'a> {
  pub(crate) fn new(runtime: &'a StateMachineRuntime, scope: Scope, abort: AbortSignal) -> Self {
    Self {
      runtime,
      scope,
      abort,
    }
  }

  pub fn execution_id(&self) -> &str {
    &self.scope.execution_id
  }

  pub fn name(&self) -> &str {
    &self.scope.execution_name
  }

  pub fn history(&self) -> &HistoryLog {
    &self.scope.history
  }

  pub fn abort_signal(&self) -> &AbortSignal {
    &self.abort
  }

  /// Run the execution to a final status.
  #[instrument(
    name = "execution",
    skip(self),
    fields(
      state_machine = %self.scope.state_machine,
      execution_id = %self.scope.execution_id,
    )
  )]
  pub async fn wait(self) -> ExecutionOutcome {
    let runtime = self.runtime;
    let scope = &self.scope;

    info!(
      execution_id = %scope.execution_id,
      state_machine = %scope.state_machine,
      input = %scope.input,
      "execution_started"
    );
    scope.history.append(HistoryEventKind::ExecutionStarted {
      input: scope.input.clone(),
    });
    runtime.notifier.notify(ExecutionEvent::ExecutionStarted {
      execution_id: scope.execution_id.clone(),
      state_machine: scope.state_machine.clone(),
      parent_execution_id: None,
    });

    let finish = match runtime.check_size(&scope.input) {
      Err(err) => Finish::Completed(Err(err.into())),
      Ok(()) => {
        let run = runtime.run_graph(
          &runtime.definition.graph,
          scope.input.clone(),
          scope,
          self.abort.token(),
        );
        match runtime.definition.timeout_seconds {
          Some(seconds) => match tokio::time::timeout(Duration::from_secs(seconds), run).await {
            Ok(result) => Finish::Completed(result),
            Err(_) => Finish::TimedOut(seconds),
          },
          None => Finish::Completed(run.await),
        }
      }
    };

    let outcome = conclude(scope, finish, || self.abort.reason());
    runtime.notifier.notify(ExecutionEvent::ExecutionFinished {
      outcome: outcome.clone(),
    });
    outcome
  }
}

/// How a run ended.
pub(crate) enum Finish {
  Completed(Result<Value, Halt>),
  TimedOut(u64),
}

/// Record the final history event and build the outcome.
pub(crate) fn conclude(
  scope: &Scope,
  finish: Finish,
  abort_reason: impl FnOnce() -> StatesError,
) -> ExecutionOutcome {
  let (status, output, error) = match finish {
    Finish::Completed(Ok(output)) => {
      info!(execution_id = %scope.execution_id, "execution_succeeded");
      scope.history.append(HistoryEventKind::ExecutionSucceeded {
        output: output.clone(),
      });
      (ExecutionStatus::Succeeded, Some(output), None)
    }
    Finish::Completed(Err(Halt::Failed(err))) => {
      error!(
        execution_id = %scope.execution_id,
        error = %err.error,
        cause = %err.cause,
        "execution_failed"
      );
      scope.history.append(HistoryEventKind::ExecutionFailed {
        error: err.error.clone(),
        cause: err.cause.clone(),
      });
      (ExecutionStatus::Failed, None, Some(err))
    }
    Finish::Completed(Err(Halt::Aborted)) => {
      let reason = abort_reason();
      warn!(
        execution_id = %scope.execution_id,
        error = %reason.error,
        cause = %reason.cause,
        "execution_aborted"
      );
      scope.history.append(HistoryEventKind::ExecutionAborted {
        error: reason.error.clone(),
        cause: reason.cause.clone(),
      });
      (ExecutionStatus::Aborted, None, Some(reason))
    }
    Finish::TimedOut(seconds) => {
      let err = StatesError::new(
        error_name::TIMEOUT,
        format!("execution did not finish within {seconds}s"),
      );
      warn!(execution_id = %scope.execution_id, timeout_seconds = seconds, "execution_timed_out");
      scope.history.append(HistoryEventKind::ExecutionTimedOut {
        error: err.error.clone(),
        cause: err.cause.clone(),
      });
      (ExecutionStatus::TimedOut, None, Some(err))
    }
  };

  ExecutionOutcome {
    execution_id: scope.execution_id.clone(),
    name: scope.execution_name.clone(),
    state_machine: scope.state_machine.clone(),
    status,
    input: scope.input.clone(),
    output,
    error,
    started_at: scope.start_time,
    stopped_at: Utc::now(),
  }
}
