//! Task dispatch for the three integration patterns.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use stately_definition::{TaskState, error_name};
use stately_path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::context::{Scope, with_task_token};
use crate::error::{Halt, StatesError};
use crate::history::HistoryEventKind;
use crate::runtime::StateMachineRuntime;
use crate::task::{IntegrationPattern, TaskOutcome, TaskRequest};

impl StateMachineRuntime {
  /// Run one attempt of a Task state and return its raw result.
  #[allow(clippy::too_many_arguments)]
  #[instrument(
    name = "task",
    skip(self, task, effective, context, scope, cancel),
    fields(execution_id = %scope.execution_id)
  )]
  pub(crate) async fn run_task(
    &self,
    name: &str,
    task: &TaskState,
    effective: &Value,
    context: Value,
    attempt: u32,
    scope: &Scope,
    cancel: &CancellationToken,
  ) -> Result<Value, Halt> {
    let (pattern, _) = IntegrationPattern::from_resource(&task.resource);
    let mut registration =
      (pattern == IntegrationPattern::WaitForTaskToken).then(|| self.tokens.issue());
    let token = registration.as_ref().map(|r| r.token().to_string());
    let context = match &token {
      Some(token) => with_task_token(context, token),
      None => context,
    };

    let payload = match &task.parameters {
      Some(template) => template
        .resolve(effective, &context, self.random.as_ref())
        .map_err(StatesError::from_template)?,
      None => effective.clone(),
    };
    self.check_size(&payload)?;

    let timeout = limit(
      task.timeout_seconds,
      task.timeout_seconds_path.as_ref(),
      effective,
      &context,
    )?;
    let heartbeat = limit(
      task.heartbeat_seconds,
      task.heartbeat_seconds_path.as_ref(),
      effective,
      &context,
    )?;

    info!(
      execution_id = %scope.execution_id,
      state = name,
      resource = %task.resource,
      attempt,
      "task_scheduled"
    );
    scope.history.append(HistoryEventKind::TaskScheduled {
      state: name.to_string(),
      resource: task.resource.clone(),
      payload: payload.clone(),
      attempt,
      timeout_seconds: timeout.map(|t| t.as_secs()),
      heartbeat_seconds: heartbeat.map(|h| h.as_secs()),
    });

    let request = TaskRequest {
      execution_id: scope.execution_id.clone(),
      state_name: name.to_string(),
      resource: task.resource.clone(),
      pattern,
      payload,
      task_token: token.clone(),
      attempt,
    };

    let work = async {
      let outcome = self.executor.invoke(request).await?;
      match (registration.as_mut(), outcome) {
        (Some(registration), _) => {
          scope.history.append(HistoryEventKind::TaskSubmitted {
            state: name.to_string(),
            resource: task.resource.clone(),
            task_token: registration.token().to_string(),
          });
          registration.wait(heartbeat).await
        }
        (None, TaskOutcome::Completed(output)) => Ok(output),
        (None, TaskOutcome::Job(job)) => job.await,
      }
    };

    let result = tokio::select! {
      _ = cancel.cancelled() => return Err(Halt::Aborted),
      result = bounded(timeout, work) => result,
    };
    let result = result.and_then(|output| self.check_size(&output).map(|_| output));

    match result {
      Ok(output) => {
        info!(execution_id = %scope.execution_id, state = name, "task_succeeded");
        scope.history.append(HistoryEventKind::TaskSucceeded {
          state: name.to_string(),
          resource: task.resource.clone(),
          output: output.clone(),
        });
        Ok(output)
      }
      Err(err) => {
        warn!(
          execution_id = %scope.execution_id,
          state = name,
          error = %err.error,
          cause = %err.cause,
          "task_failed"
        );
        scope.history.append(HistoryEventKind::TaskFailed {
          state: name.to_string(),
          resource: task.resource.clone(),
          error: err.error.clone(),
          cause: err.cause.clone(),
        });
        Err(err.into())
      }
    }
  }

  /// Invoke a resource outside a Task state (ItemReader, ResultWriter) and
  /// wait for its result.
  pub(crate) async fn invoke_resource(
    &self,
    name: &str,
    resource: &str,
    payload: Value,
    scope: &Scope,
    cancel: &CancellationToken,
  ) -> Result<Value, Halt> {
    let (pattern, _) = IntegrationPattern::from_resource(resource);
    if pattern == IntegrationPattern::WaitForTaskToken {
      return Err(
        StatesError::runtime(format!("'{resource}' cannot use .waitForTaskToken here")).into(),
      );
    }
    let request = TaskRequest {
      execution_id: scope.execution_id.clone(),
      state_name: name.to_string(),
      resource: resource.to_string(),
      pattern,
      payload,
      task_token: None,
      attempt: 1,
    };
    let work = async {
      match self.executor.invoke(request).await? {
        TaskOutcome::Completed(output) => Ok(output),
        TaskOutcome::Job(job) => job.await,
      }
    };
    tokio::select! {
      _ = cancel.cancelled() => Err(Halt::Aborted),
      result = work => result.map_err(Halt::from),
    }
  }
}

/// Resolve `TimeoutSeconds` / `HeartbeatSeconds` or their `...Path` forms.
fn limit(
  fixed: Option<u64>,
  path: Option<&Path>,
  input: &Value,
  context: &Value,
) -> Result<Option<Duration>, StatesError> {
  if let Some(seconds) = fixed {
    return Ok(Some(Duration::from_secs(seconds)));
  }
  let Some(path) = path else {
    return Ok(None);
  };
  let value = path.evaluate(input, context).map_err(StatesError::from_path)?;
  match value.as_u64() {
    Some(seconds) if seconds > 0 => Ok(Some(Duration::from_secs(seconds))),
    _ => Err(StatesError::runtime(format!(
      "'{path}' selected {value} instead of a positive integer"
    ))),
  }
}

async fn bounded(
  timeout: Option<Duration>,
  work: impl Future<Output = Result<Value, StatesError>>,
) -> Result<Value, StatesError> {
  let Some(timeout) = timeout else {
    return work.await;
  };
  match tokio::time::timeout(timeout, work).await {
    Ok(result) => result,
    Err(_) => Err(StatesError::new(
      error_name::TIMEOUT,
      format!("task did not finish within {}s", timeout.as_secs()),
    )),
  }
}
