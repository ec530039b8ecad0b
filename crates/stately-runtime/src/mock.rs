//! Scripted task executor for tests and local runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stately_definition::error_name;
use tracing::debug;

use crate::error::StatesError;
use crate::task::{IntegrationPattern, TaskExecutor, TaskOutcome, TaskRequest};
use crate::token::TaskTokenRegistry;

/// One scripted reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MockResponse {
  Return(Value),
  Throw {
    #[serde(rename = "Error")]
    error: String,
    #[serde(rename = "Cause", default)]
    cause: String,
  },
}

impl MockResponse {
  pub fn throw(error: impl Into<String>, cause: impl Into<String>) -> Self {
    MockResponse::Throw {
      error: error.into(),
      cause: cause.into(),
    }
  }

  fn into_result(self) -> Result<Value, StatesError> {
    match self {
      MockResponse::Return(value) => Ok(value),
      MockResponse::Throw { error, cause } => Err(StatesError::new(error, cause)),
    }
  }
}

/// A [`TaskExecutor`] that replays scripted responses per resource.
///
/// Each call takes the next response in the list; the last one repeats.
/// Resources match exactly first, then with any integration suffix removed.
/// For `.waitForTaskToken` tasks the response is delivered through the token
/// registry, when one is attached.
#[derive(Debug, Default)]
pub struct MockTaskExecutor {
  responses: HashMap<String, Vec<MockResponse>>,
  calls: Mutex<HashMap<String, usize>>,
  requests: Mutex<Vec<TaskRequest>>,
  callbacks: Option<Arc<TaskTokenRegistry>>,
}

impl MockTaskExecutor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse `{"<resource>": [{"Return": ...} | {"Throw": {"Error", "Cause"}}]}`.
  pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
    let responses = serde_json::from_value(value)?;
    Ok(Self {
      responses,
      ..Self::default()
    })
  }

  pub fn with_responses(
    mut self,
    resource: impl Into<String>,
    responses: impl IntoIterator<Item = MockResponse>,
  ) -> Self {
    self
      .responses
      .insert(resource.into(), responses.into_iter().collect());
    self
  }

  /// Complete `.waitForTaskToken` tasks through `tokens`.
  pub fn with_callbacks(mut self, tokens: Arc<TaskTokenRegistry>) -> Self {
    self.callbacks = Some(tokens);
    self
  }

  /// Every request received so far.
  pub fn requests(&self) -> Vec<TaskRequest> {
    self
      .requests
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  pub fn call_count(&self, resource: &str) -> usize {
    self
      .requests
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .filter(|r| r.resource == resource || r.base_resource() == resource)
      .count()
  }

  fn next_response(&self, request: &TaskRequest) -> Option<MockResponse> {
    let key = [request.resource.as_str(), request.base_resource()]
      .into_iter()
      .find(|key| self.responses.contains_key(*key))?;
    let script = self.responses.get(key)?;
    let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
    let count = calls.entry(key.to_string()).or_default();
    let response = script.get(*count).or_else(|| script.last()).cloned();
    *count += 1;
    response
  }
}

#[async_trait]
impl TaskExecutor for MockTaskExecutor {
  async fn invoke(&self, request: TaskRequest) -> Result<TaskOutcome, StatesError> {
    debug!(
      execution_id = %request.execution_id,
      state = %request.state_name,
      resource = %request.resource,
      "mock_task_invoked"
    );
    self
      .requests
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(request.clone());

    let response = self.next_response(&request).ok_or_else(|| {
      StatesError::new(
        error_name::TASK_FAILED,
        format!("no mock response for resource '{}'", request.resource),
      )
    })?;

    match request.pattern {
      IntegrationPattern::RequestResponse => Ok(TaskOutcome::Completed(response.into_result()?)),
      IntegrationPattern::RunJob => {
        let result = response.into_result();
        Ok(TaskOutcome::Job(Box::pin(async move { result })))
      }
      IntegrationPattern::WaitForTaskToken => {
        // The token channel buffers the reply until the runtime waits on it.
        if let (Some(tokens), Some(token)) = (&self.callbacks, &request.task_token) {
          let delivered = match response.into_result() {
            Ok(output) => tokens.send_success(token, output),
            Err(err) => tokens.send_failure(token, err.error, err.cause),
          };
          if let Err(err) = delivered {
            debug!(error = %err, "mock_callback_dropped");
          }
        }
        Ok(TaskOutcome::Completed(Value::Null))
      }
    }
  }
}
