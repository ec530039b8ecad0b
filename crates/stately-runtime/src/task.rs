//! Task execution seam.
//!
//! The runtime never performs work itself: a `Task` state builds a payload
//! and hands it to a [`TaskExecutor`]. How the runtime then waits depends on
//! the [`IntegrationPattern`] encoded in the resource name.

use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StatesError;

const SYNC_SUFFIXES: [&str; 2] = [".sync:2", ".sync"];
const TOKEN_SUFFIX: &str = ".waitForTaskToken";

/// How the runtime waits for a task to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationPattern {
  /// The executor's response is the result.
  RequestResponse,
  /// The executor starts a job; the result is the job's completion (`.sync`).
  RunJob,
  /// The executor hands off a task token; the result arrives through
  /// `SendTaskSuccess` / `SendTaskFailure` (`.waitForTaskToken`).
  WaitForTaskToken,
}

impl IntegrationPattern {
  /// Split a resource into its pattern and the resource without the suffix.
  pub fn from_resource(resource: &str) -> (Self, &str) {
    if let Some(base) = resource.strip_suffix(TOKEN_SUFFIX) {
      return (IntegrationPattern::WaitForTaskToken, base);
    }
    for suffix in SYNC_SUFFIXES {
      if let Some(base) = resource.strip_suffix(suffix) {
        return (IntegrationPattern::RunJob, base);
      }
    }
    (IntegrationPattern::RequestResponse, resource)
  }
}

/// A unit of work handed to a [`TaskExecutor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
  pub execution_id: String,
  pub state_name: String,
  /// The resource exactly as written in the definition.
  pub resource: String,
  pub pattern: IntegrationPattern,
  pub payload: Value,
  /// Set for [`IntegrationPattern::WaitForTaskToken`].
  pub task_token: Option<String>,
  /// 1 for the first attempt, increasing with each retry.
  pub attempt: u32,
}

impl TaskRequest {
  /// The resource with any integration suffix removed.
  pub fn base_resource(&self) -> &str {
    IntegrationPattern::from_resource(&self.resource).1
  }
}

/// What an executor returns for a successfully started task.
pub enum TaskOutcome {
  /// The task's result.
  Completed(Value),
  /// A running job; the task's result is whatever it resolves to.
  Job(BoxFuture<'static, Result<Value, StatesError>>),
}

impl fmt::Debug for TaskOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TaskOutcome::Completed(value) => f.debug_tuple("Completed").field(value).finish(),
      TaskOutcome::Job(_) => f.write_str("Job(..)"),
    }
  }
}

/// Performs the work behind `Task` states, ItemReaders and ResultWriters.
///
/// Errors are reported as [`StatesError`]s so `Retry` and `Catch` can match
/// them by name.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
  async fn invoke(&self, request: TaskRequest) -> Result<TaskOutcome, StatesError>;
}
