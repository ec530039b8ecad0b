use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Status of an execution as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Running,
  Succeeded,
  Failed,
  Aborted,
  TimedOut,
}

impl ExecutionStatus {
  pub fn is_terminal(&self) -> bool {
    *self != ExecutionStatus::Running
  }
}

/// An execution as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExecutionRecord {
  pub execution_id: String,
  pub name: String,
  pub state_machine: String,
  /// Set for distributed Map children.
  pub parent_execution_id: Option<String>,
  pub status: ExecutionStatus,
  pub input: Json<serde_json::Value>,
  pub output: Option<Json<serde_json::Value>>,
  pub error: Option<String>,
  pub cause: Option<String>,
  pub started_at: DateTime<Utc>,
  pub stopped_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
  /// A new `Running` record.
  pub fn running(
    execution_id: impl Into<String>,
    name: impl Into<String>,
    state_machine: impl Into<String>,
    input: serde_json::Value,
  ) -> Self {
    Self {
      execution_id: execution_id.into(),
      name: name.into(),
      state_machine: state_machine.into(),
      parent_execution_id: None,
      status: ExecutionStatus::Running,
      input: Json(input),
      output: None,
      error: None,
      cause: None,
      started_at: Utc::now(),
      stopped_at: None,
    }
  }
}

/// One history event of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HistoryEntry {
  pub execution_id: String,
  pub event_id: i64,
  pub event_type: String,
  pub timestamp: DateTime<Utc>,
  /// The full event as JSON.
  pub details: Json<serde_json::Value>,
}
