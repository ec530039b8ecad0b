//! Per-execution scope and the `$$` context object.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::history::HistoryLog;

/// What every state of one execution shares.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
  pub execution_id: String,
  pub execution_name: String,
  pub state_machine: String,
  pub input: Value,
  pub start_time: DateTime<Utc>,
  pub history: HistoryLog,
}

impl Scope {
  /// The context object for a state entered at `entered`.
  pub fn context(&self, state: &str, entered: DateTime<Utc>, retry_count: u32) -> Value {
    json!({
      "Execution": {
        "Id": self.execution_id,
        "Name": self.execution_name,
        "Input": self.input,
        "StartTime": timestamp(self.start_time),
      },
      "StateMachine": {
        "Id": self.state_machine,
        "Name": self.state_machine,
      },
      "State": {
        "Name": state,
        "EnteredTime": timestamp(entered),
        "RetryCount": retry_count,
      },
    })
  }
}

/// Add `Task.Token` to a context object.
pub(crate) fn with_task_token(mut context: Value, token: &str) -> Value {
  if let Value::Object(map) = &mut context {
    map.insert("Task".to_string(), json!({"Token": token}));
  }
  context
}

/// Add `Map.Item` to a context object.
pub(crate) fn with_map_item(mut context: Value, index: usize, value: &Value) -> Value {
  if let Value::Object(map) = &mut context {
    map.insert(
      "Map".to_string(),
      json!({"Item": {"Index": index, "Value": value}}),
    );
  }
  context
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
