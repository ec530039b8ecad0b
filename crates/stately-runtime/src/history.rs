//! Execution history.
//!
//! Every execution appends an ordered list of [`HistoryEvent`]s as it runs.
//! The log is shared: the engine holds a clone while the execution writes to
//! it, so history can be read before the execution finishes.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry in an execution's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
  /// 1-based, increasing in append order.
  pub id: u64,
  pub timestamp: DateTime<Utc>,
  #[serde(flatten)]
  pub kind: HistoryEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HistoryEventKind {
  ExecutionStarted {
    input: Value,
  },
  ExecutionSucceeded {
    output: Value,
  },
  ExecutionFailed {
    error: String,
    cause: String,
  },
  ExecutionAborted {
    error: String,
    cause: String,
  },
  ExecutionTimedOut {
    error: String,
    cause: String,
  },
  StateEntered {
    state: String,
    state_type: String,
    input: Value,
  },
  StateExited {
    state: String,
    output: Value,
  },
  TaskScheduled {
    state: String,
    resource: String,
    payload: Value,
    attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    heartbeat_seconds: Option<u64>,
  },
  /// A `.waitForTaskToken` task was handed off and is waiting for a callback.
  TaskSubmitted {
    state: String,
    resource: String,
    task_token: String,
  },
  TaskSucceeded {
    state: String,
    resource: String,
    output: Value,
  },
  TaskFailed {
    state: String,
    resource: String,
    error: String,
    cause: String,
  },
  TaskRetryScheduled {
    state: String,
    error: String,
    retry_count: u32,
    delay_ms: u64,
  },
  CatchMatched {
    state: String,
    error: String,
    next: String,
  },
  WaitStarted {
    state: String,
    delay_ms: u64,
  },
  MapIterationStarted {
    state: String,
    index: usize,
  },
  MapIterationSucceeded {
    state: String,
    index: usize,
  },
  MapIterationFailed {
    state: String,
    index: usize,
    error: String,
    cause: String,
  },
  /// A distributed Map item started as its own child execution.
  ChildExecutionStarted {
    state: String,
    index: usize,
    execution_id: String,
  },
}

impl HistoryEventKind {
  /// The variant name, as stored in the `type` field.
  pub fn name(&self) -> &'static str {
    match self {
      HistoryEventKind::ExecutionStarted { .. } => "ExecutionStarted",
      HistoryEventKind::ExecutionSucceeded { .. } => "ExecutionSucceeded",
      HistoryEventKind::ExecutionFailed { .. } => "ExecutionFailed",
      HistoryEventKind::ExecutionAborted { .. } => "ExecutionAborted",
      HistoryEventKind::ExecutionTimedOut { .. } => "ExecutionTimedOut",
      HistoryEventKind::StateEntered { .. } => "StateEntered",
      HistoryEventKind::StateExited { .. } => "StateExited",
      HistoryEventKind::TaskScheduled { .. } => "TaskScheduled",
      HistoryEventKind::TaskSubmitted { .. } => "TaskSubmitted",
      HistoryEventKind::TaskSucceeded { .. } => "TaskSucceeded",
      HistoryEventKind::TaskFailed { .. } => "TaskFailed",
      HistoryEventKind::TaskRetryScheduled { .. } => "TaskRetryScheduled",
      HistoryEventKind::CatchMatched { .. } => "CatchMatched",
      HistoryEventKind::WaitStarted { .. } => "WaitStarted",
      HistoryEventKind::MapIterationStarted { .. } => "MapIterationStarted",
      HistoryEventKind::MapIterationSucceeded { .. } => "MapIterationSucceeded",
      HistoryEventKind::MapIterationFailed { .. } => "MapIterationFailed",
      HistoryEventKind::ChildExecutionStarted { .. } => "ChildExecutionStarted",
    }
  }
}

/// Append-only, shareable history of one execution.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
  events: Arc<Mutex<Vec<HistoryEvent>>>,
}

impl HistoryLog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append an event and return its id.
  pub fn append(&self, kind: HistoryEventKind) -> u64 {
    let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
    let id = events.len() as u64 + 1;
    events.push(HistoryEvent {
      id,
      timestamp: Utc::now(),
      kind,
    });
    id
  }

  /// A snapshot of every event so far.
  pub fn events(&self) -> Vec<HistoryEvent> {
    self
      .events
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  /// Events with an id greater than `after`.
  pub fn events_after(&self, after: u64) -> Vec<HistoryEvent> {
    self
      .events
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .iter()
      .filter(|event| event.id > after)
      .cloned()
      .collect()
  }

  pub fn len(&self) -> usize {
    self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The most recently entered state, if it has not exited yet.
  pub fn current_state(&self) -> Option<String> {
    let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
    for event in events.iter().rev() {
      match &event.kind {
        HistoryEventKind::StateEntered { state, .. } => return Some(state.clone()),
        HistoryEventKind::StateExited { .. }
        | HistoryEventKind::ExecutionSucceeded { .. }
        | HistoryEventKind::ExecutionFailed { .. }
        | HistoryEventKind::ExecutionAborted { .. }
        | HistoryEventKind::ExecutionTimedOut { .. } => return None,
        _ => {}
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_ids_increase() {
    let log = HistoryLog::new();
    assert_eq!(log.append(HistoryEventKind::ExecutionStarted { input: json!({}) }), 1);
    assert_eq!(
      log.append(HistoryEventKind::StateEntered {
        state: "A".to_string(),
        state_type: "Pass".to_string(),
        input: json!({}),
      }),
      2
    );
    assert_eq!(log.len(), 2);
    assert_eq!(log.events_after(1).len(), 1);
    assert_eq!(log.current_state().as_deref(), Some("A"));

    log.append(HistoryEventKind::StateExited {
      state: "A".to_string(),
      output: json!({}),
    });
    assert_eq!(log.current_state(), None);
  }

  #[test]
  fn test_event_serialization() {
    let log = HistoryLog::new();
    log.append(HistoryEventKind::TaskFailed {
      state: "Work".to_string(),
      resource: "r".to_string(),
      error: "E".to_string(),
      cause: "C".to_string(),
    });
    let value = serde_json::to_value(&log.events()[0]).unwrap();
    assert_eq!(value["type"], "TaskFailed");
    assert_eq!(value["state"], "Work");
    assert_eq!(value["id"], 1);
  }
}
