//! Mapping runtime outcomes and history onto store records.

use std::sync::Arc;

use sqlx::types::Json;
use stately_runtime::{
  ExecutionEvent, ExecutionNotifier, ExecutionOutcome, ExecutionStatus, HistoryEvent,
};
use stately_store::{ExecutionRecord, HistoryEntry, Store};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::EngineError;

pub(crate) fn to_stored(status: ExecutionStatus) -> stately_store::ExecutionStatus {
  match status {
    ExecutionStatus::Running => stately_store::ExecutionStatus::Running,
    ExecutionStatus::Succeeded => stately_store::ExecutionStatus::Succeeded,
    ExecutionStatus::Failed => stately_store::ExecutionStatus::Failed,
    ExecutionStatus::Aborted => stately_store::ExecutionStatus::Aborted,
    ExecutionStatus::TimedOut => stately_store::ExecutionStatus::TimedOut,
  }
}

pub(crate) fn from_stored(status: stately_store::ExecutionStatus) -> ExecutionStatus {
  match status {
    stately_store::ExecutionStatus::Running => ExecutionStatus::Running,
    stately_store::ExecutionStatus::Succeeded => ExecutionStatus::Succeeded,
    stately_store::ExecutionStatus::Failed => ExecutionStatus::Failed,
    stately_store::ExecutionStatus::Aborted => ExecutionStatus::Aborted,
    stately_store::ExecutionStatus::TimedOut => ExecutionStatus::TimedOut,
  }
}

/// The final record of a finished execution.
pub(crate) fn finished_record(
  outcome: &ExecutionOutcome,
  parent_execution_id: Option<String>,
) -> ExecutionRecord {
  ExecutionRecord {
    execution_id: outcome.execution_id.clone(),
    name: outcome.name.clone(),
    state_machine: outcome.state_machine.clone(),
    parent_execution_id,
    status: to_stored(outcome.status),
    input: Json(outcome.input.clone()),
    output: outcome.output.clone().map(Json),
    error: outcome.error.as_ref().map(|e| e.error.clone()),
    cause: outcome.error.as_ref().map(|e| e.cause.clone()),
    started_at: outcome.started_at,
    stopped_at: Some(outcome.stopped_at),
  }
}

pub(crate) fn history_entries(
  execution_id: &str,
  events: &[HistoryEvent],
) -> Result<Vec<HistoryEntry>, serde_json::Error> {
  events
    .iter()
    .map(|event| {
      Ok(HistoryEntry {
        execution_id: execution_id.to_string(),
        event_id: i64::try_from(event.id).unwrap_or(i64::MAX),
        event_type: event.kind.name().to_string(),
        timestamp: event.timestamp,
        details: Json(serde_json::to_value(event)?),
      })
    })
    .collect()
}

pub(crate) fn history_events(
  entries: Vec<HistoryEntry>,
) -> Result<Vec<HistoryEvent>, serde_json::Error> {
  entries
    .into_iter()
    .map(|entry| serde_json::from_value(entry.details.0))
    .collect()
}

/// Write a finished execution and its history.
pub(crate) async fn save_outcome(
  store: &dyn Store,
  outcome: &ExecutionOutcome,
  history: &[HistoryEvent],
) -> Result<(), EngineError> {
  store.update_execution(&finished_record(outcome, None)).await?;
  store
    .append_history(&history_entries(&outcome.execution_id, history)?)
    .await?;
  Ok(())
}

/// Forwards runtime events to the persistence task and to an optional
/// caller-supplied notifier.
pub(crate) struct PersistingNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
  forward: Option<Arc<dyn ExecutionNotifier>>,
}

impl PersistingNotifier {
  pub(crate) fn new(
    sender: mpsc::UnboundedSender<ExecutionEvent>,
    forward: Option<Arc<dyn ExecutionNotifier>>,
  ) -> Self {
    Self { sender, forward }
  }
}

impl ExecutionNotifier for PersistingNotifier {
  fn notify(&self, event: ExecutionEvent) {
    if let Some(forward) = &self.forward {
      forward.notify(event.clone());
    }
    if matches!(event, ExecutionEvent::ChildExecutionFinished { .. }) {
      // Fails only once the service is gone.
      let _ = self.sender.send(event);
    }
  }
}

/// Persist distributed Map children as they finish. Top-level executions
/// are saved by the task that runs them.
pub(crate) async fn persist_children(
  store: Arc<dyn Store>,
  mut events: mpsc::UnboundedReceiver<ExecutionEvent>,
) {
  while let Some(event) = events.recv().await {
    let ExecutionEvent::ChildExecutionFinished {
      parent_execution_id,
      outcome,
      history,
    } = event
    else {
      continue;
    };

    debug!(
      execution_id = %outcome.execution_id,
      parent_execution_id = %parent_execution_id,
      "child_execution_persisting"
    );
    let record = finished_record(&outcome, Some(parent_execution_id));
    let result = async {
      store.create_execution(&record).await?;
      store
        .append_history(&history_entries(&outcome.execution_id, &history)?)
        .await?;
      Ok::<_, EngineError>(())
    }
    .await;

    if let Err(err) = result {
      error!(
        execution_id = %outcome.execution_id,
        error = %err,
        "child_execution_persist_failed"
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;
  use serde_json::json;
  use stately_runtime::{HistoryEventKind, HistoryLog, StatesError};

  #[test]
  fn test_history_round_trips_through_entries() {
    let log = HistoryLog::new();
    log.append(HistoryEventKind::ExecutionStarted { input: json!({"a": 1}) });
    log.append(HistoryEventKind::StateEntered {
      state: "Work".to_string(),
      state_type: "Task".to_string(),
      input: json!({"a": 1}),
    });
    let events = log.events();

    let entries = history_entries("m:run", &events).unwrap();
    assert_eq!(entries[1].event_id, 2);
    assert_eq!(entries[1].event_type, "StateEntered");
    assert_eq!(history_events(entries).unwrap(), events);
  }

  #[test]
  fn test_finished_record_carries_error() {
    let now = Utc::now();
    let outcome = ExecutionOutcome {
      execution_id: "m:run".to_string(),
      name: "run".to_string(),
      state_machine: "m".to_string(),
      status: ExecutionStatus::Failed,
      input: json!({}),
      output: None,
      error: Some(StatesError::new("Boom", "broken")),
      started_at: now,
      stopped_at: now,
    };

    let record = finished_record(&outcome, Some("parent".to_string()));
    assert_eq!(record.status, stately_store::ExecutionStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("Boom"));
    assert_eq!(record.cause.as_deref(), Some("broken"));
    assert_eq!(record.parent_execution_id.as_deref(), Some("parent"));
  }
}
