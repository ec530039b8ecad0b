//! Execution events and notifiers for observability.
//!
//! Events are emitted while an execution runs so consumers can observe
//! progress, persist child executions, stream to UIs, etc. They are a lighter
//! live feed next to the [`HistoryLog`](crate::HistoryLog).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::execution::ExecutionOutcome;
use crate::history::HistoryEvent;

/// Events emitted during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// An execution (or a distributed Map child) has started.
  ExecutionStarted {
    execution_id: String,
    state_machine: String,
    parent_execution_id: Option<String>,
  },

  /// A state has been entered.
  StateEntered { execution_id: String, state: String },

  /// A state finished and produced output.
  StateExited {
    execution_id: String,
    state: String,
    output: serde_json::Value,
  },

  /// A state failed; Retry or Catch may still handle it.
  StateFailed {
    execution_id: String,
    state: String,
    error: String,
    cause: String,
  },

  /// A top-level execution reached a final status.
  ExecutionFinished { outcome: ExecutionOutcome },

  /// A distributed Map child reached a final status.
  ChildExecutionFinished {
    parent_execution_id: String,
    outcome: ExecutionOutcome,
    history: Vec<HistoryEvent>,
  },
}

/// Trait for receiving execution events.
///
/// The runtime calls `notify` for each event; implementations decide what to
/// do with them (persist, broadcast, log, ignore, etc.).
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // NOTE: Unbounded so a slow consumer never stalls an execution. Volume is a
  // handful of events per state.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
