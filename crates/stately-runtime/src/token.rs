//! Task token callbacks for `.waitForTaskToken` tasks.
//!
//! A waiting task registers a token and parks on a channel. External callers
//! complete it with [`TaskTokenRegistry::send_success`] or
//! [`TaskTokenRegistry::send_failure`], or keep it alive with
//! [`TaskTokenRegistry::send_heartbeat`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use stately_definition::error_name;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{StatesError, TokenError};

#[derive(Debug)]
enum TokenSignal {
  Success(Value),
  Failure(StatesError),
  Heartbeat,
}

/// Tokens of tasks currently waiting for a callback.
#[derive(Debug, Default)]
pub struct TaskTokenRegistry {
  pending: Mutex<HashMap<String, mpsc::UnboundedSender<TokenSignal>>>,
}

impl TaskTokenRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Issue a fresh token. The token is withdrawn when the returned
  /// registration is dropped.
  pub(crate) fn issue(self: &Arc<Self>) -> TokenRegistration {
    let token = uuid::Uuid::new_v4().to_string();
    let (sender, receiver) = mpsc::unbounded_channel();
    self
      .pending
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .insert(token.clone(), sender);
    TokenRegistration {
      token,
      receiver,
      registry: Arc::clone(self),
    }
  }

  /// Complete the task with `output`.
  pub fn send_success(&self, token: &str, output: Value) -> Result<(), TokenError> {
    self.finish(token, TokenSignal::Success(output))
  }

  /// Fail the task with an error name and cause.
  pub fn send_failure(
    &self,
    token: &str,
    error: impl Into<String>,
    cause: impl Into<String>,
  ) -> Result<(), TokenError> {
    self.finish(token, TokenSignal::Failure(StatesError::new(error, cause)))
  }

  /// Reset the task's heartbeat timer.
  pub fn send_heartbeat(&self, token: &str) -> Result<(), TokenError> {
    let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
    let sender = pending.get(token).ok_or_else(|| missing(token))?;
    sender
      .send(TokenSignal::Heartbeat)
      .map_err(|_| missing(token))
  }

  pub fn is_pending(&self, token: &str) -> bool {
    self
      .pending
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .contains_key(token)
  }

  /// Tokens currently waiting, in no particular order.
  pub fn pending_tokens(&self) -> Vec<String> {
    self
      .pending
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .keys()
      .cloned()
      .collect()
  }

  fn finish(&self, token: &str, signal: TokenSignal) -> Result<(), TokenError> {
    let sender = self
      .pending
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .remove(token)
      .ok_or_else(|| missing(token))?;
    sender.send(signal).map_err(|_| missing(token))
  }

  fn withdraw(&self, token: &str) {
    self
      .pending
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .remove(token);
  }
}

fn missing(token: &str) -> TokenError {
  TokenError::TaskDoesNotExist {
    token: token.to_string(),
  }
}

/// A token issued to one waiting task attempt.
#[derive(Debug)]
pub(crate) struct TokenRegistration {
  token: String,
  receiver: mpsc::UnboundedReceiver<TokenSignal>,
  registry: Arc<TaskTokenRegistry>,
}

impl TokenRegistration {
  pub(crate) fn token(&self) -> &str {
    &self.token
  }

  /// Wait for the callback. With a heartbeat interval, fails with
  /// `States.HeartbeatTimeout` when no signal arrives within it.
  pub(crate) async fn wait(&mut self, heartbeat: Option<Duration>) -> Result<Value, StatesError> {
    loop {
      let signal = match heartbeat {
        Some(interval) => match tokio::time::timeout(interval, self.receiver.recv()).await {
          Ok(signal) => signal,
          Err(_) => {
            return Err(StatesError::new(
              error_name::HEARTBEAT_TIMEOUT,
              format!("no heartbeat received within {}s", interval.as_secs()),
            ));
          }
        },
        None => self.receiver.recv().await,
      };

      match signal {
        Some(TokenSignal::Success(output)) => return Ok(output),
        Some(TokenSignal::Failure(err)) => return Err(err),
        Some(TokenSignal::Heartbeat) => {
          debug!(task_token = %self.token, "task_heartbeat");
        }
        None => return Err(StatesError::runtime("task token was withdrawn")),
      }
    }
  }
}

impl Drop for TokenRegistration {
  fn drop(&mut self) {
    self.registry.withdraw(&self.token);
  }
}
