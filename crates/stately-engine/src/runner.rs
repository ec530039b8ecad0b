//! Execution runner with channel-based triggering.
//!
//! The `ExecutionRunner` owns an mpsc channel for receiving execution inputs
//! and runs each one against a registered state machine through the
//! [`ExecutionService`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::EngineError;
use crate::service::{ExecutionDescription, ExecutionService};

/// A runner that starts an execution for each input it receives.
///
/// Executions run one at a time, in the order their inputs arrive.
///
/// # Usage
///
/// ```ignore
/// let runner = ExecutionRunner::new(service, arn);
///
/// // Get sender for external triggers
/// let sender = runner.sender();
///
/// // Start the execution loop
/// let cancel = CancellationToken::new();
/// runner.start(cancel).await?;
/// ```
pub struct ExecutionRunner {
  sender: mpsc::Sender<Value>,
  receiver: mpsc::Receiver<Value>,
  service: Arc<ExecutionService>,
  arn: String,
}

impl ExecutionRunner {
  /// Create a runner with the service's configured buffer size.
  pub fn new(service: Arc<ExecutionService>, arn: impl Into<String>) -> Self {
    let buffer_size = service.config().runner_buffer_size;
    Self::with_buffer_size(service, arn, buffer_size)
  }

  pub fn with_buffer_size(
    service: Arc<ExecutionService>,
    arn: impl Into<String>,
    buffer_size: usize,
  ) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size.max(1));
    Self {
      sender,
      receiver,
      service,
      arn: arn.into(),
    }
  }

  /// Get a sender handle for triggering executions.
  pub fn sender(&self) -> mpsc::Sender<Value> {
    self.sender.clone()
  }

  /// Queue an execution with the given input.
  pub async fn run(&self, input: Value) -> Result<(), EngineError> {
    self
      .sender
      .send(input)
      .await
      .map_err(|_| EngineError::RunnerClosed)
  }

  /// Start the execution loop.
  ///
  /// Runs until the cancellation token is triggered or the channel closes.
  /// Cancelling also stops the execution in flight.
  pub async fn start(mut self, cancel: CancellationToken) -> Result<(), EngineError> {
    info!(arn = %self.arn, "execution_runner_started");

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!(arn = %self.arn, "execution_runner_cancelled");
          break;
        }
        input = self.receiver.recv() => {
          let Some(input) = input else {
            info!(arn = %self.arn, "execution_runner_channel_closed");
            break;
          };

          let execution_id = match self.service.start_execution(&self.arn, input, None).await {
            Ok(execution_id) => execution_id,
            Err(err) => {
              error!(arn = %self.arn, error = %err, "execution_start_failed");
              continue;
            }
          };

          tokio::select! {
            _ = cancel.cancelled() => {
              if let Err(err) = self
                .service
                .stop_execution(
                  &execution_id,
                  Some("Cancelled".to_string()),
                  Some("execution runner shut down".to_string()),
                )
                .await
              {
                debug!(execution_id = %execution_id, error = %err, "execution_stop_skipped");
              }
              info!(arn = %self.arn, "execution_runner_cancelled");
              break;
            }
            result = self.service.wait_for_execution(&execution_id) => match result {
              Ok(description) => info!(
                execution_id = %description.execution_id,
                status = description.status.as_str(),
                "execution_finished"
              ),
              Err(err) => error!(execution_id = %execution_id, error = %err, "execution_wait_failed"),
            },
          }
        }
      }
    }

    Ok(())
  }

  /// Run a single execution to completion, outside the loop.
  pub async fn execute_once(&self, input: Value) -> Result<ExecutionDescription, EngineError> {
    let execution_id = self.service.start_execution(&self.arn, input, None).await?;
    self.service.wait_for_execution(&execution_id).await
  }

  pub fn service(&self) -> &ExecutionService {
    &self.service
  }
}
