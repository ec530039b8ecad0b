use async_trait::async_trait;
use serde_json::Value;
use stately_definition::CustomState;

use crate::error::StatesError;

/// Input to a [`CustomStateHandler`].
#[derive(Debug, Clone)]
pub struct CustomStateRequest {
  pub execution_id: String,
  pub state_name: String,
  pub state: CustomState,
  /// The effective input, after `InputPath`.
  pub input: Value,
  /// The `$$` context object.
  pub context: Value,
}

/// Executes states whose `Type` is not built in.
///
/// The returned value is the state's result; `ResultPath` and `OutputPath`
/// apply to it as for a Task.
#[async_trait]
pub trait CustomStateHandler: Send + Sync {
  async fn execute(&self, request: CustomStateRequest) -> Result<Value, StatesError>;
}
