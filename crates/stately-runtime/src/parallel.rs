use serde_json::Value;
use stately_definition::ParallelState;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::Scope;
use crate::error::Halt;
use crate::runtime::StateMachineRuntime;

impl StateMachineRuntime {
  /// Run every branch on a copy of `input`. The result is the branch outputs
  /// in branch order. The first branch to fail cancels the rest.
  pub(crate) async fn run_parallel(
    &self,
    name: &str,
    state: &ParallelState,
    input: Value,
    scope: &Scope,
    cancel: &CancellationToken,
  ) -> Result<Value, Halt> {
    info!(
      execution_id = %scope.execution_id,
      state = name,
      branches = state.branches.len(),
      "parallel_started"
    );

    let branch_cancel = cancel.child_token();
    let branches = state
      .branches
      .iter()
      .map(|branch| self.run_graph(branch, input.clone(), scope, &branch_cancel));

    match futures::future::try_join_all(branches).await {
      Ok(outputs) => Ok(Value::Array(outputs)),
      Err(halt) => {
        branch_cancel.cancel();
        if let Halt::Failed(err) = &halt {
          warn!(
            execution_id = %scope.execution_id,
            state = name,
            error = %err.error,
            "parallel_branch_failed"
          );
        }
        Err(halt)
      }
    }
  }
}
