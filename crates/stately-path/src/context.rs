//! Well-known paths into the context object (`$$`).

pub const EXECUTION_ID: &str = "$$.Execution.Id";
pub const EXECUTION_NAME: &str = "$$.Execution.Name";
pub const EXECUTION_INPUT: &str = "$$.Execution.Input";
pub const EXECUTION_START_TIME: &str = "$$.Execution.StartTime";
pub const STATE_MACHINE_ID: &str = "$$.StateMachine.Id";
pub const STATE_MACHINE_NAME: &str = "$$.StateMachine.Name";
pub const STATE_NAME: &str = "$$.State.Name";
pub const STATE_ENTERED_TIME: &str = "$$.State.EnteredTime";
pub const STATE_RETRY_COUNT: &str = "$$.State.RetryCount";
pub const TASK_TOKEN: &str = "$$.Task.Token";
pub const MAP_ITEM_INDEX: &str = "$$.Map.Item.Index";
pub const MAP_ITEM_VALUE: &str = "$$.Map.Item.Value";
