//! Stately Definition
//!
//! The Amazon States Language document model. A [`StateMachineDefinition`]
//! parses from and renders back to ASL JSON; [`validate`] checks it before
//! anything runs.
//!
//! - [`State`] and its per-type structs
//! - [`Condition`] / [`ChoiceRule`] for Choice states
//! - [`RetryRule`] / [`CatchRule`] and [`error_name`] matching
//! - [`Graph`] for transition analysis

mod condition;
mod definition;
mod error;
pub mod error_name;
mod graph;
mod retry;
mod state;
mod validate;

pub use condition::{ChoiceRule, Comparison, Condition, Operand, OperandKind, Operator};
pub use definition::{StateGraph, StateMachineDefinition};
pub use error::{DefinitionError, ValidationError, ValidationErrorKind};
pub use graph::Graph;
pub use retry::{CatchRule, JitterStrategy, RetryRule};
pub use state::{
  ChoiceState, CustomState, ExecutionType, FailState, ItemBatcher, ItemProcessor, ItemReader,
  MapState, ParallelState, PassState, ProcessorConfig, ProcessorMode, ReaderConfig, ResultWriter,
  State, SucceedState, TaskState, Transition, WaitState,
};
pub use validate::{ValidationOptions, validate};
