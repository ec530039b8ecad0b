//! State machine runtime for stately.
//!
//! This crate interprets a validated [`StateMachineDefinition`] against JSON
//! input: data flow through paths and templates, Choice evaluation, Wait
//! timers, Retry/Catch, Parallel and Map fan-out, and the three task
//! integration patterns.
//!
//! # Architecture
//!
//! ```text
//! StateMachineRuntime
//! ├── builder(name, definition, executor) - validates the definition
//! ├── execute(input, options) -> Execution
//! └── tokens() - task token callbacks
//!
//! Execution
//! └── wait() - walks the graph until a terminal state, abort or timeout
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use stately_runtime::{ExecutionOptions, MockTaskExecutor, StateMachineRuntime};
//!
//! let executor = Arc::new(MockTaskExecutor::from_json(mocks)?);
//! let runtime = StateMachineRuntime::new("orders", definition, executor)?;
//!
//! let outcome = runtime.execute(input, ExecutionOptions::default()).wait().await;
//! ```
//!
//! [`StateMachineDefinition`]: stately_definition::StateMachineDefinition

mod choice;
mod config;
mod context;
mod custom;
mod error;
mod events;
mod execution;
mod history;
mod interpreter;
mod invoke;
mod map;
mod mock;
mod parallel;
mod retry;
mod runtime;
mod task;
mod token;

pub use config::RuntimeConfig;
pub use custom::{CustomStateHandler, CustomStateRequest};
pub use error::{RuntimeError, StatesError, TokenError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use execution::{AbortSignal, Execution, ExecutionOptions, ExecutionOutcome, ExecutionStatus};
pub use history::{HistoryEvent, HistoryEventKind, HistoryLog};
pub use mock::{MockResponse, MockTaskExecutor};
pub use retry::{Retrier, backoff_delay};
pub use runtime::{RuntimeBuilder, StateMachineRuntime};
pub use task::{IntegrationPattern, TaskExecutor, TaskOutcome, TaskRequest};
pub use token::TaskTokenRegistry;
