//! Stately Engine
//!
//! This crate hosts registered state machines and exposes the control API
//! over their executions. It provides the [`ExecutionService`] and an
//! [`ExecutionRunner`] for channel-based triggering.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ExecutionRunner                        │
//! │  - owns mpsc channel (sender + receiver)                    │
//! │  - run(input) queues an execution                           │
//! │  - start(cancel) runs the execution loop                    │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ExecutionService                        │
//! │  - register_state_machine / start_execution                 │
//! │  - describe, history, list, stop, wait                      │
//! │  - task token callbacks                                     │
//! │  - persists executions and history to a Store               │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   StateMachineRuntime                       │
//! │  - interprets the definition, one Tokio task per execution  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use stately_engine::{EngineConfig, ExecutionService};
//! use stately_store::MemoryStore;
//!
//! let service = ExecutionService::new(Arc::new(MemoryStore::new()), EngineConfig::default());
//! let arn = service.register_state_machine("orders", definition, executor)?;
//!
//! let execution_id = service.start_execution(&arn, input, None).await?;
//! let description = service.wait_for_execution(&execution_id).await?;
//! ```

mod config;
mod error;
mod persist;
mod runner;
mod service;

pub use config::EngineConfig;
pub use error::EngineError;
pub use runner::ExecutionRunner;
pub use service::{ExecutionDescription, ExecutionService};
