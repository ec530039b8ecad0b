//! Stately Store
//!
//! This crate provides the storage trait and implementations for state
//! machine executions and their history. Data lives in memory or in SQLite.
//!
//! The [`Store`] trait defines operations for:
//! - Creating and updating execution records
//! - Listing executions of a state machine
//! - Appending and reading execution history

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{ExecutionRecord, ExecutionStatus, HistoryEntry};

use async_trait::async_trait;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A record with this ID already exists.
  #[error("already exists: {0}")]
  AlreadyExists(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Migrations could not be applied.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage trait for executions and their history.
#[async_trait]
pub trait Store: Send + Sync {
  /// Create a new execution record. Fails with [`Error::AlreadyExists`] when
  /// the ID is taken.
  async fn create_execution(&self, execution: &ExecutionRecord) -> Result<(), Error>;

  /// Get an execution by ID.
  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error>;

  /// Overwrite the status, output, error and stop time of an execution.
  async fn update_execution(&self, execution: &ExecutionRecord) -> Result<(), Error>;

  /// List executions of a state machine, newest first.
  async fn list_executions(&self, state_machine: &str) -> Result<Vec<ExecutionRecord>, Error>;

  /// Append history events.
  async fn append_history(&self, entries: &[HistoryEntry]) -> Result<(), Error>;

  /// History of an execution in event order.
  async fn get_history(&self, execution_id: &str) -> Result<Vec<HistoryEntry>, Error>;
}
