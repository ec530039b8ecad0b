use std::path::Path;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::{Error, ExecutionRecord, HistoryEntry, Store};

/// SQLite-based store implementation.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) the database file at `path` and migrate it.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), Error> {
    sqlx::migrate!("../../migrations").run(&self.pool).await?;
    Ok(())
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn create_execution(&self, execution: &ExecutionRecord) -> Result<(), Error> {
    sqlx::query(
      r#"
      INSERT INTO executions (
        execution_id, name, state_machine, parent_execution_id, status,
        input, output, error, cause, started_at, stopped_at
      )
      VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
      "#,
    )
    .bind(&execution.execution_id)
    .bind(&execution.name)
    .bind(&execution.state_machine)
    .bind(&execution.parent_execution_id)
    .bind(execution.status)
    .bind(&execution.input)
    .bind(&execution.output)
    .bind(&execution.error)
    .bind(&execution.cause)
    .bind(execution.started_at)
    .bind(execution.stopped_at)
    .execute(&self.pool)
    .await
    .map_err(|err| match &err {
      sqlx::Error::Database(db) if db.is_unique_violation() => {
        Error::AlreadyExists(execution.execution_id.clone())
      }
      _ => Error::Database(err),
    })?;

    Ok(())
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error> {
    sqlx::query_as(
      r#"
      SELECT execution_id, name, state_machine, parent_execution_id, status,
             input, output, error, cause, started_at, stopped_at
      FROM executions
      WHERE execution_id = ?
      "#,
    )
    .bind(execution_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(execution_id.to_string()))
  }

  async fn update_execution(&self, execution: &ExecutionRecord) -> Result<(), Error> {
    let result = sqlx::query(
      r#"
      UPDATE executions
      SET status = ?, output = ?, error = ?, cause = ?, stopped_at = ?
      WHERE execution_id = ?
      "#,
    )
    .bind(execution.status)
    .bind(&execution.output)
    .bind(&execution.error)
    .bind(&execution.cause)
    .bind(execution.stopped_at)
    .bind(&execution.execution_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(execution.execution_id.clone()));
    }
    Ok(())
  }

  async fn list_executions(&self, state_machine: &str) -> Result<Vec<ExecutionRecord>, Error> {
    let records = sqlx::query_as(
      r#"
      SELECT execution_id, name, state_machine, parent_execution_id, status,
             input, output, error, cause, started_at, stopped_at
      FROM executions
      WHERE state_machine = ?
      ORDER BY started_at DESC
      "#,
    )
    .bind(state_machine)
    .fetch_all(&self.pool)
    .await?;

    Ok(records)
  }

  async fn append_history(&self, entries: &[HistoryEntry]) -> Result<(), Error> {
    let mut tx = self.pool.begin().await?;
    for entry in entries {
      sqlx::query(
        r#"
        INSERT INTO history_events (execution_id, event_id, event_type, timestamp, details)
        VALUES (?, ?, ?, ?, ?)
        "#,
      )
      .bind(&entry.execution_id)
      .bind(entry.event_id)
      .bind(&entry.event_type)
      .bind(entry.timestamp)
      .bind(&entry.details)
      .execute(&mut *tx)
      .await?;
    }
    tx.commit().await?;

    Ok(())
  }

  async fn get_history(&self, execution_id: &str) -> Result<Vec<HistoryEntry>, Error> {
    let entries = sqlx::query_as(
      r#"
      SELECT execution_id, event_id, event_type, timestamp, details
      FROM history_events
      WHERE execution_id = ?
      ORDER BY event_id ASC
      "#,
    )
    .bind(execution_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(entries)
  }
}
