use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Error, ExecutionRecord, HistoryEntry, Store};

/// In-process store. Everything is lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
  executions: RwLock<HashMap<String, ExecutionRecord>>,
  history: RwLock<HashMap<String, Vec<HistoryEntry>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn create_execution(&self, execution: &ExecutionRecord) -> Result<(), Error> {
    let mut executions = self.executions.write().await;
    if executions.contains_key(&execution.execution_id) {
      return Err(Error::AlreadyExists(execution.execution_id.clone()));
    }
    executions.insert(execution.execution_id.clone(), execution.clone());
    Ok(())
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error> {
    self
      .executions
      .read()
      .await
      .get(execution_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))
  }

  async fn update_execution(&self, execution: &ExecutionRecord) -> Result<(), Error> {
    let mut executions = self.executions.write().await;
    let record = executions
      .get_mut(&execution.execution_id)
      .ok_or_else(|| Error::NotFound(execution.execution_id.clone()))?;
    record.status = execution.status;
    record.output = execution.output.clone();
    record.error = execution.error.clone();
    record.cause = execution.cause.clone();
    record.stopped_at = execution.stopped_at;
    Ok(())
  }

  async fn list_executions(&self, state_machine: &str) -> Result<Vec<ExecutionRecord>, Error> {
    let mut records: Vec<_> = self
      .executions
      .read()
      .await
      .values()
      .filter(|e| e.state_machine == state_machine)
      .cloned()
      .collect();
    records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(records)
  }

  async fn append_history(&self, entries: &[HistoryEntry]) -> Result<(), Error> {
    let mut history = self.history.write().await;
    for entry in entries {
      history
        .entry(entry.execution_id.clone())
        .or_default()
        .push(entry.clone());
    }
    Ok(())
  }

  async fn get_history(&self, execution_id: &str) -> Result<Vec<HistoryEntry>, Error> {
    let mut entries = self
      .history
      .read()
      .await
      .get(execution_id)
      .cloned()
      .unwrap_or_default();
    entries.sort_by_key(|e| e.event_id);
    Ok(entries)
  }
}
