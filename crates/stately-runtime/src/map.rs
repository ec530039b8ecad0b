//! Map state fan-out.
//!
//! Items come from `ItemsPath` or an `ItemReader`, are optionally grouped by
//! an `ItemBatcher`, shaped by `ItemSelector`, and run through the item
//! processor with bounded concurrency. Results keep item order. In
//! `DISTRIBUTED` mode every item runs as a child execution with its own id and
//! history.

use chrono::Utc;
use futures::StreamExt;
use serde_json::{Map, Value, json};
use stately_definition::{
  ItemBatcher, ItemReader, MapState, ProcessorMode, ResultWriter, StateGraph, error_name,
};
use stately_path::{Path, type_name};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::{Scope, with_map_item};
use crate::error::{Halt, StatesError};
use crate::events::ExecutionEvent;
use crate::execution::{Finish, conclude};
use crate::history::{HistoryEventKind, HistoryLog};
use crate::runtime::StateMachineRuntime;

/// Failure budget of one Map run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Tolerance {
  count: Option<u64>,
  percentage: Option<f64>,
}

impl Tolerance {
  fn resolve(state: &MapState, input: &Value, context: &Value) -> Result<Self, StatesError> {
    let count = match (state.tolerated_failure_count, &state.tolerated_failure_count_path) {
      (Some(count), _) => Some(count),
      (None, Some(path)) => {
        let value = evaluate(path, input, context)?;
        Some(value.as_u64().ok_or_else(|| {
          StatesError::runtime(format!(
            "ToleratedFailureCountPath '{path}' selected {value} instead of a non-negative integer"
          ))
        })?)
      }
      (None, None) => None,
    };
    let percentage = match (
      state.tolerated_failure_percentage,
      &state.tolerated_failure_percentage_path,
    ) {
      (Some(pct), _) => Some(pct),
      (None, Some(path)) => {
        let value = evaluate(path, input, context)?;
        match value.as_f64() {
          Some(pct) if (0.0..=100.0).contains(&pct) => Some(pct),
          _ => {
            return Err(StatesError::runtime(format!(
              "ToleratedFailurePercentagePath '{path}' selected {value} instead of a percentage"
            )));
          }
        }
      }
      (None, None) => None,
    };
    Ok(Self { count, percentage })
  }

  fn is_set(&self) -> bool {
    self.count.is_some() || self.percentage.is_some()
  }

  fn allows(&self, failures: usize, total: usize) -> bool {
    if !self.is_set() {
      return false;
    }
    let over_count = self.count.is_some_and(|count| failures as u64 > count);
    let over_percentage = self
      .percentage
      .is_some_and(|pct| failures as f64 * 100.0 / total.max(1) as f64 > pct);
    !over_count && !over_percentage
  }
}

impl StateMachineRuntime {
  pub(crate) async fn run_map(
    &self,
    name: &str,
    state: &MapState,
    input: &Value,
    context: &Value,
    scope: &Scope,
    cancel: &CancellationToken,
  ) -> Result<Value, Halt> {
    let processor = state
      .processor()
      .ok_or_else(|| StatesError::runtime("Map state has no ItemProcessor"))?;

    let items = match &state.item_reader {
      Some(reader) => {
        self
          .read_items(name, reader, input, context, scope, cancel)
          .await?
      }
      None => {
        let path = state.items_path.clone().unwrap_or_else(Path::root);
        match evaluate(&path, input, context)? {
          Value::Array(items) => items,
          other => {
            return Err(
              StatesError::runtime(format!(
                "ItemsPath '{path}' selected {} instead of an array",
                type_name(&other)
              ))
              .into(),
            );
          }
        }
      }
    };
    let items = match &state.item_batcher {
      Some(batcher) => self.batch(batcher, items, input, context)?,
      None => items,
    };

    let inputs = items
      .iter()
      .enumerate()
      .map(|(index, item)| match state.selector() {
        Some(template) => template
          .resolve(
            input,
            &with_map_item(context.clone(), index, item),
            self.random.as_ref(),
          )
          .map_err(StatesError::from_template),
        None => Ok(item.clone()),
      })
      .collect::<Result<Vec<_>, _>>()?;

    let limit = self.map_concurrency(state, input, context)?;
    let tolerance = Tolerance::resolve(state, input, context)?;
    let total = inputs.len();
    let mode = state.mode();
    let label = state.label.as_deref().unwrap_or(name);

    info!(
      execution_id = %scope.execution_id,
      state = name,
      items = total,
      max_concurrency = limit,
      mode = ?mode,
      "map_started"
    );

    let item_cancel = cancel.child_token();
    let mut results = Vec::with_capacity(total);
    let mut failures = 0usize;
    let mut iterations = futures::stream::iter(inputs.into_iter().enumerate())
      .map(|(index, item)| {
        self.run_iteration(name, label, mode, processor, index, item, scope, &item_cancel)
      })
      .buffered(limit);

    while let Some(result) = iterations.next().await {
      let err = match result {
        Ok(output) => {
          results.push(output);
          continue;
        }
        Err(Halt::Aborted) => return Err(Halt::Aborted),
        Err(Halt::Failed(err)) => err,
      };

      failures += 1;
      if error_name::is_terminal(&err.error) || !tolerance.allows(failures, total) {
        item_cancel.cancel();
        warn!(
          execution_id = %scope.execution_id,
          state = name,
          failures,
          error = %err.error,
          "map_failed"
        );
        if tolerance.is_set() && !error_name::is_terminal(&err.error) {
          return Err(
            StatesError::new(
              error_name::EXCEED_TOLERATED_FAILURE_THRESHOLD,
              format!("{failures} of {total} items failed; last error: {err}"),
            )
            .into(),
          );
        }
        return Err(err.into());
      }
      results.push(err.to_value());
    }
    drop(iterations);

    match &state.result_writer {
      Some(writer) => {
        self
          .write_results(name, writer, results, input, context, scope, cancel)
          .await
      }
      None => Ok(Value::Array(results)),
    }
  }

  #[allow(clippy::too_many_arguments)]
  async fn run_iteration(
    &self,
    name: &str,
    label: &str,
    mode: ProcessorMode,
    processor: &StateGraph,
    index: usize,
    input: Value,
    scope: &Scope,
    cancel: &CancellationToken,
  ) -> Result<Value, Halt> {
    scope.history.append(HistoryEventKind::MapIterationStarted {
      state: name.to_string(),
      index,
    });

    let result = match mode {
      ProcessorMode::Inline => self.run_graph(processor, input, scope, cancel).await,
      ProcessorMode::Distributed => {
        self
          .run_child(name, label, processor, index, input, scope, cancel)
          .await
      }
    };

    match &result {
      Ok(_) => {
        scope.history.append(HistoryEventKind::MapIterationSucceeded {
          state: name.to_string(),
          index,
        });
      }
      Err(Halt::Failed(err)) => {
        scope.history.append(HistoryEventKind::MapIterationFailed {
          state: name.to_string(),
          index,
          error: err.error.clone(),
          cause: err.cause.clone(),
        });
      }
      Err(Halt::Aborted) => {}
    }
    result
  }

  /// Run one item as a child execution and report it to the notifier.
  #[allow(clippy::too_many_arguments)]
  async fn run_child(
    &self,
    name: &str,
    label: &str,
    processor: &StateGraph,
    index: usize,
    input: Value,
    scope: &Scope,
    cancel: &CancellationToken,
  ) -> Result<Value, Halt> {
    let child = Scope {
      execution_id: format!("{}/{label}/{index}", scope.execution_id),
      execution_name: format!("{label}-{index}"),
      state_machine: scope.state_machine.clone(),
      input: input.clone(),
      start_time: Utc::now(),
      history: HistoryLog::new(),
    };

    scope.history.append(HistoryEventKind::ChildExecutionStarted {
      state: name.to_string(),
      index,
      execution_id: child.execution_id.clone(),
    });
    child
      .history
      .append(HistoryEventKind::ExecutionStarted { input: input.clone() });
    self.notifier.notify(ExecutionEvent::ExecutionStarted {
      execution_id: child.execution_id.clone(),
      state_machine: child.state_machine.clone(),
      parent_execution_id: Some(scope.execution_id.clone()),
    });

    let result = self.run_graph(processor, input, &child, cancel).await;

    let outcome = conclude(&child, Finish::Completed(result.clone()), || {
      StatesError::new("", "parent execution stopped")
    });
    self.notifier.notify(ExecutionEvent::ChildExecutionFinished {
      parent_execution_id: scope.execution_id.clone(),
      outcome,
      history: child.history.events(),
    });
    result
  }

  async fn read_items(
    &self,
    name: &str,
    reader: &ItemReader,
    input: &Value,
    context: &Value,
    scope: &Scope,
    cancel: &CancellationToken,
  ) -> Result<Vec<Value>, Halt> {
    let payload = match &reader.parameters {
      Some(template) => template
        .resolve(input, context, self.random.as_ref())
        .map_err(StatesError::from_template)?,
      None => json!({}),
    };

    let response = self
      .invoke_resource(name, &reader.resource, payload, scope, cancel)
      .await
      .map_err(|halt| match halt {
        Halt::Failed(err) => {
          StatesError::new(error_name::ITEM_READER_FAILED, err.to_string()).into()
        }
        aborted => aborted,
      })?;

    let mut items = match response {
      Value::Array(items) => items,
      Value::Object(mut map) if map.get("Items").is_some_and(Value::is_array) => {
        match map.remove("Items") {
          Some(Value::Array(items)) => items,
          _ => Vec::new(),
        }
      }
      other => {
        return Err(
          StatesError::new(
            error_name::ITEM_READER_FAILED,
            format!("reader returned {} instead of an array", type_name(&other)),
          )
          .into(),
        );
      }
    };

    if let Some(config) = &reader.reader_config {
      let max = match (config.max_items, &config.max_items_path) {
        (Some(max), _) => Some(max),
        (None, Some(path)) => evaluate(path, input, context)?.as_u64(),
        (None, None) => None,
      };
      if let Some(max) = max.filter(|max| *max > 0) {
        items.truncate(usize::try_from(max).unwrap_or(usize::MAX));
      }
    }
    Ok(items)
  }

  fn batch(
    &self,
    batcher: &ItemBatcher,
    items: Vec<Value>,
    input: &Value,
    context: &Value,
  ) -> Result<Vec<Value>, StatesError> {
    let size = match (batcher.max_items_per_batch, &batcher.max_items_per_batch_path) {
      (Some(size), _) => size,
      (None, Some(path)) => {
        let value = evaluate(path, input, context)?;
        value.as_u64().ok_or_else(|| {
          StatesError::runtime(format!(
            "MaxItemsPerBatchPath '{path}' selected {value} instead of a positive integer"
          ))
        })?
      }
      (None, None) => u64::MAX,
    };
    let size = usize::try_from(size).unwrap_or(usize::MAX).max(1);

    let batch_input = batcher
      .batch_input
      .as_ref()
      .map(|template| template.resolve(input, context, self.random.as_ref()))
      .transpose()
      .map_err(StatesError::from_template)?;

    Ok(
      items
        .chunks(size)
        .map(|chunk| {
          let mut batch = Map::new();
          if let Some(batch_input) = &batch_input {
            batch.insert("BatchInput".to_string(), batch_input.clone());
          }
          batch.insert("Items".to_string(), Value::Array(chunk.to_vec()));
          Value::Object(batch)
        })
        .collect(),
    )
  }

  #[allow(clippy::too_many_arguments)]
  async fn write_results(
    &self,
    name: &str,
    writer: &ResultWriter,
    results: Vec<Value>,
    input: &Value,
    context: &Value,
    scope: &Scope,
    cancel: &CancellationToken,
  ) -> Result<Value, Halt> {
    let mut payload = match &writer.parameters {
      Some(template) => template
        .resolve(input, context, self.random.as_ref())
        .map_err(StatesError::from_template)?,
      None => json!({}),
    };
    match &mut payload {
      Value::Object(map) => {
        map.insert("Results".to_string(), Value::Array(results));
      }
      _ => payload = json!({"Results": results}),
    }

    self
      .invoke_resource(name, &writer.resource, payload, scope, cancel)
      .await
      .map_err(|halt| match halt {
        Halt::Failed(err) => {
          StatesError::new(error_name::RESULT_WRITER_FAILED, err.to_string()).into()
        }
        aborted => aborted,
      })
  }

  fn map_concurrency(
    &self,
    state: &MapState,
    input: &Value,
    context: &Value,
  ) -> Result<usize, StatesError> {
    let requested = match (state.max_concurrency, &state.max_concurrency_path) {
      (Some(n), _) => u64::from(n),
      (None, Some(path)) => {
        let value = evaluate(path, input, context)?;
        value.as_u64().ok_or_else(|| {
          StatesError::runtime(format!(
            "MaxConcurrencyPath '{path}' selected {value} instead of a non-negative integer"
          ))
        })?
      }
      (None, None) => 0,
    };
    let ceiling = self.config.map_concurrency_limit.max(1);
    Ok(match usize::try_from(requested).unwrap_or(usize::MAX) {
      0 => ceiling,
      n => n.min(ceiling),
    })
  }
}

fn evaluate(path: &Path, input: &Value, context: &Value) -> Result<Value, StatesError> {
  path.evaluate(input, context).map_err(StatesError::from_path)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_tolerance() {
    let none = Tolerance::default();
    assert!(!none.allows(1, 10));

    let count = Tolerance {
      count: Some(2),
      percentage: None,
    };
    assert!(count.allows(2, 10));
    assert!(!count.allows(3, 10));

    let pct = Tolerance {
      count: None,
      percentage: Some(25.0),
    };
    assert!(pct.allows(1, 4));
    assert!(!pct.allows(2, 4));
  }
}
