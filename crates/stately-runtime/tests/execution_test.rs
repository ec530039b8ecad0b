//! Integration tests for StateMachineRuntime::execute against scripted tasks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use stately_definition::{StateMachineDefinition, ValidationOptions, error_name};
use stately_runtime::{
  AbortSignal, ChannelNotifier, CustomStateHandler, CustomStateRequest, ExecutionEvent,
  ExecutionOptions, ExecutionOutcome, ExecutionStatus, HistoryEventKind, HistoryLog,
  MockResponse, MockTaskExecutor, RuntimeConfig, RuntimeError, StateMachineRuntime, StatesError,
  TaskExecutor, TaskOutcome, TaskRequest,
};

fn definition(value: Value) -> StateMachineDefinition {
  StateMachineDefinition::from_value(value).expect("definition should parse")
}

fn runtime(value: Value, executor: Arc<MockTaskExecutor>) -> StateMachineRuntime {
  StateMachineRuntime::new("test", definition(value), executor).expect("definition should be valid")
}

async fn run(runtime: &StateMachineRuntime, input: Value) -> ExecutionOutcome {
  runtime.execute(input, ExecutionOptions::default()).wait().await
}

fn error_of(outcome: &ExecutionOutcome) -> &str {
  outcome
    .error
    .as_ref()
    .map(|e| e.error.as_str())
    .unwrap_or_default()
}

#[tokio::test]
async fn test_choice_routes_failed_job() {
  let runtime = runtime(
    json!({
      "StartAt": "CheckStatus",
      "States": {
        "CheckStatus": {
          "Type": "Choice",
          "Choices": [
            {"Variable": "$.status", "StringEquals": "SUCCEEDED", "Next": "jobSucceededState"},
            {"Variable": "$.status", "StringEquals": "FAILED", "Next": "jobFailedState"}
          ],
          "Default": "jobSucceededState"
        },
        "jobSucceededState": {"Type": "Succeed"},
        "jobFailedState": {"Type": "Pass", "Result": "routed", "ResultPath": "$.route", "End": true}
      }
    }),
    Arc::new(MockTaskExecutor::new()),
  );

  let outcome = run(&runtime, json!({"status": "FAILED"})).await;

  assert_eq!(outcome.status, ExecutionStatus::Succeeded);
  assert_eq!(
    outcome.output,
    Some(json!({"status": "FAILED", "route": "routed"}))
  );
}

#[tokio::test]
async fn test_output_path_root_returns_merged_document() {
  let runtime = runtime(
    json!({
      "StartAt": "Lookup",
      "States": {
        "Lookup": {
          "Type": "Task",
          "Resource": "arn:aws:lambda:lookup",
          "Parameters": {"id.$": "$.order.id", "source": "test"},
          "ResultSelector": {"total.$": "$.amount"},
          "ResultPath": "$.price",
          "OutputPath": "$",
          "End": true
        }
      }
    }),
    Arc::new(
      MockTaskExecutor::new().with_responses(
        "arn:aws:lambda:lookup",
        [MockResponse::Return(json!({"amount": 42, "currency": "EUR"}))],
      ),
    ),
  );

  let outcome = run(&runtime, json!({"order": {"id": 7}})).await;

  assert_eq!(
    outcome.output,
    Some(json!({"order": {"id": 7}, "price": {"total": 42}}))
  );
}

#[tokio::test]
async fn test_null_result_path_keeps_input() {
  let executor = Arc::new(
    MockTaskExecutor::new().with_responses("arn:notify", [MockResponse::Return(json!("sent"))]),
  );
  let runtime = runtime(
    json!({
      "StartAt": "Notify",
      "States": {
        "Notify": {"Type": "Task", "Resource": "arn:notify", "ResultPath": null, "End": true}
      }
    }),
    executor.clone(),
  );

  let input = json!({"user": "ada", "items": [1, 2]});
  let outcome = run(&runtime, input.clone()).await;

  assert_eq!(outcome.output, Some(input));
  assert_eq!(executor.call_count("arn:notify"), 1);
}

#[tokio::test]
async fn test_map_runs_items_in_order() {
  let runtime = runtime(
    json!({
      "StartAt": "Double",
      "States": {
        "Double": {
          "Type": "Map",
          "ItemsPath": "$.values",
          "MaxConcurrency": 1,
          "ItemSelector": {"n.$": "$$.Map.Item.Value"},
          "ItemProcessor": {
            "StartAt": "Add",
            "States": {
              "Add": {
                "Type": "Pass",
                "Parameters": {"doubled.$": "States.MathAdd($.n, $.n)"},
                "End": true
              }
            }
          },
          "End": true
        }
      }
    }),
    Arc::new(MockTaskExecutor::new()),
  );

  let outcome = run(&runtime, json!({"values": [1, 2, 3]})).await;

  assert_eq!(outcome.status, ExecutionStatus::Succeeded);
  assert_eq!(
    outcome.output,
    Some(json!([{"doubled": 2}, {"doubled": 4}, {"doubled": 6}]))
  );
}

#[tokio::test]
async fn test_map_items_path_must_select_array() {
  let runtime = runtime(
    json!({
      "StartAt": "Each",
      "States": {
        "Each": {
          "Type": "Map",
          "ItemsPath": "$.values",
          "ItemProcessor": {"StartAt": "P", "States": {"P": {"Type": "Pass", "End": true}}},
          "End": true
        }
      }
    }),
    Arc::new(MockTaskExecutor::new()),
  );

  let outcome = run(&runtime, json!({"values": "nope"})).await;

  assert_eq!(outcome.status, ExecutionStatus::Failed);
  assert_eq!(error_of(&outcome), error_name::RUNTIME);
}

#[tokio::test]
async fn test_parallel_branch_failure_fails_execution() {
  let runtime = runtime(
    json!({
      "StartAt": "Both",
      "States": {
        "Both": {
          "Type": "Parallel",
          "Branches": [
            {"StartAt": "A", "States": {"A": {"Type": "Pass", "Result": "a", "End": true}}},
            {"StartAt": "B", "States": {"B": {"Type": "Task", "Resource": "arn:b", "End": true}}}
          ],
          "End": true
        }
      }
    }),
    Arc::new(
      MockTaskExecutor::new().with_responses("arn:b", [MockResponse::throw("BFailed", "broken")]),
    ),
  );

  let outcome = run(&runtime, json!({})).await;

  assert_eq!(outcome.status, ExecutionStatus::Failed);
  assert_eq!(outcome.output, None);
  assert_eq!(outcome.error, Some(StatesError::new("BFailed", "broken")));
}

#[tokio::test]
async fn test_parallel_outputs_in_branch_order() {
  let runtime = runtime(
    json!({
      "StartAt": "Both",
      "States": {
        "Both": {
          "Type": "Parallel",
          "Branches": [
            {"StartAt": "A", "States": {"A": {"Type": "Pass", "Result": "a", "End": true}}},
            {"StartAt": "B", "States": {"B": {"Type": "Pass", "InputPath": "$.x", "End": true}}}
          ],
          "ResultPath": "$.results",
          "End": true
        }
      }
    }),
    Arc::new(MockTaskExecutor::new()),
  );

  let outcome = run(&runtime, json!({"x": 1})).await;

  assert_eq!(outcome.output, Some(json!({"x": 1, "results": ["a", 1]})));
}

#[tokio::test(start_paused = true)]
async fn test_retry_runs_max_attempts_plus_one() {
  let executor = Arc::new(
    MockTaskExecutor::new().with_responses("arn:flaky", [MockResponse::throw("Flaky", "down")]),
  );
  let runtime = runtime(
    json!({
      "StartAt": "Call",
      "States": {
        "Call": {
          "Type": "Task",
          "Resource": "arn:flaky",
          "Retry": [
            {"ErrorEquals": ["States.ALL"], "MaxAttempts": 2, "IntervalSeconds": 1, "BackoffRate": 2.0}
          ],
          "End": true
        }
      }
    }),
    executor.clone(),
  );

  let history = HistoryLog::new();
  let outcome = runtime
    .execute(
      json!({}),
      ExecutionOptions {
        history: history.clone(),
        ..Default::default()
      },
    )
    .wait()
    .await;

  assert_eq!(outcome.status, ExecutionStatus::Failed);
  assert_eq!(error_of(&outcome), "Flaky");
  assert_eq!(executor.call_count("arn:flaky"), 3);

  let delays: Vec<u64> = history
    .events()
    .into_iter()
    .filter_map(|event| match event.kind {
      HistoryEventKind::TaskRetryScheduled { delay_ms, .. } => Some(delay_ms),
      _ => None,
    })
    .collect();
  assert_eq!(delays, vec![1000, 2000]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_then_succeed() {
  let executor = Arc::new(MockTaskExecutor::new().with_responses(
    "arn:flaky",
    [
      MockResponse::throw("Flaky", "first"),
      MockResponse::Return(json!("ok")),
    ],
  ));
  let runtime = runtime(
    json!({
      "StartAt": "Call",
      "States": {
        "Call": {
          "Type": "Task",
          "Resource": "arn:flaky",
          "Parameters": {"attempt.$": "$$.State.RetryCount"},
          "Retry": [{"ErrorEquals": ["Flaky"], "MaxAttempts": 3}],
          "End": true
        }
      }
    }),
    executor.clone(),
  );

  let outcome = run(&runtime, json!({})).await;

  assert_eq!(outcome.output, Some(json!("ok")));
  let payloads: Vec<Value> = executor.requests().into_iter().map(|r| r.payload).collect();
  assert_eq!(payloads, vec![json!({"attempt": 0}), json!({"attempt": 1})]);
}

#[tokio::test]
async fn test_catch_injects_error_and_continues() {
  let runtime = runtime(
    json!({
      "StartAt": "Charge",
      "States": {
        "Charge": {
          "Type": "Task",
          "Resource": "arn:charge",
          "Catch": [{"ErrorEquals": ["CardDeclined"], "ResultPath": "$.failure", "Next": "Refund"}],
          "End": true
        },
        "Refund": {"Type": "Pass", "End": true}
      }
    }),
    Arc::new(MockTaskExecutor::new().with_responses(
      "arn:charge",
      [MockResponse::throw("CardDeclined", "insufficient funds")],
    )),
  );

  let outcome = run(&runtime, json!({"amount": 10})).await;

  assert_eq!(outcome.status, ExecutionStatus::Succeeded);
  assert_eq!(
    outcome.output,
    Some(json!({
      "amount": 10,
      "failure": {"Error": "CardDeclined", "Cause": "insufficient funds"}
    }))
  );
}

#[tokio::test]
async fn test_fail_state_reports_error_and_cause() {
  let runtime = runtime(
    json!({
      "StartAt": "Stop",
      "States": {
        "Stop": {"Type": "Fail", "Error": "OrderRejected", "CausePath": "$.reason"}
      }
    }),
    Arc::new(MockTaskExecutor::new()),
  );

  let outcome = run(&runtime, json!({"reason": "out of stock"})).await;

  assert_eq!(outcome.status, ExecutionStatus::Failed);
  assert_eq!(
    outcome.error,
    Some(StatesError::new("OrderRejected", "out of stock"))
  );
}

#[tokio::test]
async fn test_no_choice_matched_escapes_states_all() {
  let config = RuntimeConfig {
    validation: ValidationOptions {
      allow_missing_choice_default: true,
    },
    ..RuntimeConfig::default()
  };
  let runtime = StateMachineRuntime::builder(
    "test",
    definition(json!({
      "StartAt": "Wrap",
      "States": {
        "Wrap": {
          "Type": "Parallel",
          "Branches": [{
            "StartAt": "Pick",
            "States": {
              "Pick": {
                "Type": "Choice",
                "Choices": [{"Variable": "$.n", "NumericEquals": 1, "Next": "One"}]
              },
              "One": {"Type": "Succeed"}
            }
          }],
          "Catch": [{"ErrorEquals": ["States.ALL"], "Next": "Caught"}],
          "End": true
        },
        "Caught": {"Type": "Succeed"}
      }
    })),
    Arc::new(MockTaskExecutor::new()),
  )
  .config(config)
  .build()
  .unwrap();

  let outcome = run(&runtime, json!({"n": 2})).await;

  assert_eq!(outcome.status, ExecutionStatus::Failed);
  assert_eq!(error_of(&outcome), error_name::NO_CHOICE_MATCHED);
}

#[tokio::test]
async fn test_data_limit_is_not_caught() {
  let config = RuntimeConfig {
    max_payload_bytes: 64,
    ..RuntimeConfig::default()
  };
  let runtime = StateMachineRuntime::builder(
    "test",
    definition(json!({
      "StartAt": "Fetch",
      "States": {
        "Fetch": {
          "Type": "Task",
          "Resource": "arn:fetch",
          "Catch": [{"ErrorEquals": ["States.ALL"], "Next": "Recovered"}],
          "End": true
        },
        "Recovered": {"Type": "Succeed"}
      }
    })),
    Arc::new(
      MockTaskExecutor::new().with_responses("arn:fetch", [MockResponse::Return(json!("x".repeat(200)))]),
    ),
  )
  .config(config)
  .build()
  .unwrap();

  let outcome = run(&runtime, json!({})).await;

  assert_eq!(outcome.status, ExecutionStatus::Failed);
  assert_eq!(error_of(&outcome), error_name::DATA_LIMIT_EXCEEDED);
}

#[tokio::test]
async fn test_wait_for_task_token_success() {
  let executor = Arc::new(
    MockTaskExecutor::new().with_responses("arn:approval", [MockResponse::Return(json!(null))]),
  );
  let runtime = Arc::new(runtime(
    json!({
      "StartAt": "Approve",
      "States": {
        "Approve": {
          "Type": "Task",
          "Resource": "arn:approval.waitForTaskToken",
          "Parameters": {"token.$": "$$.Task.Token"},
          "ResultPath": "$.approval",
          "End": true
        }
      }
    }),
    executor,
  ));

  let handle = tokio::spawn({
    let runtime = runtime.clone();
    async move {
      runtime
        .execute(json!({"doc": 1}), ExecutionOptions::default())
        .wait()
        .await
    }
  });

  let token = loop {
    if let Some(token) = runtime.tokens().pending_tokens().into_iter().next() {
      break token;
    }
    tokio::task::yield_now().await;
  };
  runtime
    .tokens()
    .send_success(&token, json!({"approved": true}))
    .unwrap();

  let outcome = handle.await.unwrap();
  assert_eq!(
    outcome.output,
    Some(json!({"doc": 1, "approval": {"approved": true}}))
  );
  assert!(!runtime.tokens().is_pending(&token));
}

#[tokio::test]
async fn test_wait_for_task_token_with_mock_callbacks() {
  let runtime = {
    let tokens = Arc::new(stately_runtime::TaskTokenRegistry::new());
    let executor = MockTaskExecutor::new()
      .with_responses(
        "arn:approval",
        [MockResponse::throw("Rejected", "by reviewer")],
      )
      .with_callbacks(tokens.clone());
    StateMachineRuntime::builder(
      "test",
      definition(json!({
        "StartAt": "Approve",
        "States": {
          "Approve": {"Type": "Task", "Resource": "arn:approval.waitForTaskToken", "End": true}
        }
      })),
      Arc::new(executor),
    )
    .tokens(tokens)
    .build()
    .unwrap()
  };

  let outcome = run(&runtime, json!({})).await;

  assert_eq!(outcome.error, Some(StatesError::new("Rejected", "by reviewer")));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_timeout() {
  let runtime = runtime(
    json!({
      "StartAt": "Approve",
      "States": {
        "Approve": {
          "Type": "Task",
          "Resource": "arn:approval.waitForTaskToken",
          "HeartbeatSeconds": 5,
          "End": true
        }
      }
    }),
    Arc::new(MockTaskExecutor::new().with_responses("arn:approval", [MockResponse::Return(json!(null))])),
  );

  let outcome = run(&runtime, json!({})).await;

  assert_eq!(outcome.status, ExecutionStatus::Failed);
  assert_eq!(error_of(&outcome), error_name::HEARTBEAT_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_keeps_task_alive() {
  let runtime = Arc::new(runtime(
    json!({
      "StartAt": "Approve",
      "States": {
        "Approve": {
          "Type": "Task",
          "Resource": "arn:approval.waitForTaskToken",
          "HeartbeatSeconds": 5,
          "End": true
        }
      }
    }),
    Arc::new(MockTaskExecutor::new().with_responses("arn:approval", [MockResponse::Return(json!(null))])),
  ));

  let handle = tokio::spawn({
    let runtime = runtime.clone();
    async move { runtime.execute(json!({}), ExecutionOptions::default()).wait().await }
  });

  let token = loop {
    if let Some(token) = runtime.tokens().pending_tokens().into_iter().next() {
      break token;
    }
    tokio::task::yield_now().await;
  };
  for _ in 0..2 {
    tokio::time::sleep(Duration::from_secs(3)).await;
    runtime.tokens().send_heartbeat(&token).unwrap();
  }
  tokio::time::sleep(Duration::from_secs(3)).await;
  runtime.tokens().send_success(&token, json!("done")).unwrap();

  let outcome = handle.await.unwrap();
  assert_eq!(outcome.output, Some(json!("done")));
}

#[derive(Debug)]
struct SlowJob;

#[async_trait]
impl TaskExecutor for SlowJob {
  async fn invoke(&self, _request: TaskRequest) -> Result<TaskOutcome, StatesError> {
    Ok(TaskOutcome::Job(Box::pin(async {
      tokio::time::sleep(Duration::from_secs(60)).await;
      Ok(json!("late"))
    })))
  }
}

#[tokio::test(start_paused = true)]
async fn test_task_timeout_can_be_caught() {
  let runtime = StateMachineRuntime::new(
    "test",
    definition(json!({
      "StartAt": "Job",
      "States": {
        "Job": {
          "Type": "Task",
          "Resource": "arn:batch.sync",
          "TimeoutSeconds": 5,
          "Catch": [{"ErrorEquals": ["States.Timeout"], "ResultPath": "$.error", "Next": "Late"}],
          "End": true
        },
        "Late": {"Type": "Pass", "End": true}
      }
    })),
    Arc::new(SlowJob),
  )
  .unwrap();

  let outcome = run(&runtime, json!({})).await;

  assert_eq!(outcome.status, ExecutionStatus::Succeeded);
  let output = outcome.output.unwrap();
  assert_eq!(output["error"]["Error"], json!(error_name::TIMEOUT));
}

#[tokio::test(start_paused = true)]
async fn test_abort_stops_waiting_execution() {
  let runtime = Arc::new(runtime(
    json!({
      "StartAt": "Sleep",
      "States": {
        "Sleep": {"Type": "Wait", "Seconds": 100, "End": true}
      }
    }),
    Arc::new(MockTaskExecutor::new()),
  ));

  let abort = AbortSignal::new();
  let history = HistoryLog::new();
  let handle = tokio::spawn({
    let runtime = runtime.clone();
    let options = ExecutionOptions {
      name: Some("run-1".to_string()),
      abort: abort.clone(),
      history: history.clone(),
    };
    async move { runtime.execute(json!({}), options).wait().await }
  });

  while history.current_state().as_deref() != Some("Sleep") {
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  abort.abort(Some("Stopped".to_string()), Some("operator".to_string()));

  let outcome = handle.await.unwrap();
  assert_eq!(outcome.status, ExecutionStatus::Aborted);
  assert_eq!(outcome.execution_id, "test:run-1");
  assert_eq!(outcome.error, Some(StatesError::new("Stopped", "operator")));
  let last = history.events().pop().unwrap();
  assert_eq!(last.kind.name(), "ExecutionAborted");
}

#[tokio::test(start_paused = true)]
async fn test_execution_timeout() {
  let runtime = runtime(
    json!({
      "StartAt": "Sleep",
      "TimeoutSeconds": 5,
      "States": {
        "Sleep": {"Type": "Wait", "Seconds": 10, "End": true}
      }
    }),
    Arc::new(MockTaskExecutor::new()),
  );

  let outcome = run(&runtime, json!({})).await;

  assert_eq!(outcome.status, ExecutionStatus::TimedOut);
  assert_eq!(error_of(&outcome), error_name::TIMEOUT);
}

fn tolerant_map(tolerated: u64) -> Value {
  json!({
    "StartAt": "Each",
    "States": {
      "Each": {
        "Type": "Map",
        "MaxConcurrency": 1,
        "ToleratedFailureCount": tolerated,
        "ItemProcessor": {
          "StartAt": "Work",
          "States": {"Work": {"Type": "Task", "Resource": "arn:work", "End": true}}
        },
        "End": true
      }
    }
  })
}

fn flaky_items() -> Arc<MockTaskExecutor> {
  Arc::new(MockTaskExecutor::new().with_responses(
    "arn:work",
    [
      MockResponse::Return(json!(1)),
      MockResponse::throw("Boom", "item two"),
      MockResponse::Return(json!(3)),
    ],
  ))
}

#[tokio::test]
async fn test_map_tolerated_failure_keeps_error_in_slot() {
  let runtime = runtime(tolerant_map(1), flaky_items());

  let outcome = run(&runtime, json!(["a", "b", "c"])).await;

  assert_eq!(outcome.status, ExecutionStatus::Succeeded);
  assert_eq!(
    outcome.output,
    Some(json!([1, {"Error": "Boom", "Cause": "item two"}, 3]))
  );
}

#[tokio::test]
async fn test_map_exceeds_tolerated_failures() {
  let runtime = runtime(tolerant_map(0), flaky_items());

  let outcome = run(&runtime, json!(["a", "b", "c"])).await;

  assert_eq!(outcome.status, ExecutionStatus::Failed);
  assert_eq!(
    error_of(&outcome),
    error_name::EXCEED_TOLERATED_FAILURE_THRESHOLD
  );
}

#[tokio::test]
async fn test_distributed_map_reports_children() {
  let executor = Arc::new(
    MockTaskExecutor::new()
      .with_responses("arn:reader", [MockResponse::Return(json!({"Items": ["a", "b", "c"]}))])
      .with_responses("arn:writer", [MockResponse::Return(json!({"written": true}))]),
  );
  let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
  let runtime = StateMachineRuntime::builder(
    "test",
    definition(json!({
      "StartAt": "Fan",
      "States": {
        "Fan": {
          "Type": "Map",
          "Label": "fan",
          "ItemReader": {"Resource": "arn:reader", "ReaderConfig": {"MaxItems": 2}},
          "ItemProcessor": {
            "ProcessorConfig": {"Mode": "DISTRIBUTED", "ExecutionType": "STANDARD"},
            "StartAt": "Echo",
            "States": {"Echo": {"Type": "Pass", "End": true}}
          },
          "ResultWriter": {"Resource": "arn:writer", "Parameters": {"Bucket": "out"}},
          "End": true
        }
      }
    })),
    executor.clone(),
  )
  .notifier(Arc::new(ChannelNotifier::new(sender)))
  .build()
  .unwrap();

  let outcome = runtime
    .execute(
      json!({}),
      ExecutionOptions {
        name: Some("run-1".to_string()),
        ..Default::default()
      },
    )
    .wait()
    .await;
  assert_eq!(outcome.output, Some(json!({"written": true})));

  let written = executor
    .requests()
    .into_iter()
    .find(|r| r.resource == "arn:writer")
    .unwrap();
  assert_eq!(written.payload, json!({"Bucket": "out", "Results": ["a", "b"]}));

  drop(runtime);
  let mut children = Vec::new();
  while let Ok(event) = receiver.try_recv() {
    if let ExecutionEvent::ChildExecutionFinished {
      parent_execution_id,
      outcome,
      history,
    } = event
    {
      assert_eq!(parent_execution_id, "test:run-1");
      assert_eq!(outcome.status, ExecutionStatus::Succeeded);
      assert_eq!(history.last().unwrap().kind.name(), "ExecutionSucceeded");
      children.push(outcome.execution_id);
    }
  }
  children.sort();
  assert_eq!(children, vec!["test:run-1/fan/0", "test:run-1/fan/1"]);
}

#[derive(Debug)]
struct Echo;

#[async_trait]
impl CustomStateHandler for Echo {
  async fn execute(&self, request: CustomStateRequest) -> Result<Value, StatesError> {
    Ok(json!({"echo": request.input, "prefix": request.state.fields.get("Prefix")}))
  }
}

fn custom_definition() -> StateMachineDefinition {
  definition(json!({
    "StartAt": "Say",
    "States": {
      "Say": {"Type": "Echo", "Prefix": ">", "ResultPath": "$.said", "End": true}
    }
  }))
}

#[tokio::test]
async fn test_custom_state_handler() {
  let runtime =
    StateMachineRuntime::builder("test", custom_definition(), Arc::new(MockTaskExecutor::new()))
      .custom_state("Echo", Arc::new(Echo))
      .build()
      .unwrap();

  let outcome = run(&runtime, json!({"msg": "hi"})).await;

  assert_eq!(
    outcome.output,
    Some(json!({"msg": "hi", "said": {"echo": {"msg": "hi"}, "prefix": ">"}}))
  );
}

#[test]
fn test_custom_state_requires_handler() {
  let err = StateMachineRuntime::new(
    "test",
    custom_definition(),
    Arc::new(MockTaskExecutor::new()),
  )
  .err()
  .unwrap();

  assert!(matches!(
    err,
    RuntimeError::MissingCustomHandler { ref state, ref type_name } if state == "Say" && type_name == "Echo"
  ));
}

#[test]
fn test_invalid_definition_is_rejected() {
  let err = StateMachineRuntime::new(
    "test",
    definition(json!({
      "StartAt": "Missing",
      "States": {"Only": {"Type": "Succeed"}}
    })),
    Arc::new(MockTaskExecutor::new()),
  )
  .err()
  .unwrap();

  assert!(matches!(err, RuntimeError::InvalidDefinition { .. }));
}
