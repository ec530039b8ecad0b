use serde::{Deserialize, Serialize};
use stately_runtime::RuntimeConfig;

/// Engine configuration, usually loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Applied to every registered state machine.
  pub runtime: RuntimeConfig,
  /// Capacity of an [`ExecutionRunner`](crate::ExecutionRunner) channel.
  pub runner_buffer_size: usize,
}

impl EngineConfig {
  pub const DEFAULT_RUNNER_BUFFER_SIZE: usize = 100;
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      runtime: RuntimeConfig::default(),
      runner_buffer_size: Self::DEFAULT_RUNNER_BUFFER_SIZE,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_partial_config_uses_defaults() {
    let config: EngineConfig =
      serde_json::from_value(json!({"runtime": {"max_payload_bytes": 1024}})).unwrap();
    assert_eq!(config.runtime.max_payload_bytes, 1024);
    assert_eq!(
      config.runtime.map_concurrency_limit,
      RuntimeConfig::DEFAULT_MAP_CONCURRENCY_LIMIT
    );
    assert_eq!(config.runner_buffer_size, EngineConfig::DEFAULT_RUNNER_BUFFER_SIZE);
  }
}
