use serde::{Deserialize, Serialize};
use stately_definition::ValidationOptions;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
  /// Largest serialized state output or task payload, in bytes.
  pub max_payload_bytes: usize,
  /// Upper bound on concurrent Map iterations, also used when a Map sets no
  /// `MaxConcurrency` (or sets it to 0).
  pub map_concurrency_limit: usize,
  /// Checks applied when the runtime is built.
  pub validation: ValidationOptions,
}

impl RuntimeConfig {
  pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 256 * 1024;
  pub const DEFAULT_MAP_CONCURRENCY_LIMIT: usize = 40;
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      max_payload_bytes: Self::DEFAULT_MAX_PAYLOAD_BYTES,
      map_concurrency_limit: Self::DEFAULT_MAP_CONCURRENCY_LIMIT,
      validation: ValidationOptions::default(),
    }
  }
}
