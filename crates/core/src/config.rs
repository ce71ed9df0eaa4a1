//! Pipeline configuration (spec §6 "Configuration options").
//!
//! Unlike the teacher's `Reactive<T>`-wrapped, live-reloadable server config, this value
//! is constructed once and threaded explicitly through every call site, per §9's design
//! note on treating caller- and pipeline-scoped values as plain immutable data rather
//! than ambient reactive objects.

#[derive(Clone, Debug)]
pub struct PipelineConfig {
  pub allow_list_ttl_seconds: u64,
  pub system_max_row_cap: i64,
  pub query_timeout_ms: u64,
  pub query_timeout_ceiling_ms: u64,
  pub pool_size: usize,
  pub queue_timeout_ms: u64,
  pub llm_timeout_ms: u64,
  pub nl_prompt_metadata_limit: usize,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    return Self {
      allow_list_ttl_seconds: 60,
      system_max_row_cap: 10_000,
      query_timeout_ms: 30_000,
      query_timeout_ceiling_ms: 120_000,
      pool_size: 16,
      queue_timeout_ms: 5_000,
      llm_timeout_ms: 30_000,
      nl_prompt_metadata_limit: 50,
    };
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("query_timeout_ms {0} exceeds query_timeout_ceiling_ms {1}")]
  TimeoutExceedsCeiling(u64, u64),
  #[error("system_max_row_cap must be positive")]
  NonPositiveRowCap,
  #[error("pool_size must be positive")]
  NonPositivePoolSize,
}

impl PipelineConfig {
  /// Validates once at construction rather than at every call site, matching the
  /// teacher's preference for validating config up front and treating later reads as
  /// infallible.
  pub fn validated(self) -> Result<Self, ConfigError> {
    if self.query_timeout_ms > self.query_timeout_ceiling_ms {
      return Err(ConfigError::TimeoutExceedsCeiling(
        self.query_timeout_ms,
        self.query_timeout_ceiling_ms,
      ));
    }
    if self.system_max_row_cap <= 0 {
      return Err(ConfigError::NonPositiveRowCap);
    }
    if self.pool_size == 0 {
      return Err(ConfigError::NonPositivePoolSize);
    }
    return Ok(self);
  }

  /// Clamps a caller-requested timeout to the configured ceiling.
  pub fn clamp_timeout_ms(&self, requested_ms: Option<u64>) -> u64 {
    return requested_ms
      .unwrap_or(self.query_timeout_ms)
      .min(self.query_timeout_ceiling_ms);
  }
}
