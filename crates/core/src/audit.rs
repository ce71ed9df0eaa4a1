//! Structured audit record (§6 Outbound). Emitted unconditionally at the end of every
//! `Pipeline::run_sql`/`run_nl` invocation, success or failure, via a `tracing::info!`
//! event on the `"audit"` target — never containing raw result rows or PII.

use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::caller::CallerContext;
use crate::error::PipelineError;
use crate::pipeline::PipelineData;

/// Fields of the audit record that accumulate as a pipeline invocation progresses,
/// independent of whether the invocation ultimately succeeds. Unlike `PipelineData`
/// (only populated on success), this is always available by the time `emit` runs.
#[derive(Default)]
pub struct AuditContext {
  pub tables_referenced: Vec<String>,
  pub filter_applied: bool,
  pub practice_ids_scope_size: usize,
}

pub fn emit(
  ctx: &CallerContext,
  action: &str,
  input: &str,
  result: &Result<PipelineData, PipelineError>,
  duration: Duration,
  audit_ctx: &AuditContext,
) {
  let outcome = match result {
    Ok(_) => "ok".to_string(),
    Err(err) => err.kind().to_string(),
  };

  tracing::info!(
    target: "audit",
    caller_id = %ctx.caller_id,
    action,
    input_hash = %hash_input(input),
    tables_referenced = ?audit_ctx.tables_referenced,
    filter_applied = audit_ctx.filter_applied,
    practice_ids_scope_size = audit_ctx.practice_ids_scope_size,
    outcome,
    duration_ms = duration.as_millis() as u64,
    "pipeline invocation",
  );
}

/// The raw SQL/question text is never logged as part of the audit trail; only a stable
/// hash is, so the same input can be correlated across invocations without exposing it.
fn hash_input(input: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  return format!("{:x}", hasher.finalize());
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hash_input_is_stable_and_content_dependent() {
    assert_eq!(hash_input("SELECT 1"), hash_input("SELECT 1"));
    assert_ne!(hash_input("SELECT 1"), hash_input("SELECT 2"));
  }
}
