//! C1 — Permission Evaluator.
//!
//! Fail-closed: any structurally ill-formed input is treated as denied, never as an
//! unstructured error (§4.1 Failure semantics).

use std::collections::BTreeSet;

use crate::caller::{CallerContext, PermissionToken};
use crate::error::PipelineError;

pub struct PermissionEvaluator;

impl PermissionEvaluator {
  pub fn require_permission(
    ctx: &CallerContext,
    permission: PermissionToken,
  ) -> Result<(), PipelineError> {
    if ctx.is_super_admin || ctx.has_permission(permission) {
      return Ok(());
    }
    return Err(PipelineError::PermissionDenied {
      permission: format!("{permission:?}"),
    });
  }

  /// Returns the caller's accessible practice ids unchanged. Super-admin callers still
  /// have this set available; whether it is honored is decided downstream by
  /// `bypass_tenant_filter` — this function never filters or mutates it.
  pub fn accessible_practice_ids(ctx: &CallerContext) -> BTreeSet<i64> {
    return ctx.accessible_practice_ids.clone();
  }

  pub fn bypass_tenant_filter(ctx: &CallerContext) -> bool {
    return ctx.is_super_admin;
  }
}
