//! The stable error taxonomy of the query safety pipeline (§7).
//!
//! `PipelineError` is the only error type C8 ever returns to a caller. Component-local
//! error enums exist where a component has failure modes this taxonomy doesn't need to
//! expose one-to-one; they convert into `PipelineError` at the pipeline boundary.

use serde::Serialize;

/// A single stable taxonomy entry, matching spec §7's `Kind` column exactly.
#[derive(Clone, Debug, Serialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "kind", content = "details")]
pub enum PipelineError {
  #[error("permission denied: missing {permission}")]
  PermissionDenied { permission: String },

  #[error("malformed caller context: {reason}")]
  MalformedCallerContext { reason: String },

  #[error("could not parse SQL: {reason}")]
  ParseError { reason: String },

  #[error("statement is not a SELECT")]
  NotSelect,

  #[error("UNION/INTERSECT/EXCEPT is not permitted")]
  UnionForbidden,

  #[error("subqueries are not permitted")]
  SubqueryForbidden,

  #[error("destructive keyword `{token}` is not permitted")]
  DestructiveKeyword { token: String },

  #[error("table `{table}` is not allow-listed")]
  TableNotAllowed { table: String },

  #[error("allow-list is unavailable")]
  AllowListUnavailable,

  #[error("caller has no accessible practices")]
  NoAccessiblePractices,

  #[error("natural-language SQL generation failed: {reason}")]
  NLGenerationFailed { reason: NlFailureReason },

  #[error("query exceeded its deadline")]
  Timeout,

  #[error("connection pool exhausted")]
  QueueTimeout,

  #[error("row cap exceeded; results truncated")]
  RowCapExceeded,

  #[error("internal invariant violation: {reason}")]
  InternalInvariantViolation { reason: String },

  #[error("execution failed: {reason}")]
  ExecutionFailed { reason: String },
}

impl PipelineError {
  /// The taxonomy entry name, stable across versions, suitable for machine matching by
  /// collaborators (e.g. deciding whether a failure is retryable).
  pub fn kind(&self) -> &'static str {
    return match self {
      Self::PermissionDenied { .. } => "PermissionDenied",
      Self::MalformedCallerContext { .. } => "MalformedCallerContext",
      Self::ParseError { .. } => "ParseError",
      Self::NotSelect => "NotSelect",
      Self::UnionForbidden => "UnionForbidden",
      Self::SubqueryForbidden => "SubqueryForbidden",
      Self::DestructiveKeyword { .. } => "DestructiveKeyword",
      Self::TableNotAllowed { .. } => "TableNotAllowed",
      Self::AllowListUnavailable => "AllowListUnavailable",
      Self::NoAccessiblePractices => "NoAccessiblePractices",
      Self::NLGenerationFailed { .. } => "NLGenerationFailed",
      Self::Timeout => "Timeout",
      Self::QueueTimeout => "QueueTimeout",
      Self::RowCapExceeded => "RowCapExceeded",
      Self::InternalInvariantViolation { .. } => "InternalInvariantViolation",
      Self::ExecutionFailed { .. } => "ExecutionFailed",
    };
  }

  /// Whether a caller may reasonably retry the same request unchanged.
  pub fn retryable(&self) -> bool {
    return matches!(self, Self::AllowListUnavailable | Self::QueueTimeout);
  }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NlFailureReason {
  Timeout,
  NoSqlFound,
  ModelError,
}

impl std::fmt::Display for NlFailureReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return match self {
      Self::Timeout => write!(f, "timeout"),
      Self::NoSqlFound => write!(f, "no SQL found in model output"),
      Self::ModelError => write!(f, "model error"),
    };
  }
}
