//! Plain data values shared across components (spec §3).
//!
//! None of these types own resources beyond the pipeline invocation that created them; the
//! AST handle itself is kept private to `parser`/`injector` and never appears here (§9's
//! "AST ownership" design note).

/// One table reference collected from the FROM/JOIN clauses of the top-level SELECT.
/// Equality compares `(schema, table)` case-insensitively, ignoring quoting — delegated to
/// `trailbase_schema::QualifiedName`.
#[derive(Clone, Debug)]
pub struct TableRef {
  pub schema: Option<String>,
  pub table: String,
  pub alias: Option<String>,
}

impl TableRef {
  pub fn display_name(&self) -> String {
    return match &self.schema {
      Some(schema) => format!("{schema}.{}", self.table),
      None => self.table.clone(),
    };
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementType {
  Select,
  Insert,
  Update,
  Delete,
  Ddl,
  Unknown,
}

#[derive(Clone, Debug)]
pub struct ParseResult {
  pub valid: bool,
  pub statement_type: StatementType,
  pub tables: Vec<TableRef>,
  pub has_union: bool,
  pub has_subquery: bool,
  pub errors: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct FinalQuery {
  pub sql: String,
  pub row_cap: i64,
  pub timeout_ms: u64,
  pub filter_applied: bool,
  pub filtered_practice_count: usize,
}

#[derive(Clone, Debug)]
pub struct ExecutionResult {
  pub rows: Vec<Vec<trailbase_sqlvalue::SqlValue>>,
  pub columns: Vec<String>,
  pub row_count: usize,
  pub truncated: bool,
  pub duration_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
  Simple,
  Moderate,
  Complex,
}
