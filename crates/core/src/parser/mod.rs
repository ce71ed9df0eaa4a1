//! C3 — SQL AST Parser/Validator (§4.3).
//!
//! Parses via `trailbase_schema::parse`, classifies the statement, and applies every
//! structural rule of §4.3's rule table except the allow-list check (C2's job, applied by
//! the pipeline once C3 has produced a `ParseResult`).

pub mod keywords;
pub mod tables;

use sqlite3_parser::ast::Stmt;

use crate::model::{ParseResult, StatementType};

#[derive(Debug, thiserror::Error)]
pub enum ParserError {
  #[error("could not parse SQL: {0}")]
  Syntax(String),
  #[error("input contains more than one statement")]
  MultipleStatements,
}

/// Parses `sql` into a single statement and classifies it, using
/// `trailbase_schema::parse::parse_into_statements` (not `parse_into_statement`) so a
/// trailing second statement after `;` is detected rather than silently dropped — the
/// "single-statement" rule of §4.3.
pub fn validate(sql: &str) -> Result<ParseResult, ParserError> {
  let statements =
    trailbase_schema::parse::parse_into_statements(sql).map_err(|err| ParserError::Syntax(err.to_string()))?;

  if statements.len() > 1 {
    return Err(ParserError::MultipleStatements);
  }

  let Some(stmt) = statements.into_iter().next() else {
    return Err(ParserError::Syntax("empty input".to_string()));
  };

  let statement_type = classify(&stmt);

  let Stmt::Select(select) = &stmt else {
    return Ok(ParseResult {
      valid: true,
      statement_type,
      tables: vec![],
      has_union: false,
      has_subquery: false,
      errors: vec![],
    });
  };

  let walk = tables::walk_select(select);

  return Ok(ParseResult {
    valid: true,
    statement_type,
    tables: walk.tables,
    has_union: walk.has_union,
    has_subquery: walk.has_subquery,
    errors: vec![],
  });
}

fn classify(stmt: &Stmt) -> StatementType {
  return match stmt {
    Stmt::Select(_) => StatementType::Select,
    Stmt::Insert { .. } => StatementType::Insert,
    Stmt::Update { .. } => StatementType::Update,
    Stmt::Delete { .. } => StatementType::Delete,
    Stmt::CreateTable { .. }
    | Stmt::CreateView { .. }
    | Stmt::CreateIndex { .. }
    | Stmt::CreateVirtualTable { .. }
    | Stmt::CreateTrigger { .. }
    | Stmt::DropTable { .. }
    | Stmt::DropView { .. }
    | Stmt::DropIndex { .. }
    | Stmt::DropTrigger { .. }
    | Stmt::AlterTable { .. } => StatementType::Ddl,
    // Attach, Detach, Pragma, Vacuum, Begin, Commit, Rollback, Savepoint, Reindex, Analyze
    // and anything else this pipeline has no business reasoning about.
    _ => StatementType::Unknown,
  };
}
