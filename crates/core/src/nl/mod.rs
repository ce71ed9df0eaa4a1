//! C7 — NL-to-SQL Generator (§4.7).
//!
//! Translates a natural-language question into a candidate SQL string, then hands it
//! straight back to the SQL path starting at C3 (`parser::validate`). This generator
//! provides zero privilege and zero bypass: the extracted SQL is never trusted, and
//! this module never calls C4/C5 directly.

pub mod extract;
pub mod llm_client;
pub mod prompt;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::Complexity;
use crate::schema_metadata::TableMetadata;
use llm_client::LlmClient;

#[derive(Debug, thiserror::Error)]
pub enum NlError {
  #[error("LLM call timed out")]
  Timeout,
  #[error("LLM response contained no recognizable SQL statement")]
  NoSqlFound,
  #[error("LLM call failed: {0}")]
  ModelError(String),
}

impl From<NlError> for PipelineError {
  fn from(err: NlError) -> Self {
    let reason = match err {
      NlError::Timeout => crate::error::NlFailureReason::Timeout,
      NlError::NoSqlFound => crate::error::NlFailureReason::NoSqlFound,
      NlError::ModelError(_) => crate::error::NlFailureReason::ModelError,
    };
    return PipelineError::NLGenerationFailed { reason };
  }
}

#[derive(Clone, Debug)]
pub struct NlSqlResult {
  pub sql: String,
  pub tables_used: Vec<String>,
  pub estimated_complexity: Complexity,
  pub model_used: String,
  pub prompt_tokens: usize,
  pub completion_tokens: usize,
  pub explanation: Option<String>,
}

/// Runs the full NL-to-SQL generation contract of §4.7: build a bounded prompt, invoke
/// the LLM under `cfg.llm_timeout_ms`, extract a single SQL statement, and estimate its
/// complexity from the extracted SQL's own AST — not from the model's self-report.
pub async fn generate_sql(
  client: &dyn LlmClient,
  question: &str,
  tables: &[TableMetadata],
  cfg: &PipelineConfig,
) -> Result<NlSqlResult, NlError> {
  let rendered = prompt::build_prompt(question, tables, cfg);

  let deadline = std::time::Duration::from_millis(cfg.llm_timeout_ms);
  let completion = tokio::time::timeout(deadline, client.complete(&rendered.text, deadline))
    .await
    .map_err(|_| NlError::Timeout)??;

  let sql = extract::extract_sql(&completion.text)?;

  let (complexity, tables_used) = match trailbase_schema::parse::parse_into_statement(&sql) {
    Ok(Some(sqlite3_parser::ast::Stmt::Select(select))) => {
      let walk = crate::parser::tables::walk_select(&select);
      let tables = walk.tables.iter().map(|t| t.display_name()).collect();
      (estimate_complexity(&select), tables)
    }
    // The NL generator's output is never trusted; if it isn't even parseable as a
    // SELECT here, C3 will reject it properly once this result re-enters the SQL path.
    _ => (Complexity::Simple, vec![]),
  };

  return Ok(NlSqlResult {
    sql,
    tables_used,
    estimated_complexity: complexity,
    model_used: completion.model,
    prompt_tokens: completion.prompt_tokens,
    completion_tokens: completion.completion_tokens,
    explanation: completion.explanation,
  });
}

/// Heuristic over the final extracted SQL (§4.7): `simple` = 0 joins and no aggregation
/// beyond `COUNT`; `moderate` = 1-3 joins; `complex` = >= 4 joins or a window function.
pub fn estimate_complexity(select: &sqlite3_parser::ast::Select) -> Complexity {
  let join_count = match &select.body.select {
    sqlite3_parser::ast::OneSelect::Select { from: Some(from), .. } => {
      from.joins.as_ref().map(|j| j.len()).unwrap_or(0)
    }
    _ => 0,
  };

  let has_window = match &select.body.select {
    sqlite3_parser::ast::OneSelect::Select { window_clause, .. } => window_clause.is_some(),
    _ => false,
  };

  if join_count >= 4 || has_window {
    return Complexity::Complex;
  }
  if join_count >= 1 {
    return Complexity::Moderate;
  }
  return Complexity::Simple;
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(sql: &str) -> sqlite3_parser::ast::Select {
    let stmt = trailbase_schema::parse::parse_into_statement(sql).unwrap().unwrap();
    let sqlite3_parser::ast::Stmt::Select(select) = stmt else {
      panic!("expected SELECT");
    };
    return select;
  }

  #[test]
  fn test_simple_no_joins() {
    let select = parse("SELECT id FROM ih.patients");
    assert_eq!(estimate_complexity(&select), Complexity::Simple);
  }

  #[test]
  fn test_moderate_one_join() {
    let select = parse("SELECT p.id FROM ih.patients p JOIN ih.appointments a ON p.id = a.patient_id");
    assert_eq!(estimate_complexity(&select), Complexity::Moderate);
  }

  #[test]
  fn test_complex_many_joins() {
    let select = parse(
      "SELECT p.id FROM ih.a p \
       JOIN ih.b b1 ON p.id = b1.id \
       JOIN ih.c b2 ON p.id = b2.id \
       JOIN ih.d b3 ON p.id = b3.id \
       JOIN ih.e b4 ON p.id = b4.id",
    );
    assert_eq!(estimate_complexity(&select), Complexity::Complex);
  }
}
