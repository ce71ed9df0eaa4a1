//! Prompt assembly for C7 (§4.7). The prompt states SELECT-only/no-subquery/no-UNION
//! constraints as guidance to the model; none of it is ever trusted as enforcement —
//! §4.3 re-validates the extracted SQL from scratch.

use crate::config::PipelineConfig;
use crate::schema_metadata::TableMetadata;

pub struct RenderedPrompt {
  pub text: String,
  pub tables_included: usize,
  pub tables_dropped: usize,
}

const SYSTEM_PREAMBLE: &str = "\
You translate analytics questions into a single SQLite SELECT statement.
Rules:
- Output exactly one SELECT statement, nothing else.
- Always use fully qualified table names (schema.table).
- Never use subqueries, CTEs, or UNION/INTERSECT/EXCEPT.
- Never use INSERT, UPDATE, DELETE, DROP, ALTER, CREATE, TRUNCATE, GRANT, or REVOKE.
- Only reference tables from the schema below.";

/// Truncates the visible table list to `cfg.nl_prompt_metadata_limit`, logging the
/// dropped count rather than silently omitting it.
pub fn build_prompt(question: &str, tables: &[TableMetadata], cfg: &PipelineConfig) -> RenderedPrompt {
  let limit = cfg.nl_prompt_metadata_limit;
  let included = &tables[..tables.len().min(limit)];
  let dropped = tables.len().saturating_sub(included.len());

  if dropped > 0 {
    tracing::debug!(dropped, limit, "truncated table metadata for NL prompt");
  }

  let mut schema_section = String::new();
  for table in included {
    let name = match &table.schema {
      Some(schema) => format!("{schema}.{}", table.table),
      None => table.table.clone(),
    };
    let description = table.description.as_deref().unwrap_or("");
    schema_section.push_str(&format!("- {name}: {description}\n"));
  }

  let text = format!(
    "{SYSTEM_PREAMBLE}\n\nSchema:\n{schema_section}\nQuestion: {question}\n\nSQL:"
  );

  return RenderedPrompt {
    text,
    tables_included: included.len(),
    tables_dropped: dropped,
  };
}

#[cfg(test)]
mod tests {
  use super::*;

  fn table(name: &str) -> TableMetadata {
    return TableMetadata {
      table_id: name.to_string(),
      schema: Some("ih".to_string()),
      table: name.to_string(),
      description: Some("a table".to_string()),
      owner: None,
      semantic_tags: vec![],
    };
  }

  #[test]
  fn test_includes_all_tables_under_limit() {
    let cfg = PipelineConfig::default();
    let tables = vec![table("patients"), table("appointments")];
    let rendered = build_prompt("how many patients?", &tables, &cfg);
    assert_eq!(rendered.tables_included, 2);
    assert_eq!(rendered.tables_dropped, 0);
    assert!(rendered.text.contains("ih.patients"));
  }

  #[test]
  fn test_truncates_above_limit() {
    let mut cfg = PipelineConfig::default();
    cfg.nl_prompt_metadata_limit = 1;
    let tables = vec![table("patients"), table("appointments")];
    let rendered = build_prompt("how many patients?", &tables, &cfg);
    assert_eq!(rendered.tables_included, 1);
    assert_eq!(rendered.tables_dropped, 1);
  }

  #[test]
  fn test_prompt_states_select_only_constraint() {
    let cfg = PipelineConfig::default();
    let rendered = build_prompt("x", &[], &cfg);
    assert!(rendered.text.contains("single SQLite SELECT statement"));
    assert!(rendered.text.contains("Never use subqueries"));
  }
}
