//! Extracts a single SQL statement from a raw LLM completion (§4.7). Strips an optional
//! fenced code block, then requires the remainder to visibly start with `SELECT` or
//! `WITH` before handing it back — real validation happens once this string re-enters
//! C3, not here.

use crate::nl::NlError;

pub fn extract_sql(completion_text: &str) -> Result<String, NlError> {
  let stripped = strip_fence(completion_text.trim());
  let trimmed = stripped.trim();

  if trimmed.is_empty() || !starts_with_sql_keyword(trimmed) {
    return Err(NlError::NoSqlFound);
  }

  return Ok(trimmed.to_string());
}

fn strip_fence(text: &str) -> &str {
  let Some(inner) = text.strip_prefix("```") else {
    return text;
  };

  let inner = inner.strip_prefix("sql").unwrap_or(inner);
  let inner = inner.strip_prefix('\n').unwrap_or(inner);

  return inner.strip_suffix("```").unwrap_or(inner);
}

fn starts_with_sql_keyword(text: &str) -> bool {
  let upper = text.trim_start();
  return upper.len() >= 6 && (upper[..6].eq_ignore_ascii_case("select") || upper[..4].eq_ignore_ascii_case("with"));
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extracts_plain_sql() {
    assert_eq!(extract_sql("SELECT * FROM ih.patients").unwrap(), "SELECT * FROM ih.patients");
  }

  #[test]
  fn test_strips_fenced_block_with_language_tag() {
    let text = "```sql\nSELECT * FROM ih.patients\n```";
    assert_eq!(extract_sql(text).unwrap(), "SELECT * FROM ih.patients");
  }

  #[test]
  fn test_strips_fenced_block_without_language_tag() {
    let text = "```\nSELECT * FROM ih.patients\n```";
    assert_eq!(extract_sql(text).unwrap(), "SELECT * FROM ih.patients");
  }

  #[test]
  fn test_accepts_with_clause() {
    assert!(extract_sql("WITH cte AS (SELECT 1) SELECT * FROM cte").is_ok());
  }

  #[test]
  fn test_rejects_non_sql_text() {
    let err = extract_sql("I'm sorry, I can't help with that.").unwrap_err();
    assert!(matches!(err, NlError::NoSqlFound));
  }

  #[test]
  fn test_rejects_empty_text() {
    assert!(matches!(extract_sql("   ").unwrap_err(), NlError::NoSqlFound));
  }
}
