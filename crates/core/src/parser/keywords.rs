//! Tokenized, case-insensitive destructive-keyword sweep (§4.3 "no-destructive-keyword").
//!
//! Runs independently of and in addition to the AST-level statement classification in
//! `parser::mod` — Open Question 3 mandates both checks. Tokenizing first means a keyword
//! appearing inside a string literal or a comment never matches, e.g.
//! `WHERE note = 'please delete me'`.

const DESTRUCTIVE_KEYWORDS: &[&str] = &[
  "DROP", "TRUNCATE", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "GRANT", "REVOKE",
];

/// Scans raw SQL text for a destructive keyword token, skipping over single- and
/// double-quoted string spans and `--`/`/* */` comments. Returns the first offending token
/// in its original casing, or `None` if none is found.
pub fn sweep_destructive_keywords(sql: &str) -> Option<String> {
  for token in tokenize(sql) {
    if DESTRUCTIVE_KEYWORDS
      .iter()
      .any(|kw| kw.eq_ignore_ascii_case(token))
    {
      return Some(token.to_uppercase());
    }
  }
  return None;
}

fn tokenize(sql: &str) -> Vec<&str> {
  let bytes = sql.as_bytes();
  let mut tokens = vec![];
  let mut i = 0usize;

  while i < bytes.len() {
    let c = bytes[i];

    match c {
      b'\'' | b'"' | b'`' => {
        let quote = c;
        i += 1;
        while i < bytes.len() {
          if bytes[i] == quote {
            // SQL escapes a quote by doubling it; a doubled quote stays inside the literal.
            if i + 1 < bytes.len() && bytes[i + 1] == quote {
              i += 2;
              continue;
            }
            i += 1;
            break;
          }
          i += 1;
        }
      }
      b'-' if bytes.get(i + 1) == Some(&b'-') => {
        while i < bytes.len() && bytes[i] != b'\n' {
          i += 1;
        }
      }
      b'/' if bytes.get(i + 1) == Some(&b'*') => {
        i += 2;
        while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
          i += 1;
        }
        i = (i + 2).min(bytes.len());
      }
      c if c.is_ascii_alphabetic() || c == b'_' => {
        let start = i;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
          i += 1;
        }
        tokens.push(&sql[start..i]);
      }
      _ => {
        i += 1;
      }
    }
  }

  return tokens;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_detects_drop() {
    assert_eq!(
      sweep_destructive_keywords("DROP TABLE ih.patients"),
      Some("DROP".to_string())
    );
  }

  #[test]
  fn test_detects_lowercase() {
    assert_eq!(
      sweep_destructive_keywords("drop table ih.patients"),
      Some("DROP".to_string())
    );
  }

  #[test]
  fn test_select_is_clean() {
    assert_eq!(sweep_destructive_keywords("SELECT * FROM ih.patients"), None);
  }

  #[test]
  fn test_ignores_keyword_in_string_literal() {
    assert_eq!(
      sweep_destructive_keywords("SELECT * FROM ih.notes WHERE note = 'please delete me'"),
      None
    );
  }

  #[test]
  fn test_ignores_keyword_in_line_comment() {
    assert_eq!(
      sweep_destructive_keywords("SELECT * FROM ih.patients -- DROP TABLE ih.patients"),
      None
    );
  }

  #[test]
  fn test_ignores_keyword_in_block_comment() {
    assert_eq!(
      sweep_destructive_keywords("SELECT * FROM ih.patients /* DROP TABLE ih.patients */"),
      None
    );
  }

  #[test]
  fn test_detects_keyword_after_string_literal() {
    assert_eq!(
      sweep_destructive_keywords("SELECT * FROM ih.notes WHERE note = 'delete'; DROP TABLE ih.patients"),
      Some("DROP".to_string())
    );
  }

  #[test]
  fn test_handles_escaped_quote_inside_literal() {
    assert_eq!(
      sweep_destructive_keywords("SELECT * FROM ih.notes WHERE note = 'it''s a DROP note'"),
      None
    );
  }
}
