/// Identifier handling shared by the parser/validator and the table allow-list cache.
///
/// This is a deliberately small slice of what used to live here: table/index/trigger DDL
/// representations. The query-safety pipeline never creates or inspects DDL, so only the
/// `schema.table` qualified-name parsing survives.
use serde::{Deserialize, Serialize};
use sqlite3_parser::ast::QualifiedName as AstQualifiedName;
use std::hash::{Hash, Hasher};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
  #[error("Missing ObjectName")]
  MissingName,
  #[error("Precondition failed: {0}")]
  Precondition(Box<dyn std::error::Error + Send + Sync>),
}

/// A `schema.table` (or bare `table`) reference. Comparisons are case-insensitive and ignore
/// quoting: the allow-list cache normalizes on insertion (lower-cased, unquoted) and every
/// comparison site normalizes the incoming reference the same way before comparing, rather
/// than enumerating quoted/unquoted variants on the stored side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualifiedName {
  pub name: String,
  pub database_schema: Option<String>,
}

impl QualifiedName {
  pub fn parse(name: &str) -> Result<Self, SchemaError> {
    if name.contains(';') {
      return Err(SchemaError::Precondition("Invalid name".into()));
    }

    if let Some((db, name)) = name.split_once('.') {
      return Ok(Self {
        name: unquote_string(name),
        database_schema: Some(unquote_string(db)),
      });
    }
    return Ok(Self {
      name: unquote_string(name),
      database_schema: None,
    });
  }

  pub fn escaped_string(&self) -> String {
    return if let Some(ref db) = self.database_schema {
      format!(r#""{db}"."{}""#, self.name)
    } else {
      format!(r#""{}""#, self.name)
    };
  }

  /// Lower-cased, unquoted form used as the key into the allow-list set.
  pub fn normalized_key(&self) -> String {
    return match &self.database_schema {
      Some(db) => format!("{}.{}", db.to_lowercase(), self.name.to_lowercase()),
      None => self.name.to_lowercase(),
    };
  }

  /// Lower-cased, unquoted bare-table key, dropping any schema qualifier. Used to also
  /// allow-list the unqualified form some generators emit.
  pub fn normalized_bare_key(&self) -> String {
    return self.name.to_lowercase();
  }
}

impl PartialEq for QualifiedName {
  fn eq(&self, other: &Self) -> bool {
    return self.name.eq_ignore_ascii_case(&other.name)
      && self
        .database_schema
        .as_deref()
        .unwrap_or("main")
        .eq_ignore_ascii_case(other.database_schema.as_deref().unwrap_or("main"));
  }
}

impl Eq for QualifiedName {}

impl Hash for QualifiedName {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.name.to_lowercase().hash(state);
    self
      .database_schema
      .as_deref()
      .unwrap_or("main")
      .to_lowercase()
      .hash(state);
  }
}

impl From<AstQualifiedName> for QualifiedName {
  fn from(qn: AstQualifiedName) -> Self {
    return Self {
      database_schema: qn.db_name.map(|n| unquote_string(&n.0)),
      name: unquote_string(&qn.name.0),
    };
  }
}

impl std::fmt::Display for QualifiedName {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return match &self.database_schema {
      Some(db) => write!(f, "{db}.{}", self.name),
      None => write!(f, "{}", self.name),
    };
  }
}

pub(crate) fn unquote_string(s: &str) -> String {
  let n = s.as_bytes();
  if n.is_empty() {
    return String::new();
  }

  return match n[0] {
    b'"' | b'`' | b'\'' | b'[' if n.len() >= 2 => s[1..n.len() - 1].to_string(),
    _ => s.to_string(),
  };
}
