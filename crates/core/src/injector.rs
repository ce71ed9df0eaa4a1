//! C4 — Security Filter Injector (§4.4).
//!
//! Runs only after every §4.3 rule has passed; it does not revalidate them (§4.4
//! "Ordering guarantee"). The predicate is emitted as literal integers, never bind
//! parameters, per Open Question 4's resolution — the analytics endpoint this pipeline
//! targets accepts only literal SQL.

use std::collections::BTreeSet;
use std::fmt;

use sqlite3_parser::ast::fmt::ToTokens;
use sqlite3_parser::ast::{Expr, Id, Limit, Literal, OneSelect, Operator, Select};

#[derive(Debug, thiserror::Error)]
pub enum InjectorError {
  #[error("caller has no accessible practices")]
  NoAccessiblePractices,
  #[error("top-level query is not a row-producing SELECT")]
  NotASelect,
}

/// Rewrites `select` so its top-level `WHERE` constrains `practice_uid` to `ids`, and
/// clamps `LIMIT` to `row_cap`. When `bypass` is true (super-admin, §4.1
/// `bypass_tenant_filter?`) no predicate is injected — the SQL passes through unchanged
/// except for the same LIMIT clamp (§8 invariant 8).
pub fn inject_tenant_filter(
  mut select: Select,
  ids: &BTreeSet<i64>,
  bypass: bool,
  row_cap: i64,
) -> Result<Select, InjectorError> {
  if !bypass {
    if ids.is_empty() {
      return Err(InjectorError::NoAccessiblePractices);
    }

    let predicate = practice_uid_predicate(ids);

    let OneSelect::Select { where_clause, .. } = &mut select.body.select else {
      return Err(InjectorError::NotASelect);
    };

    *where_clause = Some(Box::new(match where_clause.take() {
      Some(existing) => Expr::Binary(existing, Operator::And, Box::new(predicate)),
      None => predicate,
    }));
  }

  clamp_limit(&mut select, row_cap);

  return Ok(select);
}

fn practice_uid_predicate(ids: &BTreeSet<i64>) -> Expr {
  let column = Expr::Id(Id("practice_uid".to_string()));

  if ids.len() == 1 {
    let id = *ids.iter().next().expect("len checked above");
    return Expr::Binary(
      Box::new(column),
      Operator::Equals,
      Box::new(Expr::Literal(Literal::Numeric(id.to_string()))),
    );
  }

  return Expr::InList {
    lhs: Box::new(column),
    not: false,
    rhs: Some(
      ids
        .iter()
        .map(|id| Expr::Literal(Literal::Numeric(id.to_string())))
        .collect(),
    ),
  };
}

/// If `select.limit` is absent, sets it to `row_cap`. If present with a literal value
/// above `row_cap`, replaces it. Non-literal `LIMIT` expressions (bind parameters or
/// computed expressions) are treated as exceeding the cap conservatively and replaced
/// outright, since the injector cannot prove them bounded.
fn clamp_limit(select: &mut Select, row_cap: i64) {
  let exceeds_cap = match &select.limit {
    None => true,
    Some(limit) => match limit.expr.as_ref() {
      Expr::Literal(Literal::Numeric(s)) => s.parse::<i64>().is_ok_and(|v| v > row_cap) || s.parse::<i64>().is_err(),
      _ => true,
    },
  };

  if exceeds_cap {
    select.limit = Some(Limit {
      expr: Box::new(Expr::Literal(Literal::Numeric(row_cap.to_string()))),
      offset: None,
    });
  }
}

pub struct SelectDisplay<'a>(pub &'a Select);

impl fmt::Display for SelectDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    return self.0.to_fmt(f);
  }
}

pub fn render(select: &Select) -> String {
  return SelectDisplay(select).to_string();
}

#[cfg(test)]
mod tests {
  use super::*;
  use sqlite3_parser::ast::Stmt;
  use trailbase_schema::parse::parse_into_statement;

  fn parse_select(sql: &str) -> Select {
    let stmt = parse_into_statement(sql).unwrap().unwrap();
    let Stmt::Select(select) = stmt else {
      panic!("expected SELECT");
    };
    return select;
  }

  fn ids(values: &[i64]) -> BTreeSet<i64> {
    return values.iter().copied().collect();
  }

  #[test]
  fn test_single_practice_no_existing_where() {
    let select = parse_select("SELECT * FROM ih.patients");
    let rewritten = inject_tenant_filter(select, &ids(&[42]), false, 10_000).unwrap();
    let sql = render(&rewritten);
    assert!(sql.contains("practice_uid = 42"));
    assert!(sql.contains("LIMIT 10000"));
  }

  #[test]
  fn test_multi_practice_existing_where() {
    let select = parse_select("SELECT * FROM ih.patients WHERE status = 'active'");
    let rewritten = inject_tenant_filter(select, &ids(&[1, 2, 3]), false, 10_000).unwrap();
    let sql = render(&rewritten);
    assert!(sql.contains("status = 'active'"));
    assert!(sql.contains("AND"));
    assert!(sql.contains("practice_uid IN (1, 2, 3)"));
  }

  #[test]
  fn test_no_accessible_practices_rejected() {
    let select = parse_select("SELECT * FROM ih.patients");
    let err = inject_tenant_filter(select, &ids(&[]), false, 10_000).unwrap_err();
    assert!(matches!(err, InjectorError::NoAccessiblePractices));
  }

  #[test]
  fn test_super_admin_bypass_no_predicate() {
    let select = parse_select("SELECT * FROM ih.patients");
    let rewritten = inject_tenant_filter(select, &ids(&[]), true, 10_000).unwrap();
    let sql = render(&rewritten);
    assert!(!sql.contains("practice_uid"));
    assert!(sql.contains("LIMIT 10000"));
  }

  #[test]
  fn test_row_cap_clamped_down() {
    let select = parse_select("SELECT * FROM ih.patients LIMIT 1000000");
    let rewritten = inject_tenant_filter(select, &ids(&[42]), false, 10_000).unwrap();
    let sql = render(&rewritten);
    assert!(sql.contains("LIMIT 10000"));
    assert!(!sql.contains("1000000"));
  }

  #[test]
  fn test_row_cap_preserved_when_under() {
    let select = parse_select("SELECT * FROM ih.patients LIMIT 5");
    let rewritten = inject_tenant_filter(select, &ids(&[42]), false, 10_000).unwrap();
    let sql = render(&rewritten);
    assert!(sql.contains("LIMIT 5"));
  }

  #[test]
  fn test_idempotent_up_to_redundant_predicate() {
    let select = parse_select("SELECT * FROM ih.patients");
    let once = inject_tenant_filter(select, &ids(&[42]), false, 10_000).unwrap();
    let rendered_once = render(&once);

    let twice_select = parse_select(&rendered_once);
    let twice = inject_tenant_filter(twice_select, &ids(&[42]), false, 10_000).unwrap();
    let rendered_twice = render(&twice);

    assert!(rendered_twice.contains("practice_uid = 42"));
    assert!(rendered_twice.contains("LIMIT 10000"));
  }

  #[test]
  fn test_group_by_order_by_preserved() {
    let select = parse_select(
      "SELECT practice_uid, COUNT(*) FROM ih.patients GROUP BY practice_uid ORDER BY practice_uid",
    );
    let rewritten = inject_tenant_filter(select, &ids(&[42]), false, 10_000).unwrap();
    let sql = render(&rewritten);
    assert!(sql.contains("GROUP BY"));
    assert!(sql.contains("ORDER BY"));
  }
}
