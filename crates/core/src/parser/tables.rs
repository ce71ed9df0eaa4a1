//! Table-reference collection and structural subquery/union detection for the top-level
//! SELECT (§4.3 "Algorithmic notes"). Mirrors the walk shape of
//! `trailbase_schema::sqlite::extract_joins_and_referenced_tables_by_alias`, generalized
//! from "resolve against a known table list" to "collect every reference, flagging
//! anything this pipeline refuses to reason about".

use sqlite3_parser::ast::{self, Expr, FromClause, JoinConstraint, OneSelect, ResultColumn, Select, SelectTable};

use crate::model::TableRef;

#[derive(Default)]
pub struct TableWalkResult {
  pub tables: Vec<TableRef>,
  pub has_union: bool,
  pub has_subquery: bool,
}

/// Walks the top-level `SELECT`'s source clauses only — CTEs (a `WITH` clause) are treated
/// as subqueries and rejected, per §4.3's algorithmic notes.
pub fn walk_select(select: &Select) -> TableWalkResult {
  let mut result = TableWalkResult::default();

  if select.with.is_some() {
    result.has_subquery = true;
  }

  if select.body.compounds.is_some() {
    result.has_union = true;
  }

  let OneSelect::Select {
    columns,
    from,
    where_clause,
    ..
  } = &select.body.select
  else {
    // `VALUES (...)` rows: no table references, nothing to flag as a subquery.
    return result;
  };

  if let Some(where_clause) = where_clause
    && expr_contains_subquery(where_clause)
  {
    result.has_subquery = true;
  }

  for column in columns {
    if let ResultColumn::Expr(expr, _alias) = column
      && expr_contains_subquery(expr)
    {
      result.has_subquery = true;
    }
  }

  match from {
    Some(from_clause) => collect_from_clause(from_clause, &mut result),
    None => {}
  }

  return result;
}

fn collect_from_clause(from: &FromClause, result: &mut TableWalkResult) {
  if let Some(table) = &from.select {
    collect_select_table(table, result);
  }

  if let Some(joins) = &from.joins {
    for join in joins {
      collect_select_table(&join.table, result);

      if let Some(JoinConstraint::On(expr)) = &join.constraint
        && expr_contains_subquery(expr)
      {
        result.has_subquery = true;
      }
    }
  }
}

fn collect_select_table(table: &SelectTable, result: &mut TableWalkResult) {
  match table {
    SelectTable::Table(fqn, alias, _indexed) => {
      result.tables.push(TableRef {
        schema: fqn.db_name.as_ref().map(|n| unquote(&n.0)),
        table: unquote(&fqn.name.0),
        alias: to_alias(alias),
      });
    }
    SelectTable::TableCall(fqn, args, alias) => {
      result.tables.push(TableRef {
        schema: fqn.db_name.as_ref().map(|n| unquote(&n.0)),
        table: unquote(&fqn.name.0),
        alias: to_alias(alias),
      });
      if args.iter().any(expr_contains_subquery) {
        result.has_subquery = true;
      }
    }
    SelectTable::Select(_, _) | SelectTable::Sub(_, _) => {
      result.has_subquery = true;
    }
  }
}

fn to_alias(alias: &Option<ast::As>) -> Option<String> {
  return alias.as_ref().map(|a| match a {
    ast::As::As(name) => unquote(&name.0),
    ast::As::Elided(name) => unquote(&name.0),
  });
}

fn unquote(s: &str) -> String {
  let bytes = s.as_bytes();
  if bytes.len() >= 2 {
    match bytes[0] {
      b'"' | b'`' | b'\'' | b'[' => return s[1..s.len() - 1].to_string(),
      _ => {}
    }
  }
  return s.to_string();
}

fn expr_contains_subquery(expr: &Expr) -> bool {
  return match expr {
    Expr::InSelect { .. } | Expr::Exists(_) | Expr::Subquery(_) => true,
    Expr::Binary(lhs, _, rhs) => expr_contains_subquery(lhs) || expr_contains_subquery(rhs),
    Expr::Unary(_, inner) => expr_contains_subquery(inner),
    Expr::IsNull(inner) | Expr::NotNull(inner) => expr_contains_subquery(inner),
    Expr::Between { lhs, start, end, .. } => {
      expr_contains_subquery(lhs) || expr_contains_subquery(start) || expr_contains_subquery(end)
    }
    Expr::InList { lhs, rhs, .. } => {
      expr_contains_subquery(lhs) || rhs.as_ref().is_some_and(|items| items.iter().any(expr_contains_subquery))
    }
    Expr::InTable { lhs, .. } => expr_contains_subquery(lhs),
    Expr::Like { lhs, rhs, escape, .. } => {
      expr_contains_subquery(lhs)
        || expr_contains_subquery(rhs)
        || escape.as_deref().is_some_and(expr_contains_subquery)
    }
    Expr::Case {
      base,
      when_then_pairs,
      else_expr,
    } => {
      base.as_deref().is_some_and(expr_contains_subquery)
        || when_then_pairs
          .iter()
          .any(|(w, t)| expr_contains_subquery(w) || expr_contains_subquery(t))
        || else_expr.as_deref().is_some_and(expr_contains_subquery)
    }
    Expr::Cast { expr, .. } => expr_contains_subquery(expr),
    Expr::Collate(inner, _) => expr_contains_subquery(inner),
    Expr::Parenthesized(exprs) => exprs.iter().any(expr_contains_subquery),
    Expr::FunctionCall { args, .. } => args.as_ref().is_some_and(|a| a.iter().any(expr_contains_subquery)),
    _ => false,
  };
}
