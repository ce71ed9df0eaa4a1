//! C8 — Query Safety Pipeline orchestrator (§4.8).
//!
//! Composes C1-C5 into the SQL path, and C6+C7+C1-C5 into the NL path. The state
//! machine of §4.8 is a linear `?`-chain through `run_sql_inner`, not a hand-rolled
//! loop — each step either advances to the next state or returns the terminal
//! `PipelineError` for its failure branch. No state may be skipped except that a
//! super-admin caller's `FilterInjected` step is a no-op pass-through (§4.1/§4.4).

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlite3_parser::ast::Stmt;

use crate::allow_list::AllowListCache;
use crate::audit::{self, AuditContext};
use crate::caller::{CallerContext, PermissionToken, Scope};
use crate::catalogue::TableFilter;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::executor::{ExecutorError, QueryExecutor};
use crate::injector::{self, InjectorError};
use crate::model::{FinalQuery, StatementType};
use crate::nl::{self, llm_client::LlmClient};
use crate::parser::{self, ParserError, keywords};
use crate::permissions::PermissionEvaluator;
use crate::schema_metadata::SchemaMetadataService;

pub struct PipelineOutcome {
  pub ok: bool,
  pub data: Option<PipelineData>,
  pub error: Option<PipelineError>,
}

/// The success half of the outbound envelope of §6: `sql_executed` is the post-rewrite
/// SQL and is safe to log; `rows` is already bounded by `row_cap`.
#[derive(Debug)]
pub struct PipelineData {
  pub rows: Vec<Vec<trailbase_sqlvalue::SqlValue>>,
  pub row_count: usize,
  pub truncated: bool,
  pub duration_ms: u64,
  pub sql_executed: String,
}

pub struct Pipeline {
  allow_list: Arc<AllowListCache>,
  executor: Arc<QueryExecutor>,
  schema_metadata: Arc<SchemaMetadataService>,
  llm_client: Arc<dyn LlmClient>,
  cfg: PipelineConfig,
}

impl Pipeline {
  pub fn new(
    allow_list: Arc<AllowListCache>,
    executor: Arc<QueryExecutor>,
    schema_metadata: Arc<SchemaMetadataService>,
    llm_client: Arc<dyn LlmClient>,
    cfg: PipelineConfig,
  ) -> Self {
    return Self {
      allow_list,
      executor,
      schema_metadata,
      llm_client,
      cfg,
    };
  }

  /// SQL path: caller -> C1 (authz) -> C3 (parse/validate) -> C2 (allow-list) -> C3
  /// (table check) -> C4 (inject filter) -> C5 (execute) -> caller.
  pub async fn run_sql(&self, ctx: &CallerContext, sql: &str, deadline: Duration) -> PipelineOutcome {
    let started = Instant::now();
    let span = tracing::info_span!("pipeline_invocation", caller_id = %ctx.caller_id, action = "run_sql");
    let _enter = span.enter();

    let mut audit_ctx = AuditContext::default();
    let result = self.run_sql_inner(ctx, sql, deadline, &mut audit_ctx).await;
    audit::emit(ctx, "run_sql", sql, &result, started.elapsed(), &audit_ctx);
    return to_outcome(result);
  }

  /// NL path: caller -> C1 (authz) -> C6 (metadata) -> C7 (LLM) -> SQL path from C3
  /// onward. The generated SQL receives no special trust; it re-enters at
  /// `run_sql_inner`, identically to user-submitted SQL.
  pub async fn run_nl(&self, ctx: &CallerContext, question: &str, deadline: Duration) -> PipelineOutcome {
    let started = Instant::now();
    let span = tracing::info_span!("pipeline_invocation", caller_id = %ctx.caller_id, action = "run_nl");
    let _enter = span.enter();

    let mut audit_ctx = AuditContext::default();
    let result = self.run_nl_inner(ctx, question, deadline, &mut audit_ctx).await;
    audit::emit(ctx, "run_nl", question, &result, started.elapsed(), &audit_ctx);
    return to_outcome(result);
  }

  async fn run_nl_inner(
    &self,
    ctx: &CallerContext,
    question: &str,
    deadline: Duration,
    audit_ctx: &mut AuditContext,
  ) -> Result<PipelineData, PipelineError> {
    PermissionEvaluator::require_permission(ctx, PermissionToken::DataExplorerQuery(Scope::Organization))?;

    let tables = self
      .schema_metadata
      .list_tables(ctx, Scope::Organization, &TableFilter::default())
      .await?;

    let generated = nl::generate_sql(self.llm_client.as_ref(), question, &tables, &self.cfg).await?;
    tracing::debug!(model = %generated.model_used, "NL generation produced candidate SQL");

    return self.run_sql_inner(ctx, &generated.sql, deadline, audit_ctx).await;
  }

  async fn run_sql_inner(
    &self,
    ctx: &CallerContext,
    sql: &str,
    deadline: Duration,
    audit_ctx: &mut AuditContext,
  ) -> Result<PipelineData, PipelineError> {
    // Received -> AuthzChecked
    PermissionEvaluator::require_permission(ctx, PermissionToken::DataExplorerExecute(Scope::Organization))?;
    tracing::debug!("authz checked");

    // AuthzChecked -> Parsed
    if let Some(token) = keywords::sweep_destructive_keywords(sql) {
      return Err(PipelineError::DestructiveKeyword { token });
    }

    let parse_result = parser::validate(sql).map_err(|err| match err {
      ParserError::Syntax(reason) => PipelineError::ParseError { reason },
      ParserError::MultipleStatements => PipelineError::ParseError {
        reason: "input contains more than one statement".to_string(),
      },
    })?;

    if parse_result.statement_type != StatementType::Select {
      return Err(PipelineError::NotSelect);
    }
    if parse_result.has_union {
      return Err(PipelineError::UnionForbidden);
    }
    if parse_result.has_subquery {
      return Err(PipelineError::SubqueryForbidden);
    }
    tracing::debug!(tables = parse_result.tables.len(), "parsed");

    audit_ctx.tables_referenced = parse_result.tables.iter().map(|t| t.display_name()).collect();

    // Parsed -> AllowListChecked
    let allow_list = self.allow_list.get_allowed_tables().await?;
    for table in &parse_result.tables {
      if !allow_list.contains(table.schema.as_deref(), &table.table) {
        return Err(PipelineError::TableNotAllowed {
          table: table.display_name(),
        });
      }
    }
    tracing::debug!("allow list checked");

    // AllowListChecked -> FilterInjected
    let stmt = trailbase_schema::parse::parse_into_statement(sql)
      .map_err(|err| PipelineError::ParseError { reason: err.to_string() })?
      .ok_or_else(|| PipelineError::InternalInvariantViolation {
        reason: "statement vanished on re-parse".to_string(),
      })?;
    let Stmt::Select(select) = stmt else {
      return Err(PipelineError::InternalInvariantViolation {
        reason: "statement reparsed as non-SELECT after classification".to_string(),
      });
    };

    let bypass = PermissionEvaluator::bypass_tenant_filter(ctx);
    let accessible_ids = PermissionEvaluator::accessible_practice_ids(ctx);
    audit_ctx.filter_applied = !bypass;
    audit_ctx.practice_ids_scope_size = accessible_ids.len();

    let rewritten = injector::inject_tenant_filter(select, &accessible_ids, bypass, self.cfg.system_max_row_cap)
      .map_err(|err| match err {
        InjectorError::NoAccessiblePractices => PipelineError::NoAccessiblePractices,
        InjectorError::NotASelect => PipelineError::InternalInvariantViolation {
          reason: "top-level query is not a row-producing SELECT".to_string(),
        },
      })?;
    let final_sql = injector::render(&rewritten);
    tracing::debug!("filter injected");

    let final_query = FinalQuery {
      sql: final_sql.clone(),
      row_cap: self.cfg.system_max_row_cap,
      timeout_ms: self.cfg.clamp_timeout_ms(Some(u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX))),
      filter_applied: !bypass,
      filtered_practice_count: accessible_ids.len(),
    };

    // FilterInjected -> Executed -> Returned
    let execution = self.executor.execute(final_query).await.map_err(|err| match err {
      ExecutorError::QueueTimeout => PipelineError::QueueTimeout,
      ExecutorError::Timeout => PipelineError::Timeout,
      ExecutorError::Execution(err) => PipelineError::ExecutionFailed { reason: err.to_string() },
    })?;
    tracing::debug!(rows = execution.row_count, truncated = execution.truncated, "executed");

    return Ok(PipelineData {
      rows: execution.rows,
      row_count: execution.row_count,
      truncated: execution.truncated,
      duration_ms: execution.duration_ms,
      sql_executed: final_sql,
    });
  }
}

fn to_outcome(result: Result<PipelineData, PipelineError>) -> PipelineOutcome {
  return match result {
    Ok(data) => PipelineOutcome {
      ok: true,
      data: Some(data),
      error: None,
    },
    Err(err) => PipelineOutcome {
      ok: false,
      data: None,
      error: Some(err),
    },
  };
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalogue::{AllowListRow, CatalogueError, ColumnMappingRow, ColumnMetadataRow, MetadataCatalogue, TableMetadataRow};
  use async_trait::async_trait;
  use trailbase_sqlite::Connection;

  struct FakeCatalogue {
    allowed: Vec<&'static str>,
  }

  #[async_trait]
  impl MetadataCatalogue for FakeCatalogue {
    async fn active_allow_list_rows(&self) -> Result<Vec<AllowListRow>, CatalogueError> {
      return Ok(
        self
          .allowed
          .iter()
          .map(|t| AllowListRow {
            schema: Some("ih".to_string()),
            table: t.to_string(),
            is_active: true,
          })
          .collect(),
      );
    }

    async fn list_tables(&self, _filter: &TableFilter) -> Result<Vec<TableMetadataRow>, CatalogueError> {
      return Ok(vec![]);
    }

    async fn get_columns(&self, _table_id: &str) -> Result<Vec<ColumnMetadataRow>, CatalogueError> {
      return Ok(vec![]);
    }

    async fn get_column_mapping(&self, _data_source_id: &str) -> Result<Option<ColumnMappingRow>, CatalogueError> {
      return Ok(None);
    }
  }

  async fn analytics_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn
      .execute_batch(
        "CREATE TABLE patients (id INTEGER PRIMARY KEY, practice_uid INTEGER, name TEXT);
         INSERT INTO patients VALUES (1, 1, 'a'), (2, 2, 'b'), (3, 1, 'c');",
      )
      .await
      .unwrap();
    return conn;
  }

  async fn test_pipeline(allowed: Vec<&'static str>) -> Pipeline {
    let _ = env_logger::try_init_from_env(env_logger::Env::new().default_filter_or("info"));

    let catalogue = Arc::new(FakeCatalogue { allowed });
    let allow_list = Arc::new(AllowListCache::new(catalogue.clone(), 60));
    let schema_metadata = Arc::new(SchemaMetadataService::new(catalogue, allow_list.clone()));
    let llm_client: Arc<dyn LlmClient> = Arc::new(crate::nl::llm_client::FakeLlmClient {
      response: std::sync::Mutex::new(Ok("SELECT 1".to_string())),
    });
    return Pipeline::new(
      allow_list,
      Arc::new(QueryExecutor::new(
        Arc::new(crate::executor::SqliteAnalyticsEndpoint::new(analytics_conn().await)),
        4,
        1_000,
      )),
      schema_metadata,
      llm_client,
      PipelineConfig::default(),
    );
  }

  #[tokio::test]
  async fn test_run_sql_happy_path_scopes_to_single_practice() {
    let pipeline = test_pipeline(vec!["patients"]).await;
    let ctx = CallerContext::for_test("user-1", false, [1]);
    let outcome = pipeline
      .run_sql(&ctx, "SELECT id FROM ih.patients", Duration::from_secs(5))
      .await;

    assert!(outcome.ok);
    let data = outcome.data.unwrap();
    assert_eq!(data.row_count, 2);
    assert!(data.sql_executed.contains("practice_uid = 1"));
  }

  #[tokio::test]
  async fn test_run_sql_rejects_table_not_allow_listed() {
    let pipeline = test_pipeline(vec![]).await;
    let ctx = CallerContext::for_test("user-1", false, [1]);
    let outcome = pipeline
      .run_sql(&ctx, "SELECT id FROM ih.patients", Duration::from_secs(5))
      .await;

    assert!(!outcome.ok);
    assert!(matches!(outcome.error, Some(PipelineError::TableNotAllowed { .. })));
  }

  #[tokio::test]
  async fn test_run_sql_rejects_destructive_statement() {
    let pipeline = test_pipeline(vec!["patients"]).await;
    let ctx = CallerContext::for_test("user-1", false, [1]);
    let outcome = pipeline
      .run_sql(&ctx, "DELETE FROM ih.patients", Duration::from_secs(5))
      .await;

    assert!(!outcome.ok);
    assert!(matches!(outcome.error, Some(PipelineError::DestructiveKeyword { .. })));
  }

  #[tokio::test]
  async fn test_run_sql_super_admin_sees_all_practices() {
    let pipeline = test_pipeline(vec!["patients"]).await;
    let ctx = CallerContext::for_test("admin-1", true, []);
    let outcome = pipeline
      .run_sql(&ctx, "SELECT id FROM ih.patients", Duration::from_secs(5))
      .await;

    assert!(outcome.ok);
    let data = outcome.data.unwrap();
    assert_eq!(data.row_count, 3);
    assert!(!data.sql_executed.contains("practice_uid"));
  }

  #[tokio::test]
  async fn test_run_sql_no_accessible_practices_rejected() {
    let pipeline = test_pipeline(vec!["patients"]).await;
    let ctx = CallerContext::for_test("user-1", false, []);
    let outcome = pipeline
      .run_sql(&ctx, "SELECT id FROM ih.patients", Duration::from_secs(5))
      .await;

    assert!(!outcome.ok);
    assert!(matches!(outcome.error, Some(PipelineError::NoAccessiblePractices)));
  }
}
