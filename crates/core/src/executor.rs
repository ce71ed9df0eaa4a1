//! C5 — Query Executor (§4.5).
//!
//! Runs a `FinalQuery` against the read-only analytics connection through a bounded pool,
//! enforcing the §6 timeout and row cap defensively even though C4 already clamped `LIMIT`
//! at the SQL level — a driver or view that ignores `LIMIT` must not be trusted blindly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use trailbase_sqlite::Connection;

use crate::model::{ExecutionResult, FinalQuery};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
  #[error("query queue timed out waiting for a connection slot")]
  QueueTimeout,
  #[error("query exceeded its execution timeout")]
  Timeout,
  #[error("query execution failed: {0}")]
  Execution(#[from] trailbase_sqlite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
  Healthy,
  Unhealthy,
}

/// The "addressable read-only SQL endpoint" of §6, abstracted behind a trait so C5 never
/// depends on a concrete driver. Mirrors how `MetadataCatalogue` abstracts the primary
/// application database away from C2/C6.
#[async_trait]
pub trait AnalyticsEndpoint: Send + Sync {
  async fn read_rows(&self, sql: String) -> Result<trailbase_sqlite::Rows, trailbase_sqlite::Error>;

  async fn health_check(&self) -> Result<Option<i64>, trailbase_sqlite::Error>;
}

/// The only implementation this repo ships: a single `trailbase_sqlite::Connection`
/// against a read-only SQLite analytics database. Not a reimplementation of "the
/// analytics database engine" itself, merely the transport C5 submits literal SQL
/// through.
pub struct SqliteAnalyticsEndpoint {
  conn: Connection,
}

impl SqliteAnalyticsEndpoint {
  pub fn new(conn: Connection) -> Self {
    return Self { conn };
  }
}

#[async_trait]
impl AnalyticsEndpoint for SqliteAnalyticsEndpoint {
  async fn read_rows(&self, sql: String) -> Result<trailbase_sqlite::Rows, trailbase_sqlite::Error> {
    return self.conn.read_query_rows(sql, ()).await;
  }

  async fn health_check(&self) -> Result<Option<i64>, trailbase_sqlite::Error> {
    return self.conn.read_query_value::<i64>("SELECT 1", ()).await;
  }
}

/// Bounded pool of outstanding queries against a single `AnalyticsEndpoint`. The
/// endpoint already fans reads out to its own reader threads (§"analytics endpoint is
/// read-only"); the semaphore here bounds concurrent *in-flight pipeline requests*, not
/// the endpoint's own parallelism, so `queue_timeout_ms` has something real to measure
/// against.
pub struct QueryExecutor {
  endpoint: Arc<dyn AnalyticsEndpoint>,
  semaphore: Arc<Semaphore>,
  queue_timeout: Duration,
}

impl QueryExecutor {
  pub fn new(endpoint: Arc<dyn AnalyticsEndpoint>, pool_size: usize, queue_timeout_ms: u64) -> Self {
    return Self {
      endpoint,
      semaphore: Arc::new(Semaphore::new(pool_size.max(1))),
      queue_timeout: Duration::from_millis(queue_timeout_ms),
    };
  }

  pub async fn execute(&self, query: FinalQuery) -> Result<ExecutionResult, ExecutorError> {
    let _permit = tokio::time::timeout(self.queue_timeout, self.semaphore.acquire())
      .await
      .map_err(|_| ExecutorError::QueueTimeout)?
      .expect("semaphore is never closed while this executor is alive");

    let started = Instant::now();
    let timeout = Duration::from_millis(query.timeout_ms);
    let sql = query.sql.clone();

    let rows = tokio::time::timeout(timeout, self.endpoint.read_rows(sql))
      .await
      .map_err(|_| ExecutorError::Timeout)??;

    let columns: Vec<String> = (0..rows.column_count())
      .map(|idx| rows.column_name(idx).unwrap_or_default().to_string())
      .collect();

    let row_cap = usize::try_from(query.row_cap).unwrap_or(usize::MAX);
    let mut out_rows = Vec::with_capacity(rows.len().min(row_cap));
    let mut truncated = false;

    for (idx, row) in rows.iter().enumerate() {
      if idx >= row_cap {
        truncated = true;
        break;
      }

      let values = (0..row.column_count())
        .map(|col| {
          row
            .get_value(col)
            .map(trailbase_sqlvalue::SqlValue::from)
            .unwrap_or_default()
        })
        .collect();
      out_rows.push(values);
    }

    return Ok(ExecutionResult {
      row_count: out_rows.len(),
      rows: out_rows,
      columns,
      truncated,
      duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    });
  }

  /// Cheap liveness probe for readiness endpoints; does not consume a pool permit so it
  /// keeps working even when the pool is saturated by slow analytics queries.
  pub async fn health(&self) -> HealthStatus {
    return match self.endpoint.health_check().await {
      Ok(Some(1)) => HealthStatus::Healthy,
      _ => HealthStatus::Unhealthy,
    };
  }
}
