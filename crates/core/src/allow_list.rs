//! C2 — Table Allow-List Cache (§4.2).
//!
//! Modeled as an atomically-swappable immutable snapshot plus a single-flight loader, per
//! §5's shared-resource policy and §9's design note: readers take only a `RwLock` read
//! guard, never the single-flight mutex that serializes reloads.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::{Mutex, RwLock};
use trailbase_schema::QualifiedName;

use crate::catalogue::{CatalogueError, MetadataCatalogue};
use crate::error::PipelineError;

/// Immutable snapshot of the allow-listed table set. Both `schema.table` and bare `table`
/// normalized keys are present, per Open Question 2's resolution in `SPEC_FULL.md`: keys
/// are lower-cased and unquoted once at population time rather than enumerating quoted
/// variants.
#[derive(Debug, Default)]
pub struct AllowListSnapshot {
  keys: HashSet<String>,
}

impl AllowListSnapshot {
  fn from_qualified_names(names: impl IntoIterator<Item = QualifiedName>) -> Self {
    let mut keys = HashSet::new();
    for name in names {
      keys.insert(name.normalized_key());
      keys.insert(name.normalized_bare_key());
    }
    return Self { keys };
  }

  pub fn contains(&self, schema: Option<&str>, table: &str) -> bool {
    let key = match schema {
      Some(schema) => format!("{}.{}", schema.to_lowercase(), table.to_lowercase()),
      None => table.to_lowercase(),
    };
    return self.keys.contains(&key);
  }

  #[cfg(test)]
  pub fn for_test(tables: &[&str]) -> Self {
    let names = tables
      .iter()
      .map(|t| QualifiedName::parse(t).expect("valid test table name"));
    return Self::from_qualified_names(names);
  }
}

pub struct AllowListCache {
  catalogue: Arc<dyn MetadataCatalogue>,
  ttl_seconds: u64,
  snapshot: RwLock<Option<Arc<AllowListSnapshot>>>,
  /// Unix-epoch seconds of the last successful load; 0 means "never loaded" and also
  /// doubles as the flag `invalidate()` clears to force a reload on next access.
  last_loaded_at: AtomicI64,
  reload_guard: Mutex<()>,
}

impl AllowListCache {
  pub fn new(catalogue: Arc<dyn MetadataCatalogue>, ttl_seconds: u64) -> Self {
    return Self {
      catalogue,
      ttl_seconds,
      snapshot: RwLock::new(None),
      last_loaded_at: AtomicI64::new(0),
      reload_guard: Mutex::new(()),
    };
  }

  /// Returns the cached snapshot if within TTL, otherwise reloads atomically from the
  /// catalogue (`is_active = true` rows only) before returning. Concurrent reloads
  /// collapse onto a single catalogue read via `reload_guard`.
  pub async fn get_allowed_tables(&self) -> Result<Arc<AllowListSnapshot>, PipelineError> {
    if !self.is_stale() {
      if let Some(snapshot) = self.snapshot.read().await.clone() {
        return Ok(snapshot);
      }
    }

    let _guard = self.reload_guard.lock().await;

    // Someone else may have refreshed while we waited for the guard.
    if !self.is_stale() {
      if let Some(snapshot) = self.snapshot.read().await.clone() {
        return Ok(snapshot);
      }
    }

    match self.catalogue.active_allow_list_rows().await {
      Ok(rows) => {
        let names = rows.into_iter().filter(|r| r.is_active).map(|r| {
          return match r.schema {
            Some(schema) => QualifiedName {
              name: r.table,
              database_schema: Some(schema),
            },
            None => QualifiedName {
              name: r.table,
              database_schema: None,
            },
          };
        });
        let snapshot = Arc::new(AllowListSnapshot::from_qualified_names(names));
        *self.snapshot.write().await = Some(snapshot.clone());
        self.last_loaded_at.store(now_unix(), Ordering::SeqCst);
        return Ok(snapshot);
      }
      Err(err) => {
        // Serve stale-but-present data; only fail closed when nothing has ever loaded.
        if let Some(snapshot) = self.snapshot.read().await.clone() {
          tracing::warn!(error = %err, "allow-list reload failed, serving stale snapshot");
          return Ok(snapshot);
        }
        tracing::error!(error = %err, "allow-list reload failed with no prior snapshot");
        return Err(PipelineError::AllowListUnavailable);
      }
    }
  }

  /// Forces a reload on the next `get_allowed_tables()` call. Does not clear the snapshot
  /// itself: stale data is still served to concurrent readers mid-reload.
  pub fn invalidate(&self) {
    self.last_loaded_at.store(0, Ordering::SeqCst);
  }

  pub async fn is_table_allowed(&self, schema: Option<&str>, table: &str) -> Result<bool, PipelineError> {
    let snapshot = self.get_allowed_tables().await?;
    return Ok(snapshot.contains(schema, table));
  }

  fn is_stale(&self) -> bool {
    let last = self.last_loaded_at.load(Ordering::SeqCst);
    if last == 0 {
      return true;
    }
    return now_unix().saturating_sub(last) as u64 >= self.ttl_seconds;
  }
}

fn now_unix() -> i64 {
  return std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .map(|d| d.as_secs() as i64)
    .unwrap_or(0);
}

impl From<CatalogueError> for PipelineError {
  fn from(_: CatalogueError) -> Self {
    return PipelineError::AllowListUnavailable;
  }
}
