//! Column-Mapping cache (spec §3 `ColumnMapping`).
//!
//! Same single-flight/atomic-swap discipline as `allow_list::AllowListCache`, but keyed
//! per `data_source_id` and with no TTL: entries are cached indefinitely and invalidated
//! only explicitly, per §3's "cached per data source indefinitely, invalidated
//! explicitly on metadata change."

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::catalogue::{ColumnMappingRow, MetadataCatalogue};
use crate::error::PipelineError;

pub struct ColumnMappingCache {
  catalogue: Arc<dyn MetadataCatalogue>,
  entries: RwLock<HashMap<String, Arc<ColumnMappingRow>>>,
  reload_guard: Mutex<()>,
}

impl ColumnMappingCache {
  pub fn new(catalogue: Arc<dyn MetadataCatalogue>) -> Self {
    return Self {
      catalogue,
      entries: RwLock::new(HashMap::new()),
      reload_guard: Mutex::new(()),
    };
  }

  /// Returns the cached mapping for `data_source_id`, loading it from the catalogue on
  /// first access. `None` means the catalogue has no mapping for that data source, not
  /// a failure.
  pub async fn get(&self, data_source_id: &str) -> Result<Option<Arc<ColumnMappingRow>>, PipelineError> {
    if let Some(entry) = self.entries.read().await.get(data_source_id) {
      return Ok(Some(entry.clone()));
    }

    let _guard = self.reload_guard.lock().await;

    // Someone else may have populated it while we waited for the guard.
    if let Some(entry) = self.entries.read().await.get(data_source_id) {
      return Ok(Some(entry.clone()));
    }

    let row = self
      .catalogue
      .get_column_mapping(data_source_id)
      .await
      .map_err(|_| PipelineError::AllowListUnavailable)?;

    let Some(row) = row else {
      return Ok(None);
    };

    let entry = Arc::new(row);
    self
      .entries
      .write()
      .await
      .insert(data_source_id.to_string(), entry.clone());

    return Ok(Some(entry));
  }

  /// Forces the next `get()` for this data source to re-read the catalogue.
  pub async fn invalidate(&self, data_source_id: &str) {
    self.entries.write().await.remove(data_source_id);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalogue::{AllowListRow, CatalogueError, TableFilter, TableMetadataRow};
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct FakeCatalogue {
    calls: AtomicUsize,
  }

  #[async_trait]
  impl MetadataCatalogue for FakeCatalogue {
    async fn active_allow_list_rows(&self) -> Result<Vec<AllowListRow>, CatalogueError> {
      return Ok(vec![]);
    }

    async fn list_tables(&self, _filter: &TableFilter) -> Result<Vec<TableMetadataRow>, CatalogueError> {
      return Ok(vec![]);
    }

    async fn get_columns(&self, _table_id: &str) -> Result<Vec<crate::catalogue::ColumnMetadataRow>, CatalogueError> {
      return Ok(vec![]);
    }

    async fn get_column_mapping(&self, data_source_id: &str) -> Result<Option<ColumnMappingRow>, CatalogueError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if data_source_id == "missing" {
        return Ok(None);
      }
      return Ok(Some(ColumnMappingRow {
        data_source_id: data_source_id.to_string(),
        date_field: "visit_date".to_string(),
        measure_field: "value".to_string(),
        measure_type_field: "measure_type".to_string(),
        time_period_field: "period".to_string(),
        practice_field: Some("practice_uid".to_string()),
        provider_field: None,
      }));
    }
  }

  #[tokio::test]
  async fn test_get_loads_and_caches() {
    let catalogue = Arc::new(FakeCatalogue { calls: AtomicUsize::new(0) });
    let cache = ColumnMappingCache::new(catalogue.clone());

    let first = cache.get("ds-1").await.unwrap().unwrap();
    assert_eq!(first.date_field, "visit_date");
    cache.get("ds-1").await.unwrap();

    assert_eq!(catalogue.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_get_missing_returns_none_without_caching() {
    let catalogue = Arc::new(FakeCatalogue { calls: AtomicUsize::new(0) });
    let cache = ColumnMappingCache::new(catalogue);
    assert!(cache.get("missing").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_invalidate_forces_reload() {
    let catalogue = Arc::new(FakeCatalogue { calls: AtomicUsize::new(0) });
    let cache = ColumnMappingCache::new(catalogue.clone());

    cache.get("ds-1").await.unwrap();
    cache.invalidate("ds-1").await;
    cache.get("ds-1").await.unwrap();

    assert_eq!(catalogue.calls.load(Ordering::SeqCst), 2);
  }
}
