//! C6 — Schema Metadata Service (§4.6).
//!
//! Serves curated table/column metadata to the NL generator (C7) and to external
//! chart-data consumers. A table present in the catalogue but absent from the
//! Allow-List (C2) is never surfaced here — the catalogue is the allow-list's
//! *source*, not an independent grant (§D).

use std::sync::Arc;

use crate::allow_list::AllowListCache;
use crate::caller::{CallerContext, PermissionToken, Scope};
use crate::catalogue::{MetadataCatalogue, TableFilter};
use crate::error::PipelineError;
use crate::permissions::PermissionEvaluator;

#[derive(Clone, Debug)]
pub struct TableMetadata {
  pub table_id: String,
  pub schema: Option<String>,
  pub table: String,
  pub description: Option<String>,
  pub owner: Option<String>,
  pub semantic_tags: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ColumnMetadata {
  pub column: String,
  pub data_type: String,
  pub description: Option<String>,
}

/// Fraction of documentation fields populated, in `[0.0, 1.0]`, used to drive curation
/// UIs external to this core (§4.6).
pub fn completeness(meta: &TableMetadata) -> f64 {
  let fields = [
    meta.description.is_some(),
    meta.owner.is_some(),
    !meta.semantic_tags.is_empty(),
  ];
  let populated = fields.iter().filter(|populated| **populated).count();
  return populated as f64 / fields.len() as f64;
}

pub struct SchemaMetadataService {
  catalogue: Arc<dyn MetadataCatalogue>,
  allow_list: Arc<AllowListCache>,
}

impl SchemaMetadataService {
  pub fn new(catalogue: Arc<dyn MetadataCatalogue>, allow_list: Arc<AllowListCache>) -> Self {
    return Self { catalogue, allow_list };
  }

  /// Returns only tables the caller holds `metadata:read` for and that are currently
  /// allow-listed. Metadata edits (not modeled here — out of scope for this core beyond
  /// gating) require the distinct `metadata:write` permission.
  pub async fn list_tables(
    &self,
    ctx: &CallerContext,
    scope: Scope,
    filter: &TableFilter,
  ) -> Result<Vec<TableMetadata>, PipelineError> {
    PermissionEvaluator::require_permission(ctx, PermissionToken::MetadataRead(scope))?;

    let rows = self.catalogue.list_tables(filter).await?;
    let allowed = self.allow_list.get_allowed_tables().await?;

    return Ok(
      rows
        .into_iter()
        .filter(|row| allowed.contains(row.schema.as_deref(), &row.table))
        .map(|row| TableMetadata {
          table_id: row.table_id,
          schema: row.schema,
          table: row.table,
          description: row.description,
          owner: row.owner,
          semantic_tags: row.semantic_tags,
        })
        .collect(),
    );
  }

  pub async fn get_columns(
    &self,
    ctx: &CallerContext,
    scope: Scope,
    table_id: &str,
  ) -> Result<Vec<ColumnMetadata>, PipelineError> {
    PermissionEvaluator::require_permission(ctx, PermissionToken::MetadataRead(scope))?;

    let rows = self.catalogue.get_columns(table_id).await?;
    return Ok(
      rows
        .into_iter()
        .map(|row| ColumnMetadata {
          column: row.column,
          data_type: row.data_type,
          description: row.description,
        })
        .collect(),
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalogue::{AllowListRow, ColumnMappingRow, ColumnMetadataRow, TableMetadataRow};
  use async_trait::async_trait;

  struct FakeCatalogue;

  #[async_trait]
  impl MetadataCatalogue for FakeCatalogue {
    async fn active_allow_list_rows(&self) -> Result<Vec<AllowListRow>, crate::catalogue::CatalogueError> {
      return Ok(vec![AllowListRow {
        schema: Some("ih".to_string()),
        table: "patients".to_string(),
        is_active: true,
      }]);
    }

    async fn list_tables(&self, _filter: &TableFilter) -> Result<Vec<TableMetadataRow>, crate::catalogue::CatalogueError> {
      return Ok(vec![
        TableMetadataRow {
          table_id: "t1".to_string(),
          schema: Some("ih".to_string()),
          table: "patients".to_string(),
          description: Some("patient records".to_string()),
          owner: Some("data-team".to_string()),
          semantic_tags: vec!["pii".to_string()],
        },
        TableMetadataRow {
          table_id: "t2".to_string(),
          schema: Some("ih".to_string()),
          table: "not_allow_listed".to_string(),
          description: None,
          owner: None,
          semantic_tags: vec![],
        },
      ]);
    }

    async fn get_columns(&self, _table_id: &str) -> Result<Vec<ColumnMetadataRow>, crate::catalogue::CatalogueError> {
      return Ok(vec![]);
    }

    async fn get_column_mapping(
      &self,
      _data_source_id: &str,
    ) -> Result<Option<ColumnMappingRow>, crate::catalogue::CatalogueError> {
      return Ok(None);
    }
  }

  fn service() -> SchemaMetadataService {
    let catalogue = Arc::new(FakeCatalogue);
    let allow_list = Arc::new(AllowListCache::new(catalogue.clone(), 60));
    return SchemaMetadataService::new(catalogue, allow_list);
  }

  #[tokio::test]
  async fn test_list_tables_filters_out_non_allow_listed() {
    let service = service();
    let ctx = CallerContext::for_test("user-1", false, [1]);
    let tables = service
      .list_tables(&ctx, Scope::Organization, &TableFilter::default())
      .await
      .unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].table, "patients");
  }

  #[tokio::test]
  async fn test_list_tables_denied_without_permission() {
    let service = service();
    let ctx = CallerContext::for_test("user-1", false, [1]);
    let err = service
      .list_tables(&ctx, Scope::All, &TableFilter::default())
      .await
      .unwrap_err();
    assert!(matches!(err, PipelineError::PermissionDenied { .. }));
  }

  #[test]
  fn test_completeness_fully_documented() {
    let meta = TableMetadata {
      table_id: "t1".to_string(),
      schema: Some("ih".to_string()),
      table: "patients".to_string(),
      description: Some("x".to_string()),
      owner: Some("y".to_string()),
      semantic_tags: vec!["pii".to_string()],
    };
    assert_eq!(completeness(&meta), 1.0);
  }

  #[test]
  fn test_completeness_undocumented() {
    let meta = TableMetadata {
      table_id: "t2".to_string(),
      schema: None,
      table: "scratch".to_string(),
      description: None,
      owner: None,
      semantic_tags: vec![],
    };
    assert_eq!(completeness(&meta), 0.0);
  }
}
