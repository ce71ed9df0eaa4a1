//! The "narrow read interface" onto the primary catalogue database (spec §6 Inbound).
//!
//! The catalogue stores allow-list source rows, curated table/column metadata, and
//! column mappings. It is not the primary application database itself (that remains an
//! external collaborator, out of scope) — it is the read surface this pipeline needs
//! from it, grounded the way the teacher grounds its own narrow `MetadataCatalogue`-
//! style reads over `trailbase_sqlite::Connection` rather than a full ORM.

use trailbase_sqlite::Connection;
use trailbase_sqlite::params::ToSqlType;

#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
  #[error("catalogue read failed: {0}")]
  Read(#[from] trailbase_sqlite::Error),
}

/// One row from the catalogue's allow-list source. Mirrors the `AllowList` invariant
/// that only `is_active` rows are ever eligible.
#[derive(Clone, Debug)]
pub struct AllowListRow {
  pub schema: Option<String>,
  pub table: String,
  pub is_active: bool,
}

#[derive(Clone, Debug)]
pub struct TableMetadataRow {
  pub table_id: String,
  pub schema: Option<String>,
  pub table: String,
  pub description: Option<String>,
  pub owner: Option<String>,
  pub semantic_tags: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ColumnMetadataRow {
  pub table_id: String,
  pub column: String,
  pub data_type: String,
  pub description: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ColumnMappingRow {
  pub data_source_id: String,
  pub date_field: String,
  pub measure_field: String,
  pub measure_type_field: String,
  pub time_period_field: String,
  pub practice_field: Option<String>,
  pub provider_field: Option<String>,
}

/// A filter over `list_tables`. `None` means "no restriction on this dimension".
#[derive(Clone, Debug, Default)]
pub struct TableFilter {
  pub schema: Option<String>,
  pub name_contains: Option<String>,
}

#[async_trait::async_trait]
pub trait MetadataCatalogue: Send + Sync {
  async fn active_allow_list_rows(&self) -> Result<Vec<AllowListRow>, CatalogueError>;
  async fn list_tables(&self, filter: &TableFilter) -> Result<Vec<TableMetadataRow>, CatalogueError>;
  async fn get_columns(&self, table_id: &str) -> Result<Vec<ColumnMetadataRow>, CatalogueError>;
  async fn get_column_mapping(
    &self,
    data_source_id: &str,
  ) -> Result<Option<ColumnMappingRow>, CatalogueError>;
}

/// SQLite-backed implementation, using the same actor-thread `Connection` the analytics
/// executor uses. The primary application database itself remains out of scope; this
/// type only reads the three catalogue tables the pipeline depends on.
pub struct SqliteMetadataCatalogue {
  conn: Connection,
}

impl SqliteMetadataCatalogue {
  pub fn new(conn: Connection) -> Self {
    return Self { conn };
  }
}

#[async_trait::async_trait]
impl MetadataCatalogue for SqliteMetadataCatalogue {
  async fn active_allow_list_rows(&self) -> Result<Vec<AllowListRow>, CatalogueError> {
    let rows = self
      .conn
      .read_query_rows(
        "SELECT table_schema, table_name, is_active FROM allow_list WHERE is_active = 1",
        (),
      )
      .await?;

    return rows
      .iter()
      .map(|row| {
        Ok(AllowListRow {
          schema: row.get::<Option<String>>(0)?,
          table: row.get::<String>(1)?,
          is_active: row.get::<i64>(2)? != 0,
        })
      })
      .collect();
  }

  async fn list_tables(&self, filter: &TableFilter) -> Result<Vec<TableMetadataRow>, CatalogueError> {
    let schema = filter.schema.clone();
    let name_contains = filter.name_contains.clone();

    let rows = self
      .conn
      .read_query_rows(
        "SELECT table_id, table_schema, table_name, description, owner, semantic_tags \
         FROM table_metadata \
         WHERE (:schema IS NULL OR table_schema = :schema) \
           AND (:name_contains IS NULL OR table_name LIKE '%' || :name_contains || '%')",
        [
          (":schema", ToSqlType::from(schema)),
          (":name_contains", ToSqlType::from(name_contains)),
        ],
      )
      .await?;

    return rows
      .iter()
      .map(|row| {
        let tags: Option<String> = row.get(5)?;
        Ok(TableMetadataRow {
          table_id: row.get(0)?,
          schema: row.get(1)?,
          table: row.get(2)?,
          description: row.get(3)?,
          owner: row.get(4)?,
          semantic_tags: tags
            .map(|s| s.split(',').map(|t| t.trim().to_string()).collect())
            .unwrap_or_default(),
        })
      })
      .collect();
  }

  async fn get_columns(&self, table_id: &str) -> Result<Vec<ColumnMetadataRow>, CatalogueError> {
    let table_id = table_id.to_string();
    let rows = self
      .conn
      .read_query_rows(
        "SELECT table_id, column_name, data_type, description FROM column_metadata WHERE table_id = :table_id",
        [(":table_id", ToSqlType::from(table_id))],
      )
      .await?;

    return rows
      .iter()
      .map(|row| {
        Ok(ColumnMetadataRow {
          table_id: row.get(0)?,
          column: row.get(1)?,
          data_type: row.get(2)?,
          description: row.get(3)?,
        })
      })
      .collect();
  }

  async fn get_column_mapping(
    &self,
    data_source_id: &str,
  ) -> Result<Option<ColumnMappingRow>, CatalogueError> {
    let data_source_id = data_source_id.to_string();
    let row = self
      .conn
      .read_query_row(
        "SELECT data_source_id, date_field, measure_field, measure_type_field, \
                time_period_field, practice_field, provider_field \
         FROM column_mapping WHERE data_source_id = :id",
        [(":id", ToSqlType::from(data_source_id))],
      )
      .await?;

    return Ok(match row {
      Some(row) => Some(ColumnMappingRow {
        data_source_id: row.get(0)?,
        date_field: row.get(1)?,
        measure_field: row.get(2)?,
        measure_type_field: row.get(3)?,
        time_period_field: row.get(4)?,
        practice_field: row.get(5)?,
        provider_field: row.get(6)?,
      }),
      None => None,
    });
  }
}
