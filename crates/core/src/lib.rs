#![forbid(unsafe_code, clippy::unwrap_used)]
#![allow(clippy::needless_return)]
#![warn(clippy::await_holding_lock, clippy::inefficient_to_string)]

pub mod allow_list;
pub mod audit;
pub mod caller;
pub mod catalogue;
pub mod column_mapping;
pub mod config;
pub mod error;
pub mod executor;
pub mod injector;
pub mod model;
pub mod nl;
pub mod parser;
pub mod permissions;
pub mod pipeline;
pub mod schema_metadata;

pub use allow_list::AllowListCache;
pub use caller::{CallerContext, PermissionToken, Scope};
pub use catalogue::{MetadataCatalogue, SqliteMetadataCatalogue};
pub use column_mapping::ColumnMappingCache;
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use executor::{AnalyticsEndpoint, QueryExecutor, SqliteAnalyticsEndpoint};
pub use pipeline::{Pipeline, PipelineData, PipelineOutcome};
pub use schema_metadata::SchemaMetadataService;
