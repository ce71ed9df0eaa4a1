#![forbid(unsafe_code, clippy::unwrap_used)]
#![allow(clippy::needless_return)]

pub mod parse;
pub mod sqlite;

pub use sqlite::{QualifiedName, SchemaError};
