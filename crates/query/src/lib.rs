//! Ash query engine
//!
//! Translates declarative request options (filter, sparse fieldsets, sort,
//! page, include) into SQL for a registered model and loads one level of
//! related rows per relationship in a single batched query.
//! The `ash-query` binary runs queries from the command line.

pub mod config;
pub mod db;
pub mod dropped;
pub mod engine;
pub mod error;
pub mod filter;
pub mod model;
pub mod options;
pub mod plan;
pub mod store;

pub use dropped::Dropped;
pub use engine::{Mode, PlannedQuery, QueryEngine, Related};
pub use error::{QueryError, QueryResult, SchemaError};
pub use model::{ModelBuilder, ModelDescriptor, ModelRegistry};
pub use options::{Page, QueryOptions};
pub use store::{PgStore, Row, RowStore};
