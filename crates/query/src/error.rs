//! Engine error types.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by query execution.
///
/// Invalid request fragments (unknown columns, operators, relationships or
/// fields) are never errors; they are dropped from the effective query and
/// reported through [`crate::Dropped`].
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("{model} record not found: {id}")]
    NotFound { model: String, id: String },

    #[error("row is not an object: {0}")]
    InvalidRow(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias using QueryError.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while assembling a model registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("model '{model}' declares a relationship to unknown model '{related}'")]
    UnknownModel { model: String, related: String },

    #[error("model '{0}' is declared more than once")]
    DuplicateModel(String),

    #[error("failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse schema file: {0}")]
    Parse(String),
}
