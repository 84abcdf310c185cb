//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] errors with additional context about which operation failed.
//! Conversions into the engine's and reactors' port-level errors live here
//! too, so adapter methods can use `?` throughout.

use chronicle_engine::ports::StoreError;
use chronicle_reactors::store::ReactorError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded into a domain type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<DbError> for ReactorError {
    fn from(e: DbError) -> Self {
        Self::Backend(e.to_string())
    }
}
