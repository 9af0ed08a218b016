//! Error types for the association engine
//!
//! Every variant below is a caller-input error raised synchronously at the
//! point of violation. Storage-layer failures pass through as `Database`
//! without wrapping or retry.

use thiserror::Error;

/// Result type alias for association operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for association and eager-loading operations
#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// Association is configured in a way the engine cannot honor
    #[error("Invalid association configuration: {0}")]
    InvalidConfiguration(String),

    /// An eager-load field override omitted the column row matching needs
    #[error("You must select the \"{column}\" field in order to match associated records")]
    MissingForeignKeyInProjection { column: String },

    /// link/unlink/replace called with an entity that was never persisted
    #[error("Cannot link entities that have not been persisted yet: {0}")]
    UnpersistedEntity(String),

    /// A source entity's primary key could not be resolved
    #[error("Could not resolve a primary key value: {0}")]
    MissingPrimaryKey(String),

    /// Storage-layer failure, propagated as-is
    #[error("Database error: {0}")]
    Database(String),

    /// Row or entity value conversion failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for OrmError {
    fn from(err: anyhow::Error) -> Self {
        OrmError::Database(err.to_string())
    }
}
