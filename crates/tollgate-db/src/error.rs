//! Database-specific error types and conversions.

use tollgate_core::error::TollgateError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Statement failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Malformed stored record: {0}")]
    Decode(String),
}

impl DbError {
    /// A statement rejected by a UNIQUE index.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Surreal(e) => e.to_string().contains("already contains"),
            DbError::Query(msg) => msg.contains("already contains"),
            _ => false,
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<DbError> for TollgateError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => TollgateError::NotFound { entity, id },
            other => TollgateError::Storage(other.to_string()),
        }
    }
}
