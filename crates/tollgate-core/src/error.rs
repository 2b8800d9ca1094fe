//! Error types for the Tollgate core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TollgateError {
    #[error("invalid email address")]
    InvalidEmail,

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid identifier: {id:?}")]
    InvalidId { id: String },

    #[error("invalid group name")]
    InvalidName,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("group name already exists: {name}")]
    DuplicateName { name: String },

    #[error("entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("not logged in")]
    NotLogged,

    #[error("no result")]
    NoResult,

    #[error("credential mismatch")]
    CredentialMismatch,

    #[error("access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("password hashing failed: {0}")]
    HashingFailure(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl TollgateError {
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId { id: id.into() }
    }

    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True for the `Invalid*` family, which is always raised before any
    /// storage round trip.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidEmail | Self::InvalidPassword | Self::InvalidId { .. } | Self::InvalidName
        )
    }
}

pub type TollgateResult<T> = Result<T, TollgateError>;
