//! Session (login state) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

/// A stored login. The raw token is never persisted; rows are keyed by
/// its SHA-256 digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token_digest: String,
    pub user_id: ObjectId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Expired once `expires_at` is not strictly after `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub token_digest: String,
    pub user_id: ObjectId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
