//! SurrealDB implementation of [`SessionRepository`].
//!
//! Rows live in `login_state`, keyed by the token digest so a lookup is a
//! single point read. SurrealDB has no TTL index; expired rows are removed
//! lazily on read or by [`SessionRepository::cleanup_expired`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use tollgate_core::error::TollgateResult;
use tollgate_core::id::ObjectId;
use tollgate_core::models::session::{CreateSession, Session};
use tollgate_core::repository::SessionRepository;
use tracing::info;

use super::checked;
use super::listing::{from_millis, parse_record_id};
use crate::error::DbError;

#[derive(Debug, Deserialize)]
struct SessionRow {
    user_id: String,
    expires_at: i64,
    created_at: i64,
}

impl SessionRow {
    fn into_session(self, token_digest: String) -> Result<Session, DbError> {
        Ok(Session {
            token_digest,
            user_id: parse_record_id(&self.user_id)?,
            expires_at: from_millis(self.expires_at)?,
            created_at: from_millis(self.created_at)?,
        })
    }
}

/// SurrealDB implementation of the Session repository.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, input: CreateSession) -> TollgateResult<Session> {
        let response = self
            .db
            .query(
                "CREATE type::thing('login_state', $digest) SET \
                 user_id = $user_id, \
                 expires_at = $expires_at, \
                 created_at = $created_at",
            )
            .bind(("digest", input.token_digest.clone()))
            .bind(("user_id", input.user_id.to_hex()))
            .bind(("expires_at", input.expires_at.timestamp_millis()))
            .bind(("created_at", input.created_at.timestamp_millis()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = checked(response)?.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("session", input.token_digest.clone()))?;

        Ok(row.into_session(input.token_digest)?)
    }

    async fn get_by_digest(&self, digest: &str) -> TollgateResult<Session> {
        let response = self
            .db
            .query("SELECT * FROM type::thing('login_state', $digest)")
            .bind(("digest", digest.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = checked(response)?.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("session", digest))?;

        Ok(row.into_session(digest.to_string())?)
    }

    async fn delete_by_digest(&self, digest: &str) -> TollgateResult<()> {
        let response = self
            .db
            .query("DELETE type::thing('login_state', $digest)")
            .bind(("digest", digest.to_string()))
            .await
            .map_err(DbError::from)?;
        checked(response)?;

        Ok(())
    }

    async fn delete_for_user(&self, user_id: &str) -> TollgateResult<u64> {
        let user_id = ObjectId::parse_str(user_id)?;

        let response = self
            .db
            .query("DELETE login_state WHERE user_id = $user_id RETURN BEFORE")
            .bind(("user_id", user_id.to_hex()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<SessionRow> = checked(response)?.take(0).map_err(DbError::from)?;

        Ok(rows.len() as u64)
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> TollgateResult<u64> {
        let response = self
            .db
            .query("DELETE login_state WHERE expires_at <= $now RETURN BEFORE")
            .bind(("now", now.timestamp_millis()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<SessionRow> = checked(response)?.take(0).map_err(DbError::from)?;

        if !rows.is_empty() {
            info!(removed = rows.len(), "Expired sessions removed");
        }
        Ok(rows.len() as u64)
    }
}
