//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Identifiers arrive as raw strings
//! and are validated before any storage round trip.

use crate::error::TollgateResult;
use crate::models::{
    config_entry::ConfigEntry,
    group::{CreateGroup, Group, GroupField, UpdateGroup},
    session::{CreateSession, Session},
    user::{CreateUser, CreateUserDetail, UpdateUser, User, UserField},
};
use crate::pagination::{Page, PageRequest};

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = TollgateResult<User>> + Send;
    fn create_detailed(
        &self,
        input: CreateUserDetail,
    ) -> impl Future<Output = TollgateResult<User>> + Send;
    fn update(
        &self,
        id: &str,
        input: UpdateUser,
    ) -> impl Future<Output = TollgateResult<User>> + Send;
    fn get_by_id(&self, id: &str) -> impl Future<Output = TollgateResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = TollgateResult<User>> + Send;
    /// Lists users; a non-empty `group_filter` keeps users in any of the
    /// given groups.
    fn list(
        &self,
        page: PageRequest<UserField>,
        group_filter: &[String],
    ) -> impl Future<Output = TollgateResult<Page<User>>> + Send;
    /// Users active within the minimum online threshold.
    fn list_online(
        &self,
        page: PageRequest<UserField>,
    ) -> impl Future<Output = TollgateResult<Page<User>>> + Send;
    fn delete(&self, id: &str) -> impl Future<Output = TollgateResult<()>> + Send;
    /// Stamps `last_activity = now` and returns the refreshed record.
    fn touch_activity(&self, id: &str) -> impl Future<Output = TollgateResult<User>> + Send;
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

pub trait GroupRepository: Send + Sync {
    fn create(&self, input: CreateGroup) -> impl Future<Output = TollgateResult<Group>> + Send;
    fn update(
        &self,
        id: &str,
        input: UpdateGroup,
    ) -> impl Future<Output = TollgateResult<Group>> + Send;
    fn get_by_id(&self, id: &str) -> impl Future<Output = TollgateResult<Group>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = TollgateResult<Group>> + Send;
    /// Malformed ids are skipped; `NoResult` when none remain.
    fn find_many(&self, ids: &[String]) -> impl Future<Output = TollgateResult<Vec<Group>>> + Send;
    fn list(
        &self,
        page: PageRequest<GroupField>,
    ) -> impl Future<Output = TollgateResult<Page<Group>>> + Send;
    fn delete(&self, id: &str) -> impl Future<Output = TollgateResult<()>> + Send;
}

/// Outcome of a full group-ref repair sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: u64,
    pub repaired: u64,
}

/// Keeps every user's `group_refs` snapshot in line with the group
/// directory.
pub trait GroupRefSync: Send + Sync {
    /// Strips `group_id` from every user's refs. Returns affected users.
    fn group_deleted(&self, group_id: &str) -> impl Future<Output = TollgateResult<u64>> + Send;
    /// Rewrites the snapshot name of `group_id`. Returns affected users.
    fn group_renamed(
        &self,
        group_id: &str,
        name: &str,
    ) -> impl Future<Output = TollgateResult<u64>> + Send;
    fn reconcile(&self) -> impl Future<Output = TollgateResult<ReconcileReport>> + Send;
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = TollgateResult<Session>> + Send;
    fn get_by_digest(&self, digest: &str)
    -> impl Future<Output = TollgateResult<Session>> + Send;
    /// Idempotent.
    fn delete_by_digest(&self, digest: &str) -> impl Future<Output = TollgateResult<()>> + Send;
    fn delete_for_user(&self, user_id: &str) -> impl Future<Output = TollgateResult<u64>> + Send;
    /// Removes sessions with `expires_at <= now`.
    fn cleanup_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = TollgateResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

pub trait ConfigRepository: Send + Sync {
    fn set(&self, key: &str, value: &str) -> impl Future<Output = TollgateResult<()>> + Send;
    fn set_many(&self, entries: &[ConfigEntry])
    -> impl Future<Output = TollgateResult<()>> + Send;
    fn get(&self, key: &str) -> impl Future<Output = TollgateResult<ConfigEntry>> + Send;
    /// Missing keys are absent from the result.
    fn get_many(
        &self,
        keys: &[String],
    ) -> impl Future<Output = TollgateResult<Vec<ConfigEntry>>> + Send;
    fn unset(&self, key: &str) -> impl Future<Output = TollgateResult<()>> + Send;
    fn unset_many(&self, keys: &[String]) -> impl Future<Output = TollgateResult<()>> + Send;
}
