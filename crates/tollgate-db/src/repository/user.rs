//! SurrealDB implementation of [`UserRepository`].
//!
//! Formats are checked and passwords hashed before any statement runs, so
//! a rejected input never leaves a partial write. Email uniqueness is
//! enforced by `idx_account_email`; the index conflict is reported as
//! [`TollgateError::DuplicateEmail`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::{Connection, Surreal};
use tollgate_core::clock::{Clock, SystemClock};
use tollgate_core::config::TollgateConfig;
use tollgate_core::error::{TollgateError, TollgateResult};
use tollgate_core::format::{FormatChecker, SimpleChecker};
use tollgate_core::id::{ObjectId, is_object_id_hex};
use tollgate_core::models::user::{
    ACTIVATE_CODE, CreateUser, CreateUserDetail, GroupRef, Password, UpdateUser, User, UserField,
};
use tollgate_core::pagination::{Page, PagePlan, PageRequest, Paginator};
use tollgate_core::password::CredentialCodec;
use tollgate_core::repository::{GroupRepository, UserRepository};
use tollgate_core::token::generate_confirm_code;
use tracing::{debug, info};

use super::checked;
use super::group::SurrealGroupRepository;
use super::listing::{self, from_millis, parse_record_id};
use super::sync::GroupRefDoc;
use crate::error::DbError;

/// Stored shape of [`Password`]; the salt is hex-encoded.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PasswordDoc {
    salt: String,
    hash: String,
    created_at: i64,
}

impl From<&Password> for PasswordDoc {
    fn from(p: &Password) -> Self {
        Self {
            salt: hex::encode(&p.salt),
            hash: p.hash.clone(),
            created_at: p.created_at.timestamp_millis(),
        }
    }
}

impl PasswordDoc {
    fn into_password(self) -> Result<Password, DbError> {
        Ok(Password {
            salt: hex::decode(&self.salt)
                .map_err(|e| DbError::Decode(format!("password salt: {e}")))?,
            hash: self.hash,
            created_at: from_millis(self.created_at)?,
        })
    }
}

/// DB-side row. Fields outside a listing projection are absent and fall
/// back to their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserRow {
    record_id: String,
    email: String,
    password: PasswordDoc,
    approved: bool,
    confirm_codes: BTreeMap<String, String>,
    privileges: Vec<String>,
    group_refs: Vec<GroupRefDoc>,
    profile: Option<serde_json::Value>,
    last_activity: i64,
    joined_at: i64,
}

impl UserRow {
    fn into_user(self, id: ObjectId) -> Result<User, DbError> {
        let group_refs = self
            .group_refs
            .into_iter()
            .map(|r| {
                Ok(GroupRef {
                    group_id: parse_record_id(&r.group_id)?,
                    group_name: r.group_name,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(User {
            id,
            email: self.email,
            password: self.password.into_password()?,
            approved: self.approved,
            confirm_codes: self.confirm_codes,
            privileges: self.privileges,
            group_refs,
            profile: self.profile,
            last_activity: from_millis(self.last_activity)?,
            joined_at: from_millis(self.joined_at)?,
        })
    }

    fn try_into_user(self) -> Result<User, DbError> {
        let id = parse_record_id(&self.record_id)?;
        self.into_user(id)
    }
}

fn to_docs(refs: &[GroupRef]) -> Vec<GroupRefDoc> {
    refs.iter()
        .map(|r| GroupRefDoc {
            group_id: r.group_id.to_hex(),
            group_name: r.group_name.clone(),
        })
        .collect()
}

fn duplicate_email(err: DbError) -> TollgateError {
    if err.is_unique_violation() {
        TollgateError::DuplicateEmail
    } else {
        err.into()
    }
}

/// Everything an account insert needs once inputs are validated.
struct NewAccount {
    email: String,
    password: String,
    pre_approved: bool,
    privileges: Vec<String>,
    confirm_codes: Option<BTreeMap<String, String>>,
    profile: Option<serde_json::Value>,
    group_ids: Vec<String>,
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    groups: SurrealGroupRepository<C>,
    checker: Arc<dyn FormatChecker>,
    codec: CredentialCodec,
    clock: Arc<dyn Clock>,
    config: TollgateConfig,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        let config = TollgateConfig::default();
        Self {
            groups: SurrealGroupRepository::new(db.clone()),
            db,
            checker: Arc::new(SimpleChecker::new(config.min_password_length)),
            codec: CredentialCodec::default(),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replaces the config; the password checker follows its minimum
    /// length unless a custom checker is installed afterwards.
    pub fn with_config(mut self, config: TollgateConfig) -> Self {
        self.checker = Arc::new(SimpleChecker::new(config.min_password_length));
        self.groups = self.groups.with_config(config.clone());
        self.config = config;
        self
    }

    pub fn with_checker(mut self, checker: Arc<dyn FormatChecker>) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_codec(mut self, codec: CredentialCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn checker(&self) -> &dyn FormatChecker {
        self.checker.as_ref()
    }

    pub fn codec(&self) -> &CredentialCodec {
        &self.codec
    }

    /// Resolves group ids into ref snapshots, preserving request order.
    /// Ids that do not resolve are dropped.
    async fn resolve_group_refs(&self, group_ids: &[String]) -> TollgateResult<Vec<GroupRef>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let groups = match self.groups.find_many(group_ids).await {
            Ok(groups) => groups,
            Err(TollgateError::NoResult) => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut refs: Vec<GroupRef> = Vec::with_capacity(groups.len());
        for raw in group_ids {
            let Some(group) = groups.iter().find(|g| g.id.to_hex() == *raw) else {
                continue;
            };
            if refs.iter().all(|r| r.group_id != group.id) {
                refs.push(GroupRef {
                    group_id: group.id,
                    group_name: group.name.clone(),
                });
            }
        }

        if refs.len() < group_ids.len() {
            debug!(
                requested = group_ids.len(),
                resolved = refs.len(),
                "Dropped group ids that did not resolve"
            );
        }
        Ok(refs)
    }

    async fn insert(&self, input: NewAccount) -> TollgateResult<User> {
        if !self.checker.email_valid(&input.email) {
            return Err(TollgateError::InvalidEmail);
        }
        if !self.checker.password_valid(&input.password) {
            return Err(TollgateError::InvalidPassword);
        }

        let now = self.clock.now();
        let password = self.codec.hash_at(&input.password, now)?;
        let group_refs = self.resolve_group_refs(&input.group_ids).await?;

        let confirm_codes = match input.confirm_codes {
            Some(codes) => codes,
            None if input.pre_approved => BTreeMap::new(),
            None => BTreeMap::from([(ACTIVATE_CODE.to_string(), generate_confirm_code())]),
        };

        let id = ObjectId::new();
        let response = self
            .db
            .query(
                "CREATE type::thing('account', $id) SET \
                 email = $email, \
                 password = $password, \
                 approved = $approved, \
                 confirm_codes = $confirm_codes, \
                 privileges = $privileges, \
                 group_refs = $group_refs, \
                 profile = $profile, \
                 last_activity = $now, \
                 joined_at = $now",
            )
            .bind(("id", id.to_hex()))
            .bind(("email", input.email.clone()))
            .bind(("password", PasswordDoc::from(&password)))
            .bind(("approved", input.pre_approved))
            .bind(("confirm_codes", confirm_codes))
            .bind(("privileges", input.privileges))
            .bind(("group_refs", to_docs(&group_refs)))
            .bind(("profile", input.profile))
            .bind(("now", now.timestamp_millis()))
            .await
            .map_err(DbError::from)?;

        let mut response = checked(response).map_err(duplicate_email)?;
        let rows: Vec<UserRow> = response.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", id.to_hex()))?;

        info!(user_id = %id, email = %input.email, "User created");
        Ok(row.into_user(id)?)
    }

    async fn fetch_page(
        &self,
        plan: &PagePlan,
        conditions: &[&str],
        group_ids: Option<Vec<String>>,
        cutoff: Option<i64>,
    ) -> TollgateResult<Page<User>> {
        let sql = listing::page_query("account", plan, conditions);
        let mut builder = self
            .db
            .query(sql)
            .bind(("after", listing::after_binding(plan)))
            .bind(("limit", plan.limit as u64));
        if let Some(group_ids) = group_ids {
            builder = builder.bind(("group_ids", group_ids));
        }
        if let Some(cutoff) = cutoff {
            builder = builder.bind(("cutoff", cutoff));
        }

        let response = builder.await.map_err(DbError::from)?;
        let rows: Vec<UserRow> = checked(response)?.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(listing::into_page(items, plan, |u| u.id))
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> TollgateResult<User> {
        self.insert(NewAccount {
            email: input.email,
            password: input.password,
            pre_approved: input.pre_approved,
            privileges: Vec::new(),
            confirm_codes: None,
            profile: None,
            group_ids: Vec::new(),
        })
        .await
    }

    async fn create_detailed(&self, input: CreateUserDetail) -> TollgateResult<User> {
        self.insert(NewAccount {
            email: input.email,
            password: input.password,
            pre_approved: input.pre_approved,
            privileges: input.privileges,
            confirm_codes: input.confirm_codes,
            profile: input.profile,
            group_ids: input.group_ids,
        })
        .await
    }

    async fn update(&self, id: &str, input: UpdateUser) -> TollgateResult<User> {
        let id = ObjectId::parse_str(id)?;
        if input.is_empty() {
            return self.get_by_id(&id.to_hex()).await;
        }

        let password = match input.password.as_deref() {
            Some(raw) if !self.checker.password_valid(raw) => {
                return Err(TollgateError::InvalidPassword);
            }
            Some(raw) => Some(self.codec.hash_at(raw, self.clock.now())?),
            None => None,
        };
        let group_refs = match input.group_ids.as_deref() {
            Some(ids) => Some(self.resolve_group_refs(ids).await?),
            None => None,
        };

        let mut sets = Vec::new();
        if password.is_some() {
            sets.push("password = $password");
        }
        if input.approved.is_some() {
            sets.push("approved = $approved");
        }
        if input.privileges.is_some() {
            sets.push("privileges = $privileges");
        }
        if input.confirm_codes.is_some() {
            sets.push("confirm_codes = $confirm_codes");
        }
        if input.profile.is_some() {
            sets.push("profile = $profile");
        }
        if group_refs.is_some() {
            sets.push("group_refs = $group_refs");
        }

        let query = format!(
            "UPDATE type::thing('account', $id) SET {}",
            sets.join(", ")
        );
        let mut builder = self.db.query(query).bind(("id", id.to_hex()));

        if let Some(password) = password {
            builder = builder.bind(("password", PasswordDoc::from(&password)));
        }
        if let Some(approved) = input.approved {
            builder = builder.bind(("approved", approved));
        }
        if let Some(privileges) = input.privileges {
            builder = builder.bind(("privileges", privileges));
        }
        if let Some(confirm_codes) = input.confirm_codes {
            builder = builder.bind(("confirm_codes", confirm_codes));
        }
        if let Some(profile) = input.profile {
            builder = builder.bind(("profile", profile));
        }
        if let Some(group_refs) = group_refs {
            builder = builder.bind(("group_refs", to_docs(&group_refs)));
        }

        let response = builder.await.map_err(DbError::from)?;
        let rows: Vec<UserRow> = checked(response)?.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", id.to_hex()))?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_id(&self, id: &str) -> TollgateResult<User> {
        let id = ObjectId::parse_str(id)?;

        let response = self
            .db
            .query("SELECT * FROM type::thing('account', $id)")
            .bind(("id", id.to_hex()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<UserRow> = checked(response)?.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", id.to_hex()))?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_email(&self, email: &str) -> TollgateResult<User> {
        if !self.checker.email_valid(email) {
            return Err(TollgateError::InvalidEmail);
        }

        let response = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM account \
                 WHERE email = $email LIMIT 1",
            )
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<UserRow> = checked(response)?.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", format!("email={email}")))?;

        Ok(row.try_into_user()?)
    }

    async fn list(
        &self,
        page: PageRequest<UserField>,
        group_filter: &[String],
    ) -> TollgateResult<Page<User>> {
        let plan = Paginator::new(self.config.default_limit).plan(&page)?;
        if group_filter.is_empty() {
            return self.fetch_page(&plan, &[], None, None).await;
        }

        let group_ids: Vec<String> = group_filter
            .iter()
            .filter(|id| is_object_id_hex(id))
            .cloned()
            .collect();
        if group_ids.is_empty() {
            return Err(TollgateError::NoResult);
        }
        self.fetch_page(
            &plan,
            &["group_refs[*].group_id CONTAINSANY $group_ids"],
            Some(group_ids),
            None,
        )
        .await
    }

    async fn list_online(&self, page: PageRequest<UserField>) -> TollgateResult<Page<User>> {
        let plan = Paginator::new(self.config.default_limit).plan(&page)?;
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(self.config.minimum_online_threshold())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.fetch_page(
            &plan,
            &["last_activity > $cutoff"],
            None,
            Some(cutoff.timestamp_millis()),
        )
        .await
    }

    async fn delete(&self, id: &str) -> TollgateResult<()> {
        let id = ObjectId::parse_str(id)?;

        let response = self
            .db
            .query("DELETE type::thing('account', $id) RETURN BEFORE")
            .bind(("id", id.to_hex()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<UserRow> = checked(response)?.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::not_found("user", id.to_hex()).into());
        }

        info!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn touch_activity(&self, id: &str) -> TollgateResult<User> {
        let id = ObjectId::parse_str(id)?;

        let response = self
            .db
            .query("UPDATE type::thing('account', $id) SET last_activity = $now")
            .bind(("id", id.to_hex()))
            .bind(("now", self.clock.now().timestamp_millis()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<UserRow> = checked(response)?.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", id.to_hex()))?;

        Ok(row.into_user(id)?)
    }
}
