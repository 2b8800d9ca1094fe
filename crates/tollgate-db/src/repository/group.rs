//! SurrealDB implementation of [`GroupRepository`].

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use tollgate_core::config::TollgateConfig;
use tollgate_core::error::{TollgateError, TollgateResult};
use tollgate_core::id::{ObjectId, is_object_id_hex};
use tollgate_core::models::group::{CreateGroup, Group, GroupField, UpdateGroup};
use tollgate_core::pagination::{Page, PageRequest, Paginator};
use tollgate_core::repository::{GroupRefSync, GroupRepository};
use tracing::{error, info};

use super::checked;
use super::listing;
use super::sync::SurrealGroupRefSync;
use crate::error::DbError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GroupRow {
    record_id: String,
    name: String,
    privileges: Vec<String>,
    info: Option<serde_json::Value>,
}

impl GroupRow {
    fn into_group(self, id: ObjectId) -> Group {
        Group {
            id,
            name: self.name,
            privileges: self.privileges,
            info: self.info,
        }
    }

    fn try_into_group(self) -> Result<Group, DbError> {
        let id = listing::parse_record_id(&self.record_id)?;
        Ok(self.into_group(id))
    }
}

fn duplicate_name(err: DbError, name: &str) -> TollgateError {
    if err.is_unique_violation() {
        TollgateError::DuplicateName { name: name.into() }
    } else {
        err.into()
    }
}

/// SurrealDB implementation of the Group repository.
///
/// Deletes and renames are propagated to user snapshots through `S`.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection, S: GroupRefSync = SurrealGroupRefSync<C>> {
    db: Surreal<C>,
    sync: S,
    config: TollgateConfig,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            sync: SurrealGroupRefSync::new(db.clone()),
            db,
            config: TollgateConfig::default(),
        }
    }
}

impl<C: Connection, S: GroupRefSync> SurrealGroupRepository<C, S> {
    pub fn with_config(mut self, config: TollgateConfig) -> Self {
        self.config = config;
        self
    }

    /// Swaps the coordinator deletes and renames go through.
    pub fn with_ref_sync<T: GroupRefSync>(self, sync: T) -> SurrealGroupRepository<C, T> {
        SurrealGroupRepository {
            db: self.db,
            sync,
            config: self.config,
        }
    }

    pub fn ref_sync(&self) -> &S {
        &self.sync
    }

    async fn fetch(&self, id: ObjectId) -> TollgateResult<Group> {
        let response = self
            .db
            .query("SELECT * FROM type::thing('account_group', $id)")
            .bind(("id", id.to_hex()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRow> = checked(response)?.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", id.to_hex()))?;
        Ok(row.into_group(id))
    }
}

impl<C: Connection, S: GroupRefSync> GroupRepository for SurrealGroupRepository<C, S> {
    async fn create(&self, input: CreateGroup) -> TollgateResult<Group> {
        if input.name.trim().is_empty() {
            return Err(TollgateError::InvalidName);
        }
        let id = ObjectId::new();

        let response = self
            .db
            .query(
                "CREATE type::thing('account_group', $id) SET \
                 name = $name, privileges = $privileges, info = $info",
            )
            .bind(("id", id.to_hex()))
            .bind(("name", input.name.clone()))
            .bind(("privileges", input.privileges))
            .bind(("info", input.info))
            .await
            .map_err(DbError::from)?;

        let mut response = checked(response).map_err(|e| duplicate_name(e, &input.name))?;
        let rows: Vec<GroupRow> = response.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", id.to_hex()))?;

        info!(group_id = %id, name = %input.name, "Group created");
        Ok(row.into_group(id))
    }

    async fn update(&self, id: &str, input: UpdateGroup) -> TollgateResult<Group> {
        let id = ObjectId::parse_str(id)?;
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(TollgateError::InvalidName);
        }

        let current = self.fetch(id).await?;
        let renamed_to = input.name.clone().filter(|n| *n != current.name);

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.privileges.is_some() {
            sets.push("privileges = $privileges");
        }
        if input.info.is_some() {
            sets.push("info = $info");
        }
        if sets.is_empty() {
            return Ok(current);
        }

        let query = format!(
            "UPDATE type::thing('account_group', $id) SET {}",
            sets.join(", ")
        );
        let mut builder = self.db.query(query).bind(("id", id.to_hex()));
        if let Some(name) = input.name.clone() {
            builder = builder.bind(("name", name));
        }
        if let Some(privileges) = input.privileges {
            builder = builder.bind(("privileges", privileges));
        }
        if let Some(info) = input.info {
            builder = builder.bind(("info", info));
        }

        let response = builder.await.map_err(DbError::from)?;
        let mut response = checked(response)
            .map_err(|e| duplicate_name(e, input.name.as_deref().unwrap_or_default()))?;
        let rows: Vec<GroupRow> = response.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", id.to_hex()))?;
        let group = row.into_group(id);

        if let Some(name) = renamed_to {
            if let Err(e) = self.sync.group_renamed(&id.to_hex(), &name).await {
                error!(group_id = %id, error = %e, "Failed to propagate group rename");
            }
        }

        Ok(group)
    }

    async fn get_by_id(&self, id: &str) -> TollgateResult<Group> {
        let id = ObjectId::parse_str(id)?;
        self.fetch(id).await
    }

    async fn get_by_name(&self, name: &str) -> TollgateResult<Group> {
        let response = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM account_group \
                 WHERE name = $name LIMIT 1",
            )
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRow> = checked(response)?.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", format!("name={name}")))?;
        Ok(row.try_into_group()?)
    }

    async fn find_many(&self, ids: &[String]) -> TollgateResult<Vec<Group>> {
        let valid: Vec<String> = ids
            .iter()
            .filter(|id| is_object_id_hex(id))
            .cloned()
            .collect();
        if valid.is_empty() {
            return Err(TollgateError::NoResult);
        }

        let response = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM account_group \
                 WHERE meta::id(id) IN $ids ORDER BY id ASC",
            )
            .bind(("ids", valid))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRow> = checked(response)?.take(0).map_err(DbError::from)?;

        let groups = rows
            .into_iter()
            .map(GroupRow::try_into_group)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(groups)
    }

    async fn list(&self, page: PageRequest<GroupField>) -> TollgateResult<Page<Group>> {
        let plan = Paginator::new(self.config.default_limit).plan(&page)?;
        let sql = listing::page_query("account_group", &plan, &[]);

        let response = self
            .db
            .query(sql)
            .bind(("after", listing::after_binding(&plan)))
            .bind(("limit", plan.limit as u64))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRow> = checked(response)?.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(GroupRow::try_into_group)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(listing::into_page(items, &plan, |g| g.id))
    }

    async fn delete(&self, id: &str) -> TollgateResult<()> {
        let id = ObjectId::parse_str(id)?;

        let response = self
            .db
            .query(
                "DELETE type::thing('account_group', $id) \
                 RETURN BEFORE",
            )
            .bind(("id", id.to_hex()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRow> = checked(response)?.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::not_found("group", id.to_hex()).into());
        }
        info!(group_id = %id, "Group deleted");

        // The group is gone either way; stale refs are repaired by reconcile.
        match self.sync.group_deleted(&id.to_hex()).await {
            Ok(affected) => info!(group_id = %id, users = affected, "Group references removed"),
            Err(e) => error!(group_id = %id, error = %e, "Failed to propagate group deletion"),
        }
        Ok(())
    }
}
