//! SurrealDB implementation of [`GroupRefSync`].
//!
//! Every user carries a `group_refs` snapshot of `{group_id, group_name}`
//! pairs. This module is the only writer of that field on behalf of
//! group mutations. Each statement touches one document at a time, so a
//! reader never sees a half-rewritten ref list, but there is no atomicity
//! across users.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use surrealdb::{Connection, Surreal};
use tollgate_core::error::TollgateResult;
use tollgate_core::id::ObjectId;
use tollgate_core::pagination::PagePlan;
use tollgate_core::repository::{GroupRefSync, ReconcileReport};
use tracing::{debug, info, warn};

use super::checked;
use super::listing::{self, RecordIdRow};
use crate::error::DbError;

/// Users fetched per page during [`GroupRefSync::reconcile`].
const RECONCILE_BATCH: usize = 200;

/// Stored shape of one `group_refs` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct GroupRefDoc {
    pub group_id: String,
    pub group_name: String,
}

#[derive(Debug, Deserialize)]
struct RefsRow {
    record_id: String,
    #[serde(default)]
    group_refs: Vec<GroupRefDoc>,
}

#[derive(Debug, Deserialize)]
struct GroupNameRow {
    record_id: String,
    name: String,
}

/// SurrealDB implementation of the group-ref consistency coordinator.
#[derive(Clone)]
pub struct SurrealGroupRefSync<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRefSync<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Replaces a user's refs only if they still equal `previous`.
    /// Returns `false` when a concurrent write got there first.
    async fn swap_refs(
        &self,
        user_id: &str,
        previous: Vec<GroupRefDoc>,
        next: Vec<GroupRefDoc>,
    ) -> Result<bool, DbError> {
        let response = self
            .db
            .query(
                "UPDATE type::thing('account', $id) SET group_refs = $next \
                 WHERE group_refs = $previous \
                 RETURN meta::id(id) AS record_id",
            )
            .bind(("id", user_id.to_string()))
            .bind(("next", next))
            .bind(("previous", previous))
            .await?;
        let rows: Vec<RecordIdRow> = checked(response)?.take(0)?;
        Ok(!rows.is_empty())
    }

    async fn existing_group_names(
        &self,
        ids: Vec<String>,
    ) -> Result<HashMap<String, String>, DbError> {
        let response = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, name FROM account_group \
                 WHERE meta::id(id) IN $ids",
            )
            .bind(("ids", ids))
            .await?;
        let rows: Vec<GroupNameRow> = checked(response)?.take(0)?;
        Ok(rows.into_iter().map(|r| (r.record_id, r.name)).collect())
    }
}

impl<C: Connection> GroupRefSync for SurrealGroupRefSync<C> {
    async fn group_deleted(&self, group_id: &str) -> TollgateResult<u64> {
        let group_id = ObjectId::parse_str(group_id)?.to_hex();

        let response = self
            .db
            .query(
                "UPDATE account \
                 SET group_refs = group_refs[WHERE group_id != $group_id] \
                 WHERE $group_id IN group_refs[*].group_id \
                 RETURN meta::id(id) AS record_id",
            )
            .bind(("group_id", group_id.clone()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<RecordIdRow> = checked(response)?.take(0).map_err(DbError::from)?;

        debug!(group_id = %group_id, users = rows.len(), "Stripped deleted group from users");
        Ok(rows.len() as u64)
    }

    async fn group_renamed(&self, group_id: &str, name: &str) -> TollgateResult<u64> {
        let group_id = ObjectId::parse_str(group_id)?.to_hex();

        let response = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, group_refs FROM account \
                 WHERE $group_id IN group_refs[*].group_id",
            )
            .bind(("group_id", group_id.clone()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<RefsRow> = checked(response)?.take(0).map_err(DbError::from)?;

        let mut updated = 0u64;
        for row in rows {
            let next: Vec<GroupRefDoc> = row
                .group_refs
                .iter()
                .map(|r| {
                    if r.group_id == group_id {
                        GroupRefDoc {
                            group_id: r.group_id.clone(),
                            group_name: name.to_string(),
                        }
                    } else {
                        r.clone()
                    }
                })
                .collect();
            if next == row.group_refs {
                continue;
            }
            if self.swap_refs(&row.record_id, row.group_refs, next).await? {
                updated += 1;
            } else {
                warn!(
                    user_id = %row.record_id,
                    group_id = %group_id,
                    "group_refs changed during rename; left for reconcile"
                );
            }
        }
        Ok(updated)
    }

    async fn reconcile(&self) -> TollgateResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut plan = PagePlan {
            limit: RECONCILE_BATCH,
            after: None,
            columns: vec!["group_refs"],
        };

        loop {
            let sql = listing::page_query("account", &plan, &["array::len(group_refs) > 0"]);
            let response = self
                .db
                .query(sql)
                .bind(("after", listing::after_binding(&plan)))
                .bind(("limit", plan.limit as u64))
                .await
                .map_err(DbError::from)?;
            let rows: Vec<RefsRow> = checked(response)?.take(0).map_err(DbError::from)?;
            let fetched = rows.len();

            let referenced: BTreeSet<String> = rows
                .iter()
                .flat_map(|r| r.group_refs.iter().map(|g| g.group_id.clone()))
                .collect();
            let names = if referenced.is_empty() {
                HashMap::new()
            } else {
                self.existing_group_names(referenced.into_iter().collect())
                    .await?
            };

            for row in &rows {
                report.scanned += 1;
                let next: Vec<GroupRefDoc> = row
                    .group_refs
                    .iter()
                    .filter_map(|r| {
                        names.get(&r.group_id).map(|name| GroupRefDoc {
                            group_id: r.group_id.clone(),
                            group_name: name.clone(),
                        })
                    })
                    .collect();
                if next == row.group_refs {
                    continue;
                }
                if self
                    .swap_refs(&row.record_id, row.group_refs.clone(), next)
                    .await?
                {
                    report.repaired += 1;
                } else {
                    warn!(user_id = %row.record_id, "group_refs changed during reconcile");
                }
            }

            match rows.last() {
                Some(last) if fetched == plan.limit => {
                    plan.after = Some(listing::parse_record_id(&last.record_id)?);
                }
                _ => break,
            }
        }

        info!(
            scanned = report.scanned,
            repaired = report.repaired,
            "Group reference reconcile finished"
        );
        Ok(report)
    }
}
