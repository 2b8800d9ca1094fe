//! Cursor-page statement builder shared by the directory listings.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tollgate_core::id::ObjectId;
use tollgate_core::pagination::{Page, PagePlan};

use crate::error::DbError;

/// Builds `SELECT .. FROM table WHERE .. ORDER BY id ASC LIMIT $limit`.
///
/// `id` is always selected (ordering requires it) together with
/// `meta::id(id) AS record_id`. A cursor binds as `$after`.
pub(crate) fn page_query(table: &str, plan: &PagePlan, conditions: &[&str]) -> String {
    let projection = if plan.columns.is_empty() {
        "*, meta::id(id) AS record_id".to_string()
    } else {
        let mut cols = vec!["id", "meta::id(id) AS record_id"];
        cols.extend(plan.columns.iter().copied().filter(|c| *c != "id"));
        cols.join(", ")
    };

    let mut clauses: Vec<String> = conditions.iter().map(|c| c.to_string()).collect();
    if plan.after.is_some() {
        clauses.push(format!("id > type::thing('{table}', $after)"));
    }
    let filter = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    format!("SELECT {projection} FROM {table}{filter} ORDER BY id ASC LIMIT $limit")
}

/// Bind value for `$after`; unused by the statement when there is no cursor.
pub(crate) fn after_binding(plan: &PagePlan) -> String {
    plan.after.map(|id| id.to_hex()).unwrap_or_default()
}

pub(crate) fn into_page<T>(
    items: Vec<T>,
    plan: &PagePlan,
    id_of: impl Fn(&T) -> ObjectId,
) -> Page<T> {
    let last = items.last().map(&id_of);
    Page::new(items, plan.limit, last)
}

pub(crate) fn parse_record_id(raw: &str) -> Result<ObjectId, DbError> {
    ObjectId::parse_str(raw)
        .map_err(|_| DbError::Decode(format!("record key {raw:?} is not an object id")))
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DbError::Decode(format!("timestamp {ms} out of range")))
}

/// Row carrying only the record key, for statements whose result is a
/// count of touched records.
#[derive(Debug, Deserialize)]
pub(crate) struct RecordIdRow {
    #[allow(dead_code)]
    pub record_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(columns: Vec<&'static str>, after: Option<ObjectId>) -> PagePlan {
        PagePlan {
            limit: 10,
            after,
            columns,
        }
    }

    #[test]
    fn full_record_first_page() {
        let sql = page_query("account", &plan(vec![], None), &[]);
        assert_eq!(
            sql,
            "SELECT *, meta::id(id) AS record_id FROM account ORDER BY id ASC LIMIT $limit"
        );
    }

    #[test]
    fn projection_with_cursor_and_filter() {
        let sql = page_query(
            "account",
            &plan(vec!["email"], Some(ObjectId::new())),
            &["last_activity > $cutoff"],
        );
        assert_eq!(
            sql,
            "SELECT id, meta::id(id) AS record_id, email FROM account \
             WHERE last_activity > $cutoff AND id > type::thing('account', $after) \
             ORDER BY id ASC LIMIT $limit"
        );
    }

    #[test]
    fn id_only_projection_selects_keys() {
        let sql = page_query("account_group", &plan(vec!["id"], None), &[]);
        assert!(sql.starts_with("SELECT id, meta::id(id) AS record_id FROM account_group"));
    }

    #[test]
    fn epoch_millis_decode() {
        assert_eq!(from_millis(0).unwrap(), DateTime::<Utc>::default());
    }
}
