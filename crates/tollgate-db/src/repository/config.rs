//! SurrealDB implementation of [`ConfigRepository`].
//!
//! Each entry is one `config_entry` record whose key is the setting name.

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use tollgate_core::error::{TollgateError, TollgateResult};
use tollgate_core::models::config_entry::ConfigEntry;
use tollgate_core::repository::ConfigRepository;

use super::checked;
use crate::error::DbError;

#[derive(Debug, Deserialize)]
struct ConfigRow {
    record_id: String,
    value: String,
}

impl From<ConfigRow> for ConfigEntry {
    fn from(row: ConfigRow) -> Self {
        ConfigEntry::new(row.record_id, row.value)
    }
}

fn require_key(key: &str) -> TollgateResult<()> {
    if key.is_empty() {
        return Err(TollgateError::NoResult);
    }
    Ok(())
}

/// SurrealDB implementation of the settings store.
#[derive(Clone)]
pub struct SurrealConfigRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealConfigRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ConfigRepository for SurrealConfigRepository<C> {
    async fn set(&self, key: &str, value: &str) -> TollgateResult<()> {
        require_key(key)?;
        let response = self
            .db
            .query("UPSERT type::thing('config_entry', $key) SET value = $value")
            .bind(("key", key.to_string()))
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;
        checked(response)?;
        Ok(())
    }

    async fn set_many(&self, entries: &[ConfigEntry]) -> TollgateResult<()> {
        if entries.is_empty() {
            return Err(TollgateError::NoResult);
        }
        for entry in entries {
            require_key(&entry.key)?;
        }

        let mut sql = String::from("BEGIN TRANSACTION;\n");
        for i in 0..entries.len() {
            sql.push_str(&format!(
                "UPSERT type::thing('config_entry', $key{i}) SET value = $value{i};\n"
            ));
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut builder = self.db.query(sql);
        for (i, entry) in entries.iter().enumerate() {
            builder = builder
                .bind((format!("key{i}"), entry.key.clone()))
                .bind((format!("value{i}"), entry.value.clone()));
        }
        let response = builder.await.map_err(DbError::from)?;
        checked(response)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> TollgateResult<ConfigEntry> {
        require_key(key)?;
        let response = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, value \
                 FROM type::thing('config_entry', $key)",
            )
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ConfigRow> = checked(response)?.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("config_entry", key))?;
        Ok(row.into())
    }

    async fn get_many(&self, keys: &[String]) -> TollgateResult<Vec<ConfigEntry>> {
        if keys.is_empty() {
            return Err(TollgateError::NoResult);
        }
        let response = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, value FROM config_entry \
                 WHERE meta::id(id) IN $keys",
            )
            .bind(("keys", keys.to_vec()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ConfigRow> = checked(response)?.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(ConfigEntry::from).collect())
    }

    async fn unset(&self, key: &str) -> TollgateResult<()> {
        require_key(key)?;
        let response = self
            .db
            .query("DELETE type::thing('config_entry', $key)")
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?;
        checked(response)?;
        Ok(())
    }

    async fn unset_many(&self, keys: &[String]) -> TollgateResult<()> {
        if keys.is_empty() {
            return Err(TollgateError::NoResult);
        }
        let response = self
            .db
            .query("DELETE config_entry WHERE meta::id(id) IN $keys")
            .bind(("keys", keys.to_vec()))
            .await
            .map_err(DbError::from)?;
        checked(response)?;
        Ok(())
    }
}
