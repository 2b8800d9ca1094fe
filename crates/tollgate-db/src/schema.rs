//! Schema definitions and migration runner for SurrealDB.
//!
//! Identity tables are SCHEMALESS so that `profile` and `info` can hold
//! arbitrary documents; every other field is declared with a type.
//! Record keys are 24-char hex object ids, so `ORDER BY id` is creation
//! order. Timestamps are integer UNIX milliseconds.

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, Deserialize)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "identity_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Accounts
-- =======================================================================
DEFINE TABLE account SCHEMALESS;
DEFINE FIELD email ON TABLE account TYPE string;
DEFINE FIELD password ON TABLE account TYPE object;
DEFINE FIELD password.salt ON TABLE account TYPE string;
DEFINE FIELD password.hash ON TABLE account TYPE string;
DEFINE FIELD password.created_at ON TABLE account TYPE int;
DEFINE FIELD approved ON TABLE account TYPE bool DEFAULT false;
DEFINE FIELD confirm_codes ON TABLE account TYPE object DEFAULT {};
DEFINE FIELD privileges ON TABLE account TYPE array<string> DEFAULT [];
DEFINE FIELD group_refs ON TABLE account TYPE array<object> DEFAULT [];
DEFINE FIELD last_activity ON TABLE account TYPE int;
DEFINE FIELD joined_at ON TABLE account TYPE int READONLY;
DEFINE INDEX idx_account_email ON TABLE account COLUMNS email UNIQUE;
DEFINE INDEX idx_account_last_activity ON TABLE account \
    COLUMNS last_activity;

-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE account_group SCHEMALESS;
DEFINE FIELD name ON TABLE account_group TYPE string;
DEFINE FIELD privileges ON TABLE account_group TYPE array<string> \
    DEFAULT [];
DEFINE INDEX idx_account_group_name ON TABLE account_group \
    COLUMNS name UNIQUE;

-- =======================================================================
-- Login state (record key = SHA-256 of the session token)
-- =======================================================================
DEFINE TABLE login_state SCHEMAFULL;
DEFINE FIELD user_id ON TABLE login_state TYPE string;
DEFINE FIELD expires_at ON TABLE login_state TYPE int;
DEFINE FIELD created_at ON TABLE login_state TYPE int;
DEFINE INDEX idx_login_state_user ON TABLE login_state COLUMNS user_id;
DEFINE INDEX idx_login_state_expires ON TABLE login_state \
    COLUMNS expires_at;

-- =======================================================================
-- Settings (record key = setting key)
-- =======================================================================
DEFINE TABLE config_entry SCHEMAFULL;
DEFINE FIELD value ON TABLE config_entry TYPE string;
";

/// Run all pending migrations against the database.
///
/// Migrations are tracked in the `_migration` table. Each migration
/// runs at most once; re-running is a no-op.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
