//! SurrealDB connection management.

use std::env;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket URL (e.g., `127.0.0.1:8000`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "tollgate".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// Defaults overridden by `TOLLGATE_DB_URL`, `TOLLGATE_DB_NAMESPACE`,
    /// `TOLLGATE_DB_DATABASE`, `TOLLGATE_DB_USERNAME` and
    /// `TOLLGATE_DB_PASSWORD`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            url: lookup("TOLLGATE_DB_URL").unwrap_or(defaults.url),
            namespace: lookup("TOLLGATE_DB_NAMESPACE").unwrap_or(defaults.namespace),
            database: lookup("TOLLGATE_DB_DATABASE").unwrap_or(defaults.database),
            username: lookup("TOLLGATE_DB_USERNAME").unwrap_or(defaults.username),
            password: lookup("TOLLGATE_DB_PASSWORD").unwrap_or(defaults.password),
        }
    }
}

/// Manages a connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Opens a WebSocket session, signs in as root and selects the
    /// Tollgate namespace and database.
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        let db = Surreal::new::<Ws>(config.url.as_str()).await?;
        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await?;
        db.use_ns(&config.namespace).use_db(&config.database).await?;

        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Tollgate store ready"
        );
        Ok(Self { db })
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
