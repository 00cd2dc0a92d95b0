use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::{info, instrument};

use super::artist::SqlArtistStore;
use crate::TARGET_DB;

/// Connection to the catalog database.
///
/// The pool is capped at a single connection: a cleaning session holds it for
/// its whole run and never opens a second one.
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    /// Get access to the database pool
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Connects to `database_url`. Postgres and SQLite URLs are accepted.
    #[instrument(target = "db", level = "info", skip(database_url))]
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        sqlx::any::install_default_drivers();
        info!(target: TARGET_DB, "Connecting to {}", redact(database_url));

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(database_url)
            .await?;

        info!(target: TARGET_DB, "Database connection established");
        Ok(Database { pool })
    }

    /// Opens the transaction a cleaning session runs in.
    pub async fn begin_session(&self) -> Result<SqlArtistStore, sqlx::Error> {
        let transaction = self.pool.begin().await?;
        info!(target: TARGET_DB, "Transaction started");
        Ok(SqlArtistStore::new(transaction))
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!(target: TARGET_DB, "Database connection closed");
    }
}

/// Strips the password from a connection URL before it is logged.
fn redact(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparsable url>".to_string(),
    }
}
