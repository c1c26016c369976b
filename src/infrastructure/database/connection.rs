//! Database connection pool.
//!
//! SQLite with WAL journaling; migrations are idempotent
//! create-if-missing DDL applied at startup.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::domain::error::{DomainError, DomainResult};

/// Connection pool manager for the control-plane database.
pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Open (creating if missing) the database at `database_url`,
    /// e.g. `sqlite:data/control/control.db` or `sqlite::memory:`.
    pub async fn new(database_url: &str) -> DomainResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DomainError::Storage(format!("invalid database URL: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        // A pooled :memory: database would give every connection its own
        // empty database, so in-memory URLs are pinned to one connection.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| DomainError::Storage(format!("failed to open database: {e}")))?;

        Ok(Self { pool })
    }

    /// Apply pending migrations. Safe to call on every startup.
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::Storage(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_and_migrate_in_memory() {
        let db = DatabaseConnection::new("sqlite::memory:")
            .await
            .expect("failed to open database");
        db.migrate().await.expect("failed to run migrations");

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'control_%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .expect("failed to list tables");

        let names: Vec<String> = tables.into_iter().map(|t| t.0).collect();
        assert_eq!(
            names,
            vec![
                "control_agents",
                "control_audit_logs",
                "control_task_events",
                "control_tasks"
            ]
        );

        db.close().await;
    }

    #[tokio::test]
    async fn migrate_twice_is_idempotent() {
        let db = DatabaseConnection::new("sqlite::memory:")
            .await
            .expect("failed to open database");
        db.migrate().await.expect("first migration");
        db.migrate().await.expect("second migration");
        db.close().await;
    }
}
