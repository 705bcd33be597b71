use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use thiserror::Error;
use tracing::info;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("duplicate record: {0}")]
    Duplicate(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

// users:         unique: username
// messages:      append only, read back in rowid order
// chat_requests: status mutates, everything else fixed at insert
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        username TEXT PRIMARY KEY NOT NULL,
        password TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY NOT NULL,
        sender_username TEXT NOT NULL,
        receiver_username TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        type TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS messages_by_pair ON messages (sender_username, receiver_username)",
    "CREATE TABLE IF NOT EXISTS chat_requests (
        id TEXT PRIMARY KEY NOT NULL,
        sender_username TEXT NOT NULL,
        receiver_username TEXT NOT NULL,
        message TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        status TEXT NOT NULL
    )",
];

pub async fn connect(config: &Config) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
}

/// A migrated single-connection in-memory database. The connection is never
/// recycled, so the data lives as long as the pool.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(db_pool).await?;
    }
    info!(tables = 3, "schema up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let db_pool = connect_in_memory().await.unwrap();
        migrate(&db_pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('users','messages','chat_requests')",
        )
        .fetch_one(&db_pool)
        .await
        .unwrap();
        assert_eq!(count, 3);
    }
}
