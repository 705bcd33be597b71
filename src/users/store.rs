use sqlx::SqlitePool;
use tracing::debug;

use crate::db::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    /// Argon2id PHC string, never the plaintext.
    pub password: String,
}

#[derive(Clone)]
pub struct UserStore {
    db_pool: SqlitePool,
}

impl UserStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT username,password FROM users WHERE username=?")
                .bind(username)
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(row.map(|(username, password)| User { username, password }))
    }

    pub async fn exists_by_username(&self, username: &str) -> Result<bool, StorageError> {
        Ok(sqlx::query("SELECT 1 FROM users WHERE username=?")
            .bind(username)
            .fetch_optional(&self.db_pool)
            .await?
            .is_some())
    }

    /// Inserts `user`; a taken username is [`StorageError::Duplicate`].
    pub async fn save(&self, user: &User) -> Result<(), StorageError> {
        let result = sqlx::query("INSERT INTO users (username,password) VALUES (?,?)")
            .bind(&user.username)
            .bind(&user.password)
            .execute(&self.db_pool)
            .await;

        match result {
            Ok(_) => {
                debug!(username = %user.username, "user stored");
                Ok(())
            }
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StorageError::Duplicate(user.username.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn usernames(&self) -> Result<Vec<String>, StorageError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT username FROM users WHERE username <> '' ORDER BY rowid")
                .fetch_all(&self.db_pool)
                .await?;

        Ok(rows.into_iter().map(|(username,)| username).collect())
    }
}
