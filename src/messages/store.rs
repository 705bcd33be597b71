use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::StorageError;

use super::Message;

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn save(&self, message: Message) -> Result<Message, StorageError>;

    /// Messages sent by `sender` to `receiver`, oldest first. The reverse
    /// direction is not included.
    async fn find_between(&self, sender: &str, receiver: &str) -> Result<Vec<Message>, StorageError>;
}

pub type SharedMessageStore = Arc<dyn MessageStore>;

#[derive(Clone)]
pub struct SqliteMessageStore {
    db_pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

type MessageRow = (String, String, String, String, OffsetDateTime, String);

#[async_trait]
impl MessageStore for SqliteMessageStore {
    #[instrument(skip(self, message), fields(sender = %message.sender_username, receiver = %message.receiver_username))]
    async fn save(&self, mut message: Message) -> Result<Message, StorageError> {
        let id = Uuid::now_v7();
        let timestamp = message.timestamp.unwrap_or_else(OffsetDateTime::now_utc);

        sqlx::query("INSERT INTO messages (id,sender_username,receiver_username,content,timestamp,type) VALUES (?,?,?,?,?,?)")
            .bind(id.to_string())
            .bind(&message.sender_username)
            .bind(&message.receiver_username)
            .bind(&message.content)
            .bind(timestamp)
            .bind(message.kind.as_str())
            .execute(&self.db_pool)
            .await?;

        debug!(%id, "message persisted");

        message.id = Some(id);
        message.timestamp = Some(timestamp);
        Ok(message)
    }

    async fn find_between(&self, sender: &str, receiver: &str) -> Result<Vec<Message>, StorageError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id,sender_username,receiver_username,content,timestamp,type FROM messages
             WHERE sender_username=? AND receiver_username=? ORDER BY rowid",
        )
        .bind(sender)
        .bind(receiver)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(row_to_message).collect()
    }
}

fn row_to_message(
    (id, sender_username, receiver_username, content, timestamp, kind): MessageRow,
) -> Result<Message, StorageError> {
    let id = Uuid::parse_str(&id).map_err(|err| StorageError::Corrupt(format!("message id {id:?}: {err}")))?;

    Ok(Message {
        id: Some(id),
        sender_username,
        receiver_username,
        content,
        timestamp: Some(timestamp),
        kind: kind.parse()?,
    })
}
