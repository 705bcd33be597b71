mod history;
mod store;

use std::{fmt, str::FromStr};

use axum::{routing::{get, post}, Router};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{db::StorageError, AppState};

pub use store::{MessageStore, SharedMessageStore, SqliteMessageStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    #[default]
    Chat,
    Join,
    Leave,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        use MessageType::*;
        match self {
            Chat => "CHAT",
            Join => "JOIN",
            Leave => "LEAVE",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CHAT" => Ok(MessageType::Chat),
            "JOIN" => Ok(MessageType::Join),
            "LEAVE" => Ok(MessageType::Leave),
            other => Err(StorageError::Corrupt(format!("unknown message type {other:?}"))),
        }
    }
}

/// A chat message as stored, relayed and served over HTTP.
///
/// Every field may be missing from client JSON; `id` and `timestamp` are
/// always assigned server side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    pub id: Option<Uuid>,
    pub sender_username: String,
    pub receiver_username: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(rename = "type")]
    pub kind: MessageType,
}

impl Message {
    pub fn chat(
        sender_username: impl Into<String>,
        receiver_username: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender_username: sender_username.into(),
            receiver_username: receiver_username.into(),
            content: content.into(),
            timestamp: Some(OffsetDateTime::now_utc()),
            ..Default::default()
        }
    }

    pub fn join(username: impl Into<String>) -> Self {
        Self {
            sender_username: username.into(),
            timestamp: Some(OffsetDateTime::now_utc()),
            kind: MessageType::Join,
            ..Default::default()
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/save", post(history::save_message))
        .route("/history", get(history::message_history))
}
