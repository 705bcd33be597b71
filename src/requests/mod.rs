mod list;
mod new;
mod status;

use std::str::FromStr;

use axum::{routing::{get, post, put}, Router};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{db::StorageError, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        use RequestStatus::*;
        match self {
            Pending => "PENDING",
            Accepted => "ACCEPTED",
            Rejected => "REJECTED",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RequestStatus::Pending),
            "ACCEPTED" => Ok(RequestStatus::Accepted),
            "REJECTED" => Ok(RequestStatus::Rejected),
            other => Err(StorageError::Corrupt(format!("unknown request status {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub id: Uuid,
    pub sender_username: String,
    pub receiver_username: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub status: RequestStatus,
}

const SELECT_REQUEST: &str =
    "SELECT id,sender_username,receiver_username,message,timestamp,status FROM chat_requests";

type RequestRow = (String, String, String, String, OffsetDateTime, String);

fn row_to_request(
    (id, sender_username, receiver_username, message, timestamp, status): RequestRow,
) -> Result<ChatRequest, StorageError> {
    Ok(ChatRequest {
        id: Uuid::parse_str(&id).map_err(|err| StorageError::Corrupt(format!("request id {id:?}: {err}")))?,
        sender_username,
        receiver_username,
        message,
        timestamp,
        status: status.parse()?,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(new::new_request))
        .route("/pending", get(list::pending_requests))
        .route("/sent", get(list::sent_requests))
        .route("/{id}/status", put(status::update_status))
}
