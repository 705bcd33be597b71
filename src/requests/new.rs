use axum::{debug_handler, extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{AppError, AppResult};

use super::{ChatRequest, RequestStatus};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct NewRequestBody {
    sender_username: String,
    receiver_username: String,
    message: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_request(
    State(db_pool): State<SqlitePool>,
    Json(NewRequestBody { sender_username, receiver_username, message }): Json<NewRequestBody>,
) -> AppResult<impl IntoResponse> {
    if sender_username.is_empty() || receiver_username.is_empty() {
        return Err(AppError::bad_request("senderUsername and receiverUsername are required"));
    }

    let request = ChatRequest {
        id: Uuid::now_v7(),
        sender_username,
        receiver_username,
        message,
        timestamp: OffsetDateTime::now_utc(),
        status: RequestStatus::Pending,
    };

    sqlx::query("INSERT INTO chat_requests (id,sender_username,receiver_username,message,timestamp,status) VALUES (?,?,?,?,?,?)")
        .bind(request.id.to_string())
        .bind(&request.sender_username)
        .bind(&request.receiver_username)
        .bind(&request.message)
        .bind(request.timestamp)
        .bind(request.status.as_str())
        .execute(&db_pool)
        .await?;

    info!(id = %request.id, from = %request.sender_username, to = %request.receiver_username, "chat request created");
    Ok((StatusCode::CREATED, Json(request)))
}
