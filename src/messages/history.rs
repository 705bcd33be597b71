use axum::{debug_handler, extract::{Query, State}, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::{AppResult, AppState};

use super::{Message, SharedMessageStore};

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    sender: String,
    receiver: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn save_message(
    State(messages): State<SharedMessageStore>,
    Json(mut message): Json<Message>,
) -> AppResult<impl IntoResponse> {
    message.timestamp = Some(OffsetDateTime::now_utc());
    let saved = messages.save(message).await?;
    debug!(id = ?saved.id, "message saved over http");

    Ok((StatusCode::CREATED, "Message saved successfully!"))
}

#[debug_handler(state = AppState)]
pub(crate) async fn message_history(
    State(messages): State<SharedMessageStore>,
    Query(HistoryQuery { sender, receiver }): Query<HistoryQuery>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(messages.find_between(&sender, &receiver).await?))
}
