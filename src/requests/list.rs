use axum::{debug_handler, extract::{Query, State}, Json};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{db::StorageError, AppResult};

use super::{row_to_request, ChatRequest, RequestRow, RequestStatus, SELECT_REQUEST};

#[derive(Debug, Deserialize)]
pub(crate) struct UserQuery {
    username: String,
}

#[derive(Clone, Copy)]
enum Side {
    Receiver,
    Sender,
}

async fn pending_for(db_pool: &SqlitePool, side: Side, username: &str) -> Result<Vec<ChatRequest>, StorageError> {
    let column = match side {
        Side::Receiver => "receiver_username",
        Side::Sender => "sender_username",
    };

    let rows: Vec<RequestRow> =
        sqlx::query_as(&format!("{SELECT_REQUEST} WHERE {column}=? AND status=? ORDER BY rowid"))
            .bind(username)
            .bind(RequestStatus::Pending.as_str())
            .fetch_all(db_pool)
            .await?;

    rows.into_iter().map(row_to_request).collect()
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn pending_requests(
    State(db_pool): State<SqlitePool>,
    Query(UserQuery { username }): Query<UserQuery>,
) -> AppResult<Json<Vec<ChatRequest>>> {
    Ok(Json(pending_for(&db_pool, Side::Receiver, &username).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn sent_requests(
    State(db_pool): State<SqlitePool>,
    Query(UserQuery { username }): Query<UserQuery>,
) -> AppResult<Json<Vec<ChatRequest>>> {
    Ok(Json(pending_for(&db_pool, Side::Sender, &username).await?))
}
