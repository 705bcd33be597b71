use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{AppError, AppResult};

use super::{row_to_request, ChatRequest, RequestRow, RequestStatus, SELECT_REQUEST};

#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    status: RequestStatus,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn update_status(
    State(db_pool): State<SqlitePool>,
    Path(id): Path<Uuid>,
    Json(StatusBody { status }): Json<StatusBody>,
) -> AppResult<Json<ChatRequest>> {
    let updated = sqlx::query("UPDATE chat_requests SET status=? WHERE id=?")
        .bind(status.as_str())
        .bind(id.to_string())
        .execute(&db_pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("Request not found".to_owned()));
    }

    let row: RequestRow = sqlx::query_as(&format!("{SELECT_REQUEST} WHERE id=?"))
        .bind(id.to_string())
        .fetch_one(&db_pool)
        .await?;

    info!(%id, status = status.as_str(), "chat request status changed");
    Ok(Json(row_to_request(row)?))
}
