use axum::{debug_handler, extract::State, Json};

use crate::{AppResult, AppState};

use super::UserStore;

#[debug_handler(state = AppState)]
pub(crate) async fn list_users(State(users): State<UserStore>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(users.usernames().await?))
}
