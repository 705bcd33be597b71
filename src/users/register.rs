use axum::{debug_handler, extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::info;

use crate::{db::StorageError, AppError, AppResult, AppState};

use super::{password, Credentials, User, UserStore};

const USERNAME_TAKEN: &str = "Username already exists";

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(users): State<UserStore>,
    Json(Credentials { username, password }): Json<Credentials>,
) -> AppResult<impl IntoResponse> {
    info!(%username, "registration requested");

    if username.is_empty() {
        return Err(AppError::bad_request("Username cannot be empty"));
    }
    if users.exists_by_username(&username).await? {
        return Err(AppError::bad_request(USERNAME_TAKEN));
    }

    let user = User {
        password: password::hash(&password)?,
        username,
    };
    match users.save(&user).await {
        Ok(()) => {}
        // lost a race with a concurrent registration
        Err(StorageError::Duplicate(_)) => return Err(AppError::bad_request(USERNAME_TAKEN)),
        Err(err) => return Err(err.into()),
    }

    info!(username = %user.username, "user registered");
    Ok((StatusCode::CREATED, "User registered successfully!"))
}
