use axum::{debug_handler, extract::State, Json};
use tower_sessions::Session;
use tracing::{debug, info};

use crate::{session::USERNAME, AppError, AppResult, AppState};

use super::{password, Credentials, UserStore};

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(users): State<UserStore>,
    session: Session,
    Json(Credentials { username, password }): Json<Credentials>,
) -> AppResult<&'static str> {
    let Some(user) = users.find_by_username(&username).await? else {
        debug!(%username, "login for unknown user");
        return Err(AppError::Unauthorized);
    };

    if !password::verify(&password, &user.password) {
        debug!(%username, "login with wrong password");
        return Err(AppError::Unauthorized);
    }

    session.insert(USERNAME, &user.username).await?;
    info!(username = %user.username, "login succeeded");

    Ok("Login successful!")
}
