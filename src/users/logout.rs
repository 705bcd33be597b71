use axum::debug_handler;
use tower_sessions::Session;
use tracing::info;

use crate::{session::USERNAME, AppResult};

#[debug_handler]
pub(crate) async fn logout(session: Session) -> AppResult<&'static str> {
    if let Some(username) = session.get::<String>(USERNAME).await? {
        info!(%username, "logged out");
    }
    session.clear().await;

    Ok("Logged out")
}
