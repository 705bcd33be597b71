mod hub;
mod router;
mod session;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use hub::{user_queue, Frame, PUBLIC_TOPIC};
pub use router::{Connection, ConnectionGuard, DropReason, MessageRouter, Routed, SYSTEM_SENDER, WELCOME_TEXT};
pub use session::{ConnectionId, SessionRegistry};
pub use ws::{ClientFrame, ADD_USER, PRIVATE};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::relay_ws))
}
