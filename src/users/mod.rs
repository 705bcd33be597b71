mod list;
mod login;
mod logout;
mod password;
mod register;
mod store;

use axum::{routing::{get, post}, Router};
use serde::Deserialize;

use crate::AppState;

pub use store::{User, UserStore};

#[derive(Default, Deserialize)]
#[serde(default)]
pub(crate) struct Credentials {
    pub(crate) username: String,
    pub(crate) password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register))
        .route("/login", post(login::login))
        .route("/logout", post(logout::logout))
        .route("/users", get(list::list_users))
}
