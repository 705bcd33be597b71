pub mod config;
pub mod db;
pub mod messages;
pub mod relay;
pub mod requests;
pub mod session;
pub mod telemetry;
pub mod users;

use std::sync::Arc;

use axum::{extract::FromRef, http::{header, Method, StatusCode}, response::{IntoResponse, Response}, Router};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

use crate::{
    config::Config,
    db::StorageError,
    messages::{SharedMessageStore, SqliteMessageStore},
    relay::MessageRouter,
    users::UserStore,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub users: UserStore,
    pub messages: SharedMessageStore,
    pub relay: MessageRouter,
}

impl AppState {
    pub fn new(db_pool: SqlitePool) -> Self {
        let messages: SharedMessageStore = Arc::new(SqliteMessageStore::new(db_pool.clone()));
        Self {
            users: UserStore::new(db_pool.clone()),
            relay: MessageRouter::new(messages.clone()),
            messages,
            db_pool,
        }
    }
}

pub fn app(state: AppState, config: &Config) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_expiry_minutes)));

    let cors = CorsLayer::new()
        .allow_origin(config.allowed_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .merge(users::router())
        .merge(relay::router())
        .nest("/api/messages", messages::router())
        .nest("/api/requests", requests::router())
        .with_state(state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid credentials")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        (status, self.to_string()).into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self::Other(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self::Other(anyhow::Error::msg(err.to_owned()))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(StorageError::from(err))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Other(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(tower_sessions::session::Error);
