//! Server configuration, read from the environment (and `.env` if present).
//!
//! | variable                 | default                      |
//! |--------------------------|------------------------------|
//! | `DATABASE_URL`           | `sqlite://chat.db?mode=rwc`  |
//! | `BIND_ADDR`              | `0.0.0.0:8080`               |
//! | `ALLOWED_ORIGIN`         | `http://localhost:3000`      |
//! | `DB_MAX_CONNECTIONS`     | `16`                         |
//! | `SESSION_EXPIRY_MINUTES` | `60`                         |

use std::{fmt::Display, net::SocketAddr, str::FromStr};

use axum::http::HeaderValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Origin of the browser front-end, allowed through CORS with credentials.
    pub allowed_origin: HeaderValue,
    pub db_max_connections: u32,
    pub session_expiry_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://chat.db?mode=rwc".to_owned(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            allowed_origin: HeaderValue::from_static("http://localhost:3000"),
            db_max_connections: 16,
            session_expiry_minutes: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| dotenv::var(name).ok())
    }

    /// Builds a config from any variable source; unset variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: parse_var(&lookup, "BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            allowed_origin: parse_var(&lookup, "ALLOWED_ORIGIN")?.unwrap_or(defaults.allowed_origin),
            db_max_connections: positive(parse_var(&lookup, "DB_MAX_CONNECTIONS")?, "DB_MAX_CONNECTIONS")?
                .unwrap_or(defaults.db_max_connections),
            session_expiry_minutes: positive(
                parse_var(&lookup, "SESSION_EXPIRY_MINUTES")?,
                "SESSION_EXPIRY_MINUTES",
            )?
            .unwrap_or(defaults.session_expiry_minutes),
        })
    }
}

fn positive<T>(value: Option<T>, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: Copy + Default + PartialOrd + Display,
{
    match value {
        Some(value) if value <= T::default() => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "must be greater than zero".to_owned(),
        }),
        value => Ok(value),
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };

    value
        .parse()
        .map(Some)
        .map_err(|err: T::Err| ConfigError::Invalid {
            name,
            reason: err.to_string(),
            value,
        })
}
