//! Core configuration read from the environment.
//!
//! Both base URLs are required. A missing value is a startup error for
//! the whole feature, surfaced before any session is built.

use crate::error::ConfigError;

pub const HTTP_BASE_URL_VAR: &str = "TELECARE_HTTP_BASE_URL";
pub const WS_BASE_URL_VAR: &str = "TELECARE_WS_BASE_URL";

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Base URL of the REST backend, e.g. `https://api.example.com`.
    pub http_base_url: String,

    /// Base URL of the real-time transport, e.g. `wss://ws.example.com`.
    pub ws_base_url: String,
}

impl CoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            http_base_url: require(HTTP_BASE_URL_VAR)?,
            ws_base_url: require(WS_BASE_URL_VAR)?,
        })
    }

    pub fn new(http_base_url: impl Into<String>, ws_base_url: impl Into<String>) -> Self {
        Self {
            http_base_url: http_base_url.into(),
            ws_base_url: ws_base_url.into(),
        }
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ConfigError::MissingVar(var)),
    }
}
