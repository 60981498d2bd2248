//! Process configuration from the environment (and `.env`, if present).

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PORT must be an integer between 1 and 65535, got {0:?}")]
    InvalidPort(String),

    #[error("CORS_ORIGIN entries must start with http:// or https://, got {0:?}")]
    InvalidOrigin(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Allowed origins; empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load `.env` (if any), then read `PORT` and `CORS_ORIGIN`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(std::env::var("PORT").ok().as_deref(), std::env::var("CORS_ORIGIN").ok().as_deref())
    }

    pub fn from_vars(port: Option<&str>, cors_origin: Option<&str>) -> Result<Self, ConfigError> {
        let port = match port {
            None => DEFAULT_PORT,
            Some(raw) => parse_port(raw)?,
        };
        let cors_origins = match cors_origin {
            None => Vec::new(),
            Some(raw) => parse_origins(raw)?,
        };
        Ok(Self { port, cors_origins })
    }
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort(raw.to_string())),
    }
}

fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            if origin.starts_with("http://") || origin.starts_with("https://") {
                Ok(origin.to_string())
            } else {
                Err(ConfigError::InvalidOrigin(origin.to_string()))
            }
        })
        .collect()
}
