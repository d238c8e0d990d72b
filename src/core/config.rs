//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `JWT_SECRET` - Token signing secret (min 16 bytes)
//!
//! ## Optional
//! - `SERVER_HOST` - Bind address (default: 0.0.0.0)
//! - `SERVER_PORT` - Listen port (default: 8081)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `JWT_EXPIRATION_SECS` - Token lifetime (default: one week, at most one year)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 16;
const DEFAULT_PORT: u16 = 8081;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_JWT_EXPIRATION_SECS: i64 = 3600 * 24 * 7;
const MAX_JWT_EXPIRATION_SECS: i64 = 3600 * 24 * 365;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: SecretString,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub jwt_expiration_secs: i64,
}

/// Load configuration from the process environment. Call
/// [`bootstrap::init_env`](super::bootstrap::init_env) first to pick up `.env`.
pub fn load() -> Result<AppConfig, ConfigError> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Build the configuration from an arbitrary variable source.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<AppConfig, ConfigError> {
    let required = |key: &str| {
        lookup(key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    };

    let server = ServerConfig {
        host: parse_or(&lookup, "SERVER_HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
        port: parse_or(&lookup, "SERVER_PORT", DEFAULT_PORT)?,
    };

    let database = DatabaseConfig {
        url: SecretString::from(required("DATABASE_URL")?),
        max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
    };

    let auth = AuthConfig {
        jwt_secret: SecretString::from(required("JWT_SECRET")?),
        jwt_expiration_secs: parse_or(&lookup, "JWT_EXPIRATION_SECS", DEFAULT_JWT_EXPIRATION_SECS)?,
    };

    if auth.jwt_secret.expose_secret().len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InvalidEnvVar(
            "JWT_SECRET".into(),
            format!("must be at least {MIN_JWT_SECRET_LENGTH} bytes"),
        ));
    }
    if !(1..=MAX_JWT_EXPIRATION_SECS).contains(&auth.jwt_expiration_secs) {
        return Err(ConfigError::InvalidEnvVar(
            "JWT_EXPIRATION_SECS".into(),
            format!("must be between 1 and {MAX_JWT_EXPIRATION_SECS}"),
        ));
    }

    Ok(AppConfig {
        server,
        database,
        auth,
    })
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|value| !value.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|err: T::Err| ConfigError::InvalidEnvVar(key.to_string(), err.to_string())),
        None => Ok(default),
    }
}
