//! Startup configuration.
//!
//! Everything is resolved once from the environment (optionally seeded from
//! `.env` files) before the worker starts:
//!
//! - `REDIS_URL`: queue endpoint, e.g. `redis://:password@host:6379/2`.
//! - `WORKER_QUEUE`: queue name; jobs are popped from `queue:<name>`.
//! - `WORKER_CLASSES`: comma separated job classes to accept.
//! - `POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_USER`, `POSTGRES_PASSWORD`,
//!   `POSTGRES_DB`, or `DATABASE_URL`: sample database.
use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

use crate::worker::Handshake;

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";
pub const DEFAULT_QUEUE: &str = "default";
const DEFAULT_REDIS_PORT: u16 = 6379;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid REDIS_URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unix sockets not supported by this worker")]
    UnixSocket,

    #[error("REDIS_URL has no host")]
    MissingHost,

    #[error("POSTGRES_DB not set; set env vars or DATABASE_URL")]
    MissingDatabase,
}

/// Where the queue lives and how to log into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEndpoint {
    /// `host:port` suitable for dialing.
    pub address: String,
    pub password: Option<String>,
    pub namespace: u32,
}

impl QueueEndpoint {
    /// Parses a `redis://` style URL. A path that is not a number selects
    /// namespace 0.
    pub fn from_url(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw)?;
        if url.scheme() == "unix" {
            return Err(ConfigError::UnixSocket);
        }

        let host = url.host_str().ok_or(ConfigError::MissingHost)?;
        let port = url.port().unwrap_or(DEFAULT_REDIS_PORT);
        let address = format!("{host}:{port}");

        let password = url
            .password()
            .filter(|p| !p.is_empty())
            .map(decode_userinfo);
        let namespace = url
            .path()
            .trim_start_matches('/')
            .parse::<u32>()
            .unwrap_or(0);

        Ok(Self {
            address,
            password,
            namespace,
        })
    }

    pub fn handshake(&self) -> Handshake {
        Handshake {
            credential: self.password.clone(),
            namespace: self.namespace,
        }
    }
}

/// Queue key for a queue name, following the `queue:<name>` convention.
pub fn queue_key(name: &str) -> String {
    let name = name.trim();
    let name = if name.is_empty() { DEFAULT_QUEUE } else { name };
    format!("queue:{name}")
}

/// Splits a comma separated class list, dropping blanks.
pub fn parse_classes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds a PostgreSQL connection string from `lookup`.
///
/// `POSTGRES_DB` wins when set; otherwise `DATABASE_URL` is used verbatim.
pub fn database_dsn<F>(lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    let Some(dbname) = get("POSTGRES_DB") else {
        return get("DATABASE_URL").ok_or(ConfigError::MissingDatabase);
    };

    let host = get("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = get("POSTGRES_PORT").unwrap_or_else(|| "5432".to_string());
    let user = get("POSTGRES_USER").unwrap_or_default();
    let password = get("POSTGRES_PASSWORD").unwrap_or_default();

    Ok(format!(
        "host={host} port={port} user={user} password={password} dbname={dbname} sslmode=disable"
    ))
}

/// [`database_dsn`] over the process environment.
pub fn database_dsn_from_env() -> Result<String, ConfigError> {
    database_dsn(|key| std::env::var(key).ok())
}

fn decode_userinfo(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
