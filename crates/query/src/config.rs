//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Engine and CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL. Only needed to execute queries.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Upper bound on one top-level query, including its includes.
    pub query_timeout: Option<Duration>,

    /// Model schema document (default: ./models.toml).
    pub schema_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 10,
            query_timeout: None,
            schema_path: PathBuf::from("./models.toml"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?,
            None => defaults.database_max_connections,
        };

        let query_timeout = lookup("QUERY_TIMEOUT_MS")
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .context("QUERY_TIMEOUT_MS must be a number of milliseconds")?
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let schema_path = lookup("ASH_SCHEMA")
            .map(PathBuf::from)
            .unwrap_or(defaults.schema_path);

        Ok(Self {
            database_url,
            database_max_connections,
            query_timeout,
            schema_path,
        })
    }
}
