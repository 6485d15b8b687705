use std::env;
use std::str::FromStr;

use dotenv::dotenv;
use log::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/**
 * Runtime settings, read from the environment (and `.env` when present)
 */
#[derive(Clone, Debug)]
pub struct Config {
    /// Unset runs the application against the in-memory store
    pub database_url: Option<String>,
    pub listen_addr: String,
    pub template_dir: String,
    /// Number of questions shown on the index page
    pub index_limit: usize,
    /// Header carrying the identity of the authenticated user
    pub remote_user_header: String,
    pub pool_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            listen_addr: "127.0.0.1:8000".to_string(),
            template_dir: "views".to_string(),
            index_limit: 5,
            remote_user_header: "X-Remote-User".to_string(),
            pool_size: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /**
     * Build the configuration from an arbitrary key lookup, falling back to
     * the defaults for anything unset or blank
     */
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            database_url: lookup("DATABASE_URL"),
            listen_addr: lookup("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            template_dir: lookup("TEMPLATE_DIR").unwrap_or(defaults.template_dir),
            index_limit: parse("INDEX_LIMIT", lookup("INDEX_LIMIT"), defaults.index_limit)?,
            remote_user_header: lookup("REMOTE_USER_HEADER").unwrap_or(defaults.remote_user_header),
            pool_size: parse("DB_POOL_SIZE", lookup("DB_POOL_SIZE"), defaults.pool_size)?,
        })
    }
}

fn parse<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| {
            warn!("Could not parse {}={:?}", key, value);
            ConfigError::Invalid { key, value }
        }),
    }
}
