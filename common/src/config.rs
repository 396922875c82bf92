//! Configuration loaded from the environment.
//!
//! Binaries call [`load_dotenv`] first, then [`AppConfig::load_with_service`].
//! Database settings are read separately through [`DbConfig::from_env`] so a
//! broken database config can degrade to sample data instead of aborting.

use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};
pub use crate::models::connection::{DbConfig, DbType};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_DATA_DIR: &str = "datasets";
const DEFAULT_DATABASE: &str = "IEMASTER";
const DEFAULT_SCHEMA: &str = "IEPLANE";

/// Service-level configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name, used in logs and response metadata.
    pub service_name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Time-to-live of cached metric tables.
    pub cache_ttl_secs: u64,
    /// Serve metrics from the local parquet datasets instead of the database.
    pub use_local: bool,
    /// Root directory of the local parquet datasets.
    pub local_data_dir: PathBuf,
}

impl AppConfig {
    /// Loads the service configuration from the process environment.
    pub fn load_with_service(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Loads the service configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let cache_ttl_secs = match lookup("CACHE_TTL_SECS").map(|v| v.parse::<u64>()) {
            Some(Ok(v)) => v,
            Some(Err(_)) => {
                tracing::warn!("CACHE_TTL_SECS is not a number, using {DEFAULT_CACHE_TTL_SECS}");
                DEFAULT_CACHE_TTL_SECS
            }
            None => DEFAULT_CACHE_TTL_SECS,
        };

        Self {
            service_name: service_name.to_string(),
            host: lookup("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: lookup("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            cache_ttl_secs,
            use_local: lookup("USE_LOCAL").map(|v| is_truthy(&v)).unwrap_or(false),
            local_data_dir: lookup("LOCAL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        }
    }
}

impl DbConfig {
    /// Reads the connection config from the process environment.
    ///
    /// Networked stores require `DB_USERNAME` and `DB_PASSWORD`.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the connection config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let must_get = |key: &str| {
            get(key).ok_or_else(|| AppError::Config(format!("missing required env var: {key}")))
        };

        let db_type = match get("DB_TYPE") {
            Some(v) => v.parse::<DbType>()?,
            None => DbType::Postgres,
        };

        let port = match get("DB_PORT") {
            Some(v) => Some(
                v.trim()
                    .parse::<u16>()
                    .map_err(|_| AppError::Config(format!("DB_PORT is not a valid port: {v}")))?,
            ),
            None => None,
        };

        let (username, password) = if db_type.is_networked() {
            (Some(must_get("DB_USERNAME")?), Some(must_get("DB_PASSWORD")?))
        } else {
            (get("DB_USERNAME"), get("DB_PASSWORD"))
        };

        let file_path = get("DB_FILE_PATH");
        if db_type == DbType::SQLite && file_path.is_none() {
            return Err(AppError::Config("missing required env var: DB_FILE_PATH".into()));
        }

        let default_schema = if db_type == DbType::SQLite { "" } else { DEFAULT_SCHEMA };

        Ok(DbConfig {
            db_type,
            host: get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port,
            database: get("DB_NAME").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            username,
            password,
            // DB_SCHEMA may be set to an empty string on purpose
            schema: lookup("DB_SCHEMA").unwrap_or_else(|| default_schema.to_string()),
            file_path,
            connect_timeout_secs: get("DB_CONNECT_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            max_connections: get("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        })
    }
}

/// `1`, `true` and `yes` (any case) count as true.
pub fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

/// Loads a `.env` file from the working directory (best-effort, no error if missing).
///
/// Variables already present in the environment win.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

/// Loads a specific env file (best-effort).
pub fn load_dotenv_from(env_path: &Path) {
    let Ok(content) = std::fs::read_to_string(env_path) else {
        return;
    };
    for (key, value) in parse_env_lines(&content) {
        if std::env::var(&key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let key = key.trim().trim_start_matches("export ").trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.to_string(), value.to_string())
        })
        .collect()
}
