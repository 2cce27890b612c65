//! Configuration loading.
//!
//! `config.yaml` is layered over built-in defaults and then overridden by
//! `OLLABOT_`-prefixed environment variables (`OLLABOT_SERVER__PORT=9000`).
//! Database credentials come from the `POSTGRES_*` variables, usually via `.env`.

use crate::application::use_cases::sql_guard::SqlGuardRules;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, ModelsConfig};
use crate::domain::table_schema::{TableConfigFile, TableSchema};
use crate::infrastructure::db::{DbConfig, DbPoolConfig};
use crate::infrastructure::security::keyring::KeyringManager;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";
pub const CONFIG_PATH_ENV: &str = "OLLABOT_CONFIG";
const ENV_PREFIX: &str = "OLLABOT_";
const KEYRING_SERVICE: &str = "ollabot";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LLMConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub sql_guard: SqlGuardRules,
    #[serde(default)]
    pub database: DbPoolConfig,
    #[serde(default = "default_table_config_path")]
    pub table_config_path: PathBuf,
}

fn default_table_config_path() -> PathBuf {
    PathBuf::from("configs/table_config.yaml")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LLMConfig::default(),
            models: ModelsConfig::default(),
            sql_guard: SqlGuardRules::default(),
            database: DbPoolConfig::default(),
            table_config_path: default_table_config_path(),
        }
    }
}

/// Loads `.env` from the working directory if there is one.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => warn!("Failed to load .env: {}", e),
    }
}

/// Explicit path, then `OLLABOT_CONFIG`, then the default location.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load_app_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using defaults and environment",
            path.display()
        );
    }

    let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"]))
        .extract()?;

    info!(
        "Loaded configuration from {} (llm={:?} base_url={})",
        path.display(),
        config.llm.provider,
        config.llm.base_url
    );
    Ok(config)
}

/// Tables configured for `db_type`. Missing or malformed files yield an empty
/// list so the caller can report "no tables" instead of failing at load time.
pub fn load_table_config(path: &Path, db_type: &str) -> Vec<TableSchema> {
    if !path.exists() {
        error!("Table configuration {} not found", path.display());
        return Vec::new();
    }

    let parsed: std::result::Result<TableConfigFile, _> =
        Figment::from(Yaml::file(path)).extract();

    match parsed {
        Ok(mut config) => {
            let tables = config
                .remove(db_type)
                .or_else(|| config.remove(&db_type.to_lowercase()))
                .map(|entry| entry.tables)
                .unwrap_or_default();
            info!(
                db_type = %db_type,
                "Loaded {} table(s) from table configuration",
                tables.len()
            );
            tables
        }
        Err(e) => {
            error!("Error loading table configuration: {}", e);
            Vec::new()
        }
    }
}

/// Connection settings for `db_type`, or `None` when the type is unsupported.
pub fn get_db_config(db_type: &str) -> Option<DbConfig> {
    match db_type.to_lowercase().as_str() {
        "postgres" => {
            let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
            let config = DbConfig {
                user: var("POSTGRES_USER"),
                password: var("POSTGRES_PASSWORD"),
                host: var("POSTGRES_HOST"),
                port: var("POSTGRES_PORT").and_then(|p| p.parse().ok()),
                db: var("POSTGRES_DB"),
                schema: var("POSTGRES_SCHEMA"),
                dialect: "postgresql".to_string(),
            };
            info!("Retrieved Postgres configuration.");
            Some(config)
        }
        other => {
            error!("Unsupported db_type: {}", other);
            None
        }
    }
}

/// Resolves a secret reference.
/// `env:NAME` reads an environment variable, `keychain:key` reads the OS
/// keychain, `plain:value` and bare values are returned as-is.
pub fn resolve_secret(reference: &str) -> Result<String> {
    if let Some(env_key) = reference.strip_prefix("env:") {
        std::env::var(env_key).map_err(|_| {
            AppError::ConfigError(format!(
                "Environment variable '{}' not found for password",
                env_key
            ))
        })
    } else if let Some(key_name) = reference.strip_prefix("keychain:") {
        KeyringManager::new(KEYRING_SERVICE).get_secret(key_name)
    } else if let Some(value) = reference.strip_prefix("plain:") {
        Ok(value.to_string())
    } else {
        Ok(reference.to_string())
    }
}
