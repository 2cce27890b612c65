//! Database engines for natural-language queries.
//!
//! One pooled engine is kept per db_type and reused across requests:
//! - pools are created on first use and recreated if closed
//! - credentials come from the environment and may be secret references
//! - every statement runs under the configured query timeout

pub mod postgres;

use crate::domain::error::{AppError, Result};
use crate::domain::table_schema::TableDescription;
use crate::infrastructure::config::{get_db_config, resolve_secret};
use async_trait::async_trait;
use postgres::{DbEngine, QueryRows};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// What the query pipeline needs from a database.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    fn dialect(&self) -> &str;
    async fn execute(&self, sql: &str) -> Result<QueryRows>;
    async fn describe_table(&self, table: &str) -> Result<TableDescription>;
}

/// Hands out an executor per db_type.
#[async_trait]
pub trait EngineSource: Send + Sync {
    async fn engine(&self, db_type: &str) -> Result<Arc<dyn SqlExecutor>>;
}

#[async_trait]
impl SqlExecutor for DbEngine {
    fn dialect(&self) -> &str {
        DbEngine::dialect(self)
    }

    async fn execute(&self, sql: &str) -> Result<QueryRows> {
        DbEngine::execute(self, sql).await
    }

    async fn describe_table(&self, table: &str) -> Result<TableDescription> {
        DbEngine::describe_table(self, table).await
    }
}

/// Connection settings for one db_type, read from the environment.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db: Option<String>,
    pub schema: Option<String>,
    pub dialect: String,
}

impl DbConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        let host = self.host.as_deref().ok_or_else(|| {
            AppError::ConfigError("POSTGRES_HOST is required".to_string())
        })?;
        let user = self.user.as_deref().ok_or_else(|| {
            AppError::ConfigError("POSTGRES_USER is required".to_string())
        })?;
        let database = self.db.as_deref().ok_or_else(|| {
            AppError::ConfigError("POSTGRES_DB is required".to_string())
        })?;

        let mut options = PgConnectOptions::new()
            .host(host)
            .port(self.port.unwrap_or(5432))
            .username(user)
            .database(database);

        if let Some(password_ref) = self.password.as_deref() {
            let password = resolve_secret(password_ref)?;
            options = options.password(&password);
        }

        if let Some(schema) = self.schema.as_deref() {
            options = options.options([("search_path", schema)]);
        }

        Ok(options)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbPoolConfig {
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub query_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            connect_timeout_secs: 10,
            query_timeout_secs: 30,
            idle_timeout_secs: 300,
        }
    }
}

/// Cache of database engines keyed by db_type.
pub struct DbEngineRegistry {
    engines: RwLock<HashMap<String, Arc<DbEngine>>>,
    config: DbPoolConfig,
}

impl DbEngineRegistry {
    pub fn new(config: DbPoolConfig) -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Returns the cached engine for `db_type`, connecting on first use.
    pub async fn get_or_create(&self, db_type: &str) -> Result<Arc<DbEngine>> {
        let key = db_type.to_lowercase();

        {
            let engines = self.engines.read().await;
            if let Some(engine) = engines.get(&key) {
                if engine.is_closed() {
                    warn!(db_type = %key, "Database engine is closed, will recreate");
                } else {
                    info!(db_type = %key, "Using cached database engine");
                    return Ok(engine.clone());
                }
            }
        }

        let mut engines = self.engines.write().await;
        // Another request may have connected while we waited for the lock.
        if let Some(engine) = engines.get(&key) {
            if !engine.is_closed() {
                return Ok(engine.clone());
            }
        }

        let engine = Arc::new(self.create_engine(&key).await?);
        engines.insert(key.clone(), engine.clone());
        info!(db_type = %key, "Created new database engine");
        Ok(engine)
    }

    async fn create_engine(&self, db_type: &str) -> Result<DbEngine> {
        let db_config = get_db_config(db_type).ok_or_else(|| {
            AppError::ConfigError(format!("No configuration found for db_type: {}", db_type))
        })?;
        let options = db_config.connect_options()?;

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(self.config.idle_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| {
                error!(db_type = %db_type, "Failed to connect to PostgreSQL: {}", e);
                AppError::DatabaseError(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        info!(
            db_type = %db_type,
            host = db_config.host.as_deref().unwrap_or("unknown"),
            schema = db_config.schema.as_deref().unwrap_or("public"),
            "Created PostgreSQL connection pool"
        );

        Ok(DbEngine::new(
            db_type,
            &db_config.dialect,
            pool,
            Duration::from_secs(self.config.query_timeout_secs),
        ))
    }

    /// Number of engines currently cached.
    pub async fn len(&self) -> usize {
        self.engines.read().await.len()
    }

    /// Pings every cached engine. Engines are never created here.
    pub async fn health(&self) -> BTreeMap<String, bool> {
        let engines: Vec<(String, Arc<DbEngine>)> = self
            .engines
            .read()
            .await
            .iter()
            .map(|(db_type, engine)| (db_type.clone(), engine.clone()))
            .collect();

        let mut report = BTreeMap::new();
        for (db_type, engine) in engines {
            let healthy = match engine.health_check().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(db_type = %db_type, "Database health check failed: {}", e);
                    false
                }
            };
            report.insert(db_type, healthy);
        }
        report
    }

    pub async fn close_all(&self) {
        let mut engines = self.engines.write().await;
        for (db_type, engine) in engines.drain() {
            info!(db_type = %db_type, "Closing database engine");
            engine.close().await;
        }
    }
}

#[async_trait]
impl EngineSource for DbEngineRegistry {
    async fn engine(&self, db_type: &str) -> Result<Arc<dyn SqlExecutor>> {
        let engine: Arc<dyn SqlExecutor> = self.get_or_create(db_type).await?;
        Ok(engine)
    }
}

impl Default for DbEngineRegistry {
    fn default() -> Self {
        Self::new(DbPoolConfig::default())
    }
}
