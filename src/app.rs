use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::application::use_cases::sql_guard::SqlGuard;
use crate::application::{DatabaseQueryUseCase, LogAnalysisUseCase};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::{load_app_config, resolve_config_path, AppConfig};
use crate::infrastructure::db::DbEngineRegistry;
use crate::infrastructure::llm_clients::{LLMClient, RouterClient};
use crate::interfaces::http::{start_server, HttpState};

/// `RUST_LOG` wins over `default_filter`. Logs go to stderr so CLI output
/// stays clean.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Overrides applied on top of the loaded configuration.
#[derive(Debug, Default, Clone)]
pub struct ServeOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
}

pub fn build_state(
    config: &AppConfig,
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    registry: Arc<DbEngineRegistry>,
) -> Result<HttpState> {
    let guard = SqlGuard::from_rules(&config.sql_guard)?;

    let database_query = DatabaseQueryUseCase::new(
        llm_client.clone(),
        registry.clone(),
        config.llm.clone(),
        config.models.database_query.clone(),
        guard,
        config.table_config_path.clone(),
    );
    let log_analysis = LogAnalysisUseCase::new(
        llm_client,
        config.llm.clone(),
        config.models.summarize_errors.clone(),
    );

    Ok(HttpState {
        database_query: Arc::new(database_query),
        log_analysis: Arc::new(log_analysis),
        engines: registry,
    })
}

/// Warns about configured models the LLM endpoint does not know.
async fn check_models(llm_client: &(dyn LLMClient + Send + Sync), config: &AppConfig) {
    let available = match llm_client.list_models(&config.llm).await {
        Ok(models) => models,
        Err(e) => {
            warn!("Could not list models at {}: {}", config.llm.base_url, e);
            return;
        }
    };

    let models = &config.models;
    let wanted = [
        &models.database_query.query_model,
        &models.database_query.summary_model,
        &models.database_query.embedding_model,
        &models.summarize_errors.summary_model,
    ];
    for model in wanted {
        let known = available
            .iter()
            .any(|m| m == model || m.strip_suffix(":latest") == Some(model.as_str()));
        if !known {
            warn!("Model '{}' is not available at {}", model, config.llm.base_url);
        }
    }
}

/// Expects `.env` to be loaded already so it can feed both tracing and config.
pub async fn serve(config_path: Option<&Path>, options: ServeOptions) -> Result<()> {
    let path = resolve_config_path(config_path);
    let mut config = load_app_config(&path)?;
    if let Some(host) = options.host {
        config.server.host = host;
    }
    if let Some(port) = options.port {
        config.server.port = port;
    }

    let llm_client: Arc<dyn LLMClient + Send + Sync> = Arc::new(RouterClient::new());
    check_models(llm_client.as_ref(), &config).await;

    let registry = Arc::new(DbEngineRegistry::new(config.database.clone()));
    let state = build_state(&config, llm_client, registry.clone())?;

    let server = start_server(state, &config.server.host, config.server.port)?;
    let result = server
        .await
        .map_err(|e| AppError::Internal(format!("HTTP server failed: {}", e)));

    info!("Shutting down, closing {} database engine(s)", registry.len().await);
    registry.close_all().await;
    result
}
