use super::sql_generator::SqlGenerator;
use super::sql_guard::SqlGuard;
use super::summarizer::AccumulateSummarizer;
use super::table_retriever::TableRetriever;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{DatabaseQueryModels, LLMConfig};
use crate::domain::query::QueryResponse;
use crate::domain::table_schema::TableSchema;
use crate::infrastructure::config::load_table_config;
use crate::infrastructure::db::postgres::{format_row, quote_text, QueryRows};
use crate::infrastructure::db::EngineSource;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

pub const NO_SQL_GENERATED: &str = "No SQL query generated.";
pub const UNSAFE_SQL: &str = "Generated SQL query is potentially unsafe and was not executed.";
pub const EXECUTION_FAILED: &str = "Error executing SQL query.";
pub const CONNECTION_FAILED: &str = "Failed to connect to the database";

const TABLE_TOP_K: usize = 1;

/// Answers a natural-language question by generating, checking, running and
/// summarizing one SQL query against the database named by `db_type`.
pub struct DatabaseQueryUseCase {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    engines: Arc<dyn EngineSource>,
    llm: LLMConfig,
    models: DatabaseQueryModels,
    guard: SqlGuard,
    table_config_path: PathBuf,
    retrievers: RwLock<HashMap<String, Arc<TableRetriever>>>,
}

impl DatabaseQueryUseCase {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        engines: Arc<dyn EngineSource>,
        llm: LLMConfig,
        models: DatabaseQueryModels,
        guard: SqlGuard,
        table_config_path: PathBuf,
    ) -> Self {
        Self {
            llm_client,
            engines,
            llm,
            models,
            guard,
            table_config_path,
            retrievers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn execute(&self, db_type: &str, question: &str) -> Result<QueryResponse> {
        let engine = self.engines.engine(db_type).await.map_err(|e| {
            error!(db_type = %db_type, "Failed to connect to the database: {}", e);
            AppError::DatabaseError(CONNECTION_FAILED.to_string())
        })?;

        let tables = load_table_config(&self.table_config_path, db_type);
        let retriever = self.retriever_for(db_type, tables).await;
        let selected = retriever.retrieve(question, TABLE_TOP_K).await?;

        let mut schema_blocks = Vec::with_capacity(selected.len());
        for table in &selected {
            let description = engine.describe_table(&table.table_name).await?;
            schema_blocks.push(description.render(&table.context));
        }
        let schema_text = schema_blocks.join("\n\n");

        let generator = SqlGenerator::new(
            self.llm_client.clone(),
            self.llm.with_model(&self.models.query_model),
            engine.dialect(),
        );
        let Some(generated_sql) = generator.generate(question, &schema_text).await? else {
            error!(db_type = %db_type, "No SQL query generated for query: {}", question);
            return Ok(QueryResponse::new(NO_SQL_GENERATED, ""));
        };

        if !self.validate_sql_query(&generated_sql) {
            error!(db_type = %db_type, "Generated SQL query is unsafe: {}", generated_sql);
            return Ok(QueryResponse::new(UNSAFE_SQL, generated_sql));
        }

        let sql = clean_sql_query(&generated_sql);

        let rows = match engine.execute(&sql).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(db_type = %db_type, "Error executing SQL query {}: {}", sql, e);
                return Ok(QueryResponse::new(EXECUTION_FAILED, sql));
            }
        };

        let formatted = format_results(&rows);
        let summarizer = AccumulateSummarizer::new(
            self.llm_client.clone(),
            self.llm.with_model(&self.models.summary_model),
        );
        let summary = summarizer
            .summarize(question, &[results_as_text(&formatted)])
            .await?;

        info!(db_type = %db_type, rows = rows.row_count(), "Generated summary response for query");
        Ok(QueryResponse::new(summary.trim(), sql))
    }

    /// Rejects statements matching any deny pattern.
    pub fn validate_sql_query(&self, sql: &str) -> bool {
        self.guard.is_safe(sql)
    }

    /// Reuses the retriever (and its cached embeddings) while the configured
    /// tables for `db_type` are unchanged.
    async fn retriever_for(&self, db_type: &str, tables: Vec<TableSchema>) -> Arc<TableRetriever> {
        let key = db_type.to_lowercase();
        if let Some(existing) = self.retrievers.read().await.get(&key) {
            if existing.tables() == tables.as_slice() {
                return existing.clone();
            }
        }

        let retriever = Arc::new(TableRetriever::new(
            self.llm_client.clone(),
            self.llm.with_model(&self.models.embedding_model),
            tables,
        ));
        self.retrievers.write().await.insert(key, retriever.clone());
        retriever
    }
}

pub fn clean_sql_query(sql: &str) -> String {
    let cleaned = response::clean_sql_query(sql);
    info!("Cleaned SQL query: {}", cleaned);
    cleaned
}

/// One tuple-style line per row.
pub fn format_results(rows: &QueryRows) -> Vec<String> {
    rows.rows.iter().map(|row| format_row(row)).collect()
}

/// Renders formatted rows as a single list literal for the summarizer,
/// e.g. `["('Alice', 3)", "('Bob', 1)"]`.
pub fn results_as_text(formatted: &[String]) -> String {
    let items: Vec<String> = formatted.iter().map(|s| quote_text(s)).collect();
    format!("[{}]", items.join(", "))
}
