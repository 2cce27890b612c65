use crate::domain::error::Result;
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::parse_sql_from_response;
use std::sync::Arc;
use tracing::{debug, warn};

const TEXT_TO_SQL_TEMPLATE: &str = "Given an input question, first create a syntactically correct {dialect} query to run, then look at the results of the query and return the answer. You can order the results by a relevant column to return the most interesting examples in the database.

Never query for all the columns from a specific table, only ask for a few relevant columns given the question.

Pay attention to use only the column names that you can see in the schema description. Be careful to not query for columns that do not exist. Pay attention to which column is in which table. Also, qualify column names with the table name when needed. You are required to use the following format, each taking one line:

Question: Question here
SQLQuery: SQL Query to run
SQLResult: Result of the SQLQuery
Answer: Final answer here

Only use tables listed below.
{schema}

Question: {query_str}
SQLQuery: ";

pub fn build_text_to_sql_prompt(dialect: &str, schema: &str, question: &str) -> String {
    TEXT_TO_SQL_TEMPLATE
        .replace("{dialect}", dialect)
        .replace("{schema}", schema)
        .replace("{query_str}", question)
}

/// Asks the query model for a single SQL statement answering a question
/// over the given schema.
pub struct SqlGenerator {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
    dialect: String,
}

impl SqlGenerator {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        config: LLMConfig,
        dialect: &str,
    ) -> Self {
        Self {
            llm_client,
            config,
            dialect: dialect.to_string(),
        }
    }

    pub async fn generate(&self, question: &str, schema_text: &str) -> Result<Option<String>> {
        let prompt = build_text_to_sql_prompt(&self.dialect, schema_text, question);
        debug!(model = %self.config.model, dialect = %self.dialect, "Generating SQL");

        let raw = self.llm_client.generate(&self.config, "", &prompt).await?;
        let sql = parse_sql_from_response(&raw);

        if sql.is_empty() {
            warn!("Query model returned no SQL");
            return Ok(None);
        }
        Ok(Some(sql))
    }
}
