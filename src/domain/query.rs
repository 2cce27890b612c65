use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /execute_query/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 64))]
    pub db_type: String,
    #[validate(length(min = 1, max = 4096))]
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub sql_query: String,
    pub response: String,
}

impl QueryResponse {
    pub fn new(response: impl Into<String>, sql_query: impl Into<String>) -> Self {
        Self {
            sql_query: sql_query.into(),
            response: response.into(),
        }
    }
}

/// Body of `POST /analyze_logs/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRequest {
    pub logs: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogResponse {
    pub summary: String,
}
