//! Terminal client for the HTTP API: the "Ask me!" and "Analyze Logs"
//! workflows.

use crate::domain::error::{AppError, Result};
use crate::domain::query::{LogRequest, LogResponse, QueryRequest, QueryResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

pub const EMPTY_QUERY_WARNING: &str = "Please enter a query before submitting.";
pub const EMPTY_LOGS_WARNING: &str = "Please paste log data before analyzing.";

#[derive(Deserialize)]
struct ErrorDetail {
    detail: String,
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn execute_query(&self, db_type: &str, question: &str) -> Result<QueryResponse> {
        let body = QueryRequest {
            db_type: db_type.to_string(),
            question: question.to_string(),
        };
        self.post("execute_query/", &body).await
    }

    pub async fn analyze_logs(&self, logs: &str) -> Result<LogResponse> {
        let body = LogRequest {
            logs: logs.to_string(),
        };
        self.post("analyze_logs/", &body).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorDetail>(&text)
                .map(|d| d.detail)
                .unwrap_or(text);
            return Err(AppError::Internal(format!(
                "{} {}",
                status.as_u16(),
                detail
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse JSON: {}", e)))
    }
}

/// Reads log text from `path`, or from stdin when absent or `-`.
pub fn read_logs(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => Ok(std::fs::read_to_string(p)?),
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

pub fn render_query_response(response: &QueryResponse) -> String {
    format!(
        "Executed SQL Query:\n{}\n\nSummary:\n{}",
        response.sql_query, response.response
    )
}

pub fn render_log_response(response: &LogResponse) -> String {
    format!("Error Summary & Fix Suggestions:\n{}", response.summary)
}

/// Runs the "Ask me!" flow. `Ok(None)` means the input was empty and nothing
/// was sent.
pub async fn ask(api_url: &str, db_type: &str, question: &str) -> Result<Option<String>> {
    if question.trim().is_empty() {
        return Ok(None);
    }
    let client = ApiClient::new(api_url)?;
    let response = client.execute_query(db_type, question).await?;
    Ok(Some(render_query_response(&response)))
}

pub async fn analyze_logs(api_url: &str, logs: &str) -> Result<Option<String>> {
    if logs.trim().is_empty() {
        return Ok(None);
    }
    let client = ApiClient::new(api_url)?;
    let response = client.analyze_logs(logs).await?;
    Ok(Some(render_log_response(&response)))
}
