use super::chunking::TokenTextSplitter;
use super::summarizer::RefineSummarizer;
use crate::domain::error::Result;
use crate::domain::llm_config::{LLMConfig, SummarizeErrorsModels};
use crate::infrastructure::llm_clients::LLMClient;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::info;

pub const NO_CRITICAL_ERRORS: &str = "No critical errors found.";

pub const SUMMARY_QUERY: &str = "Provide a concise summary of the following error logs and propose potential fixes for the observed issues:";

static ERROR_MARKER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)- ERROR - (.*)").unwrap());

/// Everything after the first `- ERROR - ` marker, trimmed.
pub fn extract_errors(logs: &str) -> Option<String> {
    let extracted = ERROR_MARKER_PATTERN
        .captures(logs)
        .map(|caps| caps[1].trim().to_string());
    info!("Extracted errors from logs.");
    extracted
}

pub struct LogAnalysisUseCase {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    llm: LLMConfig,
    models: SummarizeErrorsModels,
    splitter: TokenTextSplitter,
}

impl LogAnalysisUseCase {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        llm: LLMConfig,
        models: SummarizeErrorsModels,
    ) -> Self {
        Self {
            llm_client,
            llm,
            models,
            splitter: TokenTextSplitter::default(),
        }
    }

    pub async fn summarize_errors(&self, logs: &str) -> Result<String> {
        let Some(error_logs) = extract_errors(logs) else {
            info!("No critical errors found in logs.");
            return Ok(NO_CRITICAL_ERRORS.to_string());
        };

        let chunks = self.splitter.split_text(&error_logs);
        info!("Created {} document chunks for log analysis.", chunks.len());

        let summarizer = RefineSummarizer::new(
            self.llm_client.clone(),
            self.llm.with_model(&self.models.summary_model),
        );
        let summary = summarizer.summarize(SUMMARY_QUERY, &chunks).await?;

        info!("Generated log summary.");
        Ok(summary)
    }
}
