//! Response synthesis over text chunks.
//!
//! `AccumulateSummarizer` answers the query once per chunk and concatenates
//! the answers. `RefineSummarizer` packs chunks into as few prompts as fit
//! the context window, answers the first and refines that answer with each
//! following window.

use super::chunking::TokenTextSplitter;
use crate::domain::error::Result;
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::clean_llm_response;
use crate::shared::token_counter::TokenCounter;
use std::sync::Arc;
use tracing::{debug, info};

pub const ACCUMULATE_SEPARATOR: &str = "\n---------------------\n";

/// Answer when there is no text to summarize.
pub const EMPTY_RESPONSE: &str = "Empty Response";

const QA_SYSTEM_PROMPT: &str = "You are an expert Q&A system that is trusted around the world.
Always answer the query using the provided context information, and not prior knowledge.
Some rules to follow:
1. Never directly reference the given context in your answer.
2. Avoid statements like 'Based on the context, ...' or 'The context information ...' or anything along those lines.";

const TEXT_QA_TEMPLATE: &str = "Context information is below.
---------------------
{context_str}
---------------------
Given the context information and not prior knowledge, answer the query.
Query: {query_str}
Answer: ";

const REFINE_TEMPLATE: &str = "The original query is as follows: {query_str}
We have provided an existing answer: {existing_answer}
We have the opportunity to refine the existing answer (only if needed) with some more context below.
------------
{context_msg}
------------
Given the new context, refine the original answer to better answer the query. If the context isn't useful, return the original answer.
Refined Answer: ";

pub fn text_qa_prompt(context: &str, query: &str) -> String {
    TEXT_QA_TEMPLATE
        .replace("{context_str}", context)
        .replace("{query_str}", query)
}

pub fn refine_prompt(query: &str, existing_answer: &str, context: &str) -> String {
    REFINE_TEMPLATE
        .replace("{query_str}", query)
        .replace("{existing_answer}", existing_answer)
        .replace("{context_msg}", context)
}

/// Prompt budget shared by both summarizers.
#[derive(Debug, Clone, Copy)]
pub struct ContextBudget {
    pub context_window: usize,
    pub num_output: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            context_window: 3900,
            num_output: 256,
        }
    }
}

impl ContextBudget {
    /// Tokens left for context text once `scaffold` and the system prompt
    /// are accounted for. Never below one token.
    fn available(&self, scaffold: &str) -> usize {
        let used = TokenCounter::estimate_tokens(scaffold)
            + TokenCounter::estimate_tokens(QA_SYSTEM_PROMPT);
        TokenCounter::estimate_remaining(used, self.context_window, self.num_output).max(1)
    }

    fn splitter(&self, available: usize) -> Result<TokenTextSplitter> {
        TokenTextSplitter::new(available, available / 10)
    }
}

pub struct AccumulateSummarizer {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
    budget: ContextBudget,
}

impl AccumulateSummarizer {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>, config: LLMConfig) -> Self {
        Self {
            llm_client,
            config,
            budget: ContextBudget::default(),
        }
    }

    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    pub async fn summarize(&self, query: &str, text_chunks: &[String]) -> Result<String> {
        let available = self.budget.available(&text_qa_prompt("", query));
        let splitter = self.budget.splitter(available)?;

        let mut outputs = Vec::new();
        for chunk in text_chunks {
            for piece in splitter.split_text(chunk) {
                let prompt = text_qa_prompt(&piece, query);
                let answer = self
                    .llm_client
                    .generate(&self.config, QA_SYSTEM_PROMPT, &prompt)
                    .await?;
                outputs.push(clean_llm_response(&answer));
            }
        }

        debug!("Accumulated {} answer(s)", outputs.len());
        if outputs.is_empty() {
            return Ok(EMPTY_RESPONSE.to_string());
        }
        Ok(outputs.join(ACCUMULATE_SEPARATOR))
    }
}

pub struct RefineSummarizer {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
    budget: ContextBudget,
}

impl RefineSummarizer {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>, config: LLMConfig) -> Self {
        Self {
            llm_client,
            config,
            budget: ContextBudget::default(),
        }
    }

    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    pub async fn summarize(&self, query: &str, chunks: &[String]) -> Result<String> {
        let qa_windows = self.compact(chunks, self.initial_available(query))?;
        let Some((first, rest)) = qa_windows.split_first() else {
            return Ok(EMPTY_RESPONSE.to_string());
        };

        let prompt = text_qa_prompt(first, query);
        let mut answer = clean_llm_response(
            &self
                .llm_client
                .generate(&self.config, QA_SYSTEM_PROMPT, &prompt)
                .await?,
        );

        for window in rest {
            // The refine scaffold grows with the answer, so re-pack each window against it.
            let available = self.budget.available(&refine_prompt(query, &answer, ""));
            for piece in self.compact(std::slice::from_ref(window), available)? {
                let prompt = refine_prompt(query, &answer, &piece);
                let refined = self
                    .llm_client
                    .generate(&self.config, QA_SYSTEM_PROMPT, &prompt)
                    .await?;
                answer = clean_llm_response(&refined);
            }
        }

        info!("Refined answer over {} window(s)", qa_windows.len());
        Ok(answer)
    }

    /// Windows are first packed against the larger of the two scaffolds.
    fn initial_available(&self, query: &str) -> usize {
        let qa = text_qa_prompt("", query);
        let refine = refine_prompt(query, "", "");
        if TokenCounter::estimate_tokens(&qa) >= TokenCounter::estimate_tokens(&refine) {
            self.budget.available(&qa)
        } else {
            self.budget.available(&refine)
        }
    }

    /// Joins consecutive chunks into windows of at most `available` tokens.
    /// A single chunk over budget is split on its own.
    fn compact(&self, chunks: &[String], available: usize) -> Result<Vec<String>> {
        let splitter = self.budget.splitter(available)?;
        let mut windows = Vec::new();
        let mut current = String::new();

        for chunk in chunks {
            let chunk = chunk.trim();
            if chunk.is_empty() {
                continue;
            }
            let candidate = if current.is_empty() {
                chunk.to_string()
            } else {
                format!("{}\n\n{}", current, chunk)
            };
            if TokenCounter::estimate_tokens(&candidate) <= available {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                windows.push(std::mem::take(&mut current));
            }
            if TokenCounter::estimate_tokens(chunk) <= available {
                current = chunk.to_string();
            } else {
                windows.extend(splitter.split_text(chunk));
            }
        }

        if !current.is_empty() {
            windows.push(current);
        }
        Ok(windows)
    }
}
