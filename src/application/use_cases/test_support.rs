//! Scripted LLM used by the use case tests.

use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedPrompt {
    pub model: String,
    pub system: String,
    pub user: String,
}

#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    embeddings: Vec<(String, Vec<f32>)>,
    prompts: Mutex<Vec<RecordedPrompt>>,
    embed_calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(text.to_string());
        self
    }

    /// Texts containing `needle` embed to `vector`; others to a fixed fallback.
    pub fn embedding(mut self, needle: &str, vector: Vec<f32>) -> Self {
        self.embeddings.push((needle.to_string(), vector));
        self
    }

    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMClient for ScriptedLlm {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(RecordedPrompt {
            model: config.model.clone(),
            system: system.to_string(),
            user: user.to_string(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::LLMError("no scripted reply left".to_string()))
    }

    async fn embed(&self, _config: &LLMConfig, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .embeddings
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
    }

    async fn list_models(&self, _config: &LLMConfig) -> Result<Vec<String>> {
        Ok(vec!["scripted".to_string()])
    }
}
