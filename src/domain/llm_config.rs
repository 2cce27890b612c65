use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    Ollama,
    #[serde(alias = "openai-compatible")]
    OpenAI,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub base_url: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_request_timeout() -> u64 {
    60
}

impl LLMConfig {
    /// Same endpoint and credentials, different model.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Joins `path` onto the base URL regardless of trailing slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Models used by the natural-language query pipeline.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseQueryModels {
    pub query_model: String,
    pub summary_model: String,
    pub embedding_model: String,
}

/// Models used by the log analysis pipeline.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SummarizeErrorsModels {
    pub summary_model: String,
    pub embedding_model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelsConfig {
    pub database_query: DatabaseQueryModels,
    pub summarize_errors: SummarizeErrorsModels,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            database_query: DatabaseQueryModels {
                query_model: "llama3.1".to_string(),
                summary_model: "llama3.1".to_string(),
                embedding_model: "nomic-embed-text".to_string(),
            },
            summarize_errors: SummarizeErrorsModels {
                summary_model: "llama3.1".to_string(),
                embedding_model: "nomic-embed-text".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_handles_trailing_slash() {
        let mut config = LLMConfig::default();
        assert_eq!(config.endpoint("/api/chat"), "http://localhost:11434/api/chat");
        config.base_url = "http://localhost:11434/".to_string();
        assert_eq!(config.endpoint("api/chat"), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_with_model_keeps_endpoint() {
        let config = LLMConfig {
            api_key: Some("k".to_string()),
            ..LLMConfig::default()
        };
        let derived = config.with_model("sqlcoder");
        assert_eq!(derived.model, "sqlcoder");
        assert_eq!(derived.base_url, config.base_url);
        assert_eq!(derived.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_provider_deserializes_lowercase() {
        let provider: LLMProvider = serde_json::from_str("\"ollama\"").unwrap();
        assert_eq!(provider, LLMProvider::Ollama);
        let provider: LLMProvider = serde_json::from_str("\"openai-compatible\"").unwrap();
        assert_eq!(provider, LLMProvider::OpenAI);
    }
}
