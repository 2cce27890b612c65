use super::{ensure_success, LLMClient};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

/// Client for the Ollama native API.
pub struct OllamaClient {
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn options(config: &LLMConfig) -> Option<ChatOptions> {
        if config.temperature.is_none() && config.max_tokens.is_none() {
            return None;
        }
        Some(ChatOptions {
            temperature: config.temperature,
            num_predict: config.max_tokens,
        })
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        let body = ChatRequest {
            model: &config.model,
            messages,
            stream: false,
            options: Self::options(config),
        };

        debug!(model = %config.model, "Sending chat request to Ollama");

        let response = self
            .client
            .post(config.endpoint("api/chat"))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Request failed: {}", e)))?;

        let parsed: ChatResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        Ok(parsed.message.content)
    }

    async fn embed(&self, config: &LLMConfig, text: &str) -> Result<Vec<f32>> {
        let body = EmbeddingRequest {
            model: &config.model,
            prompt: text,
        };

        let response = self
            .client
            .post(config.endpoint("api/embeddings"))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Embedding request failed: {}", e)))?;

        let parsed: EmbeddingResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse embedding: {}", e)))?;

        if parsed.embedding.is_empty() {
            return Err(AppError::LLMError(format!(
                "Model '{}' returned an empty embedding",
                config.model
            )));
        }
        Ok(parsed.embedding)
    }

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>> {
        let response = self
            .client
            .get(config.endpoint("api/tags"))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Request failed: {}", e)))?;

        let parsed: TagsResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn config_for(server: &Server, model: &str) -> LLMConfig {
        LLMConfig {
            base_url: server.url(),
            model: model.to_string(),
            ..LLMConfig::default()
        }
    }

    #[tokio::test]
    async fn test_generate_reads_message_content() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::PartialJson(json!({
                "model": "llama3.1",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "be terse"},
                    {"role": "user", "content": "hi"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": {"role": "assistant", "content": "hello"}, "done": true}"#)
            .create_async()
            .await;

        let client = OllamaClient::new();
        let reply = client
            .generate(&config_for(&server, "llama3.1"), "be terse", "hi")
            .await
            .unwrap();

        assert_eq!(reply, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_surfaces_api_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(404)
            .with_body(r#"{"error": "model 'missing' not found"}"#)
            .create_async()
            .await;

        let err = OllamaClient::new()
            .generate(&config_for(&server, "missing"), "", "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::LLMError(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_embed_returns_vector() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/embeddings")
            .match_body(Matcher::PartialJson(
                json!({"model": "nomic-embed-text", "prompt": "orders"}),
            ))
            .with_status(200)
            .with_body(r#"{"embedding": [0.1, 0.2, 0.3]}"#)
            .create_async()
            .await;

        let vector = OllamaClient::new()
            .embed(&config_for(&server, "nomic-embed-text"), "orders")
            .await
            .unwrap();

        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_list_models() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models": [{"name": "llama3.1:latest"}, {"name": "nomic-embed-text:latest"}]}"#)
            .create_async()
            .await;

        let models = OllamaClient::new()
            .list_models(&config_for(&server, ""))
            .await
            .unwrap();

        assert_eq!(models, vec!["llama3.1:latest", "nomic-embed-text:latest"]);
    }
}
