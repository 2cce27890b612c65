use super::{ensure_success, LLMClient};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Client for OpenAI-compatible endpoints (vLLM, LM Studio, llama.cpp server, ...).
pub struct OpenAIClient {
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        config: &LLMConfig,
        path: &str,
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, config.endpoint(path))
            .timeout(Duration::from_secs(config.request_timeout_secs));
        if let Some(api_key) = &config.api_key {
            request = request.bearer_auth(api_key);
        }
        request
    }
}

impl Default for OpenAIClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": user}));

        let body = json!({
            "model": config.model,
            "messages": messages,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
        });

        let response = self
            .request(reqwest::Method::POST, config, "chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Request failed: {}", e)))?;

        let json: serde_json::Value = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::LLMError("Invalid response format".to_string()))
    }

    async fn embed(&self, config: &LLMConfig, text: &str) -> Result<Vec<f32>> {
        let body = json!({
            "model": config.model,
            "input": text,
        });

        let response = self
            .request(reqwest::Method::POST, config, "embeddings")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Embedding request failed: {}", e)))?;

        let json: serde_json::Value = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        let values = json["data"][0]["embedding"].as_array().ok_or_else(|| {
            AppError::LLMError("Invalid response format: missing embedding".to_string())
        })?;

        Ok(values
            .iter()
            .filter_map(|v| v.as_f64())
            .map(|v| v as f32)
            .collect())
    }

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>> {
        let response = self
            .request(reqwest::Method::GET, config, "models")
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Request failed: {}", e)))?;

        let json: serde_json::Value = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        let models = json["data"]
            .as_array()
            .ok_or_else(|| {
                AppError::LLMError("Invalid response format: missing data array".to_string())
            })?
            .iter()
            .filter_map(|m| m["id"].as_str())
            .map(|id| id.to_string())
            .collect();

        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm_config::LLMProvider;
    use mockito::Server;

    fn config_for(server: &Server) -> LLMConfig {
        LLMConfig {
            provider: LLMProvider::OpenAI,
            base_url: format!("{}/v1", server.url()),
            model: "local-model".to_string(),
            api_key: Some("test-key".to_string()),
            ..LLMConfig::default()
        }
    }

    #[tokio::test]
    async fn test_generate_sends_bearer_and_reads_choice() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "SELECT 1;"}}]}"#)
            .create_async()
            .await;

        let reply = OpenAIClient::new()
            .generate(&config_for(&server), "sys", "question")
            .await
            .unwrap();

        assert_eq!(reply, "SELECT 1;");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_embed_reads_first_item() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_body(r#"{"data": [{"embedding": [1.0, 0.0]}]}"#)
            .create_async()
            .await;

        let vector = OpenAIClient::new()
            .embed(&config_for(&server), "text")
            .await
            .unwrap();
        assert_eq!(vector, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_invalid_format_is_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = OpenAIClient::new()
            .generate(&config_for(&server), "", "q")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid response format"));
    }
}
