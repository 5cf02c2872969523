//! Backend for the Ollama HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::base::ChatBackend;
use crate::types::config::LlmConfig;
use crate::types::messages::ChatMessage;
use crate::{InstabilityError, InstabilityResult};

/// Client for a local (or remote) Ollama server.
pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f64,
    api_key: Option<String>,
    client: Client,
}

impl OllamaClient {
    /// Creates a client for `base_url` using `model`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            temperature: 0.1,
            api_key: None,
            client: Client::new(),
        }
    }

    /// Creates a client from configuration.
    pub fn from_config(config: &LlmConfig) -> InstabilityResult<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: config.api_key(),
            client,
        })
    }

    /// Overrides the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the bearer token sent with every request.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Base URL without a trailing slash or `/v1` suffix.
    fn base(&self) -> &str {
        let base = self.base_url.trim_end_matches('/');
        base.strip_suffix("/v1").unwrap_or(base)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

// ============================================================================
// Ollama API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

// ============================================================================
// ChatBackend Implementation
// ============================================================================

#[async_trait]
impl ChatBackend for OllamaClient {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> InstabilityResult<Vec<String>> {
        let url = format!("{}/api/tags", self.base());
        let resp = self.authorize(self.client.get(&url)).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(InstabilityError::Llm(format!(
                "Ollama API error ({}): {}",
                status, text
            )));
        }

        let tags: OllamaTagsResponse = resp.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn chat(&self, messages: &[ChatMessage]) -> InstabilityResult<String> {
        let url = format!("{}/api/chat", self.base());
        let body = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "Sending chat request");

        let resp = self.authorize(self.client.post(&url)).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(InstabilityError::Llm(format!(
                "Ollama API error ({}): {}",
                status, text
            )));
        }

        let api_resp: OllamaChatResponse = resp.json().await?;
        api_resp
            .message
            .map(|m| m.content)
            .ok_or_else(|| InstabilityError::Llm("Response contained no message".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_strips_v1_and_slash() {
        let client = OllamaClient::new("http://localhost:11434/v1/", "qwen3:8b");
        assert_eq!(client.base(), "http://localhost:11434");
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hello")];
        let body = OllamaChatRequest {
            model: "qwen3:8b",
            messages: &messages,
            stream: false,
            options: OllamaOptions { temperature: 0.1 },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "qwen3:8b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["options"]["temperature"], 0.1);
    }

    #[test]
    fn test_from_config_reads_model() {
        let config = LlmConfig {
            model: "phi3:14b".to_string(),
            ..LlmConfig::default()
        };
        let client = OllamaClient::from_config(&config).unwrap();
        assert_eq!(client.model(), "phi3:14b");
        assert_eq!(client.name(), "Ollama");
    }
}
