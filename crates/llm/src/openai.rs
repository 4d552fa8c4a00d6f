//! OpenAI-compatible remote backend
//!
//! Works with OpenAI, Azure OpenAI in compatibility mode, vLLM and any
//! other server exposing `/chat/completions`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use sales_coach_config::RemoteModelSettings;
use sales_coach_core::{ChatMessage, RemoteInference};

use crate::LlmError;

/// Configuration for OpenAI-compatible backends
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 300,
            temperature: 0.7,
            top_p: 0.9,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

impl From<&RemoteModelSettings> for OpenAIConfig {
    fn from(settings: &RemoteModelSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone().unwrap_or_default(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
            timeout: Duration::from_secs(settings.timeout_secs),
            max_retries: settings.max_retries,
            ..Default::default()
        }
    }
}

/// OpenAI-compatible `RemoteInference`
pub struct OpenAIBackend {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() && !is_local_endpoint(&config.endpoint) {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !self.config.api_key.is_empty() {
            if let Ok(val) = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)) {
                headers.insert(AUTHORIZATION, val);
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn build_request(&self, messages: &[ChatMessage], persona: Option<&str>) -> OpenAIChatRequest {
        let mut wire: Vec<OpenAIMessage> = Vec::with_capacity(messages.len() + 1);
        if let Some(persona) = persona.map(str::trim).filter(|p| !p.is_empty()) {
            wire.push(OpenAIMessage {
                role: "system".to_string(),
                content: format!("Persona: {}", persona),
            });
        }
        wire.extend(messages.iter().map(|m| OpenAIMessage {
            role: m.role.to_string(),
            content: m.content.clone(),
        }));

        OpenAIChatRequest {
            model: self.config.model.clone(),
            messages: wire,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            top_p: Some(self.config.top_p),
            stream: Some(false),
        }
    }

    async fn execute_request(&self, request: &OpenAIChatRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.chat_url())
            .headers(self.build_headers())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(LlmError::Network(format!("HTTP {}: {}", status, error_text)));
            }
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let response: OpenAIChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))
    }
}

#[async_trait]
impl RemoteInference for OpenAIBackend {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        persona: Option<&str>,
    ) -> sales_coach_core::Result<String> {
        let request = self.build_request(messages, persona);
        let start = Instant::now();
        let mut last_error = None;
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    "Remote completion failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    self.config.max_retries
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute_request(&request).await {
                Ok(text) => {
                    tracing::debug!(
                        model = %self.config.model,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Remote completion finished"
                    );
                    return Ok(text);
                }
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Network("Max retries exceeded".to_string()))
            .into())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn is_local_endpoint(endpoint: &str) -> bool {
    endpoint.starts_with("http://localhost") || endpoint.starts_with("http://127.0.0.1")
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_backend() -> OpenAIBackend {
        OpenAIBackend::new(OpenAIConfig {
            endpoint: "http://127.0.0.1:1/v1/".to_string(),
            max_retries: 0,
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_remote_endpoint_requires_key() {
        assert!(OpenAIBackend::new(OpenAIConfig::default()).is_err());
        let config = OpenAIConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        };
        assert!(OpenAIBackend::new(config).is_ok());
    }

    #[test]
    fn test_chat_url() {
        assert_eq!(local_backend().chat_url(), "http://127.0.0.1:1/v1/chat/completions");
    }

    #[test]
    fn test_persona_rendered_as_leading_system_message() {
        let backend = local_backend();
        let messages = vec![ChatMessage::system("coach"), ChatMessage::user("hi")];
        let request = backend.build_request(&messages, Some("Enterprise AE"));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 3);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "Persona: Enterprise AE");
        assert_eq!(json["messages"][2]["role"], "user");

        let without = backend.build_request(&messages, Some("  "));
        assert_eq!(without.messages.len(), 2);
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Ask about budget"},"finish_reason":"stop"}]}"#;
        let parsed: OpenAIChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Ask about budget"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let backend = local_backend();
        let result = backend.complete(&[ChatMessage::user("hi")], None).await;
        assert!(matches!(result, Err(sales_coach_core::Error::Llm(_))));
    }
}
