//! On-device model served by a local Ollama runtime
//!
//! The backend is created cold. `warm_up()` checks that the runtime is
//! reachable and flips the readiness flag the orchestrator consults
//! before attempting the local path. A connection failure during
//! generation clears the flag; the readiness monitor sets it again once the
//! runtime answers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use sales_coach_config::LocalModelSettings;
use sales_coach_core::{ComputeDevice, GenerationParams, LocalInference};

use crate::device::detect_device;
use crate::LlmError;

/// Ollama backend configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub model: String,
    /// Keep the model loaded between calls ("5m", "1h", "-1")
    pub keep_alive: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "qwen2.5:1.5b-instruct".to_string(),
            keep_alive: "5m".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 1,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl From<&LocalModelSettings> for OllamaConfig {
    fn from(settings: &LocalModelSettings) -> Self {
        Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            keep_alive: settings.keep_alive.clone(),
            timeout: Duration::from_secs(settings.request_timeout_secs),
            ..Default::default()
        }
    }
}

/// Ollama-backed `LocalInference`
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
    device: ComputeDevice,
    ready: AtomicBool,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig, device: ComputeDevice) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            device,
            ready: AtomicBool::new(false),
        })
    }

    /// Build from settings, resolving the compute device
    pub fn from_settings(settings: &LocalModelSettings) -> Result<Self, LlmError> {
        Self::new(settings.into(), detect_device(settings.device))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint, path)
    }

    /// Probe the runtime and update the readiness flag
    pub async fn warm_up(&self) -> bool {
        let started = Instant::now();
        let ready = match self.list_models().await {
            Ok(models) => {
                let loaded = models.iter().any(|m| model_matches(m, &self.config.model));
                if !loaded {
                    tracing::warn!(
                        model = %self.config.model,
                        available = ?models,
                        "Local runtime reachable but model not pulled"
                    );
                }
                loaded
            }
            Err(e) => {
                tracing::warn!(endpoint = %self.config.endpoint, error = %e, "Local runtime unreachable");
                false
            }
        };

        self.ready.store(ready, Ordering::SeqCst);
        tracing::info!(
            model = %self.config.model,
            device = %self.device,
            ready,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Local model warm-up finished"
        );
        ready
    }

    fn mark_unready(&self) {
        if self.ready.swap(false, Ordering::SeqCst) {
            tracing::warn!(model = %self.config.model, "Local runtime lost; waiting for readiness monitor");
        }
    }

    /// Re-run `warm_up` every `interval` while the backend is not ready
    ///
    /// The task holds a weak reference and ends once the backend is dropped.
    pub fn spawn_readiness_monitor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let backend: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(backend) = backend.upgrade() else {
                    break;
                };
                if !backend.is_ready() {
                    backend.warm_up().await;
                }
            }
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self.client.get(self.api_url("/tags")).send().await?;
        if !response.status().is_success() {
            return Err(LlmError::Api(format!("HTTP {}", response.status())));
        }
        let tags: OllamaTagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn build_request(&self, prompt: &str, params: &GenerationParams) -> OllamaGenerateRequest {
        OllamaGenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                num_predict: params.max_tokens as i32,
                temperature: params.temperature,
                top_p: params.top_p,
                top_k: params.top_k,
                repeat_penalty: params.repeat_penalty,
                num_gpu: match self.device {
                    ComputeDevice::Cpu => Some(0),
                    ComputeDevice::Gpu => None,
                },
            },
            keep_alive: Some(self.config.keep_alive.clone()),
        }
    }

    async fn execute_request(
        &self,
        request: &OllamaGenerateRequest,
    ) -> Result<OllamaGenerateResponse, LlmError> {
        let response = self
            .client
            .post(self.api_url("/generate"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            // 5xx errors are retryable, 4xx are not
            if status.is_server_error() {
                return Err(LlmError::Network(format!("Server error {}: {}", status, error)));
            }
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error)));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    async fn generate_with_retries(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, LlmError> {
        let request = self.build_request(prompt, params);
        let mut last_error = None;
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(?backoff, attempt, "Retrying local generation");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute_request(&request).await {
                Ok(result) => {
                    tracing::debug!(
                        model = %self.config.model,
                        tokens = result.eval_count.unwrap_or(0),
                        "Local generation complete"
                    );
                    return Ok(result.response);
                }
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Network("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl LocalInference for OllamaBackend {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> sales_coach_core::Result<String> {
        if !self.is_ready() {
            return Err(LlmError::Unavailable(format!("{} is not loaded", self.config.model)).into());
        }
        match self.generate_with_retries(prompt, params).await {
            Ok(text) => Ok(text),
            Err(e) => {
                if matches!(e, LlmError::Network(_)) {
                    self.mark_unready();
                }
                Err(e.into())
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn device(&self) -> ComputeDevice {
        self.device
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Ollama reports `name:tag`; a bare configured name matches `name:latest`
fn model_matches(available: &str, configured: &str) -> bool {
    available == configured
        || (!configured.contains(':') && available == format!("{}:latest", configured))
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: i32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    repeat_penalty: f32,
    /// Layers offloaded to the GPU; 0 forces CPU
    #[serde(skip_serializing_if = "Option::is_none")]
    num_gpu: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
}
