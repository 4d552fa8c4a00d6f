//! Inference backend settings

use serde::{Deserialize, Serialize};

use sales_coach_core::GenerationParams;

use crate::ConfigError;

/// Inference backends
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmSettings {
    #[serde(default)]
    pub local: LocalModelSettings,

    #[serde(default)]
    pub remote: RemoteModelSettings,
}

/// Device preference for the on-device model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Probe for an accelerator at startup, fall back to CPU
    #[default]
    Auto,
    Gpu,
    Cpu,
}

/// On-device model (served by a local Ollama runtime)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_local_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_local_model")]
    pub model: String,

    #[serde(default)]
    pub device: DevicePreference,

    #[serde(default = "default_local_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,

    /// How long the runtime keeps the model loaded between calls
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,

    /// Transport timeout; the orchestrator deadline is usually much shorter
    #[serde(default = "default_local_request_timeout")]
    pub request_timeout_secs: u64,

    /// Warm-up retry interval while the runtime is not ready; 0 disables
    #[serde(default = "default_readiness_check")]
    pub readiness_check_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_local_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_local_model() -> String {
    "qwen2.5:1.5b-instruct".to_string()
}
fn default_local_max_tokens() -> usize {
    150
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_top_k() -> u32 {
    40
}
fn default_repeat_penalty() -> f32 {
    1.1
}
fn default_keep_alive() -> String {
    "5m".to_string()
}
fn default_local_request_timeout() -> u64 {
    10
}
fn default_readiness_check() -> u64 {
    30
}

impl Default for LocalModelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_local_endpoint(),
            model: default_local_model(),
            device: DevicePreference::Auto,
            max_tokens: default_local_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repeat_penalty: default_repeat_penalty(),
            keep_alive: default_keep_alive(),
            request_timeout_secs: default_local_request_timeout(),
            readiness_check_secs: default_readiness_check(),
        }
    }
}

impl LocalModelSettings {
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            repeat_penalty: self.repeat_penalty,
        }
    }
}

/// Remote OpenAI-compatible model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteModelSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_remote_endpoint")]
    pub endpoint: String,

    /// Set via `SALES_COACH__LLM__REMOTE__API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_remote_model")]
    pub model: String,

    #[serde(default = "default_remote_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Persona label passed with every completion request
    #[serde(default)]
    pub persona: Option<String>,
}

fn default_remote_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_remote_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_remote_max_tokens() -> usize {
    300
}
fn default_remote_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

impl Default for RemoteModelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_remote_endpoint(),
            api_key: None,
            model: default_remote_model(),
            max_tokens: default_remote_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_remote_timeout(),
            max_retries: default_max_retries(),
            persona: None,
        }
    }
}

impl LlmSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, temperature) in [
            ("llm.local.temperature", self.local.temperature),
            ("llm.remote.temperature", self.remote.temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::invalid(
                    field,
                    format!("Must be between 0.0 and 2.0, got {}", temperature),
                ));
            }
        }
        if self.local.max_tokens == 0 || self.remote.max_tokens == 0 {
            return Err(ConfigError::invalid("llm.max_tokens", "Must be greater than 0"));
        }
        if self.remote.enabled && self.remote.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("llm.remote.endpoint".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_params_from_settings() {
        let settings = LocalModelSettings {
            max_tokens: 64,
            top_k: 20,
            ..Default::default()
        };
        let params = settings.generation_params();
        assert_eq!(params.max_tokens, 64);
        assert_eq!(params.top_k, 20);
        assert_eq!(params.repeat_penalty, settings.repeat_penalty);
    }

    #[test]
    fn test_temperature_validation() {
        let mut settings = LlmSettings::default();
        assert!(settings.validate().is_ok());
        settings.remote.temperature = 3.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_device_preference_serde() {
        let pref: DevicePreference = serde_json::from_str("\"cpu\"").unwrap();
        assert_eq!(pref, DevicePreference::Cpu);
        assert_eq!(DevicePreference::default(), DevicePreference::Auto);
    }
}
