//! Inference backends
//!
//! Concrete implementations of the core inference collaborators:
//! - [`OllamaBackend`]: on-device model served by a local Ollama runtime
//!   (`LocalInference`), with compute device detection and a readiness flag
//! - [`OpenAIBackend`]: any OpenAI-compatible chat completions endpoint
//!   (`RemoteInference`)

pub mod device;
pub mod factory;
pub mod ollama;
pub mod openai;

pub use device::detect_device;
pub use factory::{local_from_settings, remote_from_settings};
pub use ollama::{OllamaBackend, OllamaConfig};
pub use openai::{OpenAIBackend, OpenAIConfig};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::Timeout)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for sales_coach_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unavailable(msg) => sales_coach_core::Error::Unavailable(msg),
            other => sales_coach_core::Error::Llm(other.to_string()),
        }
    }
}
