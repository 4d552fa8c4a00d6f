//! Configuration management for the sales coaching engine
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default.*`, `config/{env}.*`)
//! - Environment variables (`SALES_COACH__` prefix, `__` separator)
//! - Built-in defaults for every field
//!
//! Prompt framing per call type lives in [`prompts`] so it can be tuned
//! without touching the inference core.

pub mod coach;
pub mod llm;
pub mod prompts;
pub mod settings;

pub use coach::{ContextSettings, LearningSettings, OrchestratorSettings};
pub use llm::{DevicePreference, LlmSettings, LocalModelSettings, RemoteModelSettings};
pub use prompts::{CallTypeFraming, PromptsConfig};
pub use settings::{
    load_settings, load_settings_from, ObservabilityConfig, PersistenceBackend, PersistenceConfig,
    RuntimeEnvironment, ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
