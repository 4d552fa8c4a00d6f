//! Inference collaborator traits

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Result;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::System => write!(f, "system"),
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Role-tagged chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Compute device used by the on-device model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    Gpu,
    Cpu,
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Gpu => write!(f, "gpu"),
            ComputeDevice::Cpu => write!(f, "cpu"),
        }
    }
}

/// Generation parameters for the on-device model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repeat_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 150,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
        }
    }
}

/// Remote text-inference collaborator
///
/// Used for cloud-path suggestion generation and conversation-insight
/// extraction. Must tolerate sub-second call intervals during a call.
#[async_trait]
pub trait RemoteInference: Send + Sync + 'static {
    /// Complete a conversation. `persona` is an optional label the backend
    /// may use to frame its answers.
    async fn complete(&self, messages: &[ChatMessage], persona: Option<&str>) -> Result<String>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

/// On-device text-inference collaborator
#[async_trait]
pub trait LocalInference: Send + Sync + 'static {
    /// Generate text for a single prompt
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Whether the model is loaded and ready to serve requests
    fn is_ready(&self) -> bool;

    /// Device the model runs on (detected at startup)
    fn device(&self) -> ComputeDevice;

    /// Model name for logging
    fn model_name(&self) -> &str;
}
