//! Coaching core settings
//!
//! Orchestrator, context tracker and learning engine tunables.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Inference orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Attempt on-device inference when the local model is ready
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Fall back to the remote model on local timeout or failure
    #[serde(default = "default_true")]
    pub cloud_fallback_enabled: bool,

    /// Hard deadline for the local attempt
    #[serde(default = "default_local_timeout_ms")]
    pub local_timeout_ms: u64,

    /// Maximum characters of transcript kept in `context_snippet`
    #[serde(default = "default_snippet_chars")]
    pub context_snippet_chars: usize,

    /// History lines embedded in the cloud prompt
    #[serde(default = "default_history_lines")]
    pub history_lines_in_prompt: usize,

    /// Baseline confidence for locally generated suggestions
    #[serde(default = "default_local_confidence")]
    pub local_confidence_base: f32,

    /// Baseline confidence for remotely generated suggestions
    #[serde(default = "default_cloud_confidence")]
    pub cloud_confidence_base: f32,
}

fn default_true() -> bool {
    true
}
fn default_local_timeout_ms() -> u64 {
    2000
}
fn default_snippet_chars() -> usize {
    100
}
fn default_history_lines() -> usize {
    3
}
fn default_local_confidence() -> f32 {
    0.6
}
fn default_cloud_confidence() -> f32 {
    0.8
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            local_enabled: true,
            cloud_fallback_enabled: true,
            local_timeout_ms: default_local_timeout_ms(),
            context_snippet_chars: default_snippet_chars(),
            history_lines_in_prompt: default_history_lines(),
            local_confidence_base: default_local_confidence(),
            cloud_confidence_base: default_cloud_confidence(),
        }
    }
}

impl OrchestratorSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=30_000).contains(&self.local_timeout_ms) {
            return Err(ConfigError::invalid(
                "orchestrator.local_timeout_ms",
                format!("Must be between 100 and 30000, got {}", self.local_timeout_ms),
            ));
        }
        if self.context_snippet_chars == 0 {
            return Err(ConfigError::invalid(
                "orchestrator.context_snippet_chars",
                "Must be greater than 0",
            ));
        }
        for (field, value) in [
            ("orchestrator.local_confidence_base", self.local_confidence_base),
            ("orchestrator.cloud_confidence_base", self.cloud_confidence_base),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(
                    field,
                    format!("Must be between 0.0 and 1.0, got {}", value),
                ));
            }
        }
        Ok(())
    }
}

/// Conversation context tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSettings {
    /// Maximum transcript chunks kept in rolling history
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Use keyword heuristics when the extraction call fails
    #[serde(default = "default_true")]
    pub heuristic_fallback: bool,
}

fn default_history_cap() -> usize {
    20
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            heuristic_fallback: true,
        }
    }
}

impl ContextSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_cap == 0 {
            return Err(ConfigError::invalid("context.history_cap", "Must be at least 1"));
        }
        Ok(())
    }
}

/// Feedback learning engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSettings {
    #[serde(default = "default_confidence_step")]
    pub confidence_step: f32,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    #[serde(default = "default_max_confidence")]
    pub max_confidence: f32,

    /// Confidence a pattern needs before it may rewrite suggestions
    #[serde(default = "default_high_confidence")]
    pub high_confidence_threshold: f32,

    /// Pattern count that triggers pruning
    #[serde(default = "default_max_patterns")]
    pub max_patterns: usize,

    /// Pattern count kept after pruning
    #[serde(default = "default_retain_patterns")]
    pub retain_patterns: usize,

    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,

    /// Keywords a new pattern is seeded with
    #[serde(default = "default_seed_keywords")]
    pub seed_keywords: usize,

    /// Elements appended to a suggestion at most
    #[serde(default = "default_max_additions")]
    pub max_additions: usize,

    /// Feedback records retained in storage (oldest evicted)
    #[serde(default = "default_max_feedback_records")]
    pub max_feedback_records: usize,
}

fn default_confidence_step() -> f32 {
    0.1
}
fn default_min_confidence() -> f32 {
    0.1
}
fn default_max_confidence() -> f32 {
    1.0
}
fn default_high_confidence() -> f32 {
    0.7
}
fn default_max_patterns() -> usize {
    100
}
fn default_retain_patterns() -> usize {
    50
}
fn default_max_keywords() -> usize {
    10
}
fn default_seed_keywords() -> usize {
    3
}
fn default_max_additions() -> usize {
    2
}
fn default_max_feedback_records() -> usize {
    1000
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            confidence_step: default_confidence_step(),
            min_confidence: default_min_confidence(),
            max_confidence: default_max_confidence(),
            high_confidence_threshold: default_high_confidence(),
            max_patterns: default_max_patterns(),
            retain_patterns: default_retain_patterns(),
            max_keywords: default_max_keywords(),
            seed_keywords: default_seed_keywords(),
            max_additions: default_max_additions(),
            max_feedback_records: default_max_feedback_records(),
        }
    }
}

impl LearningSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_confidence)
            || !(0.0..=1.0).contains(&self.max_confidence)
            || self.min_confidence >= self.max_confidence
        {
            return Err(ConfigError::invalid(
                "learning.min_confidence",
                format!(
                    "Confidence bounds must satisfy 0 <= min < max <= 1, got [{}, {}]",
                    self.min_confidence, self.max_confidence
                ),
            ));
        }
        if self.confidence_step <= 0.0 || self.confidence_step > 0.5 {
            return Err(ConfigError::invalid(
                "learning.confidence_step",
                format!("Must be in (0.0, 0.5], got {}", self.confidence_step),
            ));
        }
        if self.retain_patterns == 0 || self.retain_patterns > self.max_patterns {
            return Err(ConfigError::invalid(
                "learning.retain_patterns",
                format!(
                    "Must be between 1 and max_patterns ({}), got {}",
                    self.max_patterns, self.retain_patterns
                ),
            ));
        }
        if self.max_keywords == 0 || self.seed_keywords == 0 {
            return Err(ConfigError::invalid(
                "learning.max_keywords",
                "Keyword limits must be greater than 0",
            ));
        }
        if self.max_feedback_records == 0 {
            return Err(ConfigError::invalid(
                "learning.max_feedback_records",
                "Must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_defaults() {
        let settings = OrchestratorSettings::default();
        assert_eq!(settings.local_timeout_ms, 2000);
        assert_eq!(settings.context_snippet_chars, 100);
        assert!(settings.cloud_confidence_base > settings.local_confidence_base);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_orchestrator_timeout_bounds() {
        let settings = OrchestratorSettings {
            local_timeout_ms: 50,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_learning_bounds() {
        let mut settings = LearningSettings::default();
        assert!(settings.validate().is_ok());

        settings.retain_patterns = 150;
        assert!(settings.validate().is_err());
        settings.retain_patterns = 50;

        settings.min_confidence = 0.9;
        settings.max_confidence = 0.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_context_cap_must_be_positive() {
        let settings = ContextSettings {
            history_cap: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
