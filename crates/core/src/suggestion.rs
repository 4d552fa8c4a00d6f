//! Coaching suggestion types
//!
//! A `CoachingSuggestion` is created once per inference cycle and is
//! immutable afterwards, except for `user_feedback`, which is attached
//! exactly once when the agent rates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sales situation a suggestion addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    Objection,
    ProductPitch,
    Closing,
    Retention,
    #[default]
    General,
}

impl SuggestionType {
    pub const ALL: [SuggestionType; 5] = [
        SuggestionType::Objection,
        SuggestionType::ProductPitch,
        SuggestionType::Closing,
        SuggestionType::Retention,
        SuggestionType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::Objection => "objection",
            SuggestionType::ProductPitch => "product_pitch",
            SuggestionType::Closing => "closing",
            SuggestionType::Retention => "retention",
            SuggestionType::General => "general",
        }
    }

    /// Parse a model-emitted tag. Case, spaces and dashes are tolerated;
    /// anything outside the enum yields `None`.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        let normalized = normalize_tag(tag);
        match normalized.as_str() {
            "objection" | "objections" => Some(SuggestionType::Objection),
            "product_pitch" | "pitch" | "product" => Some(SuggestionType::ProductPitch),
            "closing" | "close" => Some(SuggestionType::Closing),
            "retention" => Some(SuggestionType::Retention),
            "general" => Some(SuggestionType::General),
            _ => None,
        }
    }

    /// Short action label used to build suggestion titles
    pub fn action_label(&self) -> &'static str {
        match self {
            SuggestionType::Objection => "Handle Objection",
            SuggestionType::ProductPitch => "Pitch the Product",
            SuggestionType::Closing => "Move to Close",
            SuggestionType::Retention => "Retain the Customer",
            SuggestionType::General => "Coaching Tip",
        }
    }
}

impl fmt::Display for SuggestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display priority of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse_tag(tag: &str) -> Option<Self> {
        match normalize_tag(tag).as_str() {
            "high" | "urgent" => Some(Priority::High),
            "medium" | "normal" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which inference path produced a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    Local,
    Cloud,
}

impl SuggestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionSource::Local => "local",
            SuggestionSource::Cloud => "cloud",
        }
    }
}

impl fmt::Display for SuggestionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent rating of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackRating {
    Helpful,
    NotHelpful,
}

impl FeedbackRating {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackRating::Helpful => "helpful",
            FeedbackRating::NotHelpful => "not_helpful",
        }
    }

    pub fn is_helpful(&self) -> bool {
        matches!(self, FeedbackRating::Helpful)
    }
}

/// Feedback attached to a suggestion after the agent rates it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFeedback {
    pub rating: FeedbackRating,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Call type tag used to frame prompts and label suggestions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    ColdCall,
    Discovery,
    Demo,
    FollowUp,
    Negotiation,
    Retention,
    #[default]
    #[serde(other)]
    General,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::ColdCall => "cold_call",
            CallType::Discovery => "discovery",
            CallType::Demo => "demo",
            CallType::FollowUp => "follow_up",
            CallType::Negotiation => "negotiation",
            CallType::Retention => "retention",
            CallType::General => "general",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CallType::ColdCall => "Cold Call",
            CallType::Discovery => "Discovery Call",
            CallType::Demo => "Demo",
            CallType::FollowUp => "Follow-up",
            CallType::Negotiation => "Negotiation",
            CallType::Retention => "Retention Call",
            CallType::General => "Sales Call",
        }
    }

    /// Lenient parse; unknown tags map to `General`
    pub fn from_tag(tag: &str) -> Self {
        match normalize_tag(tag).as_str() {
            "cold_call" | "cold" | "outbound" => CallType::ColdCall,
            "discovery" => CallType::Discovery,
            "demo" | "demonstration" => CallType::Demo,
            "follow_up" | "followup" => CallType::FollowUp,
            "negotiation" => CallType::Negotiation,
            "retention" | "renewal" => CallType::Retention,
            _ => CallType::General,
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingSuggestion {
    pub id: String,
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    pub title: String,
    pub suggestion_text: String,
    pub context_snippet: String,
    pub confidence: f32,
    pub priority: Priority,
    pub source: SuggestionSource,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<UserFeedback>,
}

impl CoachingSuggestion {
    /// Deterministic title derived from suggestion type and call type
    pub fn title_for(suggestion_type: SuggestionType, call_type: CallType) -> String {
        format!(
            "{} · {}",
            suggestion_type.action_label(),
            call_type.display_name()
        )
    }

    pub fn is_rated(&self) -> bool {
        self.user_feedback.is_some()
    }

    /// Attach the agent's rating. Returns `false` without modifying the
    /// suggestion if it was already rated.
    pub fn attach_feedback(&mut self, rating: FeedbackRating, reason: Option<String>) -> bool {
        if self.user_feedback.is_some() {
            return false;
        }
        self.user_feedback = Some(UserFeedback {
            rating,
            timestamp: Utc::now(),
            reason,
        });
        true
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
        .replace(['-', ' '], "_")
}
