//! Feedback and learning pattern types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::suggestion::{CallType, FeedbackRating, SuggestionType};

/// Raw feedback event as recorded by the learning engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub suggestion_id: String,
    pub suggestion_text: String,
    /// Transcript context the suggestion was generated for
    pub context: String,
    pub rating: FeedbackRating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion_type: Option<SuggestionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_type: Option<CallType>,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(
        suggestion_id: impl Into<String>,
        suggestion_text: impl Into<String>,
        context: impl Into<String>,
        rating: FeedbackRating,
    ) -> Self {
        Self {
            suggestion_id: suggestion_id.into(),
            suggestion_text: suggestion_text.into(),
            context: context.into(),
            rating,
            reason: None,
            suggestion_type: None,
            call_type: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_types(mut self, suggestion_type: SuggestionType, call_type: CallType) -> Self {
        self.suggestion_type = Some(suggestion_type);
        self.call_type = Some(call_type);
        self
    }
}

/// Keyword-indexed cluster of feedback-derived knowledge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPattern {
    pub id: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub positive_examples: Vec<String>,
    #[serde(default)]
    pub negative_examples: Vec<String>,
    pub confidence: f32,
    pub frequency: u32,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl LearningPattern {
    pub fn new(keywords: Vec<String>, confidence: f32) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            keywords,
            positive_examples: Vec::new(),
            negative_examples: Vec::new(),
            confidence,
            frequency: 0,
            created_at: now,
            last_updated: now,
        }
    }

    /// Number of this pattern's keywords present in `keywords`
    pub fn overlap(&self, keywords: &[String]) -> usize {
        self.keywords
            .iter()
            .filter(|k| keywords.iter().any(|other| other == *k))
            .count()
    }

    pub fn matches(&self, keywords: &[String]) -> bool {
        self.overlap(keywords) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_overlap() {
        let pattern = LearningPattern::new(
            vec!["price".into(), "competitor".into(), "discount".into()],
            0.5,
        );
        let keywords = vec!["price".to_string(), "discount".to_string(), "team".to_string()];
        assert_eq!(pattern.overlap(&keywords), 2);
        assert!(pattern.matches(&keywords));
        assert!(!pattern.matches(&["onboarding".to_string()]));
    }

    #[test]
    fn test_feedback_record_roundtrip_fields() {
        let record = FeedbackRecord::new("s-1", "Offer a pilot", "too expensive", FeedbackRating::Helpful)
            .with_reason(Some("worked".into()))
            .with_types(SuggestionType::Objection, CallType::Demo);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["rating"], "helpful");
        assert_eq!(json["suggestion_type"], "objection");
        assert_eq!(json["call_type"], "demo");
    }
}
