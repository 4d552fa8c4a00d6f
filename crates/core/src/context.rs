//! Conversation context types
//!
//! `ConversationContext` is the rolling state of one call session. It is
//! single-writer: one session owns it, mutates it on every analyzed chunk,
//! and resets it when the call ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::suggestion::Priority;

/// Sales stage inferred from the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SalesStage {
    #[default]
    Discovery,
    Demo,
    Objection,
    Negotiation,
    Closing,
}

impl SalesStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesStage::Discovery => "discovery",
            SalesStage::Demo => "demo",
            SalesStage::Objection => "objection",
            SalesStage::Negotiation => "negotiation",
            SalesStage::Closing => "closing",
        }
    }

    pub fn parse_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "discovery" => Some(SalesStage::Discovery),
            "demo" | "presentation" => Some(SalesStage::Demo),
            "objection" | "objection_handling" => Some(SalesStage::Objection),
            "negotiation" => Some(SalesStage::Negotiation),
            "closing" | "close" => Some(SalesStage::Closing),
            _ => None,
        }
    }

    /// Default next best action for the stage
    pub fn next_best_action(&self) -> &'static str {
        match self {
            SalesStage::Discovery => "Ask open questions to uncover pain points and budget",
            SalesStage::Demo => "Tie each feature you show back to a stated pain point",
            SalesStage::Objection => "Acknowledge the concern, then reframe around value",
            SalesStage::Negotiation => "Trade concessions for commitment; anchor on ROI",
            SalesStage::Closing => "Confirm decision makers and propose a concrete start date",
        }
    }
}

/// Kind of structured insight extracted from the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Opportunity,
    Objection,
    NextStep,
    Warning,
    BuyingSignal,
    Risk,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightType::Opportunity => "opportunity",
            InsightType::Objection => "objection",
            InsightType::NextStep => "next_step",
            InsightType::Warning => "warning",
            InsightType::BuyingSignal => "buying_signal",
            InsightType::Risk => "risk",
        }
    }

    pub fn parse_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "opportunity" => Some(InsightType::Opportunity),
            "objection" => Some(InsightType::Objection),
            "next_step" | "nextstep" => Some(InsightType::NextStep),
            "warning" => Some(InsightType::Warning),
            "buying_signal" | "buyingsignal" => Some(InsightType::BuyingSignal),
            "risk" => Some(InsightType::Risk),
            _ => None,
        }
    }
}

/// One structured insight about the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationInsight {
    pub id: String,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub title: String,
    pub message: String,
    pub action: String,
    pub confidence: f32,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<SalesStage>,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of the customer as perceived by the analysis collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub engagement_level: String,
    #[serde(default)]
    pub decision_stage: String,
    #[serde(default)]
    pub personality_type: String,
}

/// Facts the customer has mentioned during the call
///
/// Scalars are overwritten by newer non-empty values. `pain_points` and
/// `decision_makers` only grow (deduplicated, case-insensitive) within a
/// session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerMentions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_solution: Option<String>,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub decision_makers: Vec<String>,
}

impl CustomerMentions {
    /// Merge an update into the accumulated mentions
    pub fn merge(&mut self, update: &CustomerMentions) {
        merge_scalar(&mut self.budget, &update.budget);
        merge_scalar(&mut self.timeline, &update.timeline);
        merge_scalar(&mut self.team_size, &update.team_size);
        merge_scalar(&mut self.current_solution, &update.current_solution);
        union_into(&mut self.pain_points, &update.pain_points);
        union_into(&mut self.decision_makers, &update.decision_makers);
    }

    pub fn is_empty(&self) -> bool {
        self.budget.is_none()
            && self.timeline.is_none()
            && self.team_size.is_none()
            && self.current_solution.is_none()
            && self.pain_points.is_empty()
            && self.decision_makers.is_empty()
    }
}

fn merge_scalar(target: &mut Option<String>, update: &Option<String>) {
    if let Some(value) = update {
        let value = value.trim();
        if !value.is_empty() {
            *target = Some(value.to_string());
        }
    }
}

/// Append values not already present (case-insensitive), keeping order
pub fn union_into(target: &mut Vec<String>, values: &[String]) {
    for value in values {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let exists = target.iter().any(|v| v.eq_ignore_ascii_case(value));
        if !exists {
            target.push(value.to_string());
        }
    }
}

/// Where the call stands in the sales process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesProgress {
    pub stage: SalesStage,
    pub confidence: f32,
    pub next_best_action: String,
}

impl Default for SalesProgress {
    fn default() -> Self {
        Self {
            stage: SalesStage::Discovery,
            confidence: 0.5,
            next_best_action: SalesStage::Discovery.next_best_action().to_string(),
        }
    }
}

/// Rolling state for one call session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub history: VecDeque<String>,
    pub history_cap: usize,
    #[serde(default)]
    pub current_topic: String,
    #[serde(default)]
    pub customer_mentions: CustomerMentions,
    #[serde(default)]
    pub sales_progress: SalesProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_profile: Option<CustomerProfile>,
}

impl ConversationContext {
    /// Create an empty context with the given history cap (minimum 1)
    pub fn new(history_cap: usize) -> Self {
        let history_cap = history_cap.max(1);
        Self {
            history: VecDeque::with_capacity(history_cap),
            history_cap,
            current_topic: String::new(),
            customer_mentions: CustomerMentions::default(),
            sales_progress: SalesProgress::default(),
            customer_profile: None,
        }
    }

    /// Append a chunk, evicting the oldest entries beyond the cap
    pub fn push_history(&mut self, chunk: impl Into<String>) {
        self.history.push_back(chunk.into());
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }
    }

    /// Most recent `n` history entries, oldest first
    pub fn recent_history(&self, n: usize) -> Vec<String> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Clear all state back to initial values (cap is kept)
    pub fn reset(&mut self) {
        *self = Self::new(self.history_cap);
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new(20)
    }
}
