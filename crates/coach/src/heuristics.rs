//! Keyword heuristics for conversation analysis
//!
//! Used when the extraction collaborator is unavailable, and for sales
//! stage inference when the collaborator does not name a valid stage.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use sales_coach_core::{
    ConversationInsight, CustomerMentions, InsightType, Priority, SalesProgress, SalesStage,
};

use crate::keywords::count_terms;

/// History entries considered for stage inference
pub const STAGE_WINDOW: usize = 5;

const PRICE_CUES: &[&str] = &["price", "pricing", "cost", "budget", "expensive"];
const TIMELINE_CUES: &[&str] = &["timeline", "when", "deadline", "quarter", "month"];

/// Stage cues in tie-break order
const STAGE_CUES: &[(SalesStage, &[&str])] = &[
    (
        SalesStage::Closing,
        &["sign", "contract", "purchase order", "start date"],
    ),
    (
        SalesStage::Negotiation,
        &["discount", "terms", "pricing tier", "negotiate"],
    ),
    (
        SalesStage::Objection,
        &["too expensive", "concern", "not sure", "competitor"],
    ),
    (
        SalesStage::Demo,
        &["show me", "demo", "walk through", "how does"],
    ),
];

static MONEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\$\s?\d[\d,]*(?:\.\d+)?\s*(?:k|m|thousand|million)?\b|\b\d[\d,]*(?:\.\d+)?\s*(?:k|thousand|million)?\s*(?:dollars|usd)\b)")
        .expect("valid money regex")
});

static TIMEFRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b((?:next|this) (?:week|month|quarter|year)|end of (?:the )?(?:week|month|quarter|year)|q[1-4](?: \d{4})?|(?:in|within) \d+ (?:days|weeks|months))\b",
    )
    .expect("valid timeframe regex")
});

static HEADCOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d[\d,]*)\+?\s+(people|users|employees|seats|reps|agents|members)\b")
        .expect("valid headcount regex")
});

static TEAM_OF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bteam of\s+(\d[\d,]*)").expect("valid team regex"));

/// Canned insights and captured mentions for one chunk
pub fn fallback_insights(chunk: &str) -> (Vec<ConversationInsight>, CustomerMentions) {
    let lower = chunk.to_lowercase();
    let mut insights = Vec::new();
    let mut mentions = CustomerMentions::default();

    if count_terms(&lower, PRICE_CUES) > 0 {
        insights.push(insight(
            InsightType::Objection,
            "Price Concern Detected",
            "The customer raised price or budget.",
            "Acknowledge the concern and reframe around ROI before talking discounts.",
            0.7,
            Priority::High,
            Some(SalesStage::Objection),
        ));
        mentions.budget = MONEY.find(chunk).map(|m| m.as_str().trim().to_string());
    }

    if count_terms(&lower, TIMELINE_CUES) > 0 {
        insights.push(insight(
            InsightType::NextStep,
            "Timeline Mentioned",
            "The customer referenced timing.",
            "Confirm the timeline and map the steps needed to hit it.",
            0.6,
            Priority::Medium,
            None,
        ));
        mentions.timeline = TIMEFRAME.find(chunk).map(|m| m.as_str().to_string());
    }

    if let Some(team_size) = team_size(chunk) {
        insights.push(insight(
            InsightType::Opportunity,
            "Team Size Identified",
            &format!("The customer mentioned {}.", team_size),
            "Size the proposal to the team and ask who else will use it.",
            0.65,
            Priority::Medium,
            None,
        ));
        mentions.team_size = Some(team_size);
    }

    (insights, mentions)
}

fn team_size(chunk: &str) -> Option<String> {
    if let Some(caps) = HEADCOUNT.captures(chunk) {
        return Some(format!("{} {}", &caps[1], caps[2].to_lowercase()));
    }
    TEAM_OF
        .captures(chunk)
        .map(|caps| format!("{} people", &caps[1]))
}

/// Infer the sales stage from recent history (oldest first)
pub fn infer_stage(recent: &[String]) -> SalesProgress {
    let window = recent.len().saturating_sub(STAGE_WINDOW);
    let text = recent[window..].join("\n").to_lowercase();

    let mut stage = SalesStage::Discovery;
    let mut hits = 0;
    for (candidate, cues) in STAGE_CUES {
        let count = count_terms(&text, cues);
        if count > hits {
            stage = *candidate;
            hits = count;
        }
    }

    SalesProgress {
        stage,
        confidence: (0.5 + 0.1 * hits as f32).min(0.95),
        next_best_action: stage.next_best_action().to_string(),
    }
}

fn insight(
    insight_type: InsightType,
    title: &str,
    message: &str,
    action: &str,
    confidence: f32,
    priority: Priority,
    stage: Option<SalesStage>,
) -> ConversationInsight {
    ConversationInsight {
        id: uuid::Uuid::new_v4().to_string(),
        insight_type,
        title: title.to_string(),
        message: message.to_string(),
        action: action.to_string(),
        confidence,
        priority,
        stage,
        timestamp: Utc::now(),
    }
}
