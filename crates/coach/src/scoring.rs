//! Heuristic confidence, type and priority for parsed suggestions

use sales_coach_core::{Priority, SuggestionType};

use crate::keywords::{contains_term, count_terms};

/// Tips at least this long get the length bonus
const DETAILED_TIP_CHARS: usize = 60;
const LENGTH_BONUS: f32 = 0.1;
const SPECIFICITY_BONUS: f32 = 0.05;

const URGENCY_CUES: &[&str] = &[
    "urgent",
    "immediately",
    "deadline",
    "cancel",
    "competitor",
    "price",
    "budget",
    "now",
];

const SOFT_CUES: &[&str] = &["maybe", "later", "consider", "think about"];

/// Classifier cues in tie-break order
const TYPE_CUES: &[(SuggestionType, &[&str])] = &[
    (
        SuggestionType::Objection,
        &["price", "expensive", "competitor", "concern", "cost", "too high"],
    ),
    (
        SuggestionType::ProductPitch,
        &["feature", "demo", "product", "integration", "capability"],
    ),
    (
        SuggestionType::Closing,
        &["contract", "sign", "next steps", "proposal", "purchase"],
    ),
    (
        SuggestionType::Retention,
        &["cancel", "renew", "churn", "unhappy", "switching"],
    ),
];

/// Confidence for a tip, starting from the source baseline
pub fn score_confidence(base: f32, tip: &str) -> f32 {
    let mut score = base;
    if tip.chars().count() >= DETAILED_TIP_CHARS {
        score += LENGTH_BONUS;
    }
    if tip.chars().any(|c| c.is_ascii_digit()) || tip.contains('"') {
        score += SPECIFICITY_BONUS;
    }
    score.clamp(0.0, 1.0)
}

/// Classify the sales situation from transcript cues
pub fn classify_type(transcript: &str) -> SuggestionType {
    let lower = transcript.to_lowercase();
    let mut best = SuggestionType::General;
    let mut best_hits = 0;
    for (suggestion_type, cues) in TYPE_CUES {
        let hits = count_terms(&lower, cues);
        if hits > best_hits {
            best = *suggestion_type;
            best_hits = hits;
        }
    }
    best
}

/// Infer priority from urgency cues in the tip or transcript
pub fn infer_priority(tip: &str, transcript: &str) -> Priority {
    let combined = format!("{}\n{}", tip, transcript).to_lowercase();
    if URGENCY_CUES.iter().any(|cue| contains_term(&combined, cue)) {
        Priority::High
    } else if SOFT_CUES.iter().any(|cue| contains_term(&combined, cue)) {
        Priority::Low
    } else {
        Priority::Medium
    }
}
