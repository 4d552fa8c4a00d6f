//! Prompt framing configuration
//!
//! Per-call-type framing for the cloud prompt, the short on-device
//! template, and the product keywords that may be embedded as context.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use sales_coach_core::CallType;

/// Placeholder replaced with the transcript chunk in local templates
pub const TRANSCRIPT_PLACEHOLDER: &str = "{transcript}";

/// Framing for one call type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTypeFraming {
    pub display_name: String,

    /// Situation description embedded in the cloud prompt
    #[serde(default)]
    pub framing: String,

    /// Short template for the on-device model; must contain `{transcript}`
    #[serde(default)]
    pub local_template: String,
}

impl CallTypeFraming {
    fn new(display_name: &str, framing: &str, focus: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            framing: framing.to_string(),
            local_template: format!(
                "You coach a sales rep on a {}. Customer said: \"{}\"\n\
                 {}\n\
                 Reply with:\nAnalysis: <one sentence>\nSuggestion: <one actionable tip>\n\
                 TYPE: <objection|product_pitch|closing|retention|general> PRIORITY: <high|medium|low>",
                display_name.to_lowercase(),
                TRANSCRIPT_PLACEHOLDER,
                focus
            ),
        }
    }
}

/// Prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// System message for the remote model
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Domain terms embedded in the cloud prompt when they occur in the chunk
    #[serde(default = "default_product_keywords")]
    pub product_keywords: Vec<String>,

    /// Framing keyed by call-type tag (`cold_call`, `demo`, ...)
    #[serde(default = "default_call_types")]
    pub call_types: HashMap<String, CallTypeFraming>,
}

fn default_system_prompt() -> String {
    "You are an experienced sales coach listening to a live call. \
     Give short, specific, actionable advice the rep can use in the next sentence."
        .to_string()
}

fn default_product_keywords() -> Vec<String> {
    [
        "pricing",
        "integration",
        "onboarding",
        "analytics",
        "dashboard",
        "api",
        "security",
        "support",
        "roi",
        "pilot",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_call_types() -> HashMap<String, CallTypeFraming> {
    let mut map = HashMap::new();
    map.insert(
        CallType::ColdCall.as_str().to_string(),
        CallTypeFraming::new(
            "Cold Call",
            "This is a cold call. The prospect did not expect the call; earn attention quickly and book a next meeting.",
            "Focus on earning the next minute of attention.",
        ),
    );
    map.insert(
        CallType::Discovery.as_str().to_string(),
        CallTypeFraming::new(
            "Discovery Call",
            "This is a discovery call. Uncover pain points, budget, timeline and decision makers before pitching.",
            "Focus on one good open question.",
        ),
    );
    map.insert(
        CallType::Demo.as_str().to_string(),
        CallTypeFraming::new(
            "Demo",
            "This is a product demo. Tie each capability shown to a pain point the customer stated.",
            "Focus on linking a feature to the customer's pain.",
        ),
    );
    map.insert(
        CallType::FollowUp.as_str().to_string(),
        CallTypeFraming::new(
            "Follow-up",
            "This is a follow-up call. Recap what was agreed, resolve open questions and secure a commitment.",
            "Focus on moving toward a concrete commitment.",
        ),
    );
    map.insert(
        CallType::Negotiation.as_str().to_string(),
        CallTypeFraming::new(
            "Negotiation",
            "This is a negotiation. Protect margin, trade concessions for commitments, and anchor on value.",
            "Focus on trading, not giving, concessions.",
        ),
    );
    map.insert(
        CallType::Retention.as_str().to_string(),
        CallTypeFraming::new(
            "Retention Call",
            "This is a retention call with an existing customer at risk of churning. Acknowledge frustration and rebuild value.",
            "Focus on acknowledging the problem before offering a fix.",
        ),
    );
    map
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            product_keywords: default_product_keywords(),
            call_types: default_call_types(),
        }
    }
}

impl PromptsConfig {
    /// Framing for a call type; configured entries win over built-ins,
    /// and unknown call types get a generic framing.
    pub fn framing(&self, call_type: CallType) -> CallTypeFraming {
        if let Some(framing) = self.call_types.get(call_type.as_str()) {
            return framing.clone();
        }
        default_call_types()
            .remove(call_type.as_str())
            .unwrap_or_else(|| {
                CallTypeFraming::new(
                    call_type.display_name(),
                    "This is a sales call. Help the rep move the conversation forward.",
                    "Focus on the most useful next sentence.",
                )
            })
    }

    /// Product keywords that occur in `text` (case-insensitive)
    pub fn matching_keywords(&self, text: &str) -> Vec<&str> {
        let lower = text.to_lowercase();
        self.product_keywords
            .iter()
            .filter(|k| !k.trim().is_empty() && lower.contains(&k.to_lowercase()))
            .map(|k| k.as_str())
            .collect()
    }
}
