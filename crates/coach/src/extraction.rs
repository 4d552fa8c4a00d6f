//! Structured insight extraction: request messages and response parsing
//!
//! The collaborator is asked for a single JSON object. Parsing is lenient
//! about field naming (snake_case or camelCase) and value types, but a
//! response without a parsable object yields `None`.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use sales_coach_core::{
    ChatMessage, ConversationContext, ConversationInsight, CustomerMentions, CustomerProfile,
    InsightType, Priority, SalesStage,
};

/// History entries included in the extraction request
const HISTORY_IN_REQUEST: usize = 5;

const SYSTEM_PROMPT: &str = "You analyze live sales call transcripts. \
     Answer with a single JSON object and nothing else.";

const RESPONSE_SHAPE: &str = r#"{
  "insights": [
    {
      "type": "opportunity|objection|next_step|warning|buying_signal|risk",
      "title": "short title",
      "message": "what was observed",
      "action": "what the rep should do",
      "confidence": 0.0,
      "priority": "high|medium|low",
      "stage": "discovery|demo|objection|negotiation|closing"
    }
  ],
  "customerProfile": {
    "sentiment": "positive|neutral|negative",
    "engagementLevel": "high|medium|low",
    "decisionStage": "string",
    "personalityType": "string"
  },
  "contextUpdate": {
    "currentTopic": "string",
    "budget": "string",
    "timeline": "string",
    "teamSize": "string",
    "currentSolution": "string",
    "painPoints": ["string"],
    "decisionMakers": ["string"]
  },
  "salesStage": "discovery|demo|objection|negotiation|closing"
}"#;

/// Validated extraction result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub insights: Vec<ConversationInsight>,
    pub customer_profile: Option<CustomerProfile>,
    pub mentions: CustomerMentions,
    pub current_topic: Option<String>,
    pub stage: Option<SalesStage>,
}

/// Chat messages asking for insights on `chunk` given what is known so far
pub fn extraction_messages(chunk: &str, context: &ConversationContext) -> Vec<ChatMessage> {
    let mut prompt = String::new();

    let history = context.recent_history(HISTORY_IN_REQUEST + 1);
    // The chunk under analysis is already the newest history entry
    let earlier: Vec<&String> = history
        .iter()
        .take(history.len().saturating_sub(1))
        .collect();
    if !earlier.is_empty() {
        prompt.push_str("Earlier in the call:\n");
        for line in earlier {
            prompt.push_str(&format!("- {}\n", line));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "Current sales stage: {}\n",
        context.sales_progress.stage.as_str()
    ));
    if !context.customer_mentions.is_empty() {
        if let Ok(known) = serde_json::to_string(&context.customer_mentions) {
            prompt.push_str(&format!("Known so far: {}\n", known));
        }
    }

    prompt.push_str(&format!("\nNew transcript:\n\"{}\"\n\n", chunk.trim()));
    prompt.push_str("Return JSON with exactly this shape (omit unknown fields):\n");
    prompt.push_str(RESPONSE_SHAPE);

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)]
}

/// Parse the collaborator's response. `None` when no JSON object is found.
pub fn parse_extraction(raw: &str) -> Option<Extraction> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }

    let parsed: RawExtraction = match serde_json::from_str(&raw[start..=end]) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(error = %e, "Extraction response is not valid JSON");
            return None;
        }
    };

    let insights = parsed
        .insights
        .into_iter()
        .filter_map(RawInsight::validate)
        .collect();

    let customer_profile = parsed.customer_profile.map(|p| CustomerProfile {
        sentiment: text_or_empty(&p.sentiment),
        engagement_level: text_or_empty(&p.engagement_level),
        decision_stage: text_or_empty(&p.decision_stage),
        personality_type: text_or_empty(&p.personality_type),
    });

    let (mentions, current_topic) = match parsed.context_update {
        Some(update) => (
            CustomerMentions {
                budget: value_text(&update.budget),
                timeline: value_text(&update.timeline),
                team_size: value_text(&update.team_size),
                current_solution: value_text(&update.current_solution),
                pain_points: value_list(&update.pain_points),
                decision_makers: value_list(&update.decision_makers),
            },
            value_text(&update.current_topic),
        ),
        None => (CustomerMentions::default(), None),
    };

    let stage = match &parsed.sales_stage {
        Value::Object(map) => map.get("stage").and_then(Value::as_str),
        other => other.as_str(),
    }
    .and_then(SalesStage::parse_tag);

    Some(Extraction {
        insights,
        customer_profile,
        mentions,
        current_topic,
        stage,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawExtraction {
    insights: Vec<RawInsight>,
    #[serde(alias = "customerProfile")]
    customer_profile: Option<RawProfile>,
    #[serde(alias = "contextUpdate")]
    context_update: Option<RawContextUpdate>,
    #[serde(alias = "salesStage")]
    sales_stage: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawInsight {
    #[serde(rename = "type", alias = "insightType", alias = "insight_type")]
    kind: Value,
    title: Value,
    message: Value,
    action: Value,
    confidence: Value,
    priority: Value,
    stage: Value,
}

impl RawInsight {
    fn validate(self) -> Option<ConversationInsight> {
        let insight_type = self.kind.as_str().and_then(InsightType::parse_tag)?;
        let message = text_or_empty(&self.message);
        let title = value_text(&self.title).unwrap_or_else(|| default_title(insight_type).to_string());
        if message.is_empty() && value_text(&self.title).is_none() {
            return None;
        }

        let confidence = match &self.confidence {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .map(|c| (c as f32).clamp(0.0, 1.0))
        .unwrap_or(0.5);

        Some(ConversationInsight {
            id: uuid::Uuid::new_v4().to_string(),
            insight_type,
            title,
            message,
            action: text_or_empty(&self.action),
            confidence,
            priority: self
                .priority
                .as_str()
                .and_then(Priority::parse_tag)
                .unwrap_or_default(),
            stage: self.stage.as_str().and_then(SalesStage::parse_tag),
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProfile {
    sentiment: Value,
    #[serde(alias = "engagementLevel")]
    engagement_level: Value,
    #[serde(alias = "decisionStage")]
    decision_stage: Value,
    #[serde(alias = "personalityType")]
    personality_type: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawContextUpdate {
    #[serde(alias = "currentTopic", alias = "topic")]
    current_topic: Value,
    budget: Value,
    timeline: Value,
    #[serde(alias = "teamSize")]
    team_size: Value,
    #[serde(alias = "currentSolution")]
    current_solution: Value,
    #[serde(alias = "painPoints")]
    pain_points: Value,
    #[serde(alias = "decisionMakers")]
    decision_makers: Value,
}

fn default_title(insight_type: InsightType) -> &'static str {
    match insight_type {
        InsightType::Opportunity => "Opportunity",
        InsightType::Objection => "Objection",
        InsightType::NextStep => "Next Step",
        InsightType::Warning => "Warning",
        InsightType::BuyingSignal => "Buying Signal",
        InsightType::Risk => "Risk",
    }
}

/// Scalar JSON value as trimmed text; null, empty and containers are `None`
fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn text_or_empty(value: &Value) -> String {
    value_text(value).unwrap_or_default()
}

/// Array (or single scalar) as a list of non-empty strings
fn value_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        other => value_text(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_wrapped_camel_case_response() {
        let raw = r#"Here is the analysis:
```json
{
  "insights": [
    {"type": "buying_signal", "title": "Asked about onboarding", "message": "Customer wants to know rollout steps",
     "action": "Outline the onboarding plan", "confidence": 0.85, "priority": "high", "stage": "closing"},
    {"type": "mystery", "title": "Dropped", "message": "Unknown type"},
    {"type": "risk", "message": "Competitor mentioned", "confidence": "1.7"}
  ],
  "customerProfile": {"sentiment": "positive", "engagementLevel": "high", "decisionStage": "evaluating", "personalityType": "analytical"},
  "contextUpdate": {"currentTopic": "onboarding", "teamSize": 45, "painPoints": ["manual reporting", ""], "decisionMakers": "CFO"},
  "salesStage": "negotiation"
}
```"#;
        let extraction = parse_extraction(raw).unwrap();

        assert_eq!(extraction.insights.len(), 2);
        let first = &extraction.insights[0];
        assert_eq!(first.insight_type, InsightType::BuyingSignal);
        assert_eq!(first.priority, Priority::High);
        assert_eq!(first.stage, Some(SalesStage::Closing));
        assert!((first.confidence - 0.85).abs() < 1e-6);

        let second = &extraction.insights[1];
        assert_eq!(second.title, "Risk");
        assert_eq!(second.priority, Priority::Medium);
        assert!((second.confidence - 1.0).abs() < 1e-6);

        let profile = extraction.customer_profile.unwrap();
        assert_eq!(profile.engagement_level, "high");
        assert_eq!(profile.personality_type, "analytical");

        assert_eq!(extraction.current_topic.as_deref(), Some("onboarding"));
        assert_eq!(extraction.mentions.team_size.as_deref(), Some("45"));
        assert_eq!(extraction.mentions.pain_points, vec!["manual reporting"]);
        assert_eq!(extraction.mentions.decision_makers, vec!["CFO"]);
        assert!(extraction.mentions.budget.is_none());
        assert_eq!(extraction.stage, Some(SalesStage::Negotiation));
    }

    #[test]
    fn test_snake_case_and_nested_stage() {
        let raw = r#"{"context_update": {"pain_points": ["slow exports"]}, "sales_stage": {"stage": "demo", "confidence": 0.7}}"#;
        let extraction = parse_extraction(raw).unwrap();
        assert!(extraction.insights.is_empty());
        assert!(extraction.customer_profile.is_none());
        assert_eq!(extraction.mentions.pain_points, vec!["slow exports"]);
        assert_eq!(extraction.stage, Some(SalesStage::Demo));
    }

    #[test]
    fn test_malformed_responses() {
        assert!(parse_extraction("no json here").is_none());
        assert!(parse_extraction("{\"insights\": [").is_none());
        assert!(parse_extraction("} backwards {").is_none());
        assert!(parse_extraction("{\"insights\": {\"type\": \"risk\"}}").is_none());
    }

    #[test]
    fn test_messages_include_history_and_known_facts() {
        let mut context = ConversationContext::new(20);
        context.push_history("We looked at your site");
        context.customer_mentions.budget = Some("$20k".into());
        context.push_history("How long does onboarding take?");

        let messages = extraction_messages("How long does onboarding take?", &context);
        assert_eq!(messages.len(), 2);
        let user = &messages[1].content;
        assert!(user.contains("- We looked at your site"));
        assert!(!user.contains("- How long does onboarding take?"));
        assert!(user.contains("\"How long does onboarding take?\""));
        assert!(user.contains("$20k"));
        assert!(user.contains("\"insights\""));
    }
}
