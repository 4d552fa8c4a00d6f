//! Post-call summary and follow-up email
//!
//! Uses the remote model when one is configured; otherwise, or when it
//! fails, builds both from the tracked context with fixed templates.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sales_coach_core::{
    ChatMessage, CoachingSuggestion, ConversationContext, RemoteInference, SalesStage,
};

/// Pain points carried into generated next steps
const PAIN_POINT_STEPS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub overview: String,
    pub key_points: Vec<String>,
    pub pain_points: Vec<String>,
    pub next_steps: Vec<String>,
    pub stage: SalesStage,
    pub suggestion_count: usize,
    pub helpful_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpEmail {
    pub subject: String,
    pub body: String,
}

pub struct CallSummarizer {
    remote: Option<Arc<dyn RemoteInference>>,
    persona: Option<String>,
}

impl CallSummarizer {
    pub fn new(remote: Option<Arc<dyn RemoteInference>>) -> Self {
        Self {
            remote,
            persona: None,
        }
    }

    pub fn with_persona(mut self, persona: Option<String>) -> Self {
        self.persona = persona;
        self
    }

    /// Summarize a finished (or ongoing) call
    pub async fn summarize(
        &self,
        context: &ConversationContext,
        suggestions: &[CoachingSuggestion],
    ) -> CallSummary {
        let mut summary = template_summary(context, suggestions);
        if context.history.is_empty() {
            return summary;
        }

        if let Some(generated) = self.remote_summary(context).await {
            if !generated.overview.is_empty() {
                summary.overview = generated.overview;
            }
            if !generated.key_points.is_empty() {
                summary.key_points = generated.key_points;
            }
            if !generated.next_steps.is_empty() {
                summary.next_steps = generated.next_steps;
            }
        }
        summary
    }

    async fn remote_summary(&self, context: &ConversationContext) -> Option<RawSummary> {
        let remote = self.remote.as_ref()?;
        let transcript: Vec<&str> = context.history.iter().map(String::as_str).collect();
        let messages = vec![
            ChatMessage::system(
                "You summarize sales calls for the rep. Answer with a single JSON object only.",
            ),
            ChatMessage::user(format!(
                "Transcript:\n{}\n\nSales stage: {}\n\n\
                 Return JSON: {{\"overview\": \"2-3 sentences\", \"keyPoints\": [\"...\"], \"nextSteps\": [\"...\"]}}",
                transcript.join("\n"),
                context.sales_progress.stage.as_str()
            )),
        ];

        match remote.complete(&messages, self.persona.as_deref()).await {
            Ok(raw) => {
                let parsed = json_object(&raw).and_then(|json| serde_json::from_str::<RawSummary>(json).ok());
                if parsed.is_none() {
                    tracing::warn!("Summary response malformed; using template");
                }
                parsed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Summary generation failed; using template");
                None
            }
        }
    }

    /// Draft a follow-up email for the customer
    pub async fn follow_up_email(
        &self,
        context: &ConversationContext,
        summary: &CallSummary,
        agent_name: &str,
        customer_name: &str,
    ) -> FollowUpEmail {
        if let Some(remote) = &self.remote {
            let messages = vec![
                ChatMessage::system(
                    "You write concise, friendly sales follow-up emails. Answer with a single JSON object only.",
                ),
                ChatMessage::user(format!(
                    "Agent: {}\nCustomer: {}\nCall overview: {}\nCustomer pain points: {}\nNext steps: {}\n\n\
                     Return JSON: {{\"subject\": \"...\", \"body\": \"...\"}}",
                    agent_name,
                    customer_name,
                    summary.overview,
                    summary.pain_points.join("; "),
                    summary.next_steps.join("; ")
                )),
            ];
            match remote.complete(&messages, self.persona.as_deref()).await {
                Ok(raw) => {
                    let parsed = json_object(&raw)
                        .and_then(|json| serde_json::from_str::<FollowUpEmail>(json).ok())
                        .filter(|email| !email.subject.trim().is_empty() && !email.body.trim().is_empty());
                    if let Some(email) = parsed {
                        return email;
                    }
                    tracing::warn!("Email response malformed; using template");
                }
                Err(e) => tracing::warn!(error = %e, "Email generation failed; using template"),
            }
        }
        template_email(context, summary, agent_name, customer_name)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSummary {
    overview: String,
    #[serde(alias = "keyPoints")]
    key_points: Vec<String>,
    #[serde(alias = "nextSteps")]
    next_steps: Vec<String>,
}

fn json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn template_summary(context: &ConversationContext, suggestions: &[CoachingSuggestion]) -> CallSummary {
    let stage = context.sales_progress.stage;
    let mentions = &context.customer_mentions;

    let mut overview = format!(
        "The call covered {} transcript segment{} and ended in the {} stage.",
        context.history.len(),
        if context.history.len() == 1 { "" } else { "s" },
        stage.as_str()
    );
    if !context.current_topic.is_empty() {
        overview.push_str(&format!(" Last topic: {}.", context.current_topic));
    }

    let mut key_points = Vec::new();
    for (label, value) in [
        ("Budget", &mentions.budget),
        ("Timeline", &mentions.timeline),
        ("Team size", &mentions.team_size),
        ("Current solution", &mentions.current_solution),
    ] {
        if let Some(value) = value {
            key_points.push(format!("{}: {}", label, value));
        }
    }
    if !mentions.decision_makers.is_empty() {
        key_points.push(format!(
            "Decision makers: {}",
            mentions.decision_makers.join(", ")
        ));
    }

    let mut next_steps = vec![context.sales_progress.next_best_action.clone()];
    next_steps.extend(
        mentions
            .pain_points
            .iter()
            .take(PAIN_POINT_STEPS)
            .map(|p| format!("Follow up on: {}", p)),
    );

    CallSummary {
        overview,
        key_points,
        pain_points: mentions.pain_points.clone(),
        next_steps,
        stage,
        suggestion_count: suggestions.len(),
        helpful_count: suggestions
            .iter()
            .filter(|s| {
                s.user_feedback
                    .as_ref()
                    .is_some_and(|f| f.rating.is_helpful())
            })
            .count(),
    }
}

fn template_email(
    context: &ConversationContext,
    summary: &CallSummary,
    agent_name: &str,
    customer_name: &str,
) -> FollowUpEmail {
    let subject = if context.current_topic.is_empty() {
        "Following up on our conversation".to_string()
    } else {
        format!("Following up on our conversation about {}", context.current_topic)
    };

    let mut body = format!(
        "Hi {},\n\nThank you for your time today.",
        customer_name
    );
    if !summary.pain_points.is_empty() {
        body.push_str("\n\nYou mentioned:\n");
        for point in &summary.pain_points {
            body.push_str(&format!("- {}\n", point));
        }
    } else {
        body.push('\n');
    }
    if !summary.next_steps.is_empty() {
        body.push_str("\nNext steps:\n");
        for step in &summary.next_steps {
            body.push_str(&format!("- {}\n", step));
        }
    }
    body.push_str(&format!("\nBest regards,\n{}", agent_name));

    FollowUpEmail { subject, body }
}
