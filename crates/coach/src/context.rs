//! Conversation context tracker
//!
//! One tracker per call session. It owns the session's
//! `ConversationContext` and is its only writer.

use std::sync::Arc;

use sales_coach_config::ContextSettings;
use sales_coach_core::{ConversationContext, ConversationInsight, RemoteInference, SalesProgress};

use crate::extraction::{extraction_messages, parse_extraction, Extraction};
use crate::heuristics::{fallback_insights, infer_stage, STAGE_WINDOW};
use crate::keywords::extract_keywords;

/// Confidence assigned to a stage named by the extraction collaborator
const REPORTED_STAGE_CONFIDENCE: f32 = 0.8;

pub struct ContextTracker {
    remote: Option<Arc<dyn RemoteInference>>,
    persona: Option<String>,
    settings: ContextSettings,
    context: ConversationContext,
}

impl ContextTracker {
    pub fn new(remote: Option<Arc<dyn RemoteInference>>, settings: ContextSettings) -> Self {
        Self {
            remote,
            persona: None,
            context: ConversationContext::new(settings.history_cap),
            settings,
        }
    }

    pub fn with_persona(mut self, persona: Option<String>) -> Self {
        self.persona = persona;
        self
    }

    /// Append `chunk` to history and extract insights from it
    ///
    /// Never fails: an unavailable collaborator falls back to keyword
    /// heuristics (when enabled), and an unparsable response yields no
    /// insights and leaves everything but history untouched.
    pub async fn analyze(&mut self, chunk: &str) -> Vec<ConversationInsight> {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            return Vec::new();
        }
        self.context.push_history(chunk);

        let Some(remote) = self.remote.clone() else {
            return self.heuristic_fallback(chunk);
        };

        let messages = extraction_messages(chunk, &self.context);
        let raw = match remote.complete(&messages, self.persona.as_deref()).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, model = remote.model_name(), "Insight extraction failed; using heuristics");
                return self.heuristic_fallback(chunk);
            }
        };

        match parse_extraction(&raw) {
            Some(extraction) => self.apply(extraction),
            None => {
                tracing::warn!(response_len = raw.len(), "Insight extraction returned malformed JSON");
                Vec::new()
            }
        }
    }

    fn heuristic_fallback(&mut self, chunk: &str) -> Vec<ConversationInsight> {
        if !self.settings.heuristic_fallback {
            return Vec::new();
        }
        let (insights, mentions) = fallback_insights(chunk);
        self.context.customer_mentions.merge(&mentions);
        if let Some(topic) = extract_keywords(chunk, 1).into_iter().next() {
            self.context.current_topic = topic;
        }
        self.context.sales_progress = infer_stage(&self.context.recent_history(STAGE_WINDOW));
        tracing::debug!(insights = insights.len(), stage = self.context.sales_progress.stage.as_str(), "Heuristic analysis applied");
        insights
    }

    fn apply(&mut self, extraction: Extraction) -> Vec<ConversationInsight> {
        if let Some(profile) = extraction.customer_profile {
            self.context.customer_profile = Some(profile);
        }
        self.context.customer_mentions.merge(&extraction.mentions);
        if let Some(topic) = extraction.current_topic {
            self.context.current_topic = topic;
        }
        self.context.sales_progress = match extraction.stage {
            Some(stage) => SalesProgress {
                stage,
                confidence: REPORTED_STAGE_CONFIDENCE,
                next_best_action: stage.next_best_action().to_string(),
            },
            None => infer_stage(&self.context.recent_history(STAGE_WINDOW)),
        };

        tracing::debug!(
            insights = extraction.insights.len(),
            stage = self.context.sales_progress.stage.as_str(),
            "Insights extracted"
        );
        extraction.insights
    }

    /// Snapshot of the current context
    pub fn context(&self) -> ConversationContext {
        self.context.clone()
    }

    pub fn context_ref(&self) -> &ConversationContext {
        &self.context
    }

    /// Back to the initial empty state (history cap kept)
    pub fn reset(&mut self) {
        self.context.reset();
    }
}
