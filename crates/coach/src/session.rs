//! Call session
//!
//! Binds one context tracker to the shared orchestrator for the lifetime
//! of a call. Chunks are processed one at a time per session: the tracker
//! lock is held while extraction and suggestion generation run side by
//! side, so history order follows submission order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use sales_coach_core::{
    CallType, CoachingSuggestion, ConversationContext, ConversationInsight, FeedbackRating,
    FeedbackRecord,
};

use crate::context::ContextTracker;
use crate::orchestrator::SuggestionOrchestrator;
use crate::CoachError;

/// Result of processing one chunk
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkOutcome {
    pub suggestion: Option<CoachingSuggestion>,
    pub insights: Vec<ConversationInsight>,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub call_type: CallType,
    pub started_at: DateTime<Utc>,
    pub context: ConversationContext,
    pub suggestion_count: usize,
}

struct EmittedSuggestion {
    suggestion: CoachingSuggestion,
    /// Full chunk the suggestion was generated for
    chunk: String,
    /// A rating is being recorded; feedback is attached once it is stored
    rating_in_flight: bool,
}

pub struct CoachSession {
    id: String,
    call_type: CallType,
    started_at: DateTime<Utc>,
    orchestrator: Arc<SuggestionOrchestrator>,
    tracker: tokio::sync::Mutex<ContextTracker>,
    suggestions: Mutex<Vec<EmittedSuggestion>>,
    last_activity: Mutex<Instant>,
}

impl CoachSession {
    pub fn new(
        call_type: CallType,
        orchestrator: Arc<SuggestionOrchestrator>,
        tracker: ContextTracker,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(session_id = %id, call_type = call_type.as_str(), "Coaching session started");
        Self {
            id,
            call_type,
            started_at: Utc::now(),
            orchestrator,
            tracker: tokio::sync::Mutex::new(tracker),
            suggestions: Mutex::new(Vec::new()),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn call_type(&self) -> CallType {
        self.call_type
    }

    /// Update last activity
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// No activity for longer than `timeout`
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.lock().elapsed() > timeout
    }

    /// Analyze a chunk and generate a suggestion for it
    pub async fn process_chunk(&self, chunk: &str) -> ChunkOutcome {
        self.touch();
        let chunk = chunk.trim();
        if chunk.is_empty() {
            return ChunkOutcome::default();
        }

        let mut tracker = self.tracker.lock().await;
        // Captured before the tracker appends this chunk
        let history = tracker
            .context_ref()
            .recent_history(self.orchestrator.history_lines());

        let (insights, suggestion) = tokio::join!(
            tracker.analyze(chunk),
            self.orchestrator
                .generate_suggestion(chunk, self.call_type, &history)
        );
        drop(tracker);

        if let Some(suggestion) = &suggestion {
            self.suggestions.lock().push(EmittedSuggestion {
                suggestion: suggestion.clone(),
                chunk: chunk.to_string(),
                rating_in_flight: false,
            });
        }
        metrics::counter!("coach_insights_total").increment(insights.len() as u64);
        tracing::debug!(
            session_id = %self.id,
            has_suggestion = suggestion.is_some(),
            insights = insights.len(),
            "Chunk processed"
        );

        ChunkOutcome {
            suggestion,
            insights,
        }
    }

    /// Feed the agent's rating to learning, then attach it to the suggestion
    ///
    /// If learning fails to store the rating the suggestion stays unrated,
    /// so the same rating can be submitted again.
    pub async fn rate_suggestion(
        &self,
        suggestion_id: &str,
        rating: FeedbackRating,
        reason: Option<String>,
    ) -> Result<CoachingSuggestion, CoachError> {
        self.touch();
        let record = {
            let mut suggestions = self.suggestions.lock();
            let entry = find_entry(&mut suggestions, suggestion_id)?;
            if entry.suggestion.user_feedback.is_some() || entry.rating_in_flight {
                return Err(CoachError::AlreadyRated(suggestion_id.to_string()));
            }
            entry.rating_in_flight = true;

            FeedbackRecord::new(
                entry.suggestion.id.clone(),
                entry.suggestion.suggestion_text.clone(),
                entry.chunk.clone(),
                rating,
            )
            .with_reason(reason.clone())
            .with_types(entry.suggestion.suggestion_type, self.call_type)
        };

        let recorded = self.orchestrator.learning().record_feedback(record).await;

        let rated = {
            let mut suggestions = self.suggestions.lock();
            let entry = find_entry(&mut suggestions, suggestion_id)?;
            entry.rating_in_flight = false;
            if let Err(e) = recorded {
                tracing::warn!(session_id = %self.id, suggestion_id, error = %e, "Rating not recorded");
                return Err(e);
            }
            entry.suggestion.attach_feedback(rating, reason);
            entry.suggestion.clone()
        };

        tracing::info!(session_id = %self.id, suggestion_id, rating = rating.as_str(), "Suggestion rated");
        Ok(rated)
    }

    pub fn suggestions(&self) -> Vec<CoachingSuggestion> {
        self.suggestions
            .lock()
            .iter()
            .map(|e| e.suggestion.clone())
            .collect()
    }

    pub async fn context(&self) -> ConversationContext {
        self.tracker.lock().await.context()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let context = self.context().await;
        SessionSnapshot {
            id: self.id.clone(),
            call_type: self.call_type,
            started_at: self.started_at,
            context,
            suggestion_count: self.suggestions.lock().len(),
        }
    }

    /// End the call: snapshot, then reset the tracker
    pub async fn end(&self) -> SessionSnapshot {
        let mut tracker = self.tracker.lock().await;
        let snapshot = SessionSnapshot {
            id: self.id.clone(),
            call_type: self.call_type,
            started_at: self.started_at,
            context: tracker.context(),
            suggestion_count: self.suggestions.lock().len(),
        };
        tracker.reset();
        tracing::info!(
            session_id = %self.id,
            suggestions = snapshot.suggestion_count,
            duration_secs = (Utc::now() - self.started_at).num_seconds(),
            "Coaching session ended"
        );
        snapshot
    }
}

fn find_entry<'a>(
    suggestions: &'a mut [EmittedSuggestion],
    suggestion_id: &str,
) -> Result<&'a mut EmittedSuggestion, CoachError> {
    suggestions
        .iter_mut()
        .find(|e| e.suggestion.id == suggestion_id)
        .ok_or_else(|| CoachError::SuggestionNotFound(suggestion_id.to_string()))
}
