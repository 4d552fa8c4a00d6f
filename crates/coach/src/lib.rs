//! Sales coaching inference core
//!
//! For every transcript chunk of a live call:
//! - [`ContextTracker`] keeps the rolling conversation state and extracts
//!   structured insights (remote extraction with a keyword fallback)
//! - [`SuggestionOrchestrator`] races the on-device model against a hard
//!   deadline, falls back to the remote model, and parses the answer into
//!   a [`CoachingSuggestion`](sales_coach_core::CoachingSuggestion)
//! - [`FeedbackLearningEngine`] turns agent ratings into keyword patterns
//!   and uses them to augment later suggestions
//!
//! [`CoachSession`] ties the three together for one call, and
//! [`CallSummarizer`] produces the post-call summary and follow-up email.

pub mod context;
pub mod extraction;
pub mod heuristics;
pub mod keywords;
pub mod learning;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod race;
pub mod scoring;
pub mod session;
pub mod summary;

pub use context::ContextTracker;
pub use learning::{FeedbackLearningEngine, LearningStats, FEEDBACK_KEY, PATTERNS_KEY};
pub use orchestrator::{OrchestratorConfig, OrchestratorStats, SourceStats, SuggestionOrchestrator};
pub use parser::{ParseFormat, ParsedResponse, ResponseParser};
pub use prompt::PromptBuilder;
pub use race::{first_of, RaceOutcome};
pub use session::{ChunkOutcome, CoachSession, SessionSnapshot};
pub use summary::{CallSummarizer, CallSummary, FollowUpEmail};

use thiserror::Error;

/// Coaching core errors
///
/// Inference failures never surface here; they become fallbacks or
/// `None`. What remains are storage problems and caller mistakes.
#[derive(Error, Debug)]
pub enum CoachError {
    #[error("Suggestion not found: {0}")]
    SuggestionNotFound(String),

    #[error("Suggestion already rated: {0}")]
    AlreadyRated(String),

    #[error(transparent)]
    Core(#[from] sales_coach_core::Error),
}

impl From<serde_json::Error> for CoachError {
    fn from(err: serde_json::Error) -> Self {
        CoachError::Core(err.into())
    }
}
