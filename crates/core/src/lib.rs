//! Core traits and types for the sales coaching engine
//!
//! This crate provides foundational types used across all other crates:
//! - Coaching suggestions and their feedback
//! - Rolling conversation context (customer mentions, sales progress)
//! - Feedback-derived learning patterns
//! - Collaborator traits for inference backends and persistence
//! - Error types

pub mod context;
pub mod error;
pub mod learning;
pub mod suggestion;
pub mod traits;

pub use context::{
    ConversationContext, ConversationInsight, CustomerMentions, CustomerProfile, InsightType,
    SalesProgress, SalesStage,
};
pub use error::{Error, Result};
pub use learning::{FeedbackRecord, LearningPattern};
pub use suggestion::{
    CallType, CoachingSuggestion, FeedbackRating, Priority, SuggestionSource, SuggestionType,
    UserFeedback,
};

pub use traits::{
    ChatMessage, ChatRole, ComputeDevice, GenerationParams, KeyValueStore, LocalInference,
    RemoteInference,
};
