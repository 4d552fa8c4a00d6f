//! Feedback learning engine
//!
//! Process-wide store of agent ratings and the keyword patterns derived
//! from them. Patterns with enough positive history are used to append a
//! "Consider also:" clause to later suggestions sharing their keywords.
//!
//! State lives in memory behind a `parking_lot::Mutex`. Writers are
//! serialized by an async lock: each update is built on a copy, written
//! to the `KeyValueStore`, and only then swapped in, so a failed write
//! leaves both memory and store at the previous state.

use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use sales_coach_config::LearningSettings;
use sales_coach_core::{FeedbackRating, FeedbackRecord, KeyValueStore, LearningPattern};

use crate::keywords::extract_keywords;
use crate::CoachError;

/// Storage key for the raw feedback list
pub const FEEDBACK_KEY: &str = "coach/feedback";
/// Storage key for the pattern set
pub const PATTERNS_KEY: &str = "coach/patterns";

/// Examples kept per pattern and polarity
const MAX_EXAMPLES: usize = 20;
/// Confidence a freshly created pattern starts from
const INITIAL_CONFIDENCE: f32 = 0.5;
const CLAUSE_MARKER: &str = "Consider also:";

/// Exactly the clause `improve_suggestion` appends: lowercase keywords,
/// comma separated, closed by a period at the very end
static GENERATED_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s+)Consider also: [^\s,.\p{Lu}]+(?:, [^\s,.\p{Lu}]+)*\.$")
        .expect("valid generated clause regex")
});

/// Summary of what the engine has learned
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningStats {
    pub total_feedback: usize,
    pub helpful: usize,
    pub not_helpful: usize,
    pub pattern_count: usize,
    pub confident_patterns: usize,
    pub average_confidence: f32,
}

#[derive(Default)]
struct LearningState {
    feedback: Vec<FeedbackRecord>,
    patterns: Vec<LearningPattern>,
}

pub struct FeedbackLearningEngine {
    store: Arc<dyn KeyValueStore>,
    config: LearningSettings,
    state: Mutex<LearningState>,
    write_lock: tokio::sync::Mutex<()>,
}

impl FeedbackLearningEngine {
    /// Restore feedback and patterns from `store`
    ///
    /// Unreadable stored data is logged and replaced with an empty list;
    /// store failures are returned.
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        config: LearningSettings,
    ) -> Result<Self, CoachError> {
        let mut feedback: Vec<FeedbackRecord> = load_list(store.as_ref(), FEEDBACK_KEY).await?;
        let mut patterns: Vec<LearningPattern> = load_list(store.as_ref(), PATTERNS_KEY).await?;

        let overflow = feedback.len().saturating_sub(config.max_feedback_records);
        feedback.drain(..overflow);
        for pattern in &mut patterns {
            pattern.confidence = pattern
                .confidence
                .clamp(config.min_confidence, config.max_confidence);
        }
        prune_patterns(&mut patterns, &config);

        tracing::info!(
            backend = store.backend_name(),
            feedback = feedback.len(),
            pattern_count = patterns.len(),
            "Feedback learning engine loaded"
        );

        Ok(Self {
            store,
            config,
            state: Mutex::new(LearningState { feedback, patterns }),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn config(&self) -> &LearningSettings {
        &self.config
    }

    /// Record one rating and update the matching pattern
    ///
    /// On a store error nothing changes: the rating is not counted and
    /// the caller may retry.
    pub async fn record_feedback(&self, record: FeedbackRecord) -> Result<(), CoachError> {
        let _guard = self.write_lock.lock().await;
        let rating = record.rating;

        // Current until the swap below; writers hold `write_lock`
        let (mut feedback, mut patterns) = {
            let state = self.state.lock();
            (state.feedback.clone(), state.patterns.clone())
        };
        let previous_feedback = serde_json::to_value(&feedback)?;

        // Learn from what the model said, not from an earlier improvement
        let example = strip_clause(&record.suggestion_text).to_string();
        let keywords = extract_keywords(
            &format!("{} {}", record.context, example),
            self.config.max_keywords,
        );
        if keywords.is_empty() {
            tracing::debug!(suggestion_id = %record.suggestion_id, "Feedback has no keywords; no pattern updated");
        } else {
            self.apply_to_patterns(&mut patterns, &keywords, rating, &example);
            prune_patterns(&mut patterns, &self.config);
        }

        feedback.push(record);
        let overflow = feedback
            .len()
            .saturating_sub(self.config.max_feedback_records);
        feedback.drain(..overflow);

        let feedback_json = serde_json::to_value(&feedback)?;
        let patterns_json = serde_json::to_value(&patterns)?;
        self.store.set(FEEDBACK_KEY, feedback_json).await?;
        if let Err(e) = self.store.set(PATTERNS_KEY, patterns_json).await {
            if let Err(restore) = self.store.set(FEEDBACK_KEY, previous_feedback).await {
                tracing::warn!(error = %restore, "Failed to restore stored feedback after pattern write error");
            }
            return Err(e.into());
        }

        let pattern_count = patterns.len();
        *self.state.lock() = LearningState { feedback, patterns };

        metrics::counter!("coach_feedback_total", "rating" => rating.as_str()).increment(1);
        tracing::debug!(rating = rating.as_str(), pattern_count, "Feedback recorded");
        Ok(())
    }

    fn apply_to_patterns(
        &self,
        patterns: &mut Vec<LearningPattern>,
        keywords: &[String],
        rating: FeedbackRating,
        example: &str,
    ) {
        // Most shared keywords wins; ties go to the earliest stored pattern
        let best = patterns
            .iter()
            .enumerate()
            .map(|(index, pattern)| (index, pattern.overlap(keywords)))
            .filter(|(_, overlap)| *overlap > 0)
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(index, _)| index);

        let index = match best {
            Some(index) => index,
            None => {
                let seed = keywords
                    .iter()
                    .take(self.config.seed_keywords)
                    .cloned()
                    .collect();
                patterns.push(LearningPattern::new(seed, INITIAL_CONFIDENCE));
                patterns.len() - 1
            }
        };

        let pattern = &mut patterns[index];
        let step = self.config.confidence_step;
        match rating {
            FeedbackRating::Helpful => {
                push_capped(&mut pattern.positive_examples, example);
                pattern.confidence = (pattern.confidence + step).min(self.config.max_confidence);
            }
            FeedbackRating::NotHelpful => {
                push_capped(&mut pattern.negative_examples, example);
                pattern.confidence = (pattern.confidence - step).max(self.config.min_confidence);
            }
        }
        pattern.frequency += 1;
        pattern.last_updated = Utc::now();
    }

    /// Append learned elements to `text` when a confident pattern matches
    /// `context`. Returns the input unchanged when there is nothing new.
    pub fn improve_suggestion(&self, text: &str, context: &str) -> String {
        let keywords = extract_keywords(context, self.config.max_keywords);
        if keywords.is_empty() || self.config.max_additions == 0 {
            return text.to_string();
        }

        let base = strip_clause(text);
        let base_lower = base.to_lowercase();
        let mut additions: Vec<String> = Vec::new();

        {
            let state = self.state.lock();
            let confident = state.patterns.iter().filter(|pattern| {
                pattern.confidence > self.config.high_confidence_threshold
                    && pattern.matches(&keywords)
            });

            'patterns: for pattern in confident {
                for example in &pattern.positive_examples {
                    for element in extract_keywords(strip_clause(example), self.config.max_keywords) {
                        if additions.len() >= self.config.max_additions {
                            break 'patterns;
                        }
                        if !base_lower.contains(&element) && !additions.contains(&element) {
                            additions.push(element);
                        }
                    }
                }
            }
        }

        if additions.is_empty() {
            return text.to_string();
        }
        format!("{} {} {}.", base, CLAUSE_MARKER, additions.join(", "))
    }

    /// Drop all feedback and patterns, in memory and in the store
    pub async fn clear(&self) -> Result<(), CoachError> {
        let _guard = self.write_lock.lock().await;
        *self.state.lock() = LearningState::default();
        self.store.delete(FEEDBACK_KEY).await?;
        self.store.delete(PATTERNS_KEY).await?;
        tracing::info!("Learning data cleared");
        Ok(())
    }

    pub fn patterns(&self) -> Vec<LearningPattern> {
        self.state.lock().patterns.clone()
    }

    pub fn feedback(&self) -> Vec<FeedbackRecord> {
        self.state.lock().feedback.clone()
    }

    pub fn stats(&self) -> LearningStats {
        let state = self.state.lock();
        let helpful = state
            .feedback
            .iter()
            .filter(|f| f.rating.is_helpful())
            .count();
        let confident_patterns = state
            .patterns
            .iter()
            .filter(|p| p.confidence > self.config.high_confidence_threshold)
            .count();
        let average_confidence = if state.patterns.is_empty() {
            0.0
        } else {
            state.patterns.iter().map(|p| p.confidence).sum::<f32>() / state.patterns.len() as f32
        };

        LearningStats {
            total_feedback: state.feedback.len(),
            helpful,
            not_helpful: state.feedback.len() - helpful,
            pattern_count: state.patterns.len(),
            confident_patterns,
            average_confidence,
        }
    }
}

async fn load_list<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Vec<T>, CoachError> {
    let value = match store.get(key).await {
        Ok(Some(value)) => value,
        Ok(None) => return Ok(Vec::new()),
        Err(sales_coach_core::Error::Serialization(e)) => {
            tracing::warn!(key, error = %e, "Stored learning data unreadable; starting empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_value(value) {
        Ok(list) => Ok(list),
        Err(e) => {
            tracing::warn!(key, error = %e, "Stored learning data malformed; starting empty");
            Ok(Vec::new())
        }
    }
}

/// Keep the most frequently updated patterns once the set grows past the cap
fn prune_patterns(patterns: &mut Vec<LearningPattern>, config: &LearningSettings) {
    if patterns.len() <= config.max_patterns {
        return;
    }
    let before = patterns.len();
    // Stable: among equal frequencies the older patterns are kept
    patterns.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    patterns.truncate(config.retain_patterns);
    tracing::debug!(before, after = patterns.len(), "Learning patterns pruned");
}

fn push_capped(examples: &mut Vec<String>, text: &str) {
    examples.push(text.to_string());
    let overflow = examples.len().saturating_sub(MAX_EXAMPLES);
    examples.drain(..overflow);
}

/// Text without a trailing clause appended by `improve_suggestion`
fn strip_clause(text: &str) -> &str {
    let text = text.trim_end();
    match GENERATED_CLAUSE.find(text) {
        Some(m) => text[..m.start()].trim_end(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sales_coach_persistence::InMemoryStore;
    use serde_json::json;

    async fn engine() -> FeedbackLearningEngine {
        FeedbackLearningEngine::load(Arc::new(InMemoryStore::new()), LearningSettings::default())
            .await
            .unwrap()
    }

    fn helpful(text: &str, context: &str) -> FeedbackRecord {
        FeedbackRecord::new(uuid::Uuid::new_v4().to_string(), text, context, FeedbackRating::Helpful)
    }

    fn not_helpful(text: &str, context: &str) -> FeedbackRecord {
        FeedbackRecord::new(
            uuid::Uuid::new_v4().to_string(),
            text,
            context,
            FeedbackRating::NotHelpful,
        )
    }

    #[tokio::test]
    async fn test_first_feedback_creates_seeded_pattern() {
        let engine = engine().await;
        engine
            .record_feedback(helpful(
                "Mention the annual discount",
                "pricing pricing competitor budget renewal",
            ))
            .await
            .unwrap();

        let patterns = engine.patterns();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].keywords, vec!["pricing", "competitor", "budget"]);
        assert_eq!(patterns[0].frequency, 1);
        assert!((patterns[0].confidence - 0.6).abs() < 1e-6);
        assert_eq!(patterns[0].positive_examples, vec!["Mention the annual discount"]);
    }

    #[tokio::test]
    async fn test_confidence_moves_with_rating_and_stays_bounded() {
        let engine = engine().await;
        let context = "pricing competitor budget";

        let mut previous = 0.0;
        for _ in 0..8 {
            engine
                .record_feedback(helpful("Anchor on value", context))
                .await
                .unwrap();
            let confidence = engine.patterns()[0].confidence;
            assert!(confidence > previous || (confidence - 1.0).abs() < 1e-6);
            assert!(confidence <= 1.0);
            previous = confidence;
        }
        assert!((previous - 1.0).abs() < 1e-6);

        for _ in 0..15 {
            engine
                .record_feedback(not_helpful("Anchor on value", context))
                .await
                .unwrap();
            let confidence = engine.patterns()[0].confidence;
            assert!(confidence < previous || (confidence - 0.1).abs() < 1e-6);
            assert!(confidence >= 0.1);
            previous = confidence;
        }
        assert!((previous - 0.1).abs() < 1e-6);
        assert_eq!(engine.patterns().len(), 1);
        assert_eq!(engine.patterns()[0].frequency, 23);
    }

    #[tokio::test]
    async fn test_best_overlap_wins_and_ties_go_to_earliest() {
        let engine = engine().await;
        engine
            .record_feedback(helpful("Tip one", "alpha bravo charlie"))
            .await
            .unwrap();
        engine
            .record_feedback(helpful("Tip two", "delta echo foxtrot"))
            .await
            .unwrap();

        // Shares two keywords with the second pattern, one with the first
        engine
            .record_feedback(helpful("Tip three", "delta echo alpha"))
            .await
            .unwrap();
        let patterns = engine.patterns();
        assert_eq!(patterns[0].frequency, 1);
        assert_eq!(patterns[1].frequency, 2);

        // One keyword each: earliest stored wins
        engine
            .record_feedback(helpful("Tip four", "bravo foxtrot"))
            .await
            .unwrap();
        let patterns = engine.patterns();
        assert_eq!(patterns[0].frequency, 2);
        assert_eq!(patterns[1].frequency, 2);
    }

    #[tokio::test]
    async fn test_pruning_keeps_most_frequent() {
        let config = LearningSettings {
            max_patterns: 3,
            retain_patterns: 2,
            ..Default::default()
        };
        let engine = FeedbackLearningEngine::load(Arc::new(InMemoryStore::new()), config)
            .await
            .unwrap();

        for (word, events) in [("aaaa", 1), ("bbbb", 2), ("cccc", 3), ("dddd", 1)] {
            for _ in 0..events {
                engine.record_feedback(helpful(word, word)).await.unwrap();
            }
        }

        let keywords: Vec<Vec<String>> =
            engine.patterns().into_iter().map(|p| p.keywords).collect();
        assert_eq!(keywords, vec![vec!["cccc".to_string()], vec!["bbbb".to_string()]]);
    }

    #[tokio::test]
    async fn test_feedback_without_keywords_is_stored_only() {
        let engine = engine().await;
        engine
            .record_feedback(helpful("ok", "yes it is"))
            .await
            .unwrap();
        assert_eq!(engine.feedback().len(), 1);
        assert!(engine.patterns().is_empty());
    }

    #[tokio::test]
    async fn test_feedback_list_is_capped() {
        let config = LearningSettings {
            max_feedback_records: 3,
            ..Default::default()
        };
        let engine = FeedbackLearningEngine::load(Arc::new(InMemoryStore::new()), config)
            .await
            .unwrap();
        for i in 0..5 {
            let mut record = helpful("tip", "ctx");
            record.suggestion_id = format!("s{}", i);
            engine.record_feedback(record).await.unwrap();
        }
        let ids: Vec<String> = engine
            .feedback()
            .into_iter()
            .map(|f| f.suggestion_id)
            .collect();
        assert_eq!(ids, vec!["s2", "s3", "s4"]);
    }

    #[tokio::test]
    async fn test_improve_appends_novel_elements_once() {
        let engine = engine().await;
        for _ in 0..3 {
            engine
                .record_feedback(helpful(
                    "Share the onboarding timeline and security certification",
                    "pricing competitor budget",
                ))
                .await
                .unwrap();
        }
        assert!(engine.patterns()[0].confidence > 0.7);

        let context = "The pricing seems high next to the competitor";
        let improved = engine.improve_suggestion("Anchor on value before discussing discounts", context);
        assert_eq!(
            improved,
            "Anchor on value before discussing discounts Consider also: share, onboarding."
        );

        let twice = engine.improve_suggestion(&improved, context);
        assert_eq!(twice, improved);
    }

    #[tokio::test]
    async fn test_rating_an_improved_suggestion_learns_the_base_text() {
        let engine = engine().await;
        let context = "pricing competitor budget";
        for _ in 0..3 {
            engine
                .record_feedback(helpful("Anchor value. Consider also: share, onboarding.", context))
                .await
                .unwrap();
        }
        assert_eq!(engine.patterns()[0].positive_examples, vec!["Anchor value."; 3]);

        let text = "Anchor on value, share onboarding docs";
        assert_eq!(engine.improve_suggestion(text, context), text);
        assert_eq!(
            engine.improve_suggestion("Lead with ROI", context),
            "Lead with ROI Consider also: anchor, value."
        );
    }

    #[tokio::test]
    async fn test_model_written_consider_also_is_kept() {
        let engine = engine().await;
        let context = "pricing competitor budget";
        for _ in 0..3 {
            engine
                .record_feedback(helpful("Offer the migration workshop", context))
                .await
                .unwrap();
        }

        let text = "Lead with ROI. Consider also: their Q3 budget freeze";
        let improved = engine.improve_suggestion(text, context);
        assert_eq!(
            improved,
            "Lead with ROI. Consider also: their Q3 budget freeze Consider also: offer, migration."
        );
        assert_eq!(engine.improve_suggestion(&improved, context), improved);
    }

    #[tokio::test]
    async fn test_improve_skips_known_elements_and_weak_patterns() {
        let engine = engine().await;
        engine
            .record_feedback(helpful("Share the onboarding timeline", "pricing competitor"))
            .await
            .unwrap();
        // 0.6 is below the threshold
        assert_eq!(
            engine.improve_suggestion("Anchor on value", "pricing question"),
            "Anchor on value"
        );

        for _ in 0..2 {
            engine
                .record_feedback(helpful("Share the onboarding timeline", "pricing competitor"))
                .await
                .unwrap();
        }
        let text = "Share the onboarding timeline with them";
        assert_eq!(engine.improve_suggestion(text, "pricing question"), text);
        assert_eq!(engine.improve_suggestion("Anchor on value", "unrelated words"), "Anchor on value");
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        {
            let engine = FeedbackLearningEngine::load(store.clone(), LearningSettings::default())
                .await
                .unwrap();
            engine
                .record_feedback(helpful("Offer a pilot", "pricing competitor"))
                .await
                .unwrap();
        }
        let reloaded = FeedbackLearningEngine::load(store.clone(), LearningSettings::default())
            .await
            .unwrap();
        assert_eq!(reloaded.feedback().len(), 1);
        assert_eq!(reloaded.patterns().len(), 1);

        reloaded.clear().await.unwrap();
        assert!(store.get(FEEDBACK_KEY).await.unwrap().is_none());
        assert!(store.get(PATTERNS_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_stored_data_starts_empty() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        store.set(PATTERNS_KEY, json!({"not": "a list"})).await.unwrap();
        store.set(FEEDBACK_KEY, json!([{"bogus": true}])).await.unwrap();

        let engine = FeedbackLearningEngine::load(store, LearningSettings::default())
            .await
            .unwrap();
        assert!(engine.patterns().is_empty());
        assert!(engine.feedback().is_empty());
    }

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> sales_coach_core::Result<Option<serde_json::Value>> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: serde_json::Value) -> sales_coach_core::Result<()> {
            Err(sales_coach_core::Error::Storage("disk full".into()))
        }
        async fn delete(&self, _key: &str) -> sales_coach_core::Result<()> {
            Ok(())
        }
        async fn list(&self, _prefix: &str) -> sales_coach_core::Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn backend_name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_store_errors_are_returned() {
        let engine = FeedbackLearningEngine::load(Arc::new(FailingStore), LearningSettings::default())
            .await
            .unwrap();
        let err = engine
            .record_feedback(helpful("Offer a pilot", "pricing"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoachError::Core(sales_coach_core::Error::Storage(_))
        ));
        assert!(engine.feedback().is_empty());
        assert!(engine.patterns().is_empty());
        assert_eq!(engine.stats().total_feedback, 0);
    }

    /// In-memory store whose pattern writes can be made to fail
    struct PatternWriteFails {
        inner: InMemoryStore,
        failing: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for PatternWriteFails {
        async fn get(&self, key: &str) -> sales_coach_core::Result<Option<serde_json::Value>> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: serde_json::Value) -> sales_coach_core::Result<()> {
            if key == PATTERNS_KEY && self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(sales_coach_core::Error::Storage("disk full".into()));
            }
            self.inner.set(key, value).await
        }
        async fn delete(&self, key: &str) -> sales_coach_core::Result<()> {
            self.inner.delete(key).await
        }
        async fn list(&self, prefix: &str) -> sales_coach_core::Result<Vec<String>> {
            self.inner.list(prefix).await
        }
        fn backend_name(&self) -> &str {
            "pattern-write-fails"
        }
    }

    #[tokio::test]
    async fn test_partial_write_is_rolled_back_and_retry_succeeds() {
        let store = Arc::new(PatternWriteFails {
            inner: InMemoryStore::new(),
            failing: std::sync::atomic::AtomicBool::new(true),
        });
        let engine = FeedbackLearningEngine::load(store.clone(), LearningSettings::default())
            .await
            .unwrap();

        let record = helpful("Offer a pilot", "pricing competitor");
        assert!(engine.record_feedback(record.clone()).await.is_err());
        assert!(engine.feedback().is_empty());
        assert!(engine.patterns().is_empty());
        assert_eq!(store.get(FEEDBACK_KEY).await.unwrap(), Some(json!([])));

        store.failing.store(false, std::sync::atomic::Ordering::SeqCst);
        engine.record_feedback(record).await.unwrap();
        assert_eq!(engine.feedback().len(), 1);
        assert_eq!(engine.patterns().len(), 1);
        assert_eq!(
            store.get(FEEDBACK_KEY).await.unwrap().unwrap().as_array().unwrap().len(),
            1
        );
    }

    #[test]
    fn test_strip_clause() {
        assert_eq!(strip_clause("Do X Consider also: a, b."), "Do X");
        assert_eq!(strip_clause("Do X  "), "Do X");
        assert_eq!(
            strip_clause("Lead with ROI. Consider also: their Q3 budget freeze"),
            "Lead with ROI. Consider also: their Q3 budget freeze"
        );
        assert_eq!(
            strip_clause("Consider also: the renewal date. Then close."),
            "Consider also: the renewal date. Then close."
        );
    }
}
