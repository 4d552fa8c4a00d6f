//! End-to-end coaching scenarios
//!
//! Inference backends are scripted in-process; learning state lives in an
//! in-memory store.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use sales_coach_agent::{
    ContextTracker, FeedbackLearningEngine, OrchestratorConfig, PromptBuilder,
    SuggestionOrchestrator,
};
use sales_coach_config::{ContextSettings, LearningSettings, PromptsConfig};
use sales_coach_core::{
    CallType, ChatMessage, ComputeDevice, FeedbackRating, FeedbackRecord, GenerationParams,
    LocalInference, Priority, RemoteInference, SalesStage, SuggestionSource, SuggestionType,
};
use sales_coach_persistence::InMemoryStore;

/// Remote model replaying a fixed script, then failing
struct ScriptedRemote {
    replies: Mutex<VecDeque<String>>,
    delay: Duration,
}

impl ScriptedRemote {
    fn new(replies: &[&str]) -> Arc<dyn RemoteInference> {
        Self::delayed(replies, Duration::ZERO)
    }

    fn delayed(replies: &[&str], delay: Duration) -> Arc<dyn RemoteInference> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            delay,
        })
    }
}

#[async_trait]
impl RemoteInference for ScriptedRemote {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _persona: Option<&str>,
    ) -> sales_coach_core::Result<String> {
        tokio::time::sleep(self.delay).await;
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| sales_coach_core::Error::Unavailable("script exhausted".into()))
    }

    fn model_name(&self) -> &str {
        "scripted-remote"
    }
}

struct SlowLocal {
    delay: Duration,
}

#[async_trait]
impl LocalInference for SlowLocal {
    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> sales_coach_core::Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok("Suggestion: Ask what they are comparing against.".to_string())
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn device(&self) -> ComputeDevice {
        ComputeDevice::Cpu
    }

    fn model_name(&self) -> &str {
        "slow-local"
    }
}

async fn learning(settings: LearningSettings) -> Arc<FeedbackLearningEngine> {
    Arc::new(
        FeedbackLearningEngine::load(Arc::new(InMemoryStore::new()), settings)
            .await
            .unwrap(),
    )
}

async fn orchestrator(
    local: Option<Arc<dyn LocalInference>>,
    remote: Option<Arc<dyn RemoteInference>>,
    local_timeout: Duration,
) -> SuggestionOrchestrator {
    SuggestionOrchestrator::new(
        local,
        remote,
        learning(LearningSettings::default()).await,
        PromptBuilder::new(PromptsConfig::default(), 3),
        OrchestratorConfig {
            local_timeout,
            ..Default::default()
        },
    )
}

/// Price objection with a slow on-device model: the remote answer is used
/// and the caller waits roughly deadline + remote latency, not the local latency.
#[tokio::test]
async fn test_price_objection_falls_back_to_cloud_within_deadline() {
    let local: Arc<dyn LocalInference> = Arc::new(SlowLocal {
        delay: Duration::from_millis(1500),
    });
    let remote = ScriptedRemote::delayed(
        &["Suggestion: Acknowledge the concern and anchor on the savings they described earlier."],
        Duration::from_millis(50),
    );
    let orch = orchestrator(Some(local), Some(remote), Duration::from_millis(200)).await;

    let started = Instant::now();
    let suggestion = orch
        .generate_suggestion(
            "Your price is way too high compared to competitors",
            CallType::Negotiation,
            &[],
        )
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(suggestion.source, SuggestionSource::Cloud);
    assert_eq!(suggestion.suggestion_type, SuggestionType::Objection);
    assert_eq!(suggestion.priority, Priority::High);
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(1000), "took {:?}", elapsed);
    assert_eq!(orch.stats().local.timeouts, 1);
}

#[tokio::test]
async fn test_cloud_outscores_local_for_same_tip() {
    let tip = "Suggestion: Ask which criteria matter most.";

    struct FastLocal;
    #[async_trait]
    impl LocalInference for FastLocal {
        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> sales_coach_core::Result<String> {
            Ok("Suggestion: Ask which criteria matter most.".to_string())
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn device(&self) -> ComputeDevice {
            ComputeDevice::Cpu
        }
        fn model_name(&self) -> &str {
            "fast-local"
        }
    }

    let fast: Arc<dyn LocalInference> = Arc::new(FastLocal);
    let local_orch = orchestrator(Some(fast), None, Duration::from_millis(500)).await;
    let cloud_orch = orchestrator(None, Some(ScriptedRemote::new(&[tip])), Duration::from_millis(500)).await;

    let chunk = "We are evaluating a few vendors";
    let from_local = local_orch
        .generate_suggestion(chunk, CallType::Demo, &[])
        .await
        .unwrap();
    let from_cloud = cloud_orch
        .generate_suggestion(chunk, CallType::Demo, &[])
        .await
        .unwrap();

    assert_eq!(from_local.suggestion_text, from_cloud.suggestion_text);
    assert!(from_cloud.confidence > from_local.confidence);
    for confidence in [from_local.confidence, from_cloud.confidence] {
        assert!((0.0..=1.0).contains(&confidence));
    }
}

#[tokio::test]
async fn test_unknown_tags_still_yield_valid_enums() {
    let remote = ScriptedRemote::new(&[
        "Analysis: Hard to say.\nSuggestion: Keep listening.\nTYPE: banana PRIORITY: sky-high",
    ]);
    let orch = orchestrator(None, Some(remote), Duration::from_millis(500)).await;
    let suggestion = orch
        .generate_suggestion("Tell me more about the weather there", CallType::General, &[])
        .await
        .unwrap();

    assert!(SuggestionType::ALL.contains(&suggestion.suggestion_type));
    let json = serde_json::to_value(&suggestion).unwrap();
    let kind = json["type"].as_str().unwrap();
    assert!(SuggestionType::ALL.iter().any(|t| t.as_str() == kind));
    assert!(["high", "medium", "low"].contains(&json["priority"].as_str().unwrap()));
}

#[tokio::test]
async fn test_malformed_extraction_only_appends_history() {
    let remote = ScriptedRemote::new(&[
        r#"{"insights": [], "contextUpdate": {"budget": "$50k", "painPoints": ["slow reporting"], "currentTopic": "reporting"}, "salesStage": "demo"}"#,
        "Sorry, I cannot help with that.",
        r#"{"insights": [}"#,
    ]);
    let mut tracker = ContextTracker::new(Some(remote), ContextSettings::default());

    tracker.analyze("Reporting takes us days and we budgeted $50k").await;
    let before = tracker.context();
    assert_eq!(before.sales_progress.stage, SalesStage::Demo);

    assert!(tracker.analyze("Hmm, let me think").await.is_empty());
    assert!(tracker.analyze("What about the price?").await.is_empty());

    let mut after = tracker.context();
    assert_eq!(
        after.history,
        vec![
            "Reporting takes us days and we budgeted $50k",
            "Hmm, let me think",
            "What about the price?"
        ]
    );
    after.history = before.history.clone();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_pain_points_accumulate_without_duplicates() {
    let remote = ScriptedRemote::new(&[
        r#"{"contextUpdate": {"painPoints": ["cost"]}}"#,
        r#"{"contextUpdate": {"painPoints": ["Cost", "integration effort"]}}"#,
        r#"{"contextUpdate": {"painPoints": []}}"#,
    ]);
    let mut tracker = ContextTracker::new(Some(remote), ContextSettings::default());

    tracker.analyze("It costs a lot").await;
    tracker.analyze("And integrating is painful").await;
    tracker.analyze("Anyway").await;

    assert_eq!(
        tracker.context_ref().customer_mentions.pain_points,
        vec!["cost", "integration effort"]
    );
}

#[tokio::test]
async fn test_history_is_capped_fifo() {
    let settings = ContextSettings {
        history_cap: 3,
        ..Default::default()
    };
    let mut tracker = ContextTracker::new(None, settings);
    for chunk in ["one", "two", "three", "four", "five"] {
        tracker.analyze(chunk).await;
    }
    assert_eq!(tracker.context_ref().history, vec!["three", "four", "five"]);
}

/// 51 distinct patterns against a cap of 50: the least reinforced one goes
#[tokio::test]
async fn test_pattern_set_is_capped_by_frequency() {
    let engine = learning(LearningSettings {
        max_patterns: 50,
        retain_patterns: 50,
        ..Default::default()
    })
    .await;

    let topic = |i: usize| format!("topic{:02}", i);
    for i in 0..50 {
        for _ in 0..2 {
            engine
                .record_feedback(FeedbackRecord::new(
                    format!("s{}", i),
                    "",
                    topic(i),
                    FeedbackRating::Helpful,
                ))
                .await
                .unwrap();
        }
    }
    engine
        .record_feedback(FeedbackRecord::new("s50", "", topic(50), FeedbackRating::Helpful))
        .await
        .unwrap();

    let patterns = engine.patterns();
    assert_eq!(patterns.len(), 50);
    assert!(patterns.iter().all(|p| p.frequency == 2));
    assert!(!patterns.iter().any(|p| p.keywords.contains(&topic(50))));
    assert_eq!(engine.stats().total_feedback, 101);
}

#[tokio::test]
async fn test_improvement_is_idempotent() {
    let engine = learning(LearningSettings::default()).await;
    for id in ["a", "b", "c"] {
        engine
            .record_feedback(FeedbackRecord::new(
                id,
                "Offer the migration workshop",
                "Customers complain pricing spreadsheets break",
                FeedbackRating::Helpful,
            ))
            .await
            .unwrap();
    }
    assert_eq!(engine.stats().confident_patterns, 1);

    let context = "Our pricing spreadsheets are a mess";
    let once = engine.improve_suggestion("Mention the onboarding timeline.", context);
    let twice = engine.improve_suggestion(&once, context);

    assert_eq!(once, "Mention the onboarding timeline. Consider also: offer, migration.");
    assert_eq!(twice, once);
    assert_eq!(twice.matches("Consider also:").count(), 1);
}

#[tokio::test]
async fn test_pattern_confidence_tracks_ratings() {
    let engine = learning(LearningSettings::default()).await;
    let record = |rating| {
        FeedbackRecord::new("s", "Share the security whitepaper", "Compliance review pending", rating)
    };

    let mut last = None;
    for _ in 0..8 {
        engine.record_feedback(record(FeedbackRating::Helpful)).await.unwrap();
        let confidence = engine.patterns()[0].confidence;
        if let Some(previous) = last {
            assert!(confidence >= previous);
        }
        last = Some(confidence);
    }
    assert!((engine.patterns()[0].confidence - 1.0).abs() < 1e-6);

    for _ in 0..15 {
        engine
            .record_feedback(record(FeedbackRating::NotHelpful))
            .await
            .unwrap();
    }
    assert!((engine.patterns()[0].confidence - 0.1).abs() < 1e-6);
    assert_eq!(engine.patterns().len(), 1);
}
