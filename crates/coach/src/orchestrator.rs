//! Suggestion orchestrator
//!
//! For each chunk: try the on-device model under a hard deadline, fall
//! back to the remote model, parse whichever answered, score it, run it
//! through the learning engine. `None` means no source produced a usable
//! answer; it is a normal outcome.
//!
//! ```text
//! chunk ──► local ready? ──yes──► first_of(local, deadline)
//!              │                     │ finished ──────────────► parse ──► finish
//!              no                    │ failed / timed out
//!              ▼                     ▼
//!           cloud enabled? ──yes──► remote.complete ─────────► parse ──► finish
//!              │no                   │ error / empty
//!              ▼                     ▼
//!             None                  None
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use sales_coach_config::Settings;
use sales_coach_core::{
    CallType, CoachingSuggestion, GenerationParams, LocalInference, RemoteInference,
    SuggestionSource,
};

use crate::learning::FeedbackLearningEngine;
use crate::parser::{ParsedResponse, ResponseParser};
use crate::prompt::PromptBuilder;
use crate::race::{first_of, RaceOutcome};
use crate::scoring::{classify_type, infer_priority, score_confidence};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub local_enabled: bool,
    pub cloud_fallback_enabled: bool,
    /// Hard deadline for the local attempt
    pub local_timeout: Duration,
    pub context_snippet_chars: usize,
    pub local_confidence_base: f32,
    pub cloud_confidence_base: f32,
    pub generation: GenerationParams,
    /// Persona label passed to the remote model
    pub persona: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            cloud_fallback_enabled: true,
            local_timeout: Duration::from_millis(2000),
            context_snippet_chars: 100,
            local_confidence_base: 0.6,
            cloud_confidence_base: 0.8,
            generation: GenerationParams::default(),
            persona: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let orchestrator = &settings.orchestrator;
        Self {
            local_enabled: orchestrator.local_enabled,
            cloud_fallback_enabled: orchestrator.cloud_fallback_enabled,
            local_timeout: Duration::from_millis(orchestrator.local_timeout_ms),
            context_snippet_chars: orchestrator.context_snippet_chars,
            local_confidence_base: orchestrator.local_confidence_base,
            cloud_confidence_base: orchestrator.cloud_confidence_base,
            generation: settings.llm.local.generation_params(),
            persona: settings.llm.remote.persona.clone(),
        }
    }
}

/// Per-source diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub avg_latency_ms: f64,
}

impl SourceStats {
    fn record_success(&mut self, latency_ms: u64) {
        self.successes += 1;
        self.last_success = Some(Utc::now());
        self.avg_latency_ms += (latency_ms as f64 - self.avg_latency_ms) / self.successes as f64;
    }
}

/// Orchestrator diagnostics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrchestratorStats {
    pub local: SourceStats,
    pub cloud: SourceStats,
    /// Calls that ended without a suggestion
    pub none_count: u64,
    /// Calls where a local backend existed but was not ready
    pub local_skipped_not_ready: u64,
}

pub struct SuggestionOrchestrator {
    local: Option<Arc<dyn LocalInference>>,
    remote: Option<Arc<dyn RemoteInference>>,
    learning: Arc<FeedbackLearningEngine>,
    prompts: PromptBuilder,
    parser: ResponseParser,
    config: OrchestratorConfig,
    stats: Mutex<OrchestratorStats>,
}

impl SuggestionOrchestrator {
    pub fn new(
        local: Option<Arc<dyn LocalInference>>,
        remote: Option<Arc<dyn RemoteInference>>,
        learning: Arc<FeedbackLearningEngine>,
        prompts: PromptBuilder,
        config: OrchestratorConfig,
    ) -> Self {
        tracing::info!(
            local = local.as_ref().map(|l| l.model_name()),
            remote = remote.as_ref().map(|r| r.model_name()),
            local_timeout_ms = config.local_timeout.as_millis() as u64,
            "Suggestion orchestrator ready"
        );
        Self {
            local,
            remote,
            learning,
            prompts,
            parser: ResponseParser::new(),
            config,
            stats: Mutex::new(OrchestratorStats::default()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn learning(&self) -> &Arc<FeedbackLearningEngine> {
        &self.learning
    }

    pub fn history_lines(&self) -> usize {
        self.prompts.history_lines()
    }

    /// Produce one suggestion for `chunk`, or `None` when no source could
    pub async fn generate_suggestion(
        &self,
        chunk: &str,
        call_type: CallType,
        recent_history: &[String],
    ) -> Option<CoachingSuggestion> {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            return None;
        }
        let started = Instant::now();

        if let Some(parsed) = self.try_local(chunk, call_type).await {
            return Some(self.finish(parsed, SuggestionSource::Local, chunk, call_type, started));
        }
        if let Some(parsed) = self.try_cloud(chunk, call_type, recent_history).await {
            return Some(self.finish(parsed, SuggestionSource::Cloud, chunk, call_type, started));
        }

        self.stats.lock().none_count += 1;
        metrics::counter!("coach_suggestion_none_total").increment(1);
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "No suggestion available"
        );
        None
    }

    async fn try_local(&self, chunk: &str, call_type: CallType) -> Option<ParsedResponse> {
        if !self.config.local_enabled {
            return None;
        }
        let local = self.local.as_ref()?;
        if !local.is_ready() {
            self.stats.lock().local_skipped_not_ready += 1;
            tracing::debug!(model = local.model_name(), "Local model not ready; skipping");
            return None;
        }

        self.stats.lock().local.attempts += 1;
        let backend = Arc::clone(local);
        let prompt = self.prompts.local_prompt(chunk, call_type);
        let params = self.config.generation.clone();
        let attempt_started = Instant::now();

        let outcome = first_of(
            async move { backend.generate(&prompt, &params).await },
            self.config.local_timeout,
        )
        .await;
        let elapsed_ms = attempt_started.elapsed().as_millis() as u64;

        match outcome {
            RaceOutcome::Finished(raw) => match self.parser.parse(&raw) {
                Some(parsed) => {
                    self.stats.lock().local.record_success(elapsed_ms);
                    tracing::debug!(elapsed_ms, format = ?parsed.format, "Local suggestion parsed");
                    Some(parsed)
                }
                None => {
                    self.stats.lock().local.failures += 1;
                    tracing::warn!(elapsed_ms, "Local model returned an empty response");
                    None
                }
            },
            RaceOutcome::Failed(reason) => {
                self.stats.lock().local.failures += 1;
                tracing::warn!(elapsed_ms, error = %reason, "Local inference failed");
                None
            }
            RaceOutcome::TimedOut => {
                self.stats.lock().local.timeouts += 1;
                tracing::warn!(
                    timeout_ms = self.config.local_timeout.as_millis() as u64,
                    "Local inference timed out; falling back"
                );
                None
            }
        }
    }

    async fn try_cloud(
        &self,
        chunk: &str,
        call_type: CallType,
        recent_history: &[String],
    ) -> Option<ParsedResponse> {
        if !self.config.cloud_fallback_enabled {
            return None;
        }
        let remote = self.remote.as_ref()?;

        self.stats.lock().cloud.attempts += 1;
        let messages = self.prompts.cloud_messages(chunk, call_type, recent_history);
        let attempt_started = Instant::now();
        let result = remote
            .complete(&messages, self.config.persona.as_deref())
            .await;
        let elapsed_ms = attempt_started.elapsed().as_millis() as u64;

        match result {
            Ok(raw) => match self.parser.parse(&raw) {
                Some(parsed) => {
                    self.stats.lock().cloud.record_success(elapsed_ms);
                    tracing::debug!(elapsed_ms, format = ?parsed.format, "Cloud suggestion parsed");
                    Some(parsed)
                }
                None => {
                    self.stats.lock().cloud.failures += 1;
                    tracing::warn!(elapsed_ms, "Remote model returned an empty response");
                    None
                }
            },
            Err(e) => {
                self.stats.lock().cloud.failures += 1;
                tracing::warn!(elapsed_ms, error = %e, model = remote.model_name(), "Cloud inference failed");
                None
            }
        }
    }

    fn finish(
        &self,
        parsed: ParsedResponse,
        source: SuggestionSource,
        chunk: &str,
        call_type: CallType,
        started: Instant,
    ) -> CoachingSuggestion {
        let suggestion_type = parsed
            .suggestion_type
            .unwrap_or_else(|| classify_type(chunk));
        let priority = parsed
            .priority
            .unwrap_or_else(|| infer_priority(&parsed.text, chunk));
        let base = match source {
            SuggestionSource::Local => self.config.local_confidence_base,
            SuggestionSource::Cloud => self.config.cloud_confidence_base,
        };
        let confidence = score_confidence(base, &parsed.text);
        let suggestion_text = self.learning.improve_suggestion(&parsed.text, chunk);
        let processing_time_ms = started.elapsed().as_millis() as u64;

        metrics::counter!("coach_suggestions_total", "source" => source.as_str()).increment(1);
        metrics::histogram!("coach_suggestion_latency_ms", "source" => source.as_str())
            .record(processing_time_ms as f64);
        tracing::debug!(
            source = source.as_str(),
            suggestion_type = suggestion_type.as_str(),
            priority = priority.as_str(),
            processing_time_ms,
            "Suggestion produced"
        );

        CoachingSuggestion {
            id: uuid::Uuid::new_v4().to_string(),
            suggestion_type,
            title: CoachingSuggestion::title_for(suggestion_type, call_type),
            suggestion_text,
            context_snippet: snippet(chunk, self.config.context_snippet_chars),
            confidence,
            priority,
            source,
            processing_time_ms,
            timestamp: Utc::now(),
            user_feedback: None,
        }
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.stats.lock().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = OrchestratorStats::default();
    }
}

/// First `max_chars` grapheme clusters of `text`
fn snippet(text: &str, max_chars: usize) -> String {
    text.graphemes(true).take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sales_coach_config::{LearningSettings, PromptsConfig};
    use sales_coach_core::{ChatMessage, ComputeDevice, Priority, SuggestionType};
    use sales_coach_persistence::InMemoryStore;

    struct MockLocal {
        ready: bool,
        delay: Duration,
        reply: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl LocalInference for MockLocal {
        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> sales_coach_core::Result<String> {
            tokio::time::sleep(self.delay).await;
            self.reply
                .map(str::to_string)
                .map_err(|e| sales_coach_core::Error::Llm(e.to_string()))
        }
        fn is_ready(&self) -> bool {
            self.ready
        }
        fn device(&self) -> ComputeDevice {
            ComputeDevice::Cpu
        }
        fn model_name(&self) -> &str {
            "mock-local"
        }
    }

    struct MockRemote {
        reply: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl RemoteInference for MockRemote {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _persona: Option<&str>,
        ) -> sales_coach_core::Result<String> {
            self.reply
                .map(str::to_string)
                .map_err(|e| sales_coach_core::Error::Llm(e.to_string()))
        }
        fn model_name(&self) -> &str {
            "mock-remote"
        }
    }

    const LOCAL_REPLY: &str =
        "Analysis: Customer compares vendors.\nSuggestion: Ask which criteria matter most.\nTYPE: objection PRIORITY: high";
    const CLOUD_REPLY: &str =
        "**Analysis:** Price pushback.\n**Suggestion:** Reframe around ROI.\nTYPE: objection PRIORITY: high";

    fn local(ready: bool, delay_ms: u64, reply: Result<&'static str, &'static str>) -> Option<Arc<dyn LocalInference>> {
        Some(Arc::new(MockLocal {
            ready,
            delay: Duration::from_millis(delay_ms),
            reply,
        }))
    }

    fn remote(reply: Result<&'static str, &'static str>) -> Option<Arc<dyn RemoteInference>> {
        Some(Arc::new(MockRemote { reply }))
    }

    async fn orchestrator(
        local: Option<Arc<dyn LocalInference>>,
        remote: Option<Arc<dyn RemoteInference>>,
        config: OrchestratorConfig,
    ) -> SuggestionOrchestrator {
        let learning = FeedbackLearningEngine::load(Arc::new(InMemoryStore::new()), LearningSettings::default())
            .await
            .unwrap();
        SuggestionOrchestrator::new(
            local,
            remote,
            Arc::new(learning),
            PromptBuilder::new(PromptsConfig::default(), 3),
            config,
        )
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            local_timeout: Duration::from_millis(100),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_local_success_is_used() {
        let orch = orchestrator(local(true, 0, Ok(LOCAL_REPLY)), remote(Ok(CLOUD_REPLY)), fast_config()).await;
        let suggestion = orch
            .generate_suggestion("We are also talking to another vendor", CallType::Discovery, &[])
            .await
            .unwrap();

        assert_eq!(suggestion.source, SuggestionSource::Local);
        assert_eq!(
            suggestion.suggestion_text,
            "Customer compares vendors. Ask which criteria matter most."
        );
        assert_eq!(suggestion.suggestion_type, SuggestionType::Objection);
        assert_eq!(suggestion.priority, Priority::High);
        assert_eq!(suggestion.title, "Handle Objection · Discovery Call");
        assert!((suggestion.confidence - 0.6).abs() < 1e-6);
        assert!(suggestion.user_feedback.is_none());

        let stats = orch.stats();
        assert_eq!(stats.local.attempts, 1);
        assert_eq!(stats.local.successes, 1);
        assert!(stats.local.last_success.is_some());
        assert_eq!(stats.cloud.attempts, 0);
    }

    #[tokio::test]
    async fn test_not_ready_local_goes_to_cloud() {
        let orch = orchestrator(local(false, 0, Ok(LOCAL_REPLY)), remote(Ok(CLOUD_REPLY)), fast_config()).await;
        let suggestion = orch
            .generate_suggestion("Too expensive", CallType::ColdCall, &[])
            .await
            .unwrap();
        assert_eq!(suggestion.source, SuggestionSource::Cloud);
        assert!((suggestion.confidence - 0.8).abs() < 1e-6);

        let stats = orch.stats();
        assert_eq!(stats.local.attempts, 0);
        assert_eq!(stats.local_skipped_not_ready, 1);
        assert_eq!(stats.cloud.successes, 1);
    }

    #[tokio::test]
    async fn test_local_error_falls_back() {
        let orch = orchestrator(local(true, 0, Err("model crashed")), remote(Ok(CLOUD_REPLY)), fast_config()).await;
        let suggestion = orch
            .generate_suggestion("Too expensive", CallType::ColdCall, &[])
            .await
            .unwrap();
        assert_eq!(suggestion.source, SuggestionSource::Cloud);
        assert_eq!(orch.stats().local.failures, 1);
        assert_eq!(orch.stats().local.timeouts, 0);
    }

    #[tokio::test]
    async fn test_local_timeout_falls_back_at_deadline() {
        let orch = orchestrator(local(true, 1000, Ok(LOCAL_REPLY)), remote(Ok(CLOUD_REPLY)), fast_config()).await;
        let started = Instant::now();
        let suggestion = orch
            .generate_suggestion("Too expensive", CallType::ColdCall, &[])
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(800));
        assert_eq!(suggestion.source, SuggestionSource::Cloud);
        assert_eq!(orch.stats().local.timeouts, 1);
        assert_eq!(orch.stats().local.failures, 0);
    }

    #[tokio::test]
    async fn test_empty_local_response_counts_as_failure() {
        let orch = orchestrator(local(true, 0, Ok("  \n ")), remote(Ok(CLOUD_REPLY)), fast_config()).await;
        let suggestion = orch
            .generate_suggestion("Too expensive", CallType::ColdCall, &[])
            .await
            .unwrap();
        assert_eq!(suggestion.source, SuggestionSource::Cloud);
        assert_eq!(orch.stats().local.failures, 1);
    }

    #[tokio::test]
    async fn test_total_failure_is_none() {
        let orch = orchestrator(local(true, 0, Err("down")), remote(Err("down")), fast_config()).await;
        assert!(orch
            .generate_suggestion("Hello", CallType::General, &[])
            .await
            .is_none());
        let stats = orch.stats();
        assert_eq!(stats.none_count, 1);
        assert_eq!(stats.local.failures, 1);
        assert_eq!(stats.cloud.failures, 1);

        orch.reset_stats();
        assert_eq!(orch.stats(), OrchestratorStats::default());
    }

    #[tokio::test]
    async fn test_cloud_fallback_can_be_disabled() {
        let config = OrchestratorConfig {
            cloud_fallback_enabled: false,
            ..fast_config()
        };
        let orch = orchestrator(local(true, 0, Err("down")), remote(Ok(CLOUD_REPLY)), config).await;
        assert!(orch
            .generate_suggestion("Hello", CallType::General, &[])
            .await
            .is_none());
        assert_eq!(orch.stats().cloud.attempts, 0);
    }

    #[tokio::test]
    async fn test_local_disabled_by_policy() {
        let config = OrchestratorConfig {
            local_enabled: false,
            ..fast_config()
        };
        let orch = orchestrator(local(true, 0, Ok(LOCAL_REPLY)), remote(Ok(CLOUD_REPLY)), config).await;
        let suggestion = orch
            .generate_suggestion("Hello", CallType::General, &[])
            .await
            .unwrap();
        assert_eq!(suggestion.source, SuggestionSource::Cloud);
        assert_eq!(orch.stats().local.attempts, 0);
    }

    #[tokio::test]
    async fn test_empty_chunk_touches_no_source() {
        let orch = orchestrator(local(true, 0, Ok(LOCAL_REPLY)), remote(Ok(CLOUD_REPLY)), fast_config()).await;
        assert!(orch.generate_suggestion("   ", CallType::Demo, &[]).await.is_none());
        let stats = orch.stats();
        assert_eq!(stats.local.attempts, 0);
        assert_eq!(stats.cloud.attempts, 0);
        assert_eq!(stats.none_count, 0);
    }

    #[tokio::test]
    async fn test_garbage_tags_fall_back_to_heuristics() {
        let orch = orchestrator(
            local(true, 0, Ok("Suggestion: Confirm who signs off\nTYPE: wibble PRIORITY: extreme")),
            None,
            fast_config(),
        )
        .await;
        let suggestion = orch
            .generate_suggestion("Send the contract and we will sign", CallType::Negotiation, &[])
            .await
            .unwrap();
        assert_eq!(suggestion.suggestion_type, SuggestionType::Closing);
        assert_eq!(suggestion.priority, Priority::Medium);
        assert_eq!(suggestion.suggestion_text, "Confirm who signs off");
    }

    #[tokio::test]
    async fn test_snippet_is_truncated() {
        let config = OrchestratorConfig {
            context_snippet_chars: 10,
            ..fast_config()
        };
        let orch = orchestrator(local(true, 0, Ok(LOCAL_REPLY)), None, config).await;
        let suggestion = orch
            .generate_suggestion("Héllo wörld, this is a long transcript chunk", CallType::General, &[])
            .await
            .unwrap();
        assert_eq!(suggestion.context_snippet, "Héllo wörl");
    }

    #[test]
    fn test_running_average_latency() {
        let mut stats = SourceStats::default();
        stats.record_success(100);
        stats.record_success(300);
        assert_eq!(stats.successes, 2);
        assert!((stats.avg_latency_ms - 200.0).abs() < 1e-9);
    }
}
