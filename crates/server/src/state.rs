//! Application State
//!
//! Shared state across all handlers. Every collaborator is injected by
//! `main`; nothing here reaches for globals.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;

use sales_coach_agent::{
    CallSummarizer, CoachSession, ContextTracker, FeedbackLearningEngine, SuggestionOrchestrator,
};
use sales_coach_config::Settings;
use sales_coach_core::{CallType, RemoteInference};

use crate::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Live call sessions by id
    pub sessions: Arc<DashMap<String, Arc<CoachSession>>>,
    pub orchestrator: Arc<SuggestionOrchestrator>,
    pub learning: Arc<FeedbackLearningEngine>,
    pub summarizer: Arc<CallSummarizer>,
    /// Remote model shared by context trackers and the summarizer
    pub remote: Option<Arc<dyn RemoteInference>>,
    pub metrics: Option<PrometheusHandle>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        orchestrator: Arc<SuggestionOrchestrator>,
        remote: Option<Arc<dyn RemoteInference>>,
    ) -> Self {
        let persona = settings.llm.remote.persona.clone();
        Self {
            learning: Arc::clone(orchestrator.learning()),
            summarizer: Arc::new(CallSummarizer::new(remote.clone()).with_persona(persona)),
            settings: Arc::new(settings),
            sessions: Arc::new(DashMap::new()),
            orchestrator,
            remote,
            metrics: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_metrics(mut self, metrics: Option<PrometheusHandle>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Start a call session with its own context tracker
    pub fn create_session(&self, call_type: CallType) -> Arc<CoachSession> {
        let tracker = ContextTracker::new(self.remote.clone(), self.settings.context.clone())
            .with_persona(self.settings.llm.remote.persona.clone());
        let session = Arc::new(CoachSession::new(
            call_type,
            Arc::clone(&self.orchestrator),
            tracker,
        ));
        self.sessions
            .insert(session.id().to_string(), Arc::clone(&session));
        session
    }

    /// Look up a session and mark it active
    pub fn session(&self, id: &str) -> Result<Arc<CoachSession>, ServerError> {
        let session = self
            .sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ServerError::SessionNotFound(id.to_string()))?;
        session.touch();
        Ok(session)
    }

    pub fn remove_session(&self, id: &str) -> Result<Arc<CoachSession>, ServerError> {
        self.sessions
            .remove(id)
            .map(|(_, session)| session)
            .ok_or_else(|| ServerError::SessionNotFound(id.to_string()))
    }

    /// Drop sessions idle for longer than `idle_timeout`; returns how many
    pub fn cleanup_expired(&self, idle_timeout: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !session.is_expired(idle_timeout));
        before.saturating_sub(self.sessions.len())
    }

    /// Periodically drop idle sessions until `true` is sent on the returned channel
    pub fn start_session_cleanup(&self) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let state = self.clone();
        let interval = Duration::from_secs(self.settings.server.session_cleanup_interval_secs);
        let idle_timeout = Duration::from_secs(self.settings.server.session_idle_timeout_secs);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let removed = state.cleanup_expired(idle_timeout);
                        if removed > 0 {
                            tracing::info!(
                                removed,
                                remaining = state.sessions.len(),
                                "Idle call sessions removed"
                            );
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
