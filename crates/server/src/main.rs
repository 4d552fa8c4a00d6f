//! Sales Coach Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use sales_coach_agent::{
    FeedbackLearningEngine, OrchestratorConfig, PromptBuilder, SuggestionOrchestrator,
};
use sales_coach_config::{load_settings, Settings};
use sales_coach_core::{LocalInference, RemoteInference};
use sales_coach_llm::factory::{local_from_settings, remote_from_settings};
use sales_coach_persistence::open_store;
use sales_coach_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("SALES_COACH_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing is not initialized yet
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&settings);
    tracing::info!("Starting Sales Coach Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?settings.environment,
        config_env = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    let metrics = if settings.observability.metrics_enabled {
        init_metrics()
    } else {
        None
    };

    let store = open_store(&settings.persistence).await?;
    let learning = Arc::new(FeedbackLearningEngine::load(store, settings.learning.clone()).await?);

    let local = local_from_settings(&settings.llm.local)
        .await?
        .map(|backend| backend as Arc<dyn LocalInference>);
    let remote =
        remote_from_settings(&settings.llm.remote)?.map(|backend| backend as Arc<dyn RemoteInference>);
    if local.is_none() && remote.is_none() {
        tracing::warn!("No inference backend available; sessions will only receive heuristic insights");
    }

    let prompts = PromptBuilder::new(
        settings.prompts.clone(),
        settings.orchestrator.history_lines_in_prompt,
    );
    let orchestrator = Arc::new(SuggestionOrchestrator::new(
        local,
        remote.clone(),
        learning,
        prompts,
        OrchestratorConfig::from_settings(&settings),
    ));

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    let state = AppState::new(settings, orchestrator, remote).with_metrics(metrics);
    let cleanup = state.start_session_cleanup();
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = cleanup.send(true);
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.observability.log_level;
        format!("sales_coach={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
