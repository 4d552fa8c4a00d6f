//! Backend construction from settings

use std::sync::Arc;
use std::time::Duration;

use sales_coach_config::{LocalModelSettings, RemoteModelSettings};

use crate::{LlmError, OllamaBackend, OpenAIBackend, OpenAIConfig};

/// Build and warm up the on-device backend
///
/// Returns `None` when disabled. A backend that fails warm-up is still
/// returned; it reports not-ready and the orchestrator skips it until the
/// readiness monitor sees the runtime.
pub async fn local_from_settings(
    settings: &LocalModelSettings,
) -> Result<Option<Arc<OllamaBackend>>, LlmError> {
    if !settings.enabled {
        tracing::info!("Local inference disabled by configuration");
        return Ok(None);
    }
    let backend = OllamaBackend::from_settings(settings)?;
    backend.warm_up().await;

    let backend = Arc::new(backend);
    if settings.readiness_check_secs > 0 {
        backend.spawn_readiness_monitor(Duration::from_secs(settings.readiness_check_secs));
    }
    Ok(Some(backend))
}

/// Build the remote backend
///
/// Returns `None` when disabled or when no API key is configured for a
/// non-local endpoint, so the service can still start without one.
pub fn remote_from_settings(
    settings: &RemoteModelSettings,
) -> Result<Option<Arc<OpenAIBackend>>, LlmError> {
    if !settings.enabled {
        tracing::info!("Remote inference disabled by configuration");
        return Ok(None);
    }
    match OpenAIBackend::new(OpenAIConfig::from(settings)) {
        Ok(backend) => {
            tracing::info!(model = %settings.model, endpoint = %settings.endpoint, "Remote inference configured");
            Ok(Some(Arc::new(backend)))
        }
        Err(LlmError::Configuration(msg)) => {
            tracing::warn!(reason = %msg, "Remote inference not configured; cloud fallback unavailable");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
