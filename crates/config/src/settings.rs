//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    ConfigError, ContextSettings, LearningSettings, LlmSettings, OrchestratorSettings,
    PromptsConfig,
};

/// Environment variable prefix; nested keys use `__`
pub const ENV_PREFIX: &str = "SALES_COACH";

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Staging and production reject settings that only make sense locally
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Local/cloud race and suggestion scoring
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    /// Per-call context tracking
    #[serde(default)]
    pub context: ContextSettings,

    /// Feedback learning
    #[serde(default)]
    pub learning: LearningSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub prompts: PromptsConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed origins; empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Call sessions idle longer than this are dropped
    #[serde(default = "default_session_idle_timeout")]
    pub session_idle_timeout_secs: u64,

    /// How often idle sessions are looked for
    #[serde(default = "default_session_cleanup_interval")]
    pub session_cleanup_interval_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_session_idle_timeout() -> u64 {
    3600
}
fn default_session_cleanup_interval() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            session_idle_timeout_secs: default_session_idle_timeout(),
            session_cleanup_interval_secs: default_session_cleanup_interval(),
        }
    }
}

/// Storage backend for feedback and learned patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// Process-local, lost on restart
    #[default]
    Memory,
    /// One JSON file per key under `data_dir`
    File,
    Scylla,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,

    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,

    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_scylla_hosts() -> Vec<String> {
    vec!["127.0.0.1:9042".to_string()]
}

fn default_scylla_keyspace() -> String {
    "sales_coach".to_string()
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::Memory,
            data_dir: default_data_dir(),
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

impl Settings {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.orchestrator.validate()?;
        self.context.validate()?;
        self.learning.validate()?;
        self.llm.validate()?;
        self.validate_server()?;
        self.validate_persistence()?;

        if self.environment.is_strict() && self.persistence.backend == PersistenceBackend::Memory {
            tracing::warn!(
                environment = ?self.environment,
                "In-memory persistence configured; learned patterns are lost on restart"
            );
        }

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "Port cannot be 0"));
        }
        if self.server.session_idle_timeout_secs == 0 || self.server.session_cleanup_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "server.session_idle_timeout_secs",
                "Session timeout and cleanup interval must be greater than 0",
            ));
        }
        if self.environment.is_production()
            && self.server.cors_enabled
            && self.server.cors_origins.is_empty()
        {
            return Err(ConfigError::invalid(
                "server.cors_origins",
                "Explicit CORS origins are required in production",
            ));
        }
        Ok(())
    }

    fn validate_persistence(&self) -> Result<(), ConfigError> {
        match self.persistence.backend {
            PersistenceBackend::File if self.persistence.data_dir.trim().is_empty() => {
                Err(ConfigError::MissingField("persistence.data_dir".to_string()))
            }
            PersistenceBackend::Scylla if self.persistence.scylla_hosts.is_empty() => {
                Err(ConfigError::MissingField("persistence.scylla_hosts".to_string()))
            }
            PersistenceBackend::Scylla if self.persistence.replication_factor == 0 => Err(
                ConfigError::invalid("persistence.replication_factor", "Must be at least 1"),
            ),
            _ => Ok(()),
        }
    }
}

/// Load settings from `config/` in the working directory
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from("config", env)
}

/// Load settings from a config directory, environment overrides and defaults
///
/// Sources, later ones win:
/// 1. `{dir}/default.*`
/// 2. `{dir}/{env}.*`
/// 3. `SALES_COACH__*` environment variables
pub fn load_settings_from(dir: impl AsRef<Path>, env: Option<&str>) -> Result<Settings, ConfigError> {
    let dir = dir.as_ref();
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false));

    if let Some(env_name) = env {
        builder = builder
            .add_source(File::with_name(&dir.join(env_name).to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(
        dir = %dir.display(),
        env = env.unwrap_or("default"),
        "Settings loaded"
    );

    Ok(settings)
}
