//! Configuration management for agent-relay
//!
//! Supports configuration via:
//! 1. Config file (~/.config/agent-relay/config.toml)
//! 2. Environment variables (OPENAI_API_KEY, AGENT_RELAY_PROVIDER, etc.)
//! 3. CLI arguments (override file/env settings)

use crate::api::{
    InferenceProvider, OpenAiConfig, OpenAiProvider, ProviderKind, SimulatedProvider, TierModels,
};
use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::metrics::DEFAULT_SAVINGS_PER_HIT;
use crate::observability::{
    LedgerConfig, DEFAULT_LEDGER_CAPACITY, DEFAULT_RECENT_WINDOW_SECS, DEFAULT_TIMELINE_LIMIT,
};
use crate::optimization::OptimizerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inference provider settings
    pub provider: ProviderSettings,

    /// Cache and cascade settings
    pub optimizer: OptimizerSettings,

    /// Event ledger settings
    pub ledger: LedgerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Which provider answers prompts (simulated, openai)
    pub kind: ProviderKind,

    /// Base URL of an OpenAI-compatible API
    pub base_url: String,

    /// API key (can also use OPENAI_API_KEY env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub small_model: String,
    pub medium_model: String,
    pub large_model: String,

    /// Maximum tokens for responses
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        let models = TierModels::default();
        Self {
            kind: ProviderKind::Simulated,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            small_model: models.small,
            medium_model: models.medium,
            large_model: models.large,
            max_tokens: 1024,
            temperature: 0.2,
            timeout_secs: 30,
        }
    }
}

impl ProviderSettings {
    pub fn models(&self) -> TierModels {
        TierModels {
            small: self.small_model.clone(),
            medium: self.medium_model.clone(),
            large: self.large_model.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Responses kept before FIFO eviction
    pub cache_capacity: usize,

    /// Small-tier responses of this many characters or fewer are escalated
    pub min_adequate_chars: usize,

    /// Assumed USD saved per cache hit
    pub savings_per_hit: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            min_adequate_chars: 10,
            savings_per_hit: DEFAULT_SAVINGS_PER_HIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Events kept for timeline queries
    pub capacity: usize,

    /// Window for the "events last hour" metric
    pub recent_window_secs: u64,

    /// Timeline length when no limit is given
    pub default_timeline_limit: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LEDGER_CAPACITY,
            recent_window_secs: DEFAULT_RECENT_WINDOW_SECS,
            default_timeline_limit: DEFAULT_TIMELINE_LIMIT,
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agent-relay")
            .join("config.toml")
    }

    /// Load config from specific path; a missing file yields the defaults
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Some(kind) = lookup("AGENT_RELAY_PROVIDER").and_then(|kind| kind.parse().ok()) {
            self.provider.kind = kind;
        }
        if let Some(secs) = lookup("AGENT_RELAY_PROVIDER_TIMEOUT").and_then(|secs| secs.parse().ok()) {
            self.provider.timeout_secs = secs;
        }

        self
    }

    /// Save config to specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.optimizer.cache_capacity == 0 {
            return Err(ConfigError::Invalid("optimizer.cache_capacity must be at least 1".to_string()));
        }
        if self.ledger.capacity == 0 {
            return Err(ConfigError::Invalid("ledger.capacity must be at least 1".to_string()));
        }
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid("provider.timeout_secs must be at least 1".to_string()));
        }
        if self.optimizer.savings_per_hit < 0.0 {
            return Err(ConfigError::Invalid("optimizer.savings_per_hit must not be negative".to_string()));
        }
        if self.provider.kind == ProviderKind::OpenAI && self.provider.api_key.is_none() {
            return Err(ConfigError::MissingRequired(
                "The openai provider needs an API key (OPENAI_API_KEY)".to_string(),
            ));
        }

        Ok(())
    }

    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            cache_capacity: self.optimizer.cache_capacity,
            min_adequate_chars: self.optimizer.min_adequate_chars,
            savings_per_hit: self.optimizer.savings_per_hit,
            provider_timeout: Duration::from_secs(self.provider.timeout_secs),
        }
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            capacity: self.ledger.capacity,
            recent_window_secs: self.ledger.recent_window_secs,
            default_timeline_limit: self.ledger.default_timeline_limit,
        }
    }

    /// Instantiate the configured inference provider
    pub fn build_provider(&self) -> Result<Arc<dyn InferenceProvider>, ConfigError> {
        match self.provider.kind {
            ProviderKind::Simulated => Ok(Arc::new(SimulatedProvider::new(self.provider.models()))),
            ProviderKind::OpenAI => {
                let api_key = self.provider.api_key.clone().ok_or_else(|| {
                    ConfigError::MissingRequired("OPENAI_API_KEY".to_string())
                })?;
                Ok(Arc::new(OpenAiProvider::new(OpenAiConfig {
                    api_key,
                    base_url: Some(self.provider.base_url.clone()),
                    models: self.provider.models(),
                    max_tokens: Some(self.provider.max_tokens),
                    temperature: Some(self.provider.temperature),
                })))
            }
        }
    }

    /// Generate example config content
    pub fn example() -> String {
        let example = Config::default();
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn provider(mut self, kind: ProviderKind) -> Self {
        self.config.provider.kind = kind;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.provider.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.provider.base_url = url.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.provider.timeout_secs = secs;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.optimizer.cache_capacity = capacity;
        self
    }

    pub fn min_adequate_chars(mut self, chars: usize) -> Self {
        self.config.optimizer.min_adequate_chars = chars;
        self
    }

    pub fn ledger_capacity(mut self, capacity: usize) -> Self {
        self.config.ledger.capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
