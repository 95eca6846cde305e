//! Configuration loading, validation, and management for Hindsight.
//!
//! Loads configuration from `hindsight.toml` (path overridable via
//! `HINDSIGHT_CONFIG`) with environment variable overrides for secrets.
//! Validates all settings at startup. The embedding provider/model/dimension
//! is process-wide immutable configuration: it is read once here, injected
//! into the gateways, and never touched per request.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable naming the config file path.
pub const CONFIG_PATH_ENV: &str = "HINDSIGHT_CONFIG";
/// Environment override for the database connection string.
pub const DATABASE_URL_ENV: &str = "HINDSIGHT_DATABASE_URL";
/// Environment override for the upstream API key (both gateways).
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for hindsight_core::Error {
    fn from(e: ConfigError) -> Self {
        hindsight_core::Error::Config {
            message: e.to_string(),
        }
    }
}

/// The root configuration structure. Maps directly to `hindsight.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string for the archive + session store.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_database_url() -> String {
    "postgresql://localhost/hindsight".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            embedding: EmbeddingConfig::default(),
            chat: ChatConfig::default(),
            retrieval: RetrievalConfig::default(),
            budget: BudgetConfig::default(),
            retry: RetryConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[REDACTED]")
            .field("embedding", &self.embedding)
            .field("chat", &self.chat)
            .field("retrieval", &self.retrieval)
            .field("budget", &self.budget)
            .field("retry", &self.retry)
            .field("server", &self.server)
            .finish()
    }
}

/// Fixed embedding provider settings. Part of the stored-vector uniqueness
/// contract: turns are unique per (anchor message, provider, model).
#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// API key; `OPENAI_API_KEY` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider tag recorded alongside stored vectors.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Fixed vector dimension; every stored and queried vector must match.
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_provider() -> String {
    "hindsight".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-large".into()
}
fn default_embedding_dimension() -> usize {
    3072
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            api_key: None,
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
        }
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish()
    }
}

/// Chat-completion gateway and orchestrator-loop settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,

    /// API key; `OPENAI_API_KEY` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_chat_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Hard ceiling on total model rounds per request (liveness guard).
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// How many malformed tool calls may be fed back for self-repair
    /// before the request fails.
    #[serde(default = "default_max_correction_rounds")]
    pub max_correction_rounds: u32,
}

fn default_chat_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-4o".into()
}
fn default_chat_temperature() -> f32 {
    0.2
}
fn default_max_rounds() -> u32 {
    8
}
fn default_max_correction_rounds() -> u32 {
    2
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            api_key: None,
            model: default_chat_model(),
            temperature: default_chat_temperature(),
            max_tokens: None,
            max_rounds: default_max_rounds(),
            max_correction_rounds: default_max_correction_rounds(),
        }
    }
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_rounds", &self.max_rounds)
            .field("max_correction_rounds", &self.max_correction_rounds)
            .finish()
    }
}

/// Peek / hydration bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    #[serde(default = "default_top_n_snippets")]
    pub default_top_n_snippets: usize,

    #[serde(default = "default_max_top_n_snippets")]
    pub max_top_n_snippets: usize,

    #[serde(default = "default_bin_days")]
    pub default_bin_days: u32,

    #[serde(default = "default_max_bin_days")]
    pub max_bin_days: u32,

    /// Preview snippet length bound, characters.
    #[serde(default = "default_snippet_max_chars")]
    pub snippet_max_chars: usize,

    /// Per-side hydrated content length bound, characters.
    #[serde(default = "default_turn_max_chars")]
    pub turn_max_chars: usize,
}

fn default_top_k() -> usize {
    100
}
fn default_max_top_k() -> usize {
    1000
}
fn default_top_n_snippets() -> usize {
    10
}
fn default_max_top_n_snippets() -> usize {
    100
}
fn default_bin_days() -> u32 {
    1
}
fn default_max_bin_days() -> u32 {
    365
}
fn default_snippet_max_chars() -> usize {
    400
}
fn default_turn_max_chars() -> usize {
    2000
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            default_top_n_snippets: default_top_n_snippets(),
            max_top_n_snippets: default_max_top_n_snippets(),
            default_bin_days: default_bin_days(),
            max_bin_days: default_max_bin_days(),
            snippet_max_chars: default_snippet_max_chars(),
            turn_max_chars: default_turn_max_chars(),
        }
    }
}

/// Hard caps on hydrated context folded into a model prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_hydrated_turns")]
    pub max_hydrated_turns: usize,

    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
}

fn default_max_hydrated_turns() -> usize {
    20
}
fn default_max_context_tokens() -> usize {
    50_000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_hydrated_turns: default_max_hydrated_turns(),
            max_context_tokens: default_max_context_tokens(),
        }
    }
}

/// Bounded retry with exponential backoff for upstream calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    250
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8484
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and apply env overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut config: AppConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from `HINDSIGHT_CONFIG` or `./hindsight.toml`, falling back to
    /// defaults when no file exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "hindsight.toml".into());
        let path = Path::new(&path);
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config file found, using defaults with env overrides");
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    /// Environment variables take precedence over file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            self.database_url = url;
        }
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            self.embedding.api_key = Some(key.clone());
            self.chat.api_key = Some(key);
        }
    }

    /// Validate all settings. Called at startup; a bad config never makes it
    /// into a running process.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimension must be positive".into(),
            ));
        }
        if self.retrieval.default_top_k == 0 || self.retrieval.default_top_k > self.retrieval.max_top_k
        {
            return Err(ConfigError::Invalid(format!(
                "retrieval.default_top_k must be in 1..={}",
                self.retrieval.max_top_k
            )));
        }
        if self.retrieval.default_top_n_snippets == 0
            || self.retrieval.default_top_n_snippets > self.retrieval.max_top_n_snippets
        {
            return Err(ConfigError::Invalid(format!(
                "retrieval.default_top_n_snippets must be in 1..={}",
                self.retrieval.max_top_n_snippets
            )));
        }
        if self.retrieval.default_bin_days == 0
            || self.retrieval.default_bin_days > self.retrieval.max_bin_days
        {
            return Err(ConfigError::Invalid(format!(
                "retrieval.default_bin_days must be in 1..={}",
                self.retrieval.max_bin_days
            )));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ConfigError::Invalid(
                "chat.temperature must be in 0.0..=2.0".into(),
            ));
        }
        if self.chat.max_rounds == 0 {
            return Err(ConfigError::Invalid("chat.max_rounds must be positive".into()));
        }
        if self.budget.max_hydrated_turns == 0 || self.budget.max_context_tokens == 0 {
            return Err(ConfigError::Invalid(
                "budget caps must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be positive".into(),
            ));
        }
        Ok(())
    }
}
