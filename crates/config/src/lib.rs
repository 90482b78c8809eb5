//! Configuration loading, validation, and management for docq.
//!
//! Loads configuration from `~/.docq/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.docq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint (completion, embedding, moderation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible model endpoint
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Completion model
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding model
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Sampling temperature — 0.0 keeps answers grounded in the docs
    #[serde(default)]
    pub temperature: f32,

    /// Token budget configuration
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Vector index configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Prompt configuration
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// The three token budget figures the context fitter works with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Hard limit for the whole request (the model's context length)
    #[serde(default = "default_model_ceiling")]
    pub model_ceiling: usize,

    /// Tokens reserved for the model's reply
    #[serde(default = "default_reserved_reply_tokens")]
    pub reserved_reply_tokens: usize,

    /// Soft cap for reference text injected into the prompt
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            model_ceiling: default_model_ceiling(),
            reserved_reply_tokens: default_reserved_reply_tokens(),
            max_context_tokens: default_max_context_tokens(),
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Endpoint URL of the vector index
    #[serde(default)]
    pub index_url: String,

    /// API key for the index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default namespace (documentation set) when the request names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// How many passages to retrieve per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_url: String::new(),
            api_key: None,
            namespace: None,
            top_k: default_top_k(),
        }
    }
}

/// Gateway (HTTP server) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origin for the browser UI
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,

    /// Requests allowed per client per minute
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origin: default_allowed_origin(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

/// Prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Product name used in the grounding preamble ("the X documentation")
    #[serde(default = "default_product_name")]
    pub product_name: String,

    /// Full override for the system identity message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_override: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            product_name: default_product_name(),
            system_override: None,
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}

fn default_model_ceiling() -> usize {
    4096
}

fn default_reserved_reply_tokens() -> usize {
    1024
}

fn default_max_context_tokens() -> usize {
    1536
}

fn default_top_k() -> usize {
    3
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8080
}

fn default_allowed_origin() -> String {
    "http://localhost:3000".into()
}

fn default_rate_limit_per_minute() -> usize {
    60
}

fn default_product_name() -> String {
    "the product".into()
}

impl AppConfig {
    /// Load configuration from the default path (~/.docq/config.toml).
    ///
    /// Also checks environment variables:
    /// - `DOCQ_API_KEY` / `OPENAI_API_KEY` — model endpoint key
    /// - `DOCQ_MODEL` — completion model override
    /// - `PINECONE_API_KEY` — vector index key
    /// - `DOCQ_INDEX_URL` — vector index endpoint
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("DOCQ_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("DOCQ_MODEL") {
            config.model = model;
        }

        if config.retrieval.api_key.is_none() {
            config.retrieval.api_key = std::env::var("PINECONE_API_KEY").ok();
        }

        if let Ok(url) = std::env::var("DOCQ_INDEX_URL") {
            config.retrieval.index_url = url;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".docq")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.budget.reserved_reply_tokens >= self.budget.model_ceiling {
            return Err(ConfigError::ValidationError(
                "budget.reserved_reply_tokens must be below budget.model_ceiling".into(),
            ));
        }

        if self.budget.max_context_tokens >= self.budget.model_ceiling {
            return Err(ConfigError::ValidationError(
                "budget.max_context_tokens must be below budget.model_ceiling".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for first-run setup).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: default_api_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            temperature: 0.0,
            budget: BudgetConfig::default(),
            retrieval: RetrievalConfig::default(),
            gateway: GatewayConfig::default(),
            prompt: PromptConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for docq_core::Error {
    fn from(err: ConfigError) -> Self {
        docq_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.budget.model_ceiling, 4096);
        assert_eq!(config.budget.reserved_reply_tokens, 1024);
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(config.model, "gpt-3.5-turbo");
    }

    #[test]
    fn parse_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "gpt-4"

[budget]
model_ceiling = 8192

[retrieval]
index_url = "https://docs-index.example.io"
top_k = 5

[prompt]
product_name = "Hilla"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.budget.model_ceiling, 8192);
        // Unspecified fields keep their defaults
        assert_eq!(config.budget.reserved_reply_tokens, 1024);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.prompt.product_name, "Hilla");
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = [not toml").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn reserved_must_leave_room() {
        let mut config = AppConfig::default();
        config.budget.reserved_reply_tokens = 4096;
        assert!(config.validate().is_err());
    }

    #[test]
    fn context_cap_must_fit_ceiling() {
        let mut config = AppConfig::default();
        config.budget.max_context_tokens = 5000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_top_k_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn temperature_bounds() {
        let mut config = AppConfig::default();
        config.temperature = 2.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_toml_roundtrips() {
        let toml_str = AppConfig::default_toml();
        let config: AppConfig = toml::from_str(&toml_str).unwrap();
        assert!(config.validate().is_ok());
    }
}
