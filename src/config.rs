//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::cadence::{CadencePolicy, CadenceRules};
use crate::chat::{GeminiConfig, OpenAiConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub cadence: CadenceConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("healthscore").to_string_lossy().to_string())
        .unwrap_or_else(|| "./healthscore_data".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Check-in cadence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub policy: CadencePolicy,

    #[serde(default = "default_phase_interval")]
    pub phase_interval_hours: u32,

    #[serde(default = "default_daily_interval")]
    pub daily_interval_hours: u32,

    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_phase_interval() -> u32 {
    12
}

fn default_daily_interval() -> u32 {
    24
}

fn default_tick_interval() -> u64 {
    1000 // 1 second
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            policy: CadencePolicy::default(),
            phase_interval_hours: default_phase_interval(),
            daily_interval_hours: default_daily_interval(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl CadenceConfig {
    /// Rules for the configured policy and intervals
    pub fn rules(&self) -> CadenceRules {
        CadenceRules {
            phase_cooldown: chrono::Duration::hours(self.phase_interval_hours as i64),
            daily_cooldown: chrono::Duration::hours(self.daily_interval_hours as i64),
            ..CadenceRules::new(self.policy)
        }
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Which remote chat provider to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProvider {
    #[default]
    Gemini,
    OpenAi,
    None,
}

impl std::str::FromStr for ChatProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ChatProvider::Gemini),
            "openai" => Ok(ChatProvider::OpenAi),
            "none" => Ok(ChatProvider::None),
            other => Err(format!("unknown chat provider: {}", other)),
        }
    }
}

/// Chat assistant configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub provider: ChatProvider,

    #[serde(default)]
    pub openai: OpenAiSection,

    #[serde(default)]
    pub gemini: GeminiSection,
}

/// `[chat.openai]`
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSection {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_openai_url")]
    pub base_url: String,

    #[serde(default = "default_openai_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_openai_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_openai_max_tokens() -> u32 {
    1024
}

fn default_request_timeout() -> u64 {
    30_000
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_url(),
            model: default_openai_model(),
            temperature: default_temperature(),
            max_tokens: default_openai_max_tokens(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl OpenAiSection {
    pub fn client_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            request_timeout_ms: self.request_timeout_ms,
            ..OpenAiConfig::default()
        }
    }
}

/// `[chat.gemini]`
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSection {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_gemini_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_gemini_max_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-pro".to_string()
}

fn default_gemini_max_tokens() -> u32 {
    200
}

impl Default for GeminiSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_gemini_url(),
            model: default_gemini_model(),
            temperature: default_temperature(),
            max_output_tokens: default_gemini_max_tokens(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl GeminiSection {
    pub fn client_config(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            request_timeout_ms: self.request_timeout_ms,
            ..GeminiConfig::default()
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("healthscore").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(data_dir) = var("HEALTHSCORE_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        // Cadence overrides
        if let Some(policy) = var("HEALTHSCORE_CADENCE_POLICY") {
            match policy.parse() {
                Ok(p) => self.cadence.policy = p,
                Err(e) => tracing::warn!("Ignoring HEALTHSCORE_CADENCE_POLICY: {}", e),
            }
        }

        // Chat overrides
        if let Some(provider) = var("HEALTHSCORE_CHAT_PROVIDER") {
            match provider.parse() {
                Ok(p) => self.chat.provider = p,
                Err(e) => tracing::warn!("Ignoring HEALTHSCORE_CHAT_PROVIDER: {}", e),
            }
        }
        if let Some(key) = var("HEALTHSCORE_OPENAI_API_KEY") {
            self.chat.openai.api_key = key;
        }
        if let Some(key) = var("HEALTHSCORE_GEMINI_API_KEY") {
            self.chat.gemini.api_key = key;
        }

        // Logging overrides
        if let Some(level) = var("HEALTHSCORE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("HEALTHSCORE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# HealthScore Configuration
#
# Environment variables override these settings:
# - HEALTHSCORE_DATA_DIR
# - HEALTHSCORE_CADENCE_POLICY
# - HEALTHSCORE_CHAT_PROVIDER
# - HEALTHSCORE_OPENAI_API_KEY
# - HEALTHSCORE_GEMINI_API_KEY
# - HEALTHSCORE_LOG_LEVEL
# - HEALTHSCORE_LOG_FORMAT

[storage]
# Directory holding store.json
data_dir = "~/.local/share/healthscore"

[cadence]
# "phased" (morning + evening, 12h apart) or "daily" (one check-in per 24h)
policy = "phased"

# Cooldown between morning and evening check-ins (hours)
phase_interval_hours = 12

# Cooldown for the daily policy (hours)
daily_interval_hours = 24

# How often the status timer re-evaluates the cadence (ms)
tick_interval_ms = 1000

[chat]
# Chat provider: gemini, openai, or none
provider = "gemini"

[chat.gemini]
api_key = ""
base_url = "https://generativelanguage.googleapis.com/v1beta"
model = "gemini-pro"
temperature = 0.7
max_output_tokens = 200
request_timeout_ms = 30000

[chat.openai]
api_key = ""
base_url = "https://api.openai.com/v1"
model = "gpt-4o"
temperature = 0.7
max_tokens = 1024
request_timeout_ms = 30000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
