use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Translation config
    pub translation: TranslationConfig,

    /// Durable state location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Google Gemini
    #[default]
    Gemini,
    // @provider: Anthropic
    Anthropic,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Gemini => "Gemini",
            Self::Anthropic => "Anthropic",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Gemini => "gemini".to_string(),
            Self::Anthropic => "anthropic".to_string(),
        }
    }
}

// Implement Display trait for TranslationProvider
impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for TranslationProvider
impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// How retry waits grow between attempts
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same interval before every retry
    #[default]
    Fixed,
    /// Interval doubles per attempt, with random jitter
    Exponential,
}

/// How chunk translations of one chapter are scheduled
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingMode {
    /// Lockstep batches: the next batch starts once the whole previous batch is done
    #[default]
    Batched,
    /// Ordered sliding window: a new call starts as soon as any call finishes
    Sliding,
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Credential pool, rotated across outbound calls
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Model name; empty means the provider default
    #[serde(default = "String::new")]
    pub model: String,

    /// Service URL; empty means the provider default
    #[serde(default = "String::new")]
    pub endpoint: String,

    /// Maximum simultaneously in-flight chunk translations
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Maximum chunk size in characters
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Attempts per chunk before falling back to the untranslated text
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Wait after an explicit rate-limit signal
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,

    /// Wait after any other failure
    #[serde(default = "default_failure_backoff_ms")]
    pub failure_backoff_ms: u64,

    /// Growth of the retry waits
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Chunk scheduling inside a chapter
    #[serde(default)]
    pub scheduling: SchedulingMode,

    /// Whether untranslated fallbacks are cached like successful translations.
    /// When false, chunks that exhausted their retries are retried on the next run.
    #[serde(default = "default_true")]
    pub cache_fallbacks: bool,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            api_keys: Vec::new(),
            model: String::new(),
            endpoint: String::new(),
            max_concurrency: default_max_concurrency(),
            max_chunk_size: default_max_chunk_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            failure_backoff_ms: default_failure_backoff_ms(),
            backoff: BackoffStrategy::default(),
            scheduling: SchedulingMode::default(),
            cache_fallbacks: true,
            temperature: default_temperature(),
        }
    }
}

impl TranslationConfig {
    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if !self.model.is_empty() {
            return self.model.clone();
        }

        match self.provider {
            TranslationProvider::Gemini => default_gemini_model(),
            TranslationProvider::Anthropic => default_anthropic_model(),
        }
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if !self.endpoint.is_empty() {
            return self.endpoint.clone();
        }

        match self.provider {
            TranslationProvider::Gemini => default_gemini_endpoint(),
            TranslationProvider::Anthropic => default_anthropic_endpoint(),
        }
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Non-empty, trimmed credentials in their configured order
    pub fn credentials(&self) -> Vec<String> {
        self.api_keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// Durable state configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// SQLite database file; the user's data directory when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<&LogLevel> for log::LevelFilter {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_max_concurrency() -> usize {
    2
}

fn default_max_chunk_size() -> usize {
    14000
}

fn default_max_retries() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_rate_limit_backoff_ms() -> u64 {
    1000
}

fn default_failure_backoff_ms() -> u64 {
    2000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), AppError> {
        crate::language_utils::get_language_name(&self.source_language)
            .map_err(|e| AppError::Config(e.to_string()))?;
        crate::language_utils::get_language_name(&self.target_language)
            .map_err(|e| AppError::Config(e.to_string()))?;

        if self.translation.credentials().is_empty() {
            return Err(AppError::Config(
                "At least one API key is required (config api_keys, --api-key or EPUBTRANS_API_KEYS)".to_string(),
            ));
        }

        if self.translation.max_concurrency == 0 {
            return Err(AppError::Config("max_concurrency must be at least 1".to_string()));
        }

        if self.translation.max_chunk_size == 0 {
            return Err(AppError::Config("max_chunk_size must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "ar".to_string(),
            translation: TranslationConfig::default(),
            storage: StorageConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
