//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup so a missing
//! credential pool fails fast instead of surfacing on the first reply.

use parley_core::ProviderId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider tried first for every reply until switched at runtime
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Timeouts, retries and the apology set
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Per-provider credentials and model settings
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Conversation memory bounds and eviction
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Persona instruction sent with every request
    #[serde(default)]
    pub persona: PersonaConfig,
}

fn default_provider() -> String {
    "gemini".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Hard bound on a single provider call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts against the same provider before falling back
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// In-character replies used when every provider failed
    #[serde(default = "default_apologies")]
    pub apologies: Vec<String>,
}

fn default_timeout_ms() -> u64 {
    15_000
}
fn default_max_retries() -> u32 {
    1
}
fn default_apologies() -> Vec<String> {
    vec![
        "Sorry, I'm having a technical hiccup. Please try again in a moment! 🙏".into(),
        "Hmm, something went wrong on my side. Give me a few seconds and try again!".into(),
        "Oops, I can't process that right now. Please try again later!".into(),
    ]
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            apologies: default_apologies(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: ProviderConfig,

    #[serde(default)]
    pub groq: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, id: ProviderId) -> &ProviderConfig {
        match id {
            ProviderId::Gemini => &self.gemini,
            ProviderId::Groq => &self.groq,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Comma-separated credential list, e.g. `"key-a, key-b"`
    #[serde(default)]
    pub api_keys: String,

    /// Model override (each backend has its own default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Base URL override (tests, proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_output_tokens() -> u32 {
    500
}
fn default_temperature() -> f32 {
    0.85
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_keys: String::new(),
            model: None,
            api_url: None,
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl ProviderConfig {
    /// The parsed, ordered credential list.
    pub fn credentials(&self) -> Vec<String> {
        parse_credentials(&self.api_keys)
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_keys", &format_args!("[{} REDACTED]", self.credentials().len()))
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Messages kept per conversation (oldest dropped first)
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// How often the idle sweep runs, in milliseconds
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Conversations idle longer than this are evicted, in milliseconds
    #[serde(default = "default_idle_threshold_ms")]
    pub idle_threshold_ms: u64,
}

fn default_max_messages() -> usize {
    10
}
fn default_sweep_interval_ms() -> u64 {
    30 * 60 * 1000
}
fn default_idle_threshold_ms() -> u64 {
    60 * 60 * 1000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            sweep_interval_ms: default_sweep_interval_ms(),
            idle_threshold_ms: default_idle_threshold_ms(),
        }
    }
}

impl MemoryConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Base system prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Reply to a turn that carries no text
    #[serde(default = "default_empty_message_reply")]
    pub empty_message_reply: String,
}

fn default_system_prompt() -> String {
    "You are Parley, a friendly and helpful AI assistant. You are warm, patient \
     and natural, like a good friend who happens to know a lot.\n\n\
     - Answer clearly and to the point.\n\
     - Keep a relaxed, conversational tone with at most one or two emoji.\n\
     - Do not use action text such as *smiles*."
        .into()
}
fn default_empty_message_reply() -> String {
    "You called me but didn't say anything. What can I help you with? 😊".into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            empty_message_reply: default_empty_message_reply(),
        }
    }
}

/// Split a delimited credential value into its non-empty, trimmed entries.
pub fn parse_credentials(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(String::from)
        .collect()
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml),
    /// apply process environment overrides and validate.
    ///
    /// Environment variables (highest priority):
    /// - `GEMINI_API_KEY`, `GROQ_API_KEY`: comma-separated credential lists
    /// - `PARLEY_PROVIDER`: default provider id
    /// - `PARLEY_TIMEOUT_MS`: per-call timeout
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with(&config_path, |key| std::env::var(key).ok())
    }

    /// Load from `path`, apply overrides from `lookup` and validate.
    pub fn load_with(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(lookup)?;
        config.validate()?;

        tracing::info!(
            gemini_keys = config.providers.gemini.credentials().len(),
            groq_keys = config.providers.groq.credentials().len(),
            default_provider = %config.default_provider,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse configuration from a specific file path without validating.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment-style overrides supplied by `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(keys) = lookup("GEMINI_API_KEY") {
            self.providers.gemini.api_keys = keys;
        }
        if let Some(keys) = lookup("GROQ_API_KEY") {
            self.providers.groq.api_keys = keys;
        }
        if let Some(provider) = lookup("PARLEY_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(timeout) = lookup("PARLEY_TIMEOUT_MS") {
            self.generation.timeout_ms = timeout.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "PARLEY_TIMEOUT_MS must be a whole number of milliseconds, got '{timeout}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default_provider()?;

        for id in ProviderId::ALL {
            if self.providers.get(id).credentials().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "at least one {id} API key is required (set providers.{id}.api_keys or {}_API_KEY)",
                    id.as_str().to_ascii_uppercase()
                )));
            }
        }

        if self.generation.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "generation.timeout_ms must be > 0".into(),
            ));
        }

        if self.generation.apologies.is_empty() {
            return Err(ConfigError::ValidationError(
                "generation.apologies must contain at least one reply".into(),
            ));
        }

        if self.memory.max_messages == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_messages must be >= 1".into(),
            ));
        }

        if self.memory.sweep_interval_ms == 0 || self.memory.idle_threshold_ms == 0 {
            return Err(ConfigError::ValidationError(
                "memory.sweep_interval_ms and memory.idle_threshold_ms must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// The configured default provider as a typed id.
    pub fn default_provider(&self) -> Result<ProviderId, ConfigError> {
        self.default_provider
            .parse()
            .map_err(|e: parley_core::Error| ConfigError::ValidationError(e.to_string()))
    }

    /// The per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.generation.timeout_ms)
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            generation: GenerationConfig::default(),
            providers: ProvidersConfig::default(),
            memory: MemoryConfig::default(),
            persona: PersonaConfig::default(),
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

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for parley_core::Error {
    fn from(err: ConfigError) -> Self {
        parley_core::Error::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn with_keys() -> AppConfig {
        let mut config = AppConfig::default();
        config.providers.gemini.api_keys = "g1,g2".into();
        config.providers.groq.api_keys = "q1".into();
        config
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.generation.timeout_ms, 15_000);
        assert_eq!(config.generation.max_retries, 1);
        assert_eq!(config.generation.apologies.len(), 3);
        assert_eq!(config.memory.max_messages, 10);
        assert_eq!(config.memory.sweep_interval(), Duration::from_secs(30 * 60));
        assert_eq!(config.memory.idle_threshold(), Duration::from_secs(60 * 60));
        assert_eq!(config.providers.gemini.max_output_tokens, 500);
    }

    #[test]
    fn credentials_are_trimmed_and_empties_dropped() {
        assert_eq!(parse_credentials(" a , b,,c , "), vec!["a", "b", "c"]);
        assert!(parse_credentials("").is_empty());
        assert!(parse_credentials(" , ,").is_empty());
    }

    #[test]
    fn missing_credentials_fail_validation() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("gemini"));

        let mut config = with_keys();
        config.providers.groq.api_keys = " , ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn configured_keys_pass_validation() {
        assert!(with_keys().validate().is_ok());
    }

    #[test]
    fn unknown_default_provider_rejected() {
        let config = AppConfig {
            default_provider: "openai".into(),
            ..with_keys()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut config = with_keys();
        config.memory.max_messages = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_apology_set_rejected() {
        let mut config = with_keys();
        config.generation.apologies.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_take_priority() {
        let mut config = with_keys();
        config
            .apply_env(env(&[
                ("GEMINI_API_KEY", "e1, e2, e3"),
                ("PARLEY_PROVIDER", "groq"),
                ("PARLEY_TIMEOUT_MS", "5000"),
            ]))
            .unwrap();
        assert_eq!(config.providers.gemini.credentials(), vec!["e1", "e2", "e3"]);
        assert_eq!(config.providers.groq.credentials(), vec!["q1"]);
        assert_eq!(config.default_provider().unwrap(), ProviderId::Groq);
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn bad_timeout_override_rejected() {
        let mut config = with_keys();
        assert!(config.apply_env(env(&[("PARLEY_TIMEOUT_MS", "soon")])).is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "gemini");
    }

    #[test]
    fn load_with_reads_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_provider = "groq"

[generation]
max_retries = 2

[providers.gemini]
api_keys = "file-g1"
model = "gemini-2.0-flash"

[memory]
max_messages = 4
"#
        )
        .unwrap();

        let config = AppConfig::load_with(file.path(), env(&[("GROQ_API_KEY", "env-q1")])).unwrap();
        assert_eq!(config.default_provider().unwrap(), ProviderId::Groq);
        assert_eq!(config.generation.max_retries, 2);
        assert_eq!(config.providers.gemini.model.as_deref(), Some("gemini-2.0-flash"));
        assert_eq!(config.providers.groq.credentials(), vec!["env-q1"]);
        assert_eq!(config.memory.max_messages, 4);
        assert_eq!(config.generation.timeout_ms, 15_000);
    }

    #[test]
    fn load_with_fails_fast_without_keys() {
        let result = AppConfig::load_with(Path::new("/nonexistent/config.toml"), env(&[]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_provider = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let printed = format!("{:?}", with_keys());
        assert!(!printed.contains("g1"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn default_toml_roundtrips() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini"));
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.memory.max_messages, 10);
        assert_eq!(parsed.generation.apologies.len(), 3);
    }
}
