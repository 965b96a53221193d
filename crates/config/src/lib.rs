//! Configuration loading, validation, and management for sleuth.
//!
//! Loads configuration from `~/.sleuth/config.toml` with environment
//! variable overrides. Validates all settings at startup. The resulting
//! `AppConfig` is immutable and handed to every component that needs it.

use serde::{Deserialize, Serialize};
use sleuth_core::ReasoningEffort;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.sleuth/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Where findings and reports are written
    #[serde(default)]
    pub paths: PathConfig,

    /// Web search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Page crawler settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Encyclopedia lookup settings
    #[serde(default)]
    pub wikipedia: WikipediaConfig,

    /// Knowledge store settings
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Orchestration loop settings
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name ("openrouter", "openai", "lmstudio", "ollama", ...)
    #[serde(default = "default_provider")]
    pub name: String,

    /// Base URL override for OpenAI-compatible endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,

    /// Connect + read timeout for a single model request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_request_timeout() -> u64 {
    120
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("reasoning_effort", &self.reasoning_effort)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider(),
            api_url: None,
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            reasoning_effort: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    #[serde(default = "default_knowledge_dir")]
    pub knowledge_dir: PathBuf,

    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
}

fn default_knowledge_dir() -> PathBuf {
    PathBuf::from("research_knowledge")
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            knowledge_dir: default_knowledge_dir(),
            reports_dir: default_reports_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Sent with every outbound search and encyclopedia request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTML search endpoint
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
}

fn default_max_results() -> usize {
    6
}
fn default_search_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    "sleuth/0.1 (AI research assistant; https://github.com/sleuth-rs/sleuth)".into()
}
fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".into()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
            user_agent: default_user_agent(),
            endpoint: default_search_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,

    /// Crawled pages are truncated to this many characters
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_crawl_timeout() -> u64 {
    30
}
fn default_max_chars() -> usize {
    40_000
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_crawl_timeout(),
            max_chars: default_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaConfig {
    #[serde(default = "default_wikipedia_endpoint")]
    pub endpoint: String,
}

fn default_wikipedia_endpoint() -> String {
    "https://en.wikipedia.org/w/api.php".into()
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_wikipedia_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_knowledge_filename")]
    pub filename: String,

    /// Saves that would grow the file past this size are refused
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Id of the first entry, 0 or 1
    #[serde(default)]
    pub id_base: u64,

    /// Bounded wait for the write lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_knowledge_filename() -> String {
    "knowledge.json".into()
}
fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_lock_timeout_ms() -> u64 {
    5_000
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            filename: default_knowledge_filename(),
            max_bytes: default_max_bytes(),
            id_base: 0,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model turns inside one round before control returns to the user
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Wall-clock limit for one round; 0 disables it
    #[serde(default = "default_round_timeout")]
    pub round_timeout_secs: u64,

    /// Dispatch the tool calls of one turn concurrently
    #[serde(default = "default_true")]
    pub parallel_tool_calls: bool,

    /// Optional system prompt template file (`{timestamp}`, `{query}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_template: Option<PathBuf>,
}

fn default_max_rounds() -> u32 {
    25
}
fn default_round_timeout() -> u64 {
    600
}
fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            round_timeout_secs: default_round_timeout(),
            parallel_tool_calls: true,
            system_prompt_template: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.sleuth/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `SLEUTH_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
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

    /// Apply `SLEUTH_*` style overrides from an environment lookup.
    pub fn apply_env_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.provider.api_key.is_none() {
            self.provider.api_key = env("SLEUTH_API_KEY")
                .or_else(|| env("OPENROUTER_API_KEY"))
                .or_else(|| env("OPENAI_API_KEY"));
        }
        if let Some(provider) = env("SLEUTH_PROVIDER") {
            self.provider.name = provider;
        }
        if let Some(model) = env("SLEUTH_MODEL") {
            self.provider.model = model;
        }
        if let Some(url) = env("SLEUTH_API_URL") {
            self.provider.api_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sleuth")
    }

    /// Full path of the knowledge file.
    pub fn knowledge_path(&self) -> PathBuf {
        self.paths.knowledge_dir.join(&self.knowledge.filename)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.knowledge.id_base > 1 {
            return Err(ConfigError::ValidationError(
                "knowledge.id_base must be 0 or 1".into(),
            ));
        }
        if self.knowledge.max_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.max_bytes must be > 0".into(),
            ));
        }
        if self.knowledge.filename.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "knowledge.filename must not be empty".into(),
            ));
        }
        if self.agent.max_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_rounds must be at least 1".into(),
            ));
        }
        if self.search.user_agent.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "search.user_agent must not be empty".into(),
            ));
        }
        if self.search.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "search.max_results must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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

impl From<ConfigError> for sleuth_core::Error {
    fn from(e: ConfigError) -> Self {
        sleuth_core::Error::Config { message: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider.name, "openrouter");
        assert_eq!(config.search.max_results, 6);
        assert_eq!(config.agent.max_rounds, 25);
        assert_eq!(config.knowledge.id_base, 0);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.knowledge.max_bytes, config.knowledge.max_bytes);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.knowledge.id_base = 2;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.max_rounds = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.search.user_agent = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.name, "openrouter");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[provider]
name = "lmstudio"
model = "qwen3-8b"
reasoning_effort = "high"

[knowledge]
id_base = 1
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.provider.name, "lmstudio");
        assert_eq!(config.provider.reasoning_effort, Some(ReasoningEffort::High));
        assert_eq!(config.knowledge.id_base, 1);
        assert_eq!(config.knowledge.filename, "knowledge.json");
        assert_eq!(config.crawler.max_chars, 40_000);
    }

    #[test]
    fn invalid_file_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent]\nmax_rounds = 0\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));

        std::fs::write(&path, "[agent\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENROUTER_API_KEY", "or-key"),
            ("OPENAI_API_KEY", "oa-key"),
            ("SLEUTH_MODEL", "qwen3-8b"),
            ("SLEUTH_API_URL", "http://localhost:1234/v1"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("or-key"));
        assert_eq!(config.provider.model, "qwen3-8b");
        assert_eq!(config.provider.api_url.as_deref(), Some("http://localhost:1234/v1"));
        assert_eq!(config.provider.name, "openrouter");
    }

    #[test]
    fn file_key_wins_over_env() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("from-file".into());
        config.apply_env_overrides(|k| (k == "SLEUTH_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("knowledge.json"));
    }

    #[test]
    fn knowledge_path_joins_dir_and_file() {
        let config = AppConfig::default();
        assert_eq!(
            config.knowledge_path(),
            PathBuf::from("research_knowledge").join("knowledge.json")
        );
    }
}
