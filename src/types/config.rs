//! Configuration for Instability.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::InstabilityResult;

/// Main configuration for Instability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// LLM backend settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Diagnostic check settings.
    #[serde(default)]
    pub checks: ChecksConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// LLM backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the Ollama-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Request timeout (in seconds).
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Number of non-pinned messages kept in the conversation.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Name of the environment variable holding an optional bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
            max_history: default_max_history(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl LlmConfig {
    /// Reads the API key from the configured environment variable, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen3:8b".to_string()
}

fn default_temperature() -> f64 {
    0.1
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_max_history() -> usize {
    20
}

fn default_api_key_env() -> String {
    "INSTABILITY_API_KEY".to_string()
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path of the JSON cache file.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Maximum number of entries kept on disk.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Maximum stored size of a single value (in bytes).
    #[serde(default = "default_max_value_bytes")]
    pub max_value_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            max_entries: default_max_entries(),
            max_value_bytes: default_max_value_bytes(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".instability_cache.json")
}

fn default_max_entries() -> usize {
    64
}

fn default_max_value_bytes() -> usize {
    16 * 1024
}

/// Diagnostic check settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksConfig {
    /// Per-probe timeout (in seconds).
    #[serde(default = "default_check_timeout")]
    pub timeout_secs: u64,

    /// Delay before re-probing unreachable targets (in seconds).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Number of retry rounds for unreachable targets.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_check_timeout(),
            retry_delay_secs: default_retry_delay(),
            retries: default_retries(),
        }
    }
}

impl ChecksConfig {
    /// Per-probe timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry delay as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

fn default_check_timeout() -> u64 {
    5
}

fn default_retry_delay() -> u64 {
    5
}

fn default_retries() -> u32 {
    1
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> InstabilityResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> InstabilityResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            llm: LlmConfig::default(),
            cache: CacheConfig::default(),
            checks: ChecksConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [llm]
            model = "phi3:14b"
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.model, "phi3:14b");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.llm.max_history, 20);
        assert_eq!(config.checks.retries, 1);
        assert_eq!(config.cache.max_entries, 64);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instability.toml");

        let mut config = Config::default_config();
        config.checks.timeout_secs = 9;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.checks.timeout_secs, 9);
        assert_eq!(loaded.general.log_format, "text");
    }

    #[test]
    fn test_api_key_from_env() {
        let mut llm = LlmConfig::default();
        llm.api_key_env = "INSTABILITY_TEST_KEY_UNSET_9F2".to_string();
        assert!(llm.api_key().is_none());
    }
}
