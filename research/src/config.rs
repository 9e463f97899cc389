//! Application configuration and loading

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::ResearchConfig;

/// Top-level application configuration: the research engine's per-run
/// defaults plus the ambient concerns (logging, provider selection) that
/// sit outside the core's consumed-capability traits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub research: ResearchConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration with fallback chain: explicit `--config` path,
    /// then project-local `.research.yml`, then the user config directory,
    /// then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".research.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => tracing::warn!("Failed to load config from {}: {}", local_config.display(), e),
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("research").join("research.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to load config from {}: {}", user_config.display(), e),
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Reads just the logging level from a config file, before the rest of
    /// the config (and therefore logging itself) is set up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = config_path.cloned().or_else(|| {
            let local = PathBuf::from(".research.yml");
            local.exists().then_some(local)
        })?;
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        Some(config.logging.level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Selects and authenticates the LLM provider an embedding application
/// should construct a [`crate::llm::LlmClient`] from. The research core
/// never prompts or calls a provider directly; this struct only carries the
/// selection so `research run` can report what it expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,
    #[serde(rename = "base-url")]
    pub base_url: String,
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    /// Fails fast if the configured API key environment variable is unset;
    /// doesn't read or cache the key itself since no production `LlmClient`
    /// lives in this crate to consume it.
    pub fn check_api_key(&self) -> Result<()> {
        std::env::var(&self.api_key_env)
            .map(|_| ())
            .context(format!("LLM API key not found in env var {}", self.api_key_env))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Optional JSONL sink for the event bus, independent of the trace log.
    #[serde(rename = "event-log-path")]
    pub event_log_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), event_log_path: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_research_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.research.max_steps, 50);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn deserialize_partial_yaml_uses_defaults() {
        let yaml = r#"
llm:
  model: claude-haiku

research:
  max_steps: 10
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.model, "claude-haiku");
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.research.max_steps, 10);
        assert_eq!(config.research.token_budget, 1_000_000);
    }

    #[test]
    fn check_api_key_fails_when_env_var_missing() {
        let config = LlmConfig { api_key_env: "RESEARCH_TEST_MISSING_KEY_VAR".to_string(), ..LlmConfig::default() };
        assert!(config.check_api_key().is_err());
    }
}
