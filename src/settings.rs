//! Application settings
//!
//! Loads configuration from embedded defaults, optional files, and the
//! environment, then turns each section into the library-level settings.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use kdiag_core::DiagnosisConfig;
use kdiag_llm::{OpenAiCompatConfig, OpenAiCompatProvider};
use kdiag_tools::ExecutorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub diagnosis: DiagnosisConfig,
    #[serde(default)]
    pub executor: ExecutorSettings,
    #[serde(default)]
    pub llm: LlmSettings,
}

/// `[executor]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub shell: String,
    pub allowed_programs: Vec<String>,
    pub max_timeout_secs: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        let defaults = ExecutorConfig::default();
        Self {
            shell: defaults.shell,
            allowed_programs: defaults.allowed_programs,
            max_timeout_secs: defaults.max_timeout.as_secs(),
        }
    }
}

impl ExecutorSettings {
    pub fn to_executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::default()
            .with_shell(self.shell.clone())
            .with_allowed_programs(self.allowed_programs.iter().cloned())
            .with_max_timeout(Duration::from_secs(self.max_timeout_secs))
    }
}

/// `[llm]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub enabled: bool,
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let defaults = OpenAiCompatConfig::default();
        Self {
            enabled: true,
            base_url: defaults.base_url,
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: defaults.default_model,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

impl LlmSettings {
    /// Build the provider, or `None` when disabled or no key is set
    pub fn provider(&self) -> Result<Option<OpenAiCompatProvider>> {
        if !self.enabled {
            return Ok(None);
        }
        let Some(key) = std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
        else {
            return Ok(None);
        };

        let config = OpenAiCompatConfig::default()
            .with_api_key(key)
            .with_base_url(self.base_url.clone())
            .with_model(self.model.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs));
        OpenAiCompatProvider::new(config)
            .map(Some)
            .context("Failed to create LLM provider")
    }
}

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. Local overrides (optional)
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority), e.g. KDIAG_DIAGNOSIS__MAX_ITERATIONS
        .add_source(
            Environment::with_prefix("KDIAG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.diagnosis.max_iterations, 3);
        assert_eq!(config.diagnosis.confidence_threshold, 8.0);
        assert_eq!(config.diagnosis.deadline_ms, 120_000);
        assert!(config.diagnosis.validate().is_ok());
        assert_eq!(config.executor.allowed_programs, vec!["kubectl", "grep"]);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_disabled_llm_has_no_provider() {
        let settings = LlmSettings {
            enabled: false,
            ..LlmSettings::default()
        };
        assert!(settings.provider().unwrap().is_none());
    }

    #[test]
    fn test_missing_key_has_no_provider() {
        let settings = LlmSettings {
            api_key_env: "KDIAG_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmSettings::default()
        };
        assert!(settings.provider().unwrap().is_none());
    }

    #[test]
    fn test_executor_settings_round_into_config() {
        let settings = ExecutorSettings {
            shell: "/bin/bash".to_string(),
            allowed_programs: vec!["kubectl".to_string()],
            max_timeout_secs: 10,
        };
        let config = settings.to_executor_config();
        assert_eq!(config.shell, "/bin/bash");
        assert_eq!(config.allowed_programs, vec!["kubectl"]);
        assert_eq!(config.max_timeout, Duration::from_secs(10));
    }
}
