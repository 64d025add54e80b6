//! Diagnosis configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of loop iterations
pub const DEFAULT_MAX_ITERATIONS: usize = 3;
/// Default confidence at which the loop stops early
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 8.0;
/// Default per-command timeout in milliseconds
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;
/// Default number of commands run per iteration
pub const DEFAULT_COMMANDS_PER_ITERATION: usize = 3;
/// Default cap on initial hypotheses
pub const DEFAULT_MAX_HYPOTHESES: usize = 4;
/// Default outer deadline in milliseconds
pub const DEFAULT_DEADLINE_MS: u64 = 120_000;

/// Configuration for one diagnosis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisConfig {
    /// Maximum loop iterations
    pub max_iterations: usize,
    /// Stop once any hypothesis reaches this confidence
    pub confidence_threshold: f64,
    /// Timeout applied to each diagnostic command, in milliseconds
    pub command_timeout_ms: u64,
    /// Commands taken from the selected hypothesis per iteration
    pub commands_per_iteration: usize,
    /// Cap on the initial hypothesis set
    pub max_hypotheses: usize,
    /// Outer deadline for the whole run, in milliseconds
    pub deadline_ms: u64,
    /// Mask cluster identifiers before text generation
    pub anonymize: bool,
    /// Model override for the text-generation provider
    pub llm_model: Option<String>,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            commands_per_iteration: DEFAULT_COMMANDS_PER_ITERATION,
            max_hypotheses: DEFAULT_MAX_HYPOTHESES,
            deadline_ms: DEFAULT_DEADLINE_MS,
            anonymize: true,
            llm_model: None,
        }
    }
}

impl DiagnosisConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max iterations
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the confidence threshold
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the per-command timeout
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the commands taken per iteration
    #[must_use]
    pub fn with_commands_per_iteration(mut self, n: usize) -> Self {
        self.commands_per_iteration = n;
        self
    }

    /// Set the hypothesis cap
    #[must_use]
    pub fn with_max_hypotheses(mut self, n: usize) -> Self {
        self.max_hypotheses = n;
        self
    }

    /// Set the outer deadline
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = duration_ms(deadline);
        self
    }

    /// Enable or disable anonymization
    #[must_use]
    pub fn with_anonymize(mut self, enabled: bool) -> Self {
        self.anonymize = enabled;
        self
    }

    /// Set the model override
    #[must_use]
    pub fn with_llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = Some(model.into());
        self
    }

    /// Per-command timeout
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Outer deadline
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::invalid_config(
                "max_iterations",
                "must be at least 1",
            ));
        }
        if !(0.0..=10.0).contains(&self.confidence_threshold) {
            return Err(Error::invalid_config(
                "confidence_threshold",
                format!("{} is outside [0, 10]", self.confidence_threshold),
            ));
        }
        if self.command_timeout_ms == 0 {
            return Err(Error::invalid_config(
                "command_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.commands_per_iteration == 0 {
            return Err(Error::invalid_config(
                "commands_per_iteration",
                "must be at least 1",
            ));
        }
        if self.deadline_ms == 0 {
            return Err(Error::invalid_config(
                "deadline_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Whole milliseconds, rounding sub-millisecond durations up so they stay non-zero
fn duration_ms(duration: Duration) -> u64 {
    let ms = duration.as_millis() + u128::from(duration.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(ms).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DiagnosisConfig::default();
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.confidence_threshold, 8.0);
        assert_eq!(config.command_timeout(), Duration::from_secs(30));
        assert_eq!(config.commands_per_iteration, 3);
        assert_eq!(config.max_hypotheses, 4);
        assert_eq!(config.deadline(), Duration::from_secs(120));
        assert!(config.anonymize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = DiagnosisConfig::new()
            .with_max_iterations(5)
            .with_confidence_threshold(7.0)
            .with_command_timeout(Duration::from_secs(10))
            .with_anonymize(false)
            .with_llm_model("gpt-4o");

        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.confidence_threshold, 7.0);
        assert_eq!(config.command_timeout_ms, 10_000);
        assert!(!config.anonymize);
        assert_eq!(config.llm_model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_iterations = DiagnosisConfig::new().with_max_iterations(0);
        assert!(matches!(
            zero_iterations.validate(),
            Err(Error::InvalidConfig { ref field, .. }) if field == "max_iterations"
        ));

        let threshold = DiagnosisConfig::new().with_confidence_threshold(11.0);
        assert!(threshold.validate().is_err());

        let timeout = DiagnosisConfig::new().with_command_timeout(Duration::ZERO);
        assert!(timeout.validate().is_err());
    }

    #[test]
    fn test_sub_second_durations_keep_precision() {
        let config = DiagnosisConfig::new()
            .with_command_timeout(Duration::from_millis(500))
            .with_deadline(Duration::from_millis(1500));

        assert_eq!(config.command_timeout(), Duration::from_millis(500));
        assert_eq!(config.deadline(), Duration::from_millis(1500));
        assert!(config.validate().is_ok());

        let tiny = DiagnosisConfig::new().with_command_timeout(Duration::from_micros(10));
        assert_eq!(tiny.command_timeout_ms, 1);
        assert!(tiny.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: DiagnosisConfig =
            serde_json::from_str(r#"{"max_iterations": 2}"#).unwrap();
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.confidence_threshold, 8.0);
    }
}
