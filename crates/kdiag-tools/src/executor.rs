//! Executor - Diagnostic command execution
//!
//! This module provides the execution contract consumed by the evidence
//! gatherer and its shell-backed implementation, including:
//! - Allow-list enforcement
//! - Per-command timeout handling
//! - Latency measurement

use crate::error::{Error, Result};
use crate::security::{self, DEFAULT_ALLOWED_PROGRAMS};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Configuration for the shell executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Shell used to run pipelines (`<shell> -c <command>`)
    pub shell: String,
    /// Programs a pipeline stage may invoke
    pub allowed_programs: Vec<String>,
    /// Upper bound for any caller-supplied timeout
    pub max_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            allowed_programs: DEFAULT_ALLOWED_PROGRAMS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            max_timeout: Duration::from_secs(300),
        }
    }
}

impl ExecutorConfig {
    /// Set the shell
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Replace the allowed program list
    #[must_use]
    pub fn with_allowed_programs<I, S>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_programs = programs.into_iter().map(Into::into).collect();
        self
    }

    /// Set the maximum timeout
    #[must_use]
    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }
}

/// Raw outcome of one command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Whether the command exited with status 0
    pub success: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Wall-clock latency in milliseconds
    pub latency_ms: u64,
}

impl CommandOutput {
    /// Successful output
    #[must_use]
    pub fn success(stdout: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
            latency_ms,
        }
    }

    /// Failed output
    #[must_use]
    pub fn failure(stderr: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            latency_ms,
        }
    }
}

/// Contract for running one diagnostic command.
///
/// Output has no guaranteed shape; interpretation belongs to the caller.
#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Executor name, for logs
    fn name(&self) -> &str;

    /// Run `command`, giving up after `timeout`
    async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandOutput>;
}

/// Executes allow-listed pipelines through a local shell
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    config: ExecutorConfig,
}

impl ShellExecutor {
    /// Create a new shell executor
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl CommandExecutor for ShellExecutor {
    fn name(&self) -> &str {
        "shell"
    }

    #[instrument(skip(self), fields(executor = "shell"))]
    async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        if let Err(e) = security::check_command(&self.config, command) {
            warn!(command = %command, error = %e, "Blocked diagnostic command");
            return Err(e);
        }

        let timeout = timeout.min(self.config.max_timeout);
        let start = Instant::now();
        debug!(command = %command, timeout_ms = %timeout.as_millis(), "Executing command");

        let child = Command::new(&self.config.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Execution(e.to_string()))?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(timeout.as_millis() as u64))??;

        let latency_ms = start.elapsed().as_millis() as u64;
        let result = CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            latency_ms,
        };

        debug!(
            command = %command,
            success = %result.success,
            latency_ms = %latency_ms,
            "Command completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissive(programs: &[&str]) -> ShellExecutor {
        ShellExecutor::new(ExecutorConfig::default().with_allowed_programs(programs.iter().copied()))
    }

    #[test]
    fn test_executor_config() {
        let config = ExecutorConfig::default()
            .with_shell("/bin/bash")
            .with_max_timeout(Duration::from_secs(10))
            .with_allowed_programs(["kubectl"]);

        assert_eq!(config.shell, "/bin/bash");
        assert_eq!(config.max_timeout, Duration::from_secs(10));
        assert_eq!(config.allowed_programs, vec!["kubectl".to_string()]);
    }

    #[test]
    fn test_default_allow_list() {
        let config = ExecutorConfig::default();
        assert!(config.allowed_programs.contains(&"kubectl".to_string()));
        assert!(config.allowed_programs.contains(&"grep".to_string()));
    }

    #[tokio::test]
    async fn test_execute_success() {
        let executor = permissive(&["echo"]);
        let output = executor
            .execute("echo hello", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_execute_pipeline() {
        let executor = permissive(&["echo", "grep"]);
        let output = executor
            .execute("echo 'Limits: none' | grep Limits", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(output.success);
        assert!(output.stdout.contains("Limits"));
    }

    #[tokio::test]
    async fn test_execute_nonzero_exit_is_not_an_error() {
        let executor = permissive(&["echo", "grep"]);
        let output = executor
            .execute("echo abc | grep xyz", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!output.success);
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let executor = permissive(&["sleep"]);
        let result = executor
            .execute("sleep 5", Duration::from_millis(50))
            .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_execute_blocked() {
        let executor = ShellExecutor::default();
        let result = executor.execute("rm -rf /tmp/x", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::PermissionDenied(_))));
    }
}
