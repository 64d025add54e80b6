//! Evidence gatherer
//!
//! Runs the first few commands of a hypothesis concurrently, each under its
//! own timeout, and caches every result by exact command string. The cache
//! lives as long as the gatherer; the orchestrator creates one per run.

use super::analyzers;
use super::types::{Evidence, EvidenceResult};
use crate::config::{DEFAULT_COMMANDS_PER_ITERATION, DEFAULT_COMMAND_TIMEOUT_MS};
use crate::hypothesis::Hypothesis;
use futures::future::join_all;
use kdiag_tools::CommandExecutor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Executes diagnostic commands for hypotheses
pub struct EvidenceGatherer {
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
    commands_per_iteration: usize,
    cache: HashMap<String, EvidenceResult>,
}

impl EvidenceGatherer {
    /// Create a gatherer with an empty cache
    #[must_use]
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            commands_per_iteration: DEFAULT_COMMANDS_PER_ITERATION,
            cache: HashMap::new(),
        }
    }

    /// Set the per-command timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many commands are taken from a hypothesis per call
    #[must_use]
    pub fn with_commands_per_iteration(mut self, n: usize) -> Self {
        self.commands_per_iteration = n.max(1);
        self
    }

    /// Gather and analyze evidence for `hypothesis`.
    ///
    /// Never fails: a command that errors or times out becomes a failed
    /// [`EvidenceResult`] and the rest of the batch is still analyzed.
    #[instrument(
        skip_all,
        fields(category = %hypothesis.category, pod = %pod_label(metadata))
    )]
    pub async fn gather(
        &mut self,
        hypothesis: &Hypothesis,
        metadata: &serde_json::Value,
    ) -> Evidence {
        let mut selected: Vec<&str> = Vec::new();
        for command in hypothesis.commands.iter().take(self.commands_per_iteration) {
            if !selected.contains(&command.as_str()) {
                selected.push(command);
            }
        }

        let pending: Vec<&str> = selected
            .iter()
            .copied()
            .filter(|command| !self.cache.contains_key(*command))
            .collect();

        if pending.is_empty() {
            info!("All commands already executed, using cached data");
            let mut evidence = analyzers::analyze(hypothesis.category, self.cached(&selected));
            evidence.from_cache = true;
            return evidence;
        }

        debug!(count = pending.len(), "Executing diagnostic commands");
        let fresh = join_all(pending.iter().map(|command| self.run_one(command))).await;
        for result in fresh {
            self.cache.insert(result.command.clone(), result);
        }

        analyzers::analyze(hypothesis.category, self.cached(&selected))
    }

    async fn run_one(&self, command: &str) -> EvidenceResult {
        let start = Instant::now();
        let outcome =
            tokio::time::timeout(self.timeout, self.executor.execute(command, self.timeout)).await;
        let latency = start.elapsed().as_secs_f64();

        match outcome {
            Ok(Ok(output)) => {
                debug!(command, success = output.success, "Command finished");
                EvidenceResult::completed(command, output.success, output.stdout, output.stderr, latency)
            }
            Ok(Err(e)) => {
                warn!(command, error = %e, "Command execution failed");
                EvidenceResult::failed(command, format!("Command execution failed: {}", e), latency)
            }
            Err(_) => {
                warn!(command, "Command timed out");
                EvidenceResult::failed(
                    command,
                    format!("Command timed out after {:?}", self.timeout),
                    latency,
                )
            }
        }
    }

    fn cached(&self, commands: &[&str]) -> Vec<EvidenceResult> {
        commands
            .iter()
            .filter_map(|command| self.cache.get(*command).cloned())
            .collect()
    }

    /// Commands with a cached result, sorted
    #[must_use]
    pub fn cached_commands(&self) -> Vec<String> {
        let mut commands: Vec<String> = self.cache.keys().cloned().collect();
        commands.sort();
        commands
    }

    /// Drop every cached result
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        info!("Evidence cache cleared");
    }
}

pub(crate) fn pod_label(metadata: &serde_json::Value) -> &str {
    metadata
        .get("pod_name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown-pod")
}
