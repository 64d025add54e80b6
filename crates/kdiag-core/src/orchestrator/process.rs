//! Orchestrator main loop
//!
//! Contains `diagnose` and `investigate`, the only entry points. Both run
//! the loop under the outer deadline and convert every failure into a
//! terminal `DiagnosisResult`.

use super::core::Orchestrator;
use super::types::{DiagnosisResult, IterationRecord, TerminationReason};
use super::writer::WriterInput;
use crate::error::{Error, Result};
use crate::evidence::{pod_label, Evidence, EvidenceGatherer};
use crate::hypothesis::{Hypothesis, HypothesisScorer};
use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Mutable state of one run, readable after the loop is cut short
pub(super) struct RunState {
    pub(super) run_id: Uuid,
    pub(super) started: Instant,
    pub(super) hypotheses: Vec<Hypothesis>,
    pub(super) iterations: Vec<IterationRecord>,
    pub(super) trace: Vec<String>,
    pub(super) commands_used: Vec<String>,
}

impl RunState {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started: Instant::now(),
            hypotheses: Vec::new(),
            iterations: Vec::new(),
            trace: Vec::new(),
            commands_used: Vec::new(),
        }
    }

    pub(super) fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn record_commands(&mut self, commands: &[String], limit: usize) {
        for command in commands.iter().take(limit) {
            if !self.commands_used.contains(command) {
                self.commands_used.push(command.clone());
            }
        }
    }
}

impl Orchestrator {
    /// Diagnose a pod from its symptom metadata.
    ///
    /// Always returns a result: an empty hypothesis set, a failed command,
    /// a provider error, a panic inside the loop and the outer deadline all
    /// end in a terminal `DiagnosisResult` whose `termination` says why.
    #[instrument(skip_all, fields(pod = %pod_label(metadata)))]
    pub async fn diagnose(&self, metadata: &Value) -> DiagnosisResult {
        self.run(metadata, None).await
    }

    /// Run the loop over a caller-supplied hypothesis set instead of the
    /// catalog's.
    #[instrument(skip_all, fields(pod = %pod_label(metadata), hypotheses = hypotheses.len()))]
    pub async fn investigate(&self, hypotheses: Vec<Hypothesis>, metadata: &Value) -> DiagnosisResult {
        self.run(metadata, Some(hypotheses)).await
    }

    async fn run(&self, metadata: &Value, seed: Option<Vec<Hypothesis>>) -> DiagnosisResult {
        let mut state = RunState::new();
        info!(run_id = %state.run_id, "Starting diagnosis");

        let deadline = self.config.deadline();
        let outcome = tokio::time::timeout(
            deadline,
            AssertUnwindSafe(self.run_loop(&mut state, metadata, seed)).catch_unwind(),
        )
        .await;

        let result = match outcome {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => {
                error!(run_id = %state.run_id, error = %e, "Diagnosis failed");
                self.build_error_result(state, &e.to_string())
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(run_id = %state.run_id, panic = %message, "Diagnosis panicked");
                self.build_error_result(state, &message)
            }
            Err(_) => {
                warn!(
                    run_id = %state.run_id,
                    deadline_ms = self.config.deadline_ms,
                    "Diagnosis deadline exceeded"
                );
                self.build_deadline_result(state)
            }
        };

        info!(
            run_id = %result.run_id,
            confidence = result.confidence_score,
            iterations = result.iterations.len(),
            commands = result.total_commands_executed,
            termination = %result.termination,
            "Diagnosis finished"
        );
        result
    }

    async fn run_loop(
        &self,
        state: &mut RunState,
        metadata: &Value,
        seed: Option<Vec<Hypothesis>>,
    ) -> Result<DiagnosisResult> {
        self.config.validate()?;

        state
            .trace
            .push("REASONING: Generating initial hypotheses from pod metadata".to_string());
        let hypotheses = match seed {
            Some(hypotheses) => hypotheses,
            None => self.catalog.generate(metadata),
        };
        if hypotheses.is_empty() {
            return Ok(self.build_no_hypotheses_result(state));
        }
        state
            .trace
            .push(format!("Generated {} initial hypotheses", hypotheses.len()));
        state.hypotheses = hypotheses;

        let mut gatherer = EvidenceGatherer::new(self.executor.clone())
            .with_timeout(self.config.command_timeout())
            .with_commands_per_iteration(self.config.commands_per_iteration);

        let mut termination = TerminationReason::MaxIterations;
        for iteration in 1..=self.config.max_iterations {
            state.trace.push(format!("ITERATION {}", iteration));

            state.hypotheses = self.scorer.prioritize(std::mem::take(&mut state.hypotheses));
            let selected = state
                .hypotheses
                .first()
                .cloned()
                .ok_or_else(|| Error::Internal("hypothesis set is empty".to_string()))?;
            state.trace.push(format!(
                "SELECTED: {} (confidence: {:.1})",
                selected.category, selected.confidence
            ));

            state
                .trace
                .push("ACTING: Gathering targeted evidence...".to_string());
            let evidence = gatherer.gather(&selected, metadata).await;
            state.record_commands(&selected.commands, self.config.commands_per_iteration);

            let before: BTreeMap<String, f64> = state
                .hypotheses
                .iter()
                .map(|h| (h.id.clone(), h.confidence))
                .collect();
            if let Some(target) = state.hypotheses.iter_mut().find(|h| h.id == selected.id) {
                self.scorer.update(target, &evidence);
            }
            self.scorer
                .penalize_competitors(&mut state.hypotheses, &evidence, &selected.id);
            let confidence_deltas: BTreeMap<String, f64> = state
                .hypotheses
                .iter()
                .map(|h| {
                    let old = before.get(&h.id).copied().unwrap_or(h.confidence);
                    (h.id.clone(), h.confidence - old)
                })
                .collect();

            let summary = summarize(&selected, &evidence);
            state.trace.push(format!("UPDATED CONFIDENCE: {}", summary));
            debug!(iteration, summary = %summary, "Iteration complete");

            let selected = state
                .hypotheses
                .iter()
                .find(|h| h.id == selected.id)
                .cloned()
                .unwrap_or(selected);
            state.iterations.push(IterationRecord {
                iteration,
                hypotheses: state.hypotheses.clone(),
                selected,
                evidence,
                confidence_deltas,
                summary,
                timestamp: Utc::now(),
            });

            let threshold = self.config.confidence_threshold;
            if let Some(best) = HypothesisScorer::best(&state.hypotheses) {
                if best.confidence >= threshold {
                    state.trace.push(format!(
                        "Reached confidence threshold ({:.1} >= {:.1})",
                        best.confidence, threshold
                    ));
                    termination = TerminationReason::ConfidenceMet;
                    break;
                }
            }
        }

        if termination == TerminationReason::MaxIterations {
            state.trace.push(format!(
                "Iteration budget of {} exhausted",
                self.config.max_iterations
            ));
        }

        self.finalize(state, metadata, termination).await
    }

    async fn finalize(
        &self,
        state: &mut RunState,
        metadata: &Value,
        termination: TerminationReason,
    ) -> Result<DiagnosisResult> {
        let best = HypothesisScorer::best(&state.hypotheses)
            .cloned()
            .ok_or_else(|| Error::Internal("no hypothesis to report".to_string()))?;

        let written = self
            .writer()
            .write(&WriterInput {
                metadata,
                best: &best,
                hypotheses: &state.hypotheses,
                iterations: &state.iterations,
                trace: &state.trace,
            })
            .await;
        state
            .trace
            .push(format!("FINAL DIAGNOSIS: {}", written.diagnosis));

        Ok(DiagnosisResult {
            run_id: state.run_id,
            diagnosis: written.diagnosis,
            confidence_score: best.confidence,
            best_hypothesis: best,
            iterations: std::mem::take(&mut state.iterations),
            total_commands_executed: state.commands_used.len(),
            total_elapsed_secs: state.elapsed_secs(),
            reasoning_trace: std::mem::take(&mut state.trace),
            recommendations: written.recommendations,
            commands_used: std::mem::take(&mut state.commands_used),
            termination,
        })
    }
}

/// `"{category}: {first three findings}"`
fn summarize(hypothesis: &Hypothesis, evidence: &Evidence) -> String {
    if evidence.findings.is_empty() {
        return format!("{}: No significant evidence found", hypothesis.category);
    }
    let findings: Vec<&str> = evidence.findings.iter().take(3).map(String::as_str).collect();
    format!("{}: {}", hypothesis.category, findings.join("; "))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
