//! Result building helpers for the Orchestrator
//!
//! Terminal results for runs that never reach the writer normally: no
//! hypotheses, a fatal error, or an expired deadline.

use super::core::Orchestrator;
use super::process::RunState;
use super::types::{DiagnosisResult, TerminationReason};
use super::writer::{fallback_diagnosis, fallback_recommendations};
use crate::hypothesis::{Hypothesis, HypothesisCategory, HypothesisScorer};

const NO_HYPOTHESES_MESSAGE: &str = "No viable hypotheses generated from metadata";

/// Placeholder hypothesis for results that have no real one
fn synthetic_hypothesis(id: &str, description: String, confidence: f64, severity: f64) -> Hypothesis {
    let mut hypothesis = Hypothesis::new(HypothesisCategory::ConfigurationErrors, description, confidence)
        .with_id(id);
    hypothesis.needed_data.clear();
    hypothesis.severity_score = severity;
    hypothesis.ease_of_validation_score = 1.0;
    hypothesis
}

impl Orchestrator {
    /// Low-confidence result when the catalog produced nothing
    pub(super) fn build_no_hypotheses_result(&self, state: &mut RunState) -> DiagnosisResult {
        state.trace.push(NO_HYPOTHESES_MESSAGE.to_string());
        let best = synthetic_hypothesis("fallback", NO_HYPOTHESES_MESSAGE.to_string(), 1.0, 5.0);

        DiagnosisResult {
            run_id: state.run_id,
            diagnosis: NO_HYPOTHESES_MESSAGE.to_string(),
            confidence_score: best.confidence,
            best_hypothesis: best,
            iterations: Vec::new(),
            total_commands_executed: 0,
            total_elapsed_secs: state.elapsed_secs(),
            reasoning_trace: std::mem::take(&mut state.trace),
            recommendations: vec!["Review pod configuration manually".to_string()],
            commands_used: Vec::new(),
            termination: TerminationReason::NoHypotheses,
        }
    }

    /// Zero-confidence result carrying the error and the partial trace
    pub(super) fn build_error_result(&self, mut state: RunState, message: &str) -> DiagnosisResult {
        state.trace.push(format!("ERROR: {}", message));
        let best = synthetic_hypothesis("error", format!("Diagnosis failed: {}", message), 0.0, 1.0);

        DiagnosisResult {
            run_id: state.run_id,
            diagnosis: format!("Diagnosis failed: {}", message),
            confidence_score: 0.0,
            best_hypothesis: best,
            total_commands_executed: state.commands_used.len(),
            total_elapsed_secs: state.elapsed_secs(),
            iterations: state.iterations,
            reasoning_trace: state.trace,
            recommendations: vec!["Check system logs and try manual diagnosis".to_string()],
            commands_used: state.commands_used,
            termination: TerminationReason::FatalError,
        }
    }

    /// Template result from whatever the run had when the deadline expired
    pub(super) fn build_deadline_result(&self, mut state: RunState) -> DiagnosisResult {
        let notice = format!(
            "Diagnosis deadline of {:?} exceeded after {} completed iteration(s)",
            self.config.deadline(),
            state.iterations.len()
        );
        state.trace.push(format!("DEADLINE: {}", notice));

        let (best, diagnosis, recommendations) = match HypothesisScorer::best(&state.hypotheses) {
            Some(best) => (
                best.clone(),
                format!("{}.\n\n{}", notice, fallback_diagnosis(best)),
                fallback_recommendations(best.category),
            ),
            None => (
                synthetic_hypothesis("deadline", notice.clone(), 0.0, 1.0),
                notice,
                vec!["Re-run the diagnosis with a longer deadline".to_string()],
            ),
        };

        DiagnosisResult {
            run_id: state.run_id,
            diagnosis,
            confidence_score: best.confidence,
            best_hypothesis: best,
            total_commands_executed: state.commands_used.len(),
            total_elapsed_secs: state.elapsed_secs(),
            iterations: state.iterations,
            reasoning_trace: state.trace,
            recommendations,
            commands_used: state.commands_used,
            termination: TerminationReason::DeadlineExceeded,
        }
    }
}
