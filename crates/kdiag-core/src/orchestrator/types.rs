//! Orchestrator types
//!
//! - `TerminationReason` for how a run ended
//! - `IterationRecord` for one loop pass
//! - `DiagnosisResult` for the final output

use crate::evidence::Evidence;
use crate::hypothesis::Hypothesis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Why a diagnosis run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// A hypothesis reached the confidence threshold
    ConfidenceMet,
    /// The iteration budget ran out
    MaxIterations,
    /// No hypothesis passed the initial confidence bar
    NoHypotheses,
    /// An unexpected error or panic ended the run
    FatalError,
    /// The outer deadline expired
    DeadlineExceeded,
}

impl TerminationReason {
    /// Returns the string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConfidenceMet => "confidence_met",
            Self::MaxIterations => "max_iterations",
            Self::NoHypotheses => "no_hypotheses",
            Self::FatalError => "fatal_error",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one loop pass.
///
/// Holds owned copies of the hypotheses as they stood when the record was
/// taken; later scoring never changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number
    pub iteration: usize,
    /// Every hypothesis after this iteration's updates
    pub hypotheses: Vec<Hypothesis>,
    /// The hypothesis investigated in this iteration
    pub selected: Hypothesis,
    /// Evidence gathered for it
    pub evidence: Evidence,
    /// Confidence change per hypothesis id
    pub confidence_deltas: BTreeMap<String, f64>,
    /// One-line summary of the findings
    pub summary: String,
    /// When the record was taken
    pub timestamp: DateTime<Utc>,
}

/// Final output of a diagnosis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    /// Run id
    pub run_id: Uuid,
    /// Diagnosis prose
    pub diagnosis: String,
    /// Highest-confidence hypothesis
    pub best_hypothesis: Hypothesis,
    /// Confidence of the best hypothesis
    pub confidence_score: f64,
    /// Every completed iteration
    pub iterations: Vec<IterationRecord>,
    /// Number of distinct commands used across the run
    pub total_commands_executed: usize,
    /// Wall-clock duration of the run in seconds
    pub total_elapsed_secs: f64,
    /// Ordered, human-readable account of the run
    pub reasoning_trace: Vec<String>,
    /// Suggested next steps
    pub recommendations: Vec<String>,
    /// Distinct commands used, in first-use order
    pub commands_used: Vec<String>,
    /// How the run ended
    pub termination: TerminationReason,
}

impl DiagnosisResult {
    /// Human-readable report of every iteration
    #[must_use]
    pub fn iteration_summary(&self) -> String {
        if self.iterations.is_empty() {
            return "No iterations completed".to_string();
        }

        let mut lines = vec!["Diagnosis Summary:".to_string(), "=".repeat(30)];
        for record in &self.iterations {
            lines.push(format!("\nIteration {}:", record.iteration));
            lines.push(format!("  Investigated: {}", record.selected.category));
            lines.push(format!("  Confidence: {:.1}", record.selected.confidence));
            lines.push(format!("  Summary: {}", record.summary));
        }
        lines.join("\n")
    }

    /// Whether the run ended in an error or deadline result
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.termination,
            TerminationReason::FatalError | TerminationReason::DeadlineExceeded
        )
    }
}
