//! kdiag Core - Hypothesis-driven pod failure diagnosis
//!
//! This crate provides the reasoning loop for kdiag:
//! - Hypothesis: catalog of failure categories, scoring and prioritization
//! - Evidence: command gathering with a run-scoped cache and per-category analyzers
//! - Orchestrator: the iterate-select-gather-score loop and final diagnosis assembly
//! - Anonymizer: masking of cluster identifiers before text generation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anonymizer;
pub mod config;
pub mod error;
pub mod evidence;
pub mod hypothesis;
pub mod orchestrator;

pub use anonymizer::{Anonymizer, RestoreMap};
pub use config::DiagnosisConfig;
pub use error::{Error, Result};
pub use evidence::{Evidence, EvidenceGatherer, EvidenceResult, EvidenceValue};
pub use hypothesis::{
    CatalogEntry, Hypothesis, HypothesisCatalog, HypothesisCategory, HypothesisScorer,
};
pub use orchestrator::{
    DiagnosisResult, DiagnosisWriter, IterationRecord, Orchestrator, TerminationReason,
};
