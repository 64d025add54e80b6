//! Orchestrator - the diagnosis loop
//!
//! # Module Structure
//!
//! - `types`: `DiagnosisResult`, `IterationRecord`, `TerminationReason`
//! - `core`: `Orchestrator` struct and builder methods
//! - `process`: the iterate-select-gather-score loop under the outer deadline
//! - `result_builder`: terminal results for empty, failed and expired runs
//! - `writer`: diagnosis prose and recommendations, with template fallback

mod core;
mod process;
mod result_builder;
mod types;
mod writer;


pub use core::Orchestrator;
pub use types::{DiagnosisResult, IterationRecord, TerminationReason};
pub use writer::{
    fallback_diagnosis, fallback_recommendations, parse_recommendations, DiagnosisWriter,
    WriterInput, WrittenDiagnosis, MAX_RECOMMENDATIONS,
};
