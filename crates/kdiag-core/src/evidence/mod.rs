//! Evidence - command gathering and per-category analysis
//!
//! - `types`: `EvidenceResult`, `Evidence`, `EvidenceValue`
//! - `factors`: the named confidence factors shared with the scorer
//! - `analyzers`: category analyzers, selected through a fixed table
//! - `gatherer`: bounded concurrent execution with a run-scoped cache

pub mod analyzers;
pub mod factors;
mod gatherer;
mod types;

pub use factors::Factor;
pub(crate) use gatherer::pod_label;
pub use gatherer::EvidenceGatherer;
pub use types::{Evidence, EvidenceResult, EvidenceValue};
