//! Hypotheses
//!
//! - [`HypothesisCatalog`] turns symptom metadata into initial hypotheses
//! - [`HypothesisScorer`] moves their confidence as evidence arrives and
//!   decides which one to investigate next

mod catalog;
mod scorer;
mod types;

#[cfg(test)]
mod tests;

pub use catalog::{
    flatten_text, initial_confidence, render_template, CatalogEntry, HypothesisCatalog, Target,
};
pub use scorer::{HypothesisScorer, COMPETITOR_PENALTY};
pub use types::{Hypothesis, HypothesisCategory, MAX_CONFIDENCE, MIN_CONFIDENCE};
