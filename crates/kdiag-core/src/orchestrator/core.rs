//! Orchestrator core structure
//!
//! Contains the main `Orchestrator` struct and its builder methods.

use super::writer::DiagnosisWriter;
use crate::config::DiagnosisConfig;
use crate::hypothesis::{HypothesisCatalog, HypothesisScorer};
use kdiag_llm::LlmProvider;
use kdiag_tools::CommandExecutor;
use std::sync::Arc;

/// Drives hypothesis-driven diagnosis runs
pub struct Orchestrator {
    pub(crate) executor: Arc<dyn CommandExecutor>,
    pub(crate) llm: Option<Arc<dyn LlmProvider>>,
    pub(crate) catalog: HypothesisCatalog,
    pub(crate) scorer: HypothesisScorer,
    pub(crate) config: DiagnosisConfig,
}

impl Orchestrator {
    /// Create an orchestrator without a text-generation provider
    #[must_use]
    pub fn new(executor: Arc<dyn CommandExecutor>, config: DiagnosisConfig) -> Self {
        let catalog = HypothesisCatalog::new().with_max_hypotheses(config.max_hypotheses);
        Self {
            executor,
            llm: None,
            catalog,
            scorer: HypothesisScorer::new(),
            config,
        }
    }

    /// Set the text-generation provider for the final diagnosis
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Replace the hypothesis catalog
    #[must_use]
    pub fn with_catalog(mut self, catalog: HypothesisCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &DiagnosisConfig {
        &self.config
    }

    /// Get the hypothesis catalog
    #[must_use]
    pub fn catalog(&self) -> &HypothesisCatalog {
        &self.catalog
    }

    pub(crate) fn writer(&self) -> DiagnosisWriter {
        DiagnosisWriter::new(self.llm.clone())
            .with_model(self.config.llm_model.clone())
            .with_anonymize(self.config.anonymize)
    }
}
