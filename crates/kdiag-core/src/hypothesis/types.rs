//! Hypothesis types

use super::catalog::CatalogEntry;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest confidence a hypothesis can hold
pub const MIN_CONFIDENCE: f64 = 0.0;
/// Highest confidence a hypothesis can hold
pub const MAX_CONFIDENCE: f64 = 10.0;

/// Failure category of a hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisCategory {
    /// CPU, memory or storage pressure
    ResourceExhaustion,
    /// Image pull or registry problems
    ImageRegistryIssues,
    /// ConfigMap, Secret, environment or volume problems
    ConfigurationErrors,
    /// Service, endpoint, DNS or policy problems
    NetworkConnectivity,
    /// RBAC, service account or policy denials
    SecurityPermissions,
    /// Failing liveness or readiness probes
    LivenessReadiness,
    /// Pod cannot be placed on a node
    SchedulingIssues,
}

impl HypothesisCategory {
    /// Number of categories
    pub const COUNT: usize = 7;

    /// All categories, in table order
    pub const ALL: [Self; Self::COUNT] = [
        Self::ResourceExhaustion,
        Self::ImageRegistryIssues,
        Self::ConfigurationErrors,
        Self::NetworkConnectivity,
        Self::SecurityPermissions,
        Self::LivenessReadiness,
        Self::SchedulingIssues,
    ];

    /// Position in [`Self::ALL`], used to index the static tables
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns the string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceExhaustion => "resource_exhaustion",
            Self::ImageRegistryIssues => "image_registry_issues",
            Self::ConfigurationErrors => "configuration_errors",
            Self::NetworkConnectivity => "network_connectivity",
            Self::SecurityPermissions => "security_permissions",
            Self::LivenessReadiness => "liveness_readiness",
            Self::SchedulingIssues => "scheduling_issues",
        }
    }
}

impl fmt::Display for HypothesisCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HypothesisCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::UnknownCategory(s.to_string()))
    }
}

/// A candidate root-cause explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Unique id within a run
    pub id: String,
    /// Failure category
    pub category: HypothesisCategory,
    /// Human-readable explanation
    pub description: String,
    /// Belief in this hypothesis, always within [0, 10]
    pub confidence: f64,
    /// Supporting observations, append-only
    pub evidence_for: Vec<String>,
    /// Contradicting observations, append-only
    pub evidence_against: Vec<String>,
    /// What would validate this hypothesis
    pub needed_data: Vec<String>,
    /// Fully-resolved diagnostic commands
    pub commands: Vec<String>,
    /// Impact if this hypothesis is correct
    pub severity_score: f64,
    /// How cheaply it can be tested
    pub ease_of_validation_score: f64,
    /// Derived ranking, recomputed on every prioritization
    pub priority_score: f64,
}

impl Hypothesis {
    /// Create a hypothesis with the category's catalog scores and no commands
    #[must_use]
    pub fn new(
        category: HypothesisCategory,
        description: impl Into<String>,
        confidence: f64,
    ) -> Self {
        let entry = CatalogEntry::for_category(category);
        Self {
            id: format!("hyp_{}", category),
            category,
            description: description.into(),
            confidence: clamp_confidence(confidence),
            evidence_for: Vec::new(),
            evidence_against: Vec::new(),
            needed_data: entry.needed_data.iter().map(|s| (*s).to_string()).collect(),
            commands: Vec::new(),
            severity_score: entry.severity,
            ease_of_validation_score: entry.ease_of_validation,
            priority_score: 0.0,
        }
    }

    /// Override the id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the diagnostic commands
    #[must_use]
    pub fn with_commands(mut self, commands: Vec<String>) -> Self {
        self.commands = commands;
        self
    }

    /// Add `delta` to the confidence, clamped to [0, 10]
    pub fn adjust_confidence(&mut self, delta: f64) -> f64 {
        if delta.is_finite() {
            self.confidence = clamp_confidence(self.confidence + delta);
        }
        self.confidence
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_CONFIDENCE;
    }
    value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}
