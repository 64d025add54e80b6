//! Evidence types

use super::factors::Factor;
use crate::hypothesis::HypothesisCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one diagnostic command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceResult {
    /// The exact command string
    pub command: String,
    /// Whether the command exited successfully
    pub success: bool,
    /// Captured stdout
    pub output: String,
    /// Captured stderr, or the reason the command could not run
    pub error: String,
    /// Wall-clock latency in seconds
    pub latency: f64,
    /// When the result was produced
    pub timestamp: DateTime<Utc>,
}

impl EvidenceResult {
    /// A command that ran to completion
    #[must_use]
    pub fn completed(
        command: impl Into<String>,
        success: bool,
        output: impl Into<String>,
        error: impl Into<String>,
        latency: f64,
    ) -> Self {
        Self {
            command: command.into(),
            success,
            output: output.into(),
            error: error.into(),
            latency,
            timestamp: Utc::now(),
        }
    }

    /// A command that failed, timed out or was refused
    #[must_use]
    pub fn failed(command: impl Into<String>, error: impl Into<String>, latency: f64) -> Self {
        Self::completed(command, false, "", error, latency)
    }

    /// Output the analyzers may interpret.
    ///
    /// A `| grep` pipeline that matched nothing exits non-zero with no
    /// output at all; that is an empty answer, not a failure.
    #[must_use]
    pub fn usable_output(&self) -> Option<&str> {
        if self.success {
            return Some(&self.output);
        }
        let grep_no_match = self.command.contains("| grep")
            && self.output.trim().is_empty()
            && self.error.trim().is_empty();
        grep_no_match.then_some("")
    }

    /// Whether kubectl reported an empty listing
    #[must_use]
    pub fn is_empty_listing(&self) -> bool {
        self.output.trim().is_empty()
            || self.output.contains("No resources found")
            || self.error.contains("No resources found")
    }
}

/// Payload of one evidence section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvidenceValue {
    /// Free text
    Text(String),
    /// List of observations
    List(Vec<String>),
    /// Keyed observations
    Map(BTreeMap<String, String>),
}

impl EvidenceValue {
    /// Case-insensitive substring match anywhere in the payload
    #[must_use]
    pub fn matches(&self, pattern: &str) -> bool {
        let pattern = pattern.to_lowercase();
        match self {
            Self::Text(text) => text.to_lowercase().contains(&pattern),
            Self::List(items) => items
                .iter()
                .any(|item| item.to_lowercase().contains(&pattern)),
            Self::Map(map) => map
                .values()
                .any(|value| value.to_lowercase().contains(&pattern)),
        }
    }
}

/// Structured evidence gathered for one hypothesis in one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Category whose analyzer produced this evidence
    pub category: HypothesisCategory,
    /// Raw command results that were analyzed
    pub results: Vec<EvidenceResult>,
    /// Human-readable observations
    pub findings: Vec<String>,
    /// Named boolean factors
    pub confidence_factors: BTreeMap<String, bool>,
    /// Section name to payload, as consumed by the scorer
    pub sections: BTreeMap<String, EvidenceValue>,
    /// True when no command was executed and the cache supplied everything
    pub from_cache: bool,
}

impl Evidence {
    /// Empty evidence for a category
    #[must_use]
    pub fn new(category: HypothesisCategory) -> Self {
        Self {
            category,
            results: Vec::new(),
            findings: Vec::new(),
            confidence_factors: BTreeMap::new(),
            sections: BTreeMap::new(),
            from_cache: false,
        }
    }

    /// Record a factor under its section
    pub fn mark(&mut self, factor: Factor) {
        self.confidence_factors.insert(factor.name.to_string(), true);
        let entry = self
            .sections
            .entry(factor.section.to_string())
            .or_insert_with(|| EvidenceValue::List(Vec::new()));
        match entry {
            EvidenceValue::List(items) => {
                if !items.iter().any(|i| i == factor.name) {
                    items.push(factor.name.to_string());
                }
            }
            EvidenceValue::Text(text) => {
                text.push(' ');
                text.push_str(factor.name);
            }
            EvidenceValue::Map(map) => {
                map.insert(factor.name.to_string(), factor.name.to_string());
            }
        }
    }

    /// Record a factor together with the finding that explains it
    pub fn observe(&mut self, factor: Factor, finding: &str) {
        self.mark(factor);
        self.add_finding(finding);
    }

    /// Append a finding unless it is already present
    pub fn add_finding(&mut self, finding: impl Into<String>) {
        let finding = finding.into();
        if !self.findings.contains(&finding) {
            self.findings.push(finding);
        }
    }

    /// Whether a factor was recorded
    #[must_use]
    pub fn has_factor(&self, factor: Factor) -> bool {
        self.confidence_factors
            .get(factor.name)
            .copied()
            .unwrap_or(false)
    }

    /// All findings joined and lowercased
    #[must_use]
    pub fn findings_text(&self) -> String {
        self.findings.join(" ").to_lowercase()
    }

    /// Whether every analyzed command failed
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| !r.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::factors;

    #[test]
    fn test_evidence_value_matches() {
        let text = EvidenceValue::Text("OOMKilled twice".to_string());
        assert!(text.matches("oomkilled"));

        let list = EvidenceValue::List(vec!["a".to_string(), "Memory_Usage_High".to_string()]);
        assert!(list.matches("memory_usage_high"));
        assert!(!list.matches("cpu_usage_high"));

        let mut map = BTreeMap::new();
        map.insert("k".to_string(), "missing_secret".to_string());
        assert!(EvidenceValue::Map(map).matches("MISSING_SECRET"));
    }

    #[test]
    fn test_mark_places_factor_in_section() {
        let mut evidence = Evidence::new(HypothesisCategory::ResourceExhaustion);
        evidence.observe(factors::OOM_EVENTS_FOUND, "OOM kill events found");
        evidence.observe(factors::OOM_EVENTS_FOUND, "OOM kill events found");

        assert!(evidence.has_factor(factors::OOM_EVENTS_FOUND));
        assert_eq!(evidence.findings.len(), 1);
        assert_eq!(
            evidence.sections.get("events"),
            Some(&EvidenceValue::List(vec!["oom_events_found".to_string()]))
        );
    }

    #[test]
    fn test_usable_output() {
        let ok = EvidenceResult::completed("kubectl get pods", true, "pod", "", 0.1);
        assert_eq!(ok.usable_output(), Some("pod"));

        let no_match = EvidenceResult::completed("kubectl get pod x -o yaml | grep affinity", false, "", "", 0.1);
        assert_eq!(no_match.usable_output(), Some(""));

        let refused = EvidenceResult::failed("kubectl get pods", "connection refused", 0.1);
        assert_eq!(refused.usable_output(), None);
    }

    #[test]
    fn test_empty_listing() {
        let stderr_only =
            EvidenceResult::completed("kubectl get svc -n ns", true, "", "No resources found in ns namespace.", 0.1);
        assert!(stderr_only.is_empty_listing());

        let listed = EvidenceResult::completed("kubectl get svc -n ns", true, "NAME TYPE\napi ClusterIP", "", 0.1);
        assert!(!listed.is_empty_listing());
    }

    #[test]
    fn test_evidence_value_untagged_serde() {
        let value: EvidenceValue = serde_json::from_str(r#"["x","y"]"#).unwrap();
        assert_eq!(value, EvidenceValue::List(vec!["x".into(), "y".into()]));
        let value: EvidenceValue = serde_json::from_str(r#""text""#).unwrap();
        assert_eq!(value, EvidenceValue::Text("text".into()));
    }
}
