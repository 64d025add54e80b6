//! Confidence scoring and prioritization

use super::catalog::CatalogEntry;
use super::types::{Hypothesis, HypothesisCategory, MAX_CONFIDENCE};
use crate::evidence::factors::{self, Factor};
use crate::evidence::Evidence;
use std::cmp::Ordering;
use tracing::debug;

/// Flat penalty applied to a competitor whose contradiction terms appear
/// in the evidence
pub const COMPETITOR_PENALTY: f64 = 0.5;

static ADJUSTMENTS: [&[(Factor, f64)]; HypothesisCategory::COUNT] = [
    // resource_exhaustion
    &[
        (factors::MEMORY_USAGE_HIGH, 2.5),
        (factors::CPU_USAGE_HIGH, 2.0),
        (factors::MEMORY_USAGE_NORMAL, -1.5),
        (factors::CPU_USAGE_NORMAL, -1.0),
        (factors::OOM_EVENTS_FOUND, 3.0),
        (factors::EVICTION_EVENTS_FOUND, 3.0),
        (factors::RESOURCE_QUOTA_EXCEEDED, 2.5),
        (factors::NO_RESOURCE_EVENTS, -2.0),
        (factors::NO_RESOURCE_LIMITS, 1.5),
        (factors::RESOURCE_LIMITS_ADEQUATE, -1.0),
    ],
    // image_registry_issues
    &[
        (factors::IMAGE_PULL_ERRORS_FOUND, 3.5),
        (factors::AUTHENTICATION_ERRORS, 3.0),
        (factors::REGISTRY_UNREACHABLE, 2.5),
        (factors::SUCCESSFUL_IMAGE_PULLS, -2.0),
        (factors::INVALID_IMAGE_NAME, 2.0),
        (factors::MISSING_PULL_SECRETS, 2.5),
        (factors::VALID_IMAGE_CONFIG, -1.5),
    ],
    // configuration_errors
    &[
        (factors::MISSING_CONFIGMAP, 3.0),
        (factors::MISSING_SECRET, 3.0),
        (factors::INVALID_ENVIRONMENT_VARS, 2.0),
        (factors::CONFIGURATION_VALID, -2.0),
        (factors::VOLUME_MOUNT_ERRORS, 2.5),
        (factors::SUCCESSFUL_MOUNTS, -1.5),
    ],
    // network_connectivity
    &[
        (factors::NO_SERVICES, 2.5),
        (factors::SERVICES_PRESENT, -1.0),
        (factors::ENDPOINTS_MISSING, 2.5),
        (factors::NETWORK_POLICIES_PRESENT, 1.5),
    ],
    // security_permissions
    &[
        (factors::MISSING_SERVICE_ACCOUNT, 2.5),
        (factors::MISSING_RBAC, 2.0),
        (factors::PERMISSION_DENIED, 3.5),
    ],
    // liveness_readiness
    &[
        (factors::LIVENESS_PROBE_FAILING, 3.0),
        (factors::READINESS_PROBE_FAILING, 2.5),
        (factors::PROBE_CONFIGURATION_INVALID, 2.0),
        (factors::PROBES_PASSING, -2.5),
        (factors::HEALTH_CHECK_TIMEOUTS, 2.0),
        (factors::APPLICATION_HEALTHY, -2.0),
    ],
    // scheduling_issues
    &[
        (factors::NODE_SCHEDULING_ISSUES, 2.5),
        (factors::NODES_READY, -1.0),
        (factors::SCHEDULING_FAILURES, 3.5),
        (factors::POD_SCHEDULED, -2.0),
    ],
];

/// Updates confidences from evidence and ranks hypotheses
#[derive(Debug, Clone, Default)]
pub struct HypothesisScorer;

impl HypothesisScorer {
    /// Create a scorer over the built-in adjustment tables
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Factor deltas for a category
    #[must_use]
    pub fn adjustments(category: HypothesisCategory) -> &'static [(Factor, f64)] {
        ADJUSTMENTS[category.index()]
    }

    /// Apply the category's adjustment table to `evidence`.
    ///
    /// Every matching factor appends `"section: factor"` to `evidence_for`.
    /// Returns the confidence change actually applied after clamping.
    pub fn update(&self, hypothesis: &mut Hypothesis, evidence: &Evidence) -> f64 {
        let before = hypothesis.confidence;
        let mut delta = 0.0;

        for (factor, adjustment) in Self::adjustments(hypothesis.category) {
            let matched = evidence
                .sections
                .get(factor.section)
                .is_some_and(|payload| payload.matches(factor.name));
            if matched {
                delta += adjustment;
                hypothesis
                    .evidence_for
                    .push(format!("{}: {}", factor.section, factor.name));
            }
        }

        let after = hypothesis.adjust_confidence(delta);
        debug!(
            id = %hypothesis.id,
            before,
            after,
            "Updated hypothesis confidence"
        );
        after - before
    }

    /// Penalize every hypothesis other than `investigated_id` whose
    /// contradiction terms appear in the evidence findings.
    ///
    /// Returns the applied change per penalized hypothesis id.
    pub fn penalize_competitors(
        &self,
        hypotheses: &mut [Hypothesis],
        evidence: &Evidence,
        investigated_id: &str,
    ) -> Vec<(String, f64)> {
        let findings = evidence.findings_text();
        let mut changes = Vec::new();
        if findings.is_empty() {
            return changes;
        }

        for hypothesis in hypotheses.iter_mut().filter(|h| h.id != investigated_id) {
            let matched: Vec<&str> = CatalogEntry::for_category(hypothesis.category)
                .contradictions
                .iter()
                .copied()
                .filter(|term| findings.contains(term))
                .collect();
            if matched.is_empty() {
                continue;
            }

            for term in &matched {
                hypothesis
                    .evidence_against
                    .push(format!("Evidence contradicts: {}", term));
            }
            let before = hypothesis.confidence;
            let after = hypothesis.adjust_confidence(-COMPETITOR_PENALTY);
            debug!(id = %hypothesis.id, before, after, "Penalized competing hypothesis");
            changes.push((hypothesis.id.clone(), after - before));
        }
        changes
    }

    /// `0.4c + 0.3s + 0.2e + 0.1(10 - c)`
    #[must_use]
    pub fn priority(hypothesis: &Hypothesis) -> f64 {
        let c = hypothesis.confidence;
        0.4 * c
            + 0.3 * hypothesis.severity_score
            + 0.2 * hypothesis.ease_of_validation_score
            + 0.1 * (MAX_CONFIDENCE - c)
    }

    /// Recompute priority scores and sort, highest priority first.
    ///
    /// Ties fall back to confidence, then category name, then id, so the
    /// order is total and deterministic.
    #[must_use]
    pub fn prioritize(&self, mut hypotheses: Vec<Hypothesis>) -> Vec<Hypothesis> {
        for hypothesis in &mut hypotheses {
            hypothesis.priority_score = Self::priority(hypothesis);
        }
        hypotheses.sort_by(|a, b| {
            b.priority_score
                .total_cmp(&a.priority_score)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| tie_break(a, b))
        });
        hypotheses
    }

    /// Highest-confidence hypothesis, ties broken by category name then id
    #[must_use]
    pub fn best(hypotheses: &[Hypothesis]) -> Option<&Hypothesis> {
        hypotheses.iter().min_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| tie_break(a, b))
        })
    }
}

fn tie_break(a: &Hypothesis, b: &Hypothesis) -> Ordering {
    a.category
        .as_str()
        .cmp(b.category.as_str())
        .then_with(|| a.id.cmp(&b.id))
}
