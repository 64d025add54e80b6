//! Property tests across catalog and scorer

use super::*;
use crate::evidence::{factors, Evidence};
use proptest::prelude::*;
use serde_json::json;

fn category_strategy() -> impl Strategy<Value = HypothesisCategory> {
    (0..HypothesisCategory::COUNT).prop_map(|i| HypothesisCategory::ALL[i])
}

fn hypothesis_strategy() -> impl Strategy<Value = Hypothesis> {
    (category_strategy(), 0.0f64..=10.0, "[a-z]{1,6}").prop_map(|(category, confidence, id)| {
        Hypothesis::new(category, "generated", confidence).with_id(id)
    })
}

fn contradiction_terms() -> Vec<&'static str> {
    HypothesisCategory::ALL
        .iter()
        .flat_map(|c| CatalogEntry::for_category(*c).contradictions.iter().copied())
        .collect()
}

/// One investigation pass: the chosen hypothesis, its factors and extra findings
fn step_strategy() -> impl Strategy<Value = (usize, Vec<bool>, Vec<usize>)> {
    (
        0..HypothesisCategory::COUNT,
        prop::collection::vec(any::<bool>(), 10),
        prop::collection::vec(0usize..64, 0..4),
    )
}

fn indicator_words() -> Vec<&'static str> {
    HypothesisCategory::ALL
        .iter()
        .flat_map(|c| CatalogEntry::for_category(*c).indicators.iter().copied())
        .collect()
}

proptest! {
    #[test]
    fn confidence_stays_in_bounds(
        start in 0.0f64..=10.0,
        deltas in prop::collection::vec(-20.0f64..20.0, 0..10),
    ) {
        let mut h = Hypothesis::new(HypothesisCategory::ResourceExhaustion, "x", start);
        for delta in deltas {
            let c = h.adjust_confidence(delta);
            prop_assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&c));
        }
    }

    #[test]
    fn update_keeps_confidence_in_bounds(
        category in category_strategy(),
        start in 0.0f64..=10.0,
        mask in prop::collection::vec(any::<bool>(), 10),
    ) {
        let scorer = HypothesisScorer::new();
        let mut h = Hypothesis::new(category, "x", start);
        let mut evidence = Evidence::new(category);
        for (factor, on) in factors::vocabulary(category).iter().zip(mask) {
            if on {
                evidence.mark(*factor);
            }
        }
        let delta = scorer.update(&mut h, &evidence);
        prop_assert!((0.0..=10.0).contains(&h.confidence));
        prop_assert!((h.confidence - (start + delta)).abs() < 1e-9);
    }

    #[test]
    fn mixed_updates_and_penalties_stay_in_bounds(
        starts in prop::collection::vec(0.0f64..=10.0, HypothesisCategory::COUNT),
        steps in prop::collection::vec(step_strategy(), 1..12),
    ) {
        let scorer = HypothesisScorer::new();
        let terms = contradiction_terms();
        let mut hypotheses: Vec<Hypothesis> = HypothesisCategory::ALL
            .iter()
            .zip(starts)
            .map(|(category, start)| Hypothesis::new(*category, "x", start))
            .collect();

        for (investigated, mask, picks) in steps {
            let category = hypotheses[investigated].category;
            let investigated_id = hypotheses[investigated].id.clone();
            let mut evidence = Evidence::new(category);
            for (factor, on) in factors::vocabulary(category).iter().zip(mask) {
                if on {
                    evidence.mark(*factor);
                }
            }
            for pick in picks {
                if !terms.is_empty() {
                    evidence.add_finding(format!("saw {}", terms[pick % terms.len()]));
                }
            }

            scorer.update(&mut hypotheses[investigated], &evidence);
            for h in &hypotheses {
                prop_assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&h.confidence));
            }

            let changes = scorer.penalize_competitors(&mut hypotheses, &evidence, &investigated_id);
            for (id, change) in &changes {
                prop_assert_ne!(id, &investigated_id);
                prop_assert!(*change <= 0.0);
            }
            for h in &hypotheses {
                prop_assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&h.confidence));
            }
        }
    }

    #[test]
    fn prioritize_is_a_sorted_permutation(
        hypotheses in prop::collection::vec(hypothesis_strategy(), 0..8),
    ) {
        let scorer = HypothesisScorer::new();
        let mut before: Vec<String> = hypotheses.iter().map(|h| h.id.clone()).collect();
        let ranked = scorer.prioritize(hypotheses.clone());

        let mut after: Vec<String> = ranked.iter().map(|h| h.id.clone()).collect();
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);
        prop_assert!(ranked.windows(2).all(|w| w[0].priority_score >= w[1].priority_score));

        // order does not depend on input order
        let mut reversed = hypotheses;
        reversed.reverse();
        let again = scorer.prioritize(reversed);
        prop_assert_eq!(
            ranked.iter().map(|h| (&h.id, h.category)).collect::<Vec<_>>(),
            again.iter().map(|h| (&h.id, h.category)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn generate_respects_cap_and_threshold(
        picks in prop::collection::vec(0usize..70, 0..20),
    ) {
        let words = indicator_words();
        let text: Vec<&str> = picks.iter().map(|i| words[i % words.len()]).collect();
        let metadata = json!({"pod_name": "p1", "description": text.join(" ")});

        let hypotheses = HypothesisCatalog::new().generate(&metadata);

        prop_assert!(hypotheses.len() <= 4);
        for h in &hypotheses {
            prop_assert!(h.confidence > 2.0 && h.confidence <= 7.0);
            prop_assert!(!h.commands.is_empty());
            let placeholder = "{pod_name}";
            prop_assert!(h.commands.iter().all(|c| !c.contains(placeholder)));
        }
        prop_assert!(hypotheses.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }
}

#[test]
fn oomkilled_pod_ranks_resource_exhaustion_first() {
    let metadata = json!({
        "pod_name": "p1",
        "namespace": "ns1",
        "events": ["OOMKilled"],
        "containers": [{"name": "c1", "reason": "OOMKilled"}]
    });
    let hypotheses = HypothesisCatalog::new().generate(&metadata);
    let ranked = HypothesisScorer::new().prioritize(hypotheses);

    let top = &ranked[0];
    assert_eq!(top.category, HypothesisCategory::ResourceExhaustion);
    assert_eq!(top.commands[0], "kubectl top pod p1 -n ns1");
    assert_eq!(
        top.commands[1],
        "kubectl get events -n ns1 --field-selector involvedObject.name=p1"
    );
}
