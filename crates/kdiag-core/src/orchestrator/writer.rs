//! Diagnosis writer
//!
//! Turns the outcome of a run into prose and recommendations through an
//! [`LlmProvider`], masking cluster identifiers on the way out when
//! anonymization is enabled. Without a provider, or when it fails, the
//! writer falls back to fixed templates built from the best hypothesis.

use super::types::IterationRecord;
use crate::anonymizer::{Anonymizer, RestoreMap};
use crate::hypothesis::{Hypothesis, HypothesisCategory};
use kdiag_llm::{CompletionRequest, LlmProvider, Message};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on parsed recommendations
pub const MAX_RECOMMENDATIONS: usize = 5;

const DIAGNOSIS_TEMPERATURE: f32 = 0.3;
const RECOMMENDATION_TEMPERATURE: f32 = 0.4;

const DIAGNOSIS_SYSTEM_PROMPT: &str = r#"You are a Kubernetes expert reviewing the results of a systematic, hypothesis-driven investigation of a failing pod.

You are given:
1. The best-supported hypothesis and its confidence
2. Every investigation iteration with the evidence gathered by targeted kubectl commands
3. The reasoning trace of the investigation

Based on this investigation, give a confident, specific diagnosis of the root cause.

Format your response as:
=== ROOT CAUSE ANALYSIS ===
[Specific diagnosis based on the evidence]

=== CONFIDENCE ASSESSMENT ===
[Why you are confident in this diagnosis]

=== SUPPORTING EVIDENCE ===
[Key evidence that supports this conclusion]"#;

const RECOMMENDATION_SYSTEM_PROMPT: &str = r#"Based on the diagnosis results, provide 3-5 specific, actionable recommendations for resolving this Kubernetes issue. Each recommendation should be:
1. Specific and actionable
2. Prioritized by importance
3. Include relevant kubectl commands where applicable

Format as a numbered list."#;

static FALLBACK_RECOMMENDATIONS: [&[&str]; HypothesisCategory::COUNT] = [
    // resource_exhaustion
    &[
        "Check and adjust resource limits and requests",
        "Monitor node resource usage with kubectl top nodes",
        "Consider horizontal pod autoscaling if applicable",
    ],
    // image_registry_issues
    &[
        "Verify image name and tag correctness",
        "Check registry authentication and pull secrets",
        "Test registry connectivity from the cluster",
    ],
    // configuration_errors
    &[
        "Validate ConfigMap and Secret configurations",
        "Check environment variable references",
        "Verify volume mount paths and permissions",
    ],
    // network_connectivity
    &[
        "Verify the Service selector matches the pod labels and endpoints are populated",
        "Check NetworkPolicies in the namespace for rules blocking traffic",
        "Test DNS resolution from inside the pod",
    ],
    // security_permissions
    &[
        "Verify the pod's ServiceAccount exists and is referenced correctly",
        "Review Role and RoleBinding permissions with kubectl auth can-i",
        "Check admission and security policies that may reject the pod",
    ],
    // liveness_readiness
    &[
        "Review and adjust probe configurations",
        "Check application startup time and health endpoints",
        "Monitor probe failure events",
    ],
    // scheduling_issues
    &[
        "Compare node allocatable capacity with the pod's resource requests",
        "Review nodeSelector, affinity rules and taint tolerations",
        "Add nodes or free capacity on existing nodes",
    ],
];

/// Everything the writer needs from a finished run
#[derive(Debug, Clone, Copy)]
pub struct WriterInput<'a> {
    /// Symptom metadata the run started from
    pub metadata: &'a Value,
    /// Highest-confidence hypothesis
    pub best: &'a Hypothesis,
    /// Final hypothesis set
    pub hypotheses: &'a [Hypothesis],
    /// Completed iterations
    pub iterations: &'a [IterationRecord],
    /// Reasoning trace so far
    pub trace: &'a [String],
}

/// Diagnosis text plus recommendations
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenDiagnosis {
    /// Diagnosis prose
    pub diagnosis: String,
    /// Suggested next steps
    pub recommendations: Vec<String>,
    /// Whether the text came from the provider rather than templates
    pub generated: bool,
}

/// Produces final prose for a diagnosis run
#[derive(Clone)]
pub struct DiagnosisWriter {
    llm: Option<Arc<dyn LlmProvider>>,
    model: Option<String>,
    anonymize: bool,
}

impl DiagnosisWriter {
    /// Create a writer; `None` always uses the templates
    #[must_use]
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self {
            llm,
            model: None,
            anonymize: true,
        }
    }

    /// Override the provider's default model
    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Enable or disable identifier masking
    #[must_use]
    pub fn with_anonymize(mut self, anonymize: bool) -> Self {
        self.anonymize = anonymize;
        self
    }

    /// Write the diagnosis and recommendations.
    ///
    /// Provider failures are logged and replaced by the templates; this
    /// never fails.
    pub async fn write(&self, input: &WriterInput<'_>) -> WrittenDiagnosis {
        let Some(llm) = &self.llm else {
            return Self::fallback(input.best);
        };

        let mut anonymizer = self.anonymize.then(Anonymizer::new);
        let mut restore = RestoreMap::new();
        if let Some(anonymizer) = anonymizer.as_mut() {
            let (_, learned) = anonymizer.transform(input.metadata);
            restore.merge(learned);
        }

        let model = self
            .model
            .clone()
            .unwrap_or_else(|| llm.default_model().to_string());

        let diagnosis_prompt = mask(&mut anonymizer, &mut restore, diagnosis_prompt(input));
        let diagnosis = self
            .complete(
                llm.as_ref(),
                &model,
                DIAGNOSIS_SYSTEM_PROMPT,
                diagnosis_prompt,
                DIAGNOSIS_TEMPERATURE,
            )
            .await
            .map(|text| restore.restore(&text));

        let recommendation_prompt =
            mask(&mut anonymizer, &mut restore, recommendation_prompt(input));
        let recommendations = self
            .complete(
                llm.as_ref(),
                &model,
                RECOMMENDATION_SYSTEM_PROMPT,
                recommendation_prompt,
                RECOMMENDATION_TEMPERATURE,
            )
            .await
            .map(|text| parse_recommendations(&restore.restore(&text)))
            .filter(|items| !items.is_empty());

        let generated = diagnosis.is_some();
        WrittenDiagnosis {
            diagnosis: diagnosis.unwrap_or_else(|| fallback_diagnosis(input.best)),
            recommendations: recommendations
                .unwrap_or_else(|| fallback_recommendations(input.best.category)),
            generated,
        }
    }

    async fn complete(
        &self,
        llm: &dyn LlmProvider,
        model: &str,
        system: &str,
        user: String,
        temperature: f32,
    ) -> Option<String> {
        let request = CompletionRequest::new(model)
            .with_message(Message::system(system))
            .with_message(Message::user(user))
            .with_temperature(temperature);

        match llm.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                debug!(provider = llm.name(), "Text generation succeeded");
                Some(response.content)
            }
            Ok(_) => {
                warn!(provider = llm.name(), "Text generation returned empty content");
                None
            }
            Err(e) => {
                warn!(provider = llm.name(), error = %e, "Text generation failed, using template");
                None
            }
        }
    }

    /// Template diagnosis and recommendations for `best`
    #[must_use]
    pub fn fallback(best: &Hypothesis) -> WrittenDiagnosis {
        WrittenDiagnosis {
            diagnosis: fallback_diagnosis(best),
            recommendations: fallback_recommendations(best.category),
            generated: false,
        }
    }
}

fn mask(anonymizer: &mut Option<Anonymizer>, restore: &mut RestoreMap, text: String) -> String {
    match anonymizer {
        Some(anonymizer) => {
            let (masked, map) = anonymizer.anonymize_text(&text);
            restore.merge(map);
            masked
        }
        None => text,
    }
}

fn diagnosis_prompt(input: &WriterInput<'_>) -> String {
    let iterations: Vec<Value> = input
        .iterations
        .iter()
        .map(|record| {
            json!({
                "iteration": record.iteration,
                "investigated": record.selected.category,
                "confidence": record.selected.confidence,
                "findings": record.evidence.findings,
                "commands": record.evidence.results.iter().map(|r| &r.command).collect::<Vec<_>>(),
                "confidence_deltas": record.confidence_deltas,
                "summary": record.summary,
            })
        })
        .collect();
    let hypotheses: Vec<Value> = input
        .hypotheses
        .iter()
        .map(|h| json!({"category": h.category, "confidence": h.confidence}))
        .collect();

    format!(
        "Analyze this diagnosis investigation:\n\n\
         BEST HYPOTHESIS: {}\n(Confidence: {:.1}/10.0)\n\n\
         FINAL HYPOTHESES:\n{}\n\n\
         INVESTIGATION SUMMARY:\n{}\n\n\
         REASONING TRACE:\n{}\n\n\
         Provide your final diagnosis based on this systematic investigation.",
        input.best.description,
        input.best.confidence,
        pretty(&Value::Array(hypotheses)),
        pretty(&Value::Array(iterations)),
        input.trace.join("\n"),
    )
}

fn recommendation_prompt(input: &WriterInput<'_>) -> String {
    let evidence = input
        .iterations
        .last()
        .map(|record| {
            json!({
                "findings": record.evidence.findings,
                "sections": record.evidence.sections,
            })
        })
        .unwrap_or(Value::Null);

    format!(
        "Diagnosis: {}\nEvidence: {}\n\nProvide actionable recommendations to resolve this issue.",
        input.best.description,
        pretty(&evidence),
    )
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Extract list items from numbered (`1. `) or bulleted (`- `) lines
#[must_use]
pub fn parse_recommendations(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| {
            let first = line.chars().next()?;
            if first.is_ascii_digit() {
                match line.find(". ") {
                    Some(pos) if line[..pos].chars().all(|c| c.is_ascii_digit()) => {
                        Some(line[pos + 2..].trim())
                    }
                    _ => None,
                }
            } else {
                line.strip_prefix("- ").map(str::trim)
            }
        })
        .filter(|item| !item.is_empty())
        .take(MAX_RECOMMENDATIONS)
        .map(str::to_string)
        .collect()
}

/// Template diagnosis built from a hypothesis
#[must_use]
pub fn fallback_diagnosis(best: &Hypothesis) -> String {
    let evidence = if best.evidence_for.is_empty() {
        "Evidence collected through targeted kubectl command execution supports this hypothesis."
            .to_string()
    } else {
        best.evidence_for
            .iter()
            .map(|e| format!("- {}", e))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "=== ROOT CAUSE ANALYSIS ===\n\
         Based on systematic investigation, the most likely cause is {}.\n\n\
         === CONFIDENCE ASSESSMENT ===\n\
         Confidence level: {:.1}/10.0\n\n\
         === SUPPORTING EVIDENCE ===\n{}",
        best.description.trim_end_matches('.'),
        best.confidence,
        evidence
    )
}

/// Template recommendations for a category
#[must_use]
pub fn fallback_recommendations(category: HypothesisCategory) -> Vec<String> {
    FALLBACK_RECOMMENDATIONS[category.index()]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdiag_llm::MockProvider;

    fn best() -> Hypothesis {
        let mut h = Hypothesis::new(
            HypothesisCategory::ResourceExhaustion,
            "Pod checkout is failing due to resource constraints (CPU/Memory/Storage)",
            8.5,
        );
        h.evidence_for.push("events: oom_events_found".to_string());
        h
    }

    fn input<'a>(metadata: &'a Value, best: &'a Hypothesis) -> WriterInput<'a> {
        WriterInput {
            metadata,
            best,
            hypotheses: std::slice::from_ref(best),
            iterations: &[],
            trace: &[],
        }
    }

    #[test]
    fn test_parse_recommendations() {
        let text = "Here is what to do:\n\
            1. Raise the memory limit\n\
            2. Check for leaks\n\
            - Watch kubectl top pod\n\
            3) not a numbered item\n\
            4. Add an HPA\n\
            5. Restart the deployment\n\
            6. Too many";
        let items = parse_recommendations(text);
        assert_eq!(
            items,
            vec![
                "Raise the memory limit",
                "Check for leaks",
                "Watch kubectl top pod",
                "Add an HPA",
                "Restart the deployment",
            ]
        );
        assert!(parse_recommendations("no list here").is_empty());
    }

    #[test]
    fn test_fallback_recommendations_cover_every_category() {
        for category in HypothesisCategory::ALL {
            assert_eq!(fallback_recommendations(category).len(), 3);
        }
        assert_eq!(
            fallback_recommendations(HypothesisCategory::ResourceExhaustion)[0],
            "Check and adjust resource limits and requests"
        );
    }

    #[test]
    fn test_fallback_diagnosis_sections() {
        let text = fallback_diagnosis(&best());
        assert!(text.starts_with("=== ROOT CAUSE ANALYSIS ==="));
        assert!(text.contains("Pod checkout is failing due to resource constraints"));
        assert!(text.contains("Confidence level: 8.5/10.0"));
        assert!(text.contains("- events: oom_events_found"));
    }

    #[tokio::test]
    async fn test_without_provider_uses_templates() {
        let metadata = json!({});
        let best = best();
        let written = DiagnosisWriter::new(None).write(&input(&metadata, &best)).await;
        assert!(!written.generated);
        assert_eq!(written.diagnosis, fallback_diagnosis(&best));
    }

    #[tokio::test]
    async fn test_failing_provider_falls_back() {
        let metadata = json!({"pod_name": "checkout"});
        let best = best();
        let writer = DiagnosisWriter::new(Some(Arc::new(MockProvider::failing())));
        let written = writer.write(&input(&metadata, &best)).await;

        assert!(!written.generated);
        assert!(written.diagnosis.contains(&best.description));
        assert_eq!(
            written.recommendations,
            fallback_recommendations(HypothesisCategory::ResourceExhaustion)
        );
    }

    #[tokio::test]
    async fn test_prompts_are_masked_and_output_restored() {
        let provider = MockProvider::new();
        let writer = DiagnosisWriter::new(Some(Arc::new(provider.clone())));
        let metadata = json!({"pod_name": "checkout", "namespace": "shop"});
        let best = best();

        provider.add_response("placeholder");
        provider.add_response("1. Raise limits\n2. Add an HPA");
        let written = writer.write(&input(&metadata, &best)).await;

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let user_prompt = &requests[0].messages[1].content;
        assert!(!user_prompt.contains("checkout"));
        assert!(user_prompt.contains("pod-"));
        assert_eq!(requests[0].temperature, Some(0.3));
        assert_eq!(requests[1].temperature, Some(0.4));

        assert!(written.generated);
        assert_eq!(written.diagnosis, "placeholder");
        assert_eq!(written.recommendations, vec!["Raise limits", "Add an HPA"]);
    }

    #[tokio::test]
    async fn test_restores_masked_names_in_output() {
        let provider = MockProvider::new();
        let writer = DiagnosisWriter::new(Some(Arc::new(provider.clone())));
        let metadata = json!({"namespace": "shop"});
        let best = best();

        provider.add_response("Pods in namespace-01 are out of memory");
        provider.add_response("- Raise limits in namespace-01");
        let written = writer.write(&input(&metadata, &best)).await;

        assert_eq!(written.diagnosis, "Pods in shop are out of memory");
        assert_eq!(written.recommendations, vec!["Raise limits in shop"]);
    }

    #[tokio::test]
    async fn test_anonymize_disabled_sends_raw_prompt() {
        let provider = MockProvider::new();
        let writer = DiagnosisWriter::new(Some(Arc::new(provider.clone())))
            .with_anonymize(false)
            .with_model(Some("custom-model".to_string()));
        let metadata = json!({"pod_name": "checkout"});
        let best = best();

        writer.write(&input(&metadata, &best)).await;

        let requests = provider.requests();
        assert_eq!(requests[0].model, "custom-model");
        assert!(requests[0].messages[1].content.contains("checkout"));
    }
}
