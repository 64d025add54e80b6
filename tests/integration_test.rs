//! Integration tests for kdiag
//!
//! These tests drive the public API end to end with test doubles:
//! - kdiag-core: catalog, gatherer, scorer and orchestrator together
//! - kdiag-tools: the `CommandExecutor` contract
//! - kdiag-llm: `MockProvider` standing in for text generation

use async_trait::async_trait;
use kdiag_core::{
    DiagnosisConfig, Hypothesis, HypothesisCatalog, HypothesisCategory, Orchestrator,
    TerminationReason,
};
use kdiag_llm::MockProvider;
use kdiag_tools::{CommandExecutor, CommandOutput};
use mockall::mock;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test doubles
// ============================================================================

/// Answers by the first matching command substring
struct ScriptedExecutor {
    rules: Vec<(&'static str, CommandOutput)>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedExecutor {
    fn new(rules: Vec<(&'static str, CommandOutput)>) -> Self {
        Self {
            rules,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        command: &str,
        _timeout: Duration,
    ) -> kdiag_tools::Result<CommandOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self
            .rules
            .iter()
            .find(|(pattern, _)| command.contains(pattern))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::success("", 1)))
    }
}

/// Every command fails to start
struct BrokenExecutor;

#[async_trait]
impl CommandExecutor for BrokenExecutor {
    fn name(&self) -> &str {
        "broken"
    }

    async fn execute(
        &self,
        _command: &str,
        _timeout: Duration,
    ) -> kdiag_tools::Result<CommandOutput> {
        Err(kdiag_tools::Error::Execution("kubectl not found".to_string()))
    }
}

mock! {
    pub Executor {}

    #[async_trait]
    impl CommandExecutor for Executor {
        fn name(&self) -> &str;
        async fn execute(&self, command: &str, timeout: Duration) -> kdiag_tools::Result<CommandOutput>;
    }
}

fn oom_metadata() -> Value {
    json!({
        "pod_name": "p1",
        "namespace": "ns1",
        "events": ["OOMKilled"],
        "containers": [{"name": "c1", "terminatedReason": "OOMKilled"}]
    })
}

fn oom_events() -> CommandOutput {
    CommandOutput::success(
        "LAST SEEN   TYPE      REASON       OBJECT   MESSAGE\n2m          Warning   OOMKilling   pod/p1   Container c1 OOMKilled",
        4,
    )
}

// ============================================================================
// Catalog
// ============================================================================

#[test]
fn test_oomkilled_metadata_yields_resource_hypothesis() {
    let hypotheses = HypothesisCatalog::new().generate(&oom_metadata());

    let resource = hypotheses
        .iter()
        .find(|h| h.category == HypothesisCategory::ResourceExhaustion)
        .expect("resource exhaustion hypothesis");
    assert!(resource.confidence > 2.0);
    assert_eq!(resource.commands[0], "kubectl top pod p1 -n ns1");
    assert!(resource.description.contains("p1"));
}

#[test]
fn test_empty_metadata_yields_no_hypotheses() {
    assert!(HypothesisCatalog::new().generate(&json!({})).is_empty());
}

// ============================================================================
// Orchestrator
// ============================================================================

#[tokio::test]
async fn test_empty_metadata_returns_low_confidence_result() {
    let executor = Arc::new(ScriptedExecutor::new(Vec::new()));
    let orchestrator = Orchestrator::new(executor.clone(), DiagnosisConfig::default());

    let result = orchestrator.diagnose(&json!({})).await;

    assert_eq!(result.confidence_score, 1.0);
    assert_eq!(result.termination, TerminationReason::NoHypotheses);
    assert!(result.diagnosis.contains("No viable hypotheses"));
    assert!(result.iterations.is_empty());
    assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_loop_stops_once_threshold_is_crossed() {
    let executor = Arc::new(ScriptedExecutor::new(vec![
        (
            "kubectl top pod",
            CommandOutput::success("NAME CPU MEMORY\np1 5% 50%", 2),
        ),
        ("get events", oom_events()),
        (
            "'Limits:'",
            CommandOutput::success("    Limits:\n      memory:  128Mi", 2),
        ),
    ]));
    let config = DiagnosisConfig::default()
        .with_confidence_threshold(8.0)
        .with_max_iterations(3);
    let orchestrator = Orchestrator::new(executor, config);
    let seeded = vec![
        Hypothesis::new(HypothesisCategory::ResourceExhaustion, "resources", 7.5).with_commands(
            vec![
                "kubectl top pod p1 -n ns1".to_string(),
                "kubectl get events -n ns1 --field-selector involvedObject.name=p1".to_string(),
                "kubectl describe pod p1 -n ns1 | grep -A10 'Limits:'".to_string(),
            ],
        ),
        Hypothesis::new(HypothesisCategory::ImageRegistryIssues, "image", 6.0),
    ];

    let result = orchestrator.investigate(seeded, &oom_metadata()).await;

    assert_eq!(result.iterations.len(), 1);
    assert_eq!(result.termination, TerminationReason::ConfidenceMet);
    assert_eq!(result.best_hypothesis.category, HypothesisCategory::ResourceExhaustion);
    assert!((result.confidence_score - 8.5).abs() < 1e-9);
    let record = &result.iterations[0];
    assert!((record.confidence_deltas["hyp_resource_exhaustion"] - 1.0).abs() < 1e-9);
    assert_eq!(record.confidence_deltas["hyp_image_registry_issues"], 0.0);
}

#[tokio::test]
async fn test_failing_provider_falls_back_to_best_description() {
    let executor = Arc::new(ScriptedExecutor::new(vec![("get events", oom_events())]));
    let orchestrator = Orchestrator::new(executor, DiagnosisConfig::default())
        .with_llm(Arc::new(MockProvider::failing()));

    let result = orchestrator.diagnose(&oom_metadata()).await;

    assert_eq!(result.best_hypothesis.category, HypothesisCategory::ResourceExhaustion);
    assert!(result.diagnosis.contains(&result.best_hypothesis.description));
    assert!(!result.diagnosis.to_lowercase().contains("error"));
    assert!(!result.recommendations.is_empty());
    assert!(!result.is_degraded());
}

#[tokio::test]
async fn test_all_commands_failing_still_produces_result() {
    let orchestrator = Orchestrator::new(Arc::new(BrokenExecutor), DiagnosisConfig::default());

    let result = orchestrator.diagnose(&oom_metadata()).await;

    assert_eq!(result.termination, TerminationReason::MaxIterations);
    assert_eq!(result.iterations.len(), 3);
    assert!(result.iterations.iter().all(|r| r.evidence.all_failed()));
    assert_eq!(result.best_hypothesis.category, HypothesisCategory::ResourceExhaustion);
    assert_eq!(result.confidence_score, 2.5);
    assert!(result.diagnosis.contains("=== ROOT CAUSE ANALYSIS ==="));
}

#[tokio::test]
async fn test_deadline_returns_partial_result() {
    let executor = Arc::new(ScriptedExecutor::slow(Duration::from_secs(10)));
    let config = DiagnosisConfig::default().with_deadline(Duration::from_secs(1));
    let orchestrator = Orchestrator::new(executor, config);

    let result = orchestrator.diagnose(&oom_metadata()).await;

    assert_eq!(result.termination, TerminationReason::DeadlineExceeded);
    assert!(result.iterations.is_empty());
    assert!(result.total_elapsed_secs < 5.0);
    assert_eq!(result.best_hypothesis.category, HypothesisCategory::ResourceExhaustion);
    assert!(result
        .diagnosis
        .starts_with("Diagnosis deadline of 1s exceeded after 0 completed iteration(s)"));
    assert!(result
        .reasoning_trace
        .iter()
        .any(|line| line.starts_with("DEADLINE: ")));
    assert!(result.reasoning_trace.iter().any(|line| line == "ITERATION 1"));
}

#[tokio::test]
async fn test_commands_execute_once_per_run() {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .times(3)
        .returning(|command, _| {
            if command.contains("get events") {
                Ok(oom_events())
            } else {
                Ok(CommandOutput::success("", 1))
            }
        });
    let orchestrator = Orchestrator::new(Arc::new(executor), DiagnosisConfig::default());

    let result = orchestrator.diagnose(&oom_metadata()).await;

    // second iteration re-reads the cache and crosses the threshold
    assert_eq!(result.termination, TerminationReason::ConfidenceMet);
    assert_eq!(result.iterations.len(), 2);
    assert!(result.iterations[1].evidence.from_cache);
    assert_eq!(result.total_commands_executed, 3);
}

#[tokio::test]
async fn test_generated_text_is_restored() {
    let provider = MockProvider::new();
    provider.add_response("The container c1 in pod p1 was OOMKilled.");
    provider.add_response("1. Raise the memory limit of c1\n2. Check for leaks");
    let executor = Arc::new(ScriptedExecutor::new(vec![("get events", oom_events())]));
    let orchestrator = Orchestrator::new(executor, DiagnosisConfig::default())
        .with_llm(Arc::new(provider.clone()));

    let result = orchestrator.diagnose(&oom_metadata()).await;

    for request in provider.requests() {
        for message in &request.messages {
            assert!(!message.content.contains("ns1"));
        }
    }
    assert!(result.diagnosis.contains("OOMKilled"));
    assert_eq!(result.recommendations.len(), 2);
}
