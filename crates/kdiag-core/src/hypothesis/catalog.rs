//! Hypothesis catalog
//!
//! Read-only knowledge base of failure categories: symptom indicators,
//! diagnostic command templates and baseline scores. The tables are
//! `static` and never mutated; [`HypothesisCatalog`] only reads them.

use super::types::{Hypothesis, HypothesisCategory};
use crate::config::DEFAULT_MAX_HYPOTHESES;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Initial confidence never exceeds this
pub const MAX_INITIAL_CONFIDENCE: f64 = 7.0;
/// Categories at or below this initial confidence are discarded
pub const MIN_INITIAL_CONFIDENCE: f64 = 2.0;

const DEFAULT_POD: &str = "unknown-pod";
const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_NODE: &str = "unknown-node";

static NODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Node:\s+(\S+)").expect("NODE_RE is a compile-time constant")
});

/// RFC 1123 label: namespaces
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("LABEL_RE is a compile-time constant")
});

/// RFC 1123 subdomain: pod and node names
static SUBDOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("SUBDOMAIN_RE is a compile-time constant")
});

const MAX_LABEL_LEN: usize = 63;
const MAX_SUBDOMAIN_LEN: usize = 253;

/// Whether `name` can be pasted into a command as a namespace
#[must_use]
pub fn is_valid_label(name: &str) -> bool {
    name.len() <= MAX_LABEL_LEN && LABEL_RE.is_match(name)
}

/// Whether `name` can be pasted into a command as a pod or node name
#[must_use]
pub fn is_valid_subdomain(name: &str) -> bool {
    name.len() <= MAX_SUBDOMAIN_LEN && SUBDOMAIN_RE.is_match(name)
}

/// Static knowledge for one failure category
#[derive(Debug)]
pub struct CatalogEntry {
    /// Category this entry describes
    pub category: HypothesisCategory,
    /// Lowercase symptom keywords
    pub indicators: &'static [&'static str],
    /// Commands with `{pod_name}`, `{namespace}` and `{node_name}` placeholders,
    /// most discriminating first
    pub command_templates: &'static [&'static str],
    /// What would validate the hypothesis
    pub needed_data: &'static [&'static str],
    /// Description with a `{pod_name}` placeholder
    pub description_template: &'static str,
    /// Impact if correct
    pub severity: f64,
    /// How cheaply it can be tested
    pub ease_of_validation: f64,
    /// Lowercase findings that contradict this category when seen while
    /// investigating another one
    pub contradictions: &'static [&'static str],
}

static ENTRIES: [CatalogEntry; HypothesisCategory::COUNT] = [
    CatalogEntry {
        category: HypothesisCategory::ResourceExhaustion,
        indicators: &[
            "oomkilled",
            "evicted",
            "resource_pressure",
            "memory",
            "cpu",
            "diskpressure",
            "pidpressure",
            "limits",
            "requests",
        ],
        command_templates: &[
            "kubectl top pod {pod_name} -n {namespace}",
            "kubectl get events -n {namespace} --field-selector involvedObject.name={pod_name}",
            "kubectl describe pod {pod_name} -n {namespace} | grep -A10 'Limits:'",
            "kubectl top node",
            "kubectl describe node {node_name}",
            "kubectl get hpa -n {namespace}",
        ],
        needed_data: &[
            "Current resource usage",
            "Resource limits and requests",
            "Node capacity",
            "Resource-related events",
        ],
        description_template:
            "Pod {pod_name} is failing due to resource constraints (CPU/Memory/Storage)",
        severity: 8.5,
        ease_of_validation: 7.0,
        contradictions: &["memory usage normal", "cpu usage normal", "no resource events"],
    },
    CatalogEntry {
        category: HypothesisCategory::ImageRegistryIssues,
        indicators: &[
            "errimagepull",
            "imagepullbackoff",
            "authentication",
            "registry",
            "pull",
            "image",
            "unauthorized",
            "forbidden",
            "not found",
        ],
        command_templates: &[
            "kubectl describe pod {pod_name} -n {namespace} | grep -A10 'Events:'",
            "kubectl get pods {pod_name} -n {namespace} -o jsonpath='{{.spec.containers[*].image}}'",
            "kubectl get secrets -n {namespace}",
            "kubectl get pod {pod_name} -n {namespace} -o yaml | grep -A5 -B5 imagePullSecrets",
            "kubectl describe pod {pod_name} -n {namespace} | grep -A5 'Failed to pull image'",
        ],
        needed_data: &[
            "Image pull events",
            "Registry authentication",
            "Image availability",
            "Pull secrets configuration",
        ],
        description_template:
            "Pod {pod_name} cannot pull required container images from registry",
        severity: 6.0,
        ease_of_validation: 8.5,
        contradictions: &["successful image pulls", "valid image config"],
    },
    CatalogEntry {
        category: HypothesisCategory::ConfigurationErrors,
        indicators: &[
            "createcontainerconfigerror",
            "invalidimagename",
            "configmap",
            "secret",
            "environment",
            "volume",
            "mount",
            "config",
        ],
        command_templates: &[
            "kubectl get pod {pod_name} -n {namespace} -o yaml",
            "kubectl get configmaps -n {namespace}",
            "kubectl get secrets -n {namespace}",
            "kubectl describe pod {pod_name} -n {namespace} | grep -A20 'Environment:'",
            "kubectl describe pod {pod_name} -n {namespace} | grep -A10 'Mounts:'",
        ],
        needed_data: &[
            "ConfigMap contents",
            "Secret availability",
            "Environment variables",
            "Volume mounts",
        ],
        description_template: "Pod {pod_name} has configuration issues with ConfigMaps, Secrets, or environment variables",
        severity: 7.0,
        ease_of_validation: 6.5,
        contradictions: &["configuration valid", "successful mounts"],
    },
    CatalogEntry {
        category: HypothesisCategory::NetworkConnectivity,
        indicators: &[
            "network",
            "connectivity",
            "dns",
            "service",
            "endpoint",
            "timeout",
            "connection refused",
            "unreachable",
        ],
        command_templates: &[
            "kubectl get svc -n {namespace}",
            "kubectl get endpoints -n {namespace}",
            "kubectl get networkpolicies -n {namespace}",
            "kubectl describe svc -n {namespace}",
            "kubectl get pod {pod_name} -n {namespace} -o wide",
        ],
        needed_data: &[
            "Service endpoints",
            "Network policies",
            "DNS resolution",
            "Pod networking configuration",
        ],
        description_template:
            "Pod {pod_name} is experiencing network connectivity or DNS resolution issues",
        severity: 7.5,
        ease_of_validation: 5.0,
        contradictions: &[],
    },
    CatalogEntry {
        category: HypothesisCategory::SecurityPermissions,
        indicators: &[
            "forbidden",
            "unauthorized",
            "rbac",
            "serviceaccount",
            "permission",
            "access denied",
            "security",
            "policy",
        ],
        command_templates: &[
            "kubectl get serviceaccounts -n {namespace}",
            "kubectl get rolebindings -n {namespace}",
            "kubectl get clusterrolebindings",
            "kubectl describe pod {pod_name} -n {namespace} | grep serviceAccount",
            "kubectl auth can-i --list --as=system:serviceaccount:{namespace}:default",
        ],
        needed_data: &[
            "ServiceAccount configuration",
            "RBAC bindings",
            "Security policies",
            "Permission validation",
        ],
        description_template: "Pod {pod_name} lacks necessary RBAC permissions or security policies are blocking it",
        severity: 8.0,
        ease_of_validation: 4.0,
        contradictions: &[],
    },
    CatalogEntry {
        category: HypothesisCategory::LivenessReadiness,
        indicators: &[
            "liveness",
            "readiness",
            "probe",
            "health",
            "healthcheck",
            "startup",
            "failed",
            "unhealthy",
        ],
        command_templates: &[
            "kubectl describe pod {pod_name} -n {namespace} | grep -A10 'Liveness:'",
            "kubectl describe pod {pod_name} -n {namespace} | grep -A10 'Readiness:'",
            "kubectl get events -n {namespace} --field-selector involvedObject.name={pod_name}",
            "kubectl get pod {pod_name} -n {namespace} -o yaml | grep -A20 livenessProbe",
        ],
        needed_data: &[
            "Probe configuration",
            "Health check results",
            "Probe failure events",
            "Application startup logs",
        ],
        description_template:
            "Pod {pod_name} is failing liveness or readiness probe health checks",
        severity: 6.5,
        ease_of_validation: 7.5,
        contradictions: &["probes passing", "application healthy"],
    },
    CatalogEntry {
        category: HypothesisCategory::SchedulingIssues,
        indicators: &[
            "unschedulable",
            "scheduling",
            "node",
            "affinity",
            "taint",
            "toleration",
            "resource",
            "insufficient",
            "pending",
        ],
        command_templates: &[
            "kubectl describe pod {pod_name} -n {namespace} | grep -A10 'Events:'",
            "kubectl get nodes -o wide",
            "kubectl describe nodes",
            "kubectl get pod {pod_name} -n {namespace} -o yaml | grep -A10 nodeSelector",
            "kubectl get pod {pod_name} -n {namespace} -o yaml | grep -A10 affinity",
        ],
        needed_data: &[
            "Node availability",
            "Resource requirements",
            "Node selectors and affinity",
            "Taints and tolerations",
        ],
        description_template: "Pod {pod_name} cannot be scheduled due to node constraints or resource availability",
        severity: 7.0,
        ease_of_validation: 6.0,
        contradictions: &["pod scheduled successfully"],
    },
];

impl CatalogEntry {
    /// Entry for a category
    #[must_use]
    pub fn for_category(category: HypothesisCategory) -> &'static CatalogEntry {
        &ENTRIES[category.index()]
    }
}

/// Placeholder values resolved from pod metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Pod name
    pub pod_name: String,
    /// Namespace
    pub namespace: String,
    /// Node name, best effort
    pub node_name: String,
}

impl Target {
    /// Resolve placeholders from metadata, falling back to fixed defaults.
    ///
    /// Names end up as shell arguments, so anything that is not a valid
    /// Kubernetes name is replaced by the default.
    #[must_use]
    pub fn from_metadata(metadata: &Value) -> Self {
        let field = |key: &str, default: &str, valid: fn(&str) -> bool| {
            match metadata.get(key).and_then(Value::as_str).map(str::trim) {
                Some(name) if valid(name) => name.to_string(),
                Some(name) if !name.is_empty() => {
                    warn!(key, "Ignoring invalid name in metadata");
                    default.to_string()
                }
                _ => default.to_string(),
            }
        };

        let node_name = metadata
            .get("raw_describe")
            .and_then(Value::as_str)
            .and_then(|text| NODE_RE.captures(text))
            .and_then(|caps| caps.get(1))
            // `Node: worker-1/10.0.0.5` carries the host IP after the slash
            .and_then(|m| m.as_str().split('/').next())
            .filter(|name| is_valid_subdomain(name))
            .unwrap_or(DEFAULT_NODE)
            .to_string();

        Self {
            pod_name: field("pod_name", DEFAULT_POD, is_valid_subdomain),
            namespace: field("namespace", DEFAULT_NAMESPACE, is_valid_label),
            node_name,
        }
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        match key {
            "pod_name" => Some(&self.pod_name),
            "namespace" => Some(&self.namespace),
            "node_name" => Some(&self.node_name),
            _ => None,
        }
    }
}

/// Substitute `{key}` placeholders; `{{` and `}}` are literal braces.
///
/// Returns `None` if the template names an unknown key or has an
/// unbalanced brace.
#[must_use]
pub fn render_template(template: &str, target: &Target) -> Option<String> {
    let mut out = String::with_capacity(template.len() + 32);
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(k) => key.push(k),
                        None => return None,
                    }
                }
                out.push_str(target.lookup(&key)?);
            }
            '}' => return None,
            _ => out.push(c),
        }
    }
    Some(out)
}

/// All scalar values of the metadata, recursively, joined and lowercased.
/// Object keys are not included.
#[must_use]
pub fn flatten_text(metadata: &Value) -> String {
    fn collect(value: &Value, parts: &mut Vec<String>) {
        match value {
            Value::String(s) if !s.is_empty() => parts.push(s.clone()),
            Value::Number(n) => parts.push(n.to_string()),
            Value::Bool(b) => parts.push(b.to_string()),
            Value::Array(items) => items.iter().for_each(|v| collect(v, parts)),
            Value::Object(map) => map.values().for_each(|v| collect(v, parts)),
            _ => {}
        }
    }

    let mut parts = Vec::new();
    collect(metadata, &mut parts);
    parts.join(" ").to_lowercase()
}

/// `min(7.0, matches * 1.5 + 1.0)` over indicator substring matches
#[must_use]
pub fn initial_confidence(text: &str, indicators: &[&str]) -> f64 {
    let matches = indicators
        .iter()
        .filter(|indicator| text.contains(&indicator.to_lowercase()))
        .count();
    (matches as f64 * 1.5 + 1.0).min(MAX_INITIAL_CONFIDENCE)
}

/// Produces the initial hypothesis set from symptom metadata
#[derive(Debug, Clone)]
pub struct HypothesisCatalog {
    max_hypotheses: usize,
}

impl Default for HypothesisCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl HypothesisCatalog {
    /// Catalog over the built-in tables
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_hypotheses: DEFAULT_MAX_HYPOTHESES,
        }
    }

    /// Cap the number of generated hypotheses
    #[must_use]
    pub fn with_max_hypotheses(mut self, max: usize) -> Self {
        self.max_hypotheses = max;
        self
    }

    /// All entries, in category order
    #[must_use]
    pub fn entries(&self) -> &'static [CatalogEntry] {
        &ENTRIES
    }

    /// Entry for a category
    #[must_use]
    pub fn entry(&self, category: HypothesisCategory) -> &'static CatalogEntry {
        CatalogEntry::for_category(category)
    }

    /// Score every category against the metadata and return the strongest
    /// candidates, sorted by initial confidence.
    #[must_use]
    pub fn generate(&self, metadata: &Value) -> Vec<Hypothesis> {
        let text = flatten_text(metadata);
        let target = Target::from_metadata(metadata);

        let mut hypotheses: Vec<Hypothesis> = ENTRIES
            .iter()
            .filter_map(|entry| {
                let confidence = initial_confidence(&text, entry.indicators);
                if confidence <= MIN_INITIAL_CONFIDENCE {
                    return None;
                }
                let description = render_template(entry.description_template, &target)
                    .unwrap_or_else(|| entry.description_template.to_string());
                let commands = entry
                    .command_templates
                    .iter()
                    .map(|template| {
                        render_template(template, &target).unwrap_or_else(|| {
                            warn!(template, "Could not format command template");
                            (*template).to_string()
                        })
                    })
                    .collect();
                Some(
                    Hypothesis::new(entry.category, description, confidence)
                        .with_commands(commands),
                )
            })
            .collect();

        hypotheses.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.category.as_str().cmp(b.category.as_str()))
        });
        hypotheses.truncate(self.max_hypotheses);

        debug!(
            count = hypotheses.len(),
            pod = %target.pod_name,
            "Generated initial hypotheses"
        );
        hypotheses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> Target {
        Target {
            pod_name: "p1".to_string(),
            namespace: "ns1".to_string(),
            node_name: "node-a".to_string(),
        }
    }

    #[test]
    fn test_render_template() {
        assert_eq!(
            render_template("kubectl top pod {pod_name} -n {namespace}", &target()).as_deref(),
            Some("kubectl top pod p1 -n ns1")
        );
        assert_eq!(
            render_template(
                "kubectl get pods {pod_name} -o jsonpath='{{.spec.containers[*].image}}'",
                &target()
            )
            .as_deref(),
            Some("kubectl get pods p1 -o jsonpath='{.spec.containers[*].image}'")
        );
        assert_eq!(render_template("kubectl get {kind}", &target()), None);
        assert_eq!(render_template("kubectl get {pod_name", &target()), None);
        assert_eq!(render_template("stray }", &target()), None);
    }

    #[test]
    fn test_target_defaults_and_node_extraction() {
        let t = Target::from_metadata(&json!({}));
        assert_eq!(t.pod_name, "unknown-pod");
        assert_eq!(t.namespace, "default");
        assert_eq!(t.node_name, "unknown-node");

        let t = Target::from_metadata(&json!({
            "pod_name": "web-1",
            "raw_describe": "Name: web-1\nNode:         worker-2/10.0.0.7\nStatus: Running"
        }));
        assert_eq!(t.pod_name, "web-1");
        assert_eq!(t.node_name, "worker-2");
    }

    #[test]
    fn test_hostile_names_fall_back_to_defaults() {
        let metadata = json!({
            "pod_name": "p1 -n x | grep -r password /root",
            "namespace": "ns1 --server=https://attacker.invalid --insecure-skip-tls-verify",
            "raw_describe": "Node:  --kubeconfig=/tmp/evil/10.0.0.1",
            "events": ["OOMKilled"]
        });

        let t = Target::from_metadata(&metadata);
        assert_eq!(t.pod_name, "unknown-pod");
        assert_eq!(t.namespace, "default");
        assert_eq!(t.node_name, "unknown-node");

        let hypotheses = HypothesisCatalog::new().generate(&metadata);
        assert!(!hypotheses.is_empty());
        for command in hypotheses.iter().flat_map(|h| &h.commands) {
            assert!(!command.contains("--server"), "{command}");
            assert!(!command.contains("--kubeconfig"), "{command}");
            assert!(!command.contains("password"), "{command}");
        }
    }

    #[test]
    fn test_rendered_templates_pass_command_checks() {
        let config = kdiag_tools::ExecutorConfig::default();
        let target = Target {
            pod_name: "web-1".to_string(),
            namespace: "shop".to_string(),
            node_name: "ip-10-0-0-7.ec2.internal".to_string(),
        };
        for entry in HypothesisCatalog::new().entries() {
            for template in entry.command_templates {
                let command = render_template(template, &target).unwrap();
                assert!(
                    kdiag_tools::security::check_command(&config, &command).is_ok(),
                    "{command}"
                );
            }
        }
    }

    #[test]
    fn test_name_rules() {
        assert!(is_valid_label("ns1"));
        assert!(is_valid_label("kube-system"));
        assert!(!is_valid_label("-n"));
        assert!(!is_valid_label("ns1 -o"));
        assert!(!is_valid_label("a.b"));
        assert!(!is_valid_label("Shop"));
        assert!(!is_valid_label(&"a".repeat(64)));

        assert!(is_valid_subdomain("web-1"));
        assert!(is_valid_subdomain("ip-10-0-0-7.ec2.internal"));
        assert!(!is_valid_subdomain("--kubeconfig=/tmp/x"));
        assert!(!is_valid_subdomain("node."));
        assert!(!is_valid_subdomain(""));
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        let t = Target::from_metadata(&json!({"pod_name": " web-1 ", "namespace": "shop\n"}));
        assert_eq!(t.pod_name, "web-1");
        assert_eq!(t.namespace, "shop");
    }

    #[test]
    fn test_flatten_text_is_recursive_and_lowercase() {
        let text = flatten_text(&json!({
            "pod_name": "P1",
            "containers": [{"name": "c1", "state": {"reason": "OOMKilled"}}],
            "restarts": 4
        }));
        assert!(text.contains("oomkilled"));
        assert!(text.contains("p1"));
        assert!(text.contains('4'));
        assert!(!text.contains("containers"));
    }

    #[test]
    fn test_initial_confidence_formula() {
        assert_eq!(initial_confidence("", &["a"]), 1.0);
        assert_eq!(initial_confidence("oomkilled memory", &["oomkilled", "memory", "cpu"]), 4.0);
        let many = "oomkilled evicted memory cpu limits requests";
        assert_eq!(
            initial_confidence(many, ENTRIES[0].indicators),
            MAX_INITIAL_CONFIDENCE
        );
    }

    #[test]
    fn test_generate_scenario_oomkilled() {
        let metadata = json!({
            "pod_name": "p1",
            "namespace": "ns1",
            "events": ["OOMKilled"],
            "containers": [{"name": "c1", "terminatedReason": "OOMKilled"}]
        });
        let hypotheses = HypothesisCatalog::new().generate(&metadata);

        let resource = hypotheses
            .iter()
            .find(|h| h.category == HypothesisCategory::ResourceExhaustion)
            .expect("resource hypothesis");
        assert!(resource.confidence > 2.0);
        assert_eq!(resource.commands[0], "kubectl top pod p1 -n ns1");
        assert!(resource.description.contains("p1"));
    }

    #[test]
    fn test_generate_empty_metadata() {
        assert!(HypothesisCatalog::new().generate(&json!({})).is_empty());
    }

    #[test]
    fn test_generate_caps_and_sorts() {
        let metadata = json!({
            "description": "OOMKilled memory cpu limits ErrImagePull image pull registry \
                configmap secret volume mount network dns service timeout \
                forbidden rbac permission liveness probe failed unhealthy \
                unschedulable node taint pending insufficient"
        });
        let hypotheses = HypothesisCatalog::new().generate(&metadata);
        assert_eq!(hypotheses.len(), 4);
        assert!(hypotheses
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));

        let two = HypothesisCatalog::new().with_max_hypotheses(2).generate(&metadata);
        assert_eq!(two.len(), 2);
    }

    #[test]
    fn test_unresolved_placeholders_fall_back_to_raw_template() {
        // every built-in template resolves
        for entry in &ENTRIES {
            for template in entry.command_templates {
                assert!(render_template(template, &target()).is_some(), "{}", template);
            }
        }
    }

    #[test]
    fn test_entries_in_category_order() {
        for (i, entry) in ENTRIES.iter().enumerate() {
            assert_eq!(entry.category.index(), i);
        }
    }
}
