//! Category analyzers
//!
//! Each analyzer recognizes which kind of command produced a result by
//! matching the command text, then turns the output into findings and
//! confidence factors. The analyzer for a category is picked from
//! [`ANALYZERS`], indexed by the category.

use super::factors;
use super::types::{Evidence, EvidenceResult};
use crate::hypothesis::HypothesisCategory;

/// Signature shared by all category analyzers
pub type Analyzer = fn(&[EvidenceResult], &mut Evidence);

/// Analyzer table, in `HypothesisCategory::ALL` order
pub static ANALYZERS: [Analyzer; HypothesisCategory::COUNT] = [
    analyze_resource,
    analyze_image,
    analyze_config,
    analyze_network,
    analyze_security,
    analyze_liveness,
    analyze_scheduling,
];

/// Analyzer for a category
#[must_use]
pub fn analyzer_for(category: HypothesisCategory) -> Analyzer {
    ANALYZERS[category.index()]
}

/// Run the category analyzer over `results` and return the evidence
#[must_use]
pub fn analyze(category: HypothesisCategory, results: Vec<EvidenceResult>) -> Evidence {
    let mut evidence = Evidence::new(category);
    analyzer_for(category)(&results, &mut evidence);
    for result in &results {
        observe_events(result, &mut evidence);
    }
    evidence.results = results;
    evidence
}

/// Lowercased command and output of a result the analyzers may read
fn readable(result: &EvidenceResult) -> Option<(String, &str, String)> {
    let output = result.usable_output()?;
    Some((result.command.to_lowercase(), output, output.to_lowercase()))
}

/// Observations any event listing supports, whatever was investigated.
/// These feed the competitor penalty, never the investigated score.
fn observe_events(result: &EvidenceResult, evidence: &mut Evidence) {
    let Some((command, output, lower)) = readable(result) else {
        return;
    };
    if !(command.contains("get events") || command.contains("events:")) || output.trim().is_empty()
    {
        return;
    }

    if lower.contains("successfully pulled") {
        evidence.add_finding("Successful image pulls observed");
    }
    if !(lower.contains("oomkilled") || lower.contains("out of memory") || lower.contains("evicted"))
    {
        evidence.add_finding("No resource events found");
    }
    if lower.contains("successfully assigned") {
        evidence.add_finding("Pod scheduled successfully");
    }
    if is_application_healthy(&lower) {
        evidence.add_finding("Application healthy");
    }
}

fn is_application_healthy(events: &str) -> bool {
    events.contains("started container")
        && !events.contains("probe failed")
        && !events.contains("back-off")
        && !events.contains("backoff")
}

fn analyze_resource(results: &[EvidenceResult], evidence: &mut Evidence) {
    for result in results {
        let Some((command, output, lower)) = readable(result) else {
            continue;
        };

        if command.contains("kubectl top") {
            let usage = parse_usage_percentages(output);
            if let Some(memory) = usage.memory {
                if memory > 80.0 {
                    evidence.observe(factors::MEMORY_USAGE_HIGH, "High memory usage detected");
                } else if memory < 20.0 {
                    evidence.observe(factors::MEMORY_USAGE_NORMAL, "Memory usage normal");
                }
            }
            if let Some(cpu) = usage.cpu {
                if cpu > 80.0 {
                    evidence.observe(factors::CPU_USAGE_HIGH, "High CPU usage detected");
                } else if cpu < 20.0 {
                    evidence.observe(factors::CPU_USAGE_NORMAL, "CPU usage normal");
                }
            }
        } else if command.contains("get events") {
            let mut resource_event = false;
            if lower.contains("oomkilled") || lower.contains("out of memory") {
                evidence.observe(factors::OOM_EVENTS_FOUND, "OOM kill events found");
                resource_event = true;
            } else if lower.contains("evicted") {
                evidence.observe(factors::EVICTION_EVENTS_FOUND, "Pod eviction events found");
                resource_event = true;
            }
            if lower.contains("exceeded quota") {
                evidence.observe(factors::RESOURCE_QUOTA_EXCEEDED, "Resource quota exceeded");
                resource_event = true;
            }
            if !resource_event {
                evidence.observe(factors::NO_RESOURCE_EVENTS, "No resource events found");
            }
        } else if command.contains("limits") {
            if lower.contains("limits:") || lower.contains("requests:") {
                evidence.observe(factors::RESOURCE_LIMITS_ADEQUATE, "Resource limits configured");
            } else {
                evidence.observe(factors::NO_RESOURCE_LIMITS, "No resource limits configured");
            }
        } else if command.contains("describe node") {
            for (condition, finding) in [
                ("memorypressure", "Node reports MemoryPressure"),
                ("diskpressure", "Node reports DiskPressure"),
                ("pidpressure", "Node reports PIDPressure"),
            ] {
                let active = lower.lines().any(|line| {
                    let mut cols = line.split_whitespace();
                    cols.next() == Some(condition) && cols.next() == Some("true")
                });
                if active {
                    evidence.add_finding(finding);
                    if condition == "memorypressure" {
                        evidence.mark(factors::MEMORY_USAGE_HIGH);
                    }
                }
            }
        }
    }
}

fn analyze_image(results: &[EvidenceResult], evidence: &mut Evidence) {
    for result in results {
        let Some((command, output, lower)) = readable(result) else {
            continue;
        };

        if command.contains("jsonpath") {
            if is_invalid_image_reference(output) {
                evidence.observe(factors::INVALID_IMAGE_NAME, "Invalid image name detected");
            } else {
                evidence.observe(factors::VALID_IMAGE_CONFIG, "Valid image config detected");
            }
        } else if command.contains("imagepullsecrets") {
            if output.trim().is_empty() {
                evidence.observe(factors::MISSING_PULL_SECRETS, "No pull secrets configured");
            }
        } else if command.contains("get secrets") {
            if result.is_empty_listing() {
                evidence.observe(factors::MISSING_PULL_SECRETS, "No pull secrets configured");
            }
        } else if command.contains("get events") || command.contains("describe pod") {
            if ["errimagepull", "imagepullbackoff", "failed to pull"]
                .iter()
                .any(|e| lower.contains(e))
            {
                evidence.observe(
                    factors::IMAGE_PULL_ERRORS_FOUND,
                    "Image pull errors found in events",
                );
            }
            if lower.contains("authentication required") || lower.contains("unauthorized") {
                evidence.observe(factors::AUTHENTICATION_ERRORS, "Authentication errors detected");
            }
            if lower.contains("network is unreachable") || lower.contains("no route to host") {
                evidence.observe(factors::REGISTRY_UNREACHABLE, "Registry unreachable");
            }
            if lower.contains("successfully pulled") {
                evidence.observe(
                    factors::SUCCESSFUL_IMAGE_PULLS,
                    "Successful image pulls observed",
                );
            }
        }
    }
}

fn analyze_config(results: &[EvidenceResult], evidence: &mut Evidence) {
    for result in results {
        let Some((command, output, lower)) = readable(result) else {
            continue;
        };

        if command.contains("get configmaps") {
            if result.is_empty_listing() {
                evidence.observe(factors::MISSING_CONFIGMAP, "No ConfigMaps found in namespace");
            }
        } else if command.contains("get secrets") {
            if result.is_empty_listing() {
                evidence.observe(factors::MISSING_SECRET, "No Secrets found in namespace");
            }
        } else if command.contains("-o yaml") {
            let missing = |kind: &str| {
                lower
                    .lines()
                    .any(|line| line.contains(kind) && line.contains("not found"))
            };
            if missing("configmap") {
                evidence.observe(factors::MISSING_CONFIGMAP, "Referenced ConfigMap not found");
            }
            if missing("secret") {
                evidence.observe(factors::MISSING_SECRET, "Referenced Secret not found");
            }
            if lower.contains("createcontainerconfigerror") {
                evidence.add_finding("CreateContainerConfigError reported in pod status");
            }
        } else if command.contains("environment:") || lower.contains("environment:") {
            let section = extract_environment_section(output);
            if has_invalid_env_vars(&section) {
                evidence.observe(
                    factors::INVALID_ENVIRONMENT_VARS,
                    "Invalid environment variable configuration",
                );
            } else {
                evidence.observe(factors::CONFIGURATION_VALID, "Configuration valid");
            }
        } else if command.contains("mounts:") || lower.contains("mounts:") {
            let errors = mount_errors(&lower);
            if errors.is_empty() {
                evidence.observe(factors::SUCCESSFUL_MOUNTS, "Successful mounts");
            } else {
                evidence.mark(factors::VOLUME_MOUNT_ERRORS);
                for error in errors {
                    evidence.add_finding(error);
                }
            }
        }
    }
}

fn analyze_network(results: &[EvidenceResult], evidence: &mut Evidence) {
    for result in results {
        let Some((command, _output, lower)) = readable(result) else {
            continue;
        };

        if command.contains("get svc") || command.contains("get endpoints") {
            if result.is_empty_listing() {
                evidence.observe(factors::NO_SERVICES, "No services found in namespace");
            } else if command.contains("get svc") {
                evidence.observe(factors::SERVICES_PRESENT, "Services present in namespace");
            } else if lower.lines().skip(1).any(|line| line.contains("<none>")) {
                evidence.observe(factors::ENDPOINTS_MISSING, "Service has no ready endpoints");
            }
        } else if command.contains("get networkpolicies") {
            if !result.is_empty_listing() {
                evidence.observe(
                    factors::NETWORK_POLICIES_PRESENT,
                    "Network policies present - may restrict traffic",
                );
            }
        } else if command.contains("describe svc") {
            let no_endpoints = lower.lines().any(|line| {
                line.trim_start().starts_with("endpoints:") && line.contains("<none>")
            });
            if no_endpoints {
                evidence.observe(factors::ENDPOINTS_MISSING, "Service has no ready endpoints");
            }
        }
    }
}

fn analyze_security(results: &[EvidenceResult], evidence: &mut Evidence) {
    for result in results {
        // API server refusals arrive on stderr of a failed command
        if result.error.to_lowercase().contains("forbidden")
            || result.output.to_lowercase().contains("forbidden")
        {
            evidence.observe(
                factors::PERMISSION_DENIED,
                "Forbidden errors returned by the API server",
            );
        }

        let Some((command, _output, _lower)) = readable(result) else {
            continue;
        };

        if command.contains("get serviceaccounts") {
            if result.is_empty_listing() {
                evidence.observe(factors::MISSING_SERVICE_ACCOUNT, "No service accounts configured");
            }
        } else if command.contains("rolebindings") && result.is_empty_listing() {
            evidence.observe(factors::MISSING_RBAC, "No RBAC bindings found");
        }
    }
}

fn analyze_liveness(results: &[EvidenceResult], evidence: &mut Evidence) {
    for result in results {
        let Some((command, _output, lower)) = readable(result) else {
            continue;
        };
        let failing = lower.contains("failed") || lower.contains("unhealthy");
        let passing = lower.contains("successful") || lower.contains("healthy");

        if lower.contains("liveness:") || lower.contains("livenessprobe") {
            if failing {
                evidence.observe(factors::LIVENESS_PROBE_FAILING, "Liveness probe failures detected");
            } else if passing {
                evidence.observe(factors::PROBES_PASSING, "Probes passing");
            }
        }
        if lower.contains("readiness:") || lower.contains("readinessprobe") {
            if failing {
                evidence.observe(
                    factors::READINESS_PROBE_FAILING,
                    "Readiness probe failures detected",
                );
            } else if passing {
                evidence.observe(factors::PROBES_PASSING, "Probes passing");
            }
        }
        if lower.contains("probe") && (lower.contains("invalid") || lower.contains("malformed")) {
            evidence.observe(factors::PROBE_CONFIGURATION_INVALID, "Invalid probe configuration");
        }

        if command.contains("get events") {
            if lower.contains("liveness probe failed") {
                evidence.mark(factors::LIVENESS_PROBE_FAILING);
            }
            if lower.contains("readiness probe failed") {
                evidence.mark(factors::READINESS_PROBE_FAILING);
            }
            if lower.contains("liveness probe failed")
                || lower.contains("readiness probe failed")
                || (lower.contains("probe") && lower.contains("timeout"))
            {
                evidence.observe(factors::HEALTH_CHECK_TIMEOUTS, "Health check failures in events");
            } else if is_application_healthy(&lower) {
                evidence.observe(factors::APPLICATION_HEALTHY, "Application healthy");
            }
        }
    }
}

fn analyze_scheduling(results: &[EvidenceResult], evidence: &mut Evidence) {
    for result in results {
        let Some((command, output, lower)) = readable(result) else {
            continue;
        };

        if command.contains("get nodes") {
            if lower.contains("notready") || lower.contains("schedulingdisabled") {
                evidence.observe(
                    factors::NODE_SCHEDULING_ISSUES,
                    "Node scheduling issues detected",
                );
            } else if !output.trim().is_empty() {
                evidence.observe(factors::NODES_READY, "All nodes ready");
            }
        } else if command.contains("events") {
            if ["failedscheduling", "insufficient", "unschedulable"]
                .iter()
                .any(|e| lower.contains(e))
            {
                evidence.observe(factors::SCHEDULING_FAILURES, "Scheduling failures in events");
            } else if lower.contains("successfully assigned") {
                evidence.observe(factors::POD_SCHEDULED, "Pod scheduled successfully");
            }
        } else if command.contains("describe nodes")
            && lower
                .lines()
                .any(|line| line.contains("taints:") && line.contains("noschedule"))
        {
            evidence.add_finding("Node taints with NoSchedule effect present");
        }
    }
}

/// CPU and memory utilisation parsed from `kubectl top` output
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub(crate) struct UsagePercentages {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
}

/// Highest CPU% and MEMORY% across the data rows. Rows without percentage
/// columns (plain `kubectl top pod`) leave the value unknown.
pub(crate) fn parse_usage_percentages(output: &str) -> UsagePercentages {
    let mut usage = UsagePercentages::default();
    for line in output.lines().skip(1) {
        let percents: Vec<f64> = line
            .split_whitespace()
            .filter_map(|col| col.strip_suffix('%'))
            .filter_map(|value| value.parse().ok())
            .collect();
        if let [cpu, memory, ..] = percents[..] {
            usage.cpu = Some(usage.cpu.map_or(cpu, |c| c.max(cpu)));
            usage.memory = Some(usage.memory.map_or(memory, |m| m.max(memory)));
        }
    }
    usage
}

/// Whether any image reference in the output looks malformed
pub(crate) fn is_invalid_image_reference(output: &str) -> bool {
    let references: Vec<&str> = output
        .split_whitespace()
        .map(|r| r.trim_matches('\''))
        .filter(|r| !r.is_empty())
        .collect();
    if references.is_empty() {
        return true;
    }
    references.iter().any(|reference| {
        let allowed = reference.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-' | '/' | ':' | '@')
        });
        let bad_edges = reference.starts_with(['/', ':', '-', '.'])
            || reference.ends_with(['/', ':']);
        !allowed || bad_edges
    })
}

/// Indented lines following an `Environment:` header
pub(crate) fn extract_environment_section(output: &str) -> String {
    let mut section = Vec::new();
    let mut inside = false;
    for line in output.lines() {
        if line.to_lowercase().contains("environment:") {
            inside = true;
            continue;
        }
        if inside {
            if !line.trim().is_empty() && !line.starts_with(' ') && !line.starts_with('\t') {
                break;
            }
            section.push(line);
        }
    }
    section.join("\n")
}

fn has_invalid_env_vars(section: &str) -> bool {
    let lower = section.to_lowercase();
    ["error", "invalid", "missing", "not found", "failed"]
        .iter()
        .any(|indicator| lower.contains(indicator))
}

fn mount_errors(lower: &str) -> Vec<&'static str> {
    [
        ("no such file or directory", "Mount path does not exist"),
        ("permission denied", "Volume mount permission issues"),
        ("read-only file system", "Volume mounted as read-only"),
        ("device or resource busy", "Volume mount conflicts"),
    ]
    .into_iter()
    .filter(|(pattern, _)| lower.contains(pattern))
    .map(|(_, message)| message)
    .collect()
}
