//! Confidence factor vocabulary
//!
//! Analyzers emit these factors and the scorer's adjustment tables consume
//! them. Each factor belongs to exactly one evidence section; the scorer
//! looks for the factor name inside that section's payload.

#![allow(missing_docs)]

use crate::hypothesis::HypothesisCategory;

/// A named boolean observation extracted from command output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Factor {
    /// Evidence section the factor is recorded under
    pub section: &'static str,
    /// Factor name, also the pattern the scorer matches
    pub name: &'static str,
}

impl Factor {
    const fn new(section: &'static str, name: &'static str) -> Self {
        Self { section, name }
    }
}

/// Evidence section names
pub mod section {
    /// Live CPU and memory usage
    pub const RESOURCE_USAGE: &str = "resource_usage";
    /// Cluster events
    pub const EVENTS: &str = "events";
    /// Resource limits and requests
    pub const LIMITS: &str = "limits";
    /// Image references and pull secrets
    pub const IMAGE_CONFIG: &str = "image_config";
    /// ConfigMaps, Secrets and environment
    pub const CONFIG: &str = "config";
    /// Volume mounts
    pub const MOUNTS: &str = "mounts";
    /// Probe definitions and results
    pub const PROBES: &str = "probes";
    /// Health check outcomes
    pub const HEALTH: &str = "health";
    /// Services
    pub const SERVICES: &str = "services";
    /// Service endpoints
    pub const ENDPOINTS: &str = "endpoints";
    /// Network policies
    pub const POLICIES: &str = "policies";
    /// Service accounts
    pub const SERVICE_ACCOUNTS: &str = "service_accounts";
    /// Role bindings
    pub const RBAC: &str = "rbac";
    /// API server access
    pub const ACCESS: &str = "access";
    /// Node readiness
    pub const NODES: &str = "nodes";
}

use section::*;

// resource exhaustion
pub const MEMORY_USAGE_HIGH: Factor = Factor::new(RESOURCE_USAGE, "memory_usage_high");
pub const CPU_USAGE_HIGH: Factor = Factor::new(RESOURCE_USAGE, "cpu_usage_high");
pub const MEMORY_USAGE_NORMAL: Factor = Factor::new(RESOURCE_USAGE, "memory_usage_normal");
pub const CPU_USAGE_NORMAL: Factor = Factor::new(RESOURCE_USAGE, "cpu_usage_normal");
pub const OOM_EVENTS_FOUND: Factor = Factor::new(EVENTS, "oom_events_found");
pub const EVICTION_EVENTS_FOUND: Factor = Factor::new(EVENTS, "eviction_events_found");
pub const RESOURCE_QUOTA_EXCEEDED: Factor = Factor::new(EVENTS, "resource_quota_exceeded");
pub const NO_RESOURCE_EVENTS: Factor = Factor::new(EVENTS, "no_resource_events");
pub const NO_RESOURCE_LIMITS: Factor = Factor::new(LIMITS, "no_resource_limits");
pub const RESOURCE_LIMITS_ADEQUATE: Factor = Factor::new(LIMITS, "resource_limits_adequate");

// image / registry
pub const IMAGE_PULL_ERRORS_FOUND: Factor = Factor::new(EVENTS, "image_pull_errors_found");
pub const AUTHENTICATION_ERRORS: Factor = Factor::new(EVENTS, "authentication_errors");
pub const REGISTRY_UNREACHABLE: Factor = Factor::new(EVENTS, "registry_unreachable");
pub const SUCCESSFUL_IMAGE_PULLS: Factor = Factor::new(EVENTS, "successful_image_pulls");
pub const INVALID_IMAGE_NAME: Factor = Factor::new(IMAGE_CONFIG, "invalid_image_name");
pub const MISSING_PULL_SECRETS: Factor = Factor::new(IMAGE_CONFIG, "missing_pull_secrets");
pub const VALID_IMAGE_CONFIG: Factor = Factor::new(IMAGE_CONFIG, "valid_image_config");

// configuration
pub const MISSING_CONFIGMAP: Factor = Factor::new(CONFIG, "missing_configmap");
pub const MISSING_SECRET: Factor = Factor::new(CONFIG, "missing_secret");
pub const INVALID_ENVIRONMENT_VARS: Factor = Factor::new(CONFIG, "invalid_environment_vars");
pub const CONFIGURATION_VALID: Factor = Factor::new(CONFIG, "configuration_valid");
pub const VOLUME_MOUNT_ERRORS: Factor = Factor::new(MOUNTS, "volume_mount_errors");
pub const SUCCESSFUL_MOUNTS: Factor = Factor::new(MOUNTS, "successful_mounts");

// liveness / readiness
pub const LIVENESS_PROBE_FAILING: Factor = Factor::new(PROBES, "liveness_probe_failing");
pub const READINESS_PROBE_FAILING: Factor = Factor::new(PROBES, "readiness_probe_failing");
pub const PROBE_CONFIGURATION_INVALID: Factor = Factor::new(PROBES, "probe_configuration_invalid");
pub const PROBES_PASSING: Factor = Factor::new(PROBES, "probes_passing");
pub const HEALTH_CHECK_TIMEOUTS: Factor = Factor::new(HEALTH, "health_check_timeouts");
pub const APPLICATION_HEALTHY: Factor = Factor::new(HEALTH, "application_healthy");

// network
pub const NO_SERVICES: Factor = Factor::new(SERVICES, "no_services");
pub const SERVICES_PRESENT: Factor = Factor::new(SERVICES, "services_present");
pub const ENDPOINTS_MISSING: Factor = Factor::new(ENDPOINTS, "endpoints_missing");
pub const NETWORK_POLICIES_PRESENT: Factor = Factor::new(POLICIES, "network_policies_present");

// security
pub const MISSING_SERVICE_ACCOUNT: Factor = Factor::new(SERVICE_ACCOUNTS, "missing_service_account");
pub const MISSING_RBAC: Factor = Factor::new(RBAC, "missing_rbac");
pub const PERMISSION_DENIED: Factor = Factor::new(ACCESS, "permission_denied");

// scheduling
pub const NODE_SCHEDULING_ISSUES: Factor = Factor::new(NODES, "node_scheduling_issues");
pub const NODES_READY: Factor = Factor::new(NODES, "nodes_ready");
pub const SCHEDULING_FAILURES: Factor = Factor::new(EVENTS, "scheduling_failures");
pub const POD_SCHEDULED: Factor = Factor::new(EVENTS, "pod_scheduled");

/// Every factor the analyzer for `category` can emit
#[must_use]
pub fn vocabulary(category: HypothesisCategory) -> &'static [Factor] {
    match category {
        HypothesisCategory::ResourceExhaustion => &[
            MEMORY_USAGE_HIGH,
            CPU_USAGE_HIGH,
            MEMORY_USAGE_NORMAL,
            CPU_USAGE_NORMAL,
            OOM_EVENTS_FOUND,
            EVICTION_EVENTS_FOUND,
            RESOURCE_QUOTA_EXCEEDED,
            NO_RESOURCE_EVENTS,
            NO_RESOURCE_LIMITS,
            RESOURCE_LIMITS_ADEQUATE,
        ],
        HypothesisCategory::ImageRegistryIssues => &[
            IMAGE_PULL_ERRORS_FOUND,
            AUTHENTICATION_ERRORS,
            REGISTRY_UNREACHABLE,
            SUCCESSFUL_IMAGE_PULLS,
            INVALID_IMAGE_NAME,
            MISSING_PULL_SECRETS,
            VALID_IMAGE_CONFIG,
        ],
        HypothesisCategory::ConfigurationErrors => &[
            MISSING_CONFIGMAP,
            MISSING_SECRET,
            INVALID_ENVIRONMENT_VARS,
            CONFIGURATION_VALID,
            VOLUME_MOUNT_ERRORS,
            SUCCESSFUL_MOUNTS,
        ],
        HypothesisCategory::NetworkConnectivity => &[
            NO_SERVICES,
            SERVICES_PRESENT,
            ENDPOINTS_MISSING,
            NETWORK_POLICIES_PRESENT,
        ],
        HypothesisCategory::SecurityPermissions => {
            &[MISSING_SERVICE_ACCOUNT, MISSING_RBAC, PERMISSION_DENIED]
        }
        HypothesisCategory::LivenessReadiness => &[
            LIVENESS_PROBE_FAILING,
            READINESS_PROBE_FAILING,
            PROBE_CONFIGURATION_INVALID,
            PROBES_PASSING,
            HEALTH_CHECK_TIMEOUTS,
            APPLICATION_HEALTHY,
        ],
        HypothesisCategory::SchedulingIssues => &[
            NODE_SCHEDULING_ISSUES,
            NODES_READY,
            SCHEDULING_FAILURES,
            POD_SCHEDULED,
        ],
    }
}
