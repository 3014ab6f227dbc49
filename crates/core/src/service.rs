// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Service definitions: the unit of work for the deploy orchestrator.

use std::collections::BTreeMap;
use std::time::Duration;

/// Label applied to every container the control plane manages.
pub const MANAGED_BY_LABEL: &str = "ghfleet.managed-by";
pub const MANAGED_BY_VALUE: &str = "ghfleet";
/// Label carrying a worker container's index within the fleet.
pub const WORKER_INDEX_LABEL: &str = "ghfleet.worker-index";

/// Everything the orchestrator needs to stop, start, and health-gate one
/// container. Materialized from configuration for a given environment and
/// image tag; never persisted.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    /// Container name; matching also accepts `name-<suffix>`.
    pub name: String,
    /// Full image reference including registry and tag.
    pub image: String,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Host networking keeps worker ports stable across restarts.
    pub host_network: bool,
    pub restart_policy: String,
    pub labels: BTreeMap<String, String>,
    /// Polled every 2s after start until 200 or `health_timeout`.
    pub health_url: Option<String>,
    pub health_timeout: Duration,
    /// POSTed before stop when the container is running.
    pub drain_url: Option<String>,
    pub drain_timeout: Duration,
    /// Lower starts first.
    pub start_order: u32,
    /// Lower stops first.
    pub stop_order: u32,
    /// True for the control plane's own container: a deploy must not stop
    /// the process driving it.
    pub skip_on_self_update: bool,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
        Self {
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            env: BTreeMap::new(),
            host_network: true,
            restart_policy: "unless-stopped".to_string(),
            labels,
            health_url: None,
            health_timeout: Duration::from_secs(60),
            drain_url: None,
            drain_timeout: Duration::from_secs(30),
            start_order: 0,
            stop_order: 0,
            skip_on_self_update: false,
        }
    }

    /// True when `container_name` is this service or one of its suffixed
    /// replicas (`name-1`, `name-blue`, ...).
    pub fn matches_container(&self, container_name: &str) -> bool {
        container_name == self.name
            || container_name
                .strip_prefix(self.name.as_str())
                .is_some_and(|rest| rest.starts_with('-'))
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
