// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Fleet entries: the configured set of instances the control plane knows.

use crate::worker::WORKER_ROLE;
use serde::{Deserialize, Serialize};

/// One configured instance. Only entries with the worker role are promoted
/// to managed [`crate::WorkerState`]s; other roles are carried for display
/// and proxying but never woken or stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetEntry {
    pub id: String,
    pub ip: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FleetEntry {
    pub fn new(id: impl Into<String>, ip: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ip: ip.into(),
            role: role.into(),
            instance_id: None,
            environment: None,
            name: None,
        }
    }

    pub fn is_worker(&self) -> bool {
        self.role == WORKER_ROLE
    }
}

/// Public IPs of the worker-role entries, in snapshot order.
pub fn worker_ips(entries: &[FleetEntry]) -> Vec<String> {
    entries.iter().filter(|e| e.is_worker()).map(|e| e.ip.clone()).collect()
}

#[cfg(test)]
#[path = "fleet_tests.rs"]
mod tests;
