// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Per-instance worker state tracked by the idle controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Fleet role whose entries are promoted to managed worker state.
pub const WORKER_ROLE: &str = "ghosthands";

/// Cloud lifecycle phase of a worker instance.
///
/// Mirrors the EC2 instance states plus `standby` (detached from its
/// auto-scaling group) and `unknown` for anything we cannot classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerPhase {
    Running,
    Pending,
    Stopped,
    Stopping,
    ShuttingDown,
    Terminated,
    Standby,
    Unknown,
}

impl WorkerPhase {
    /// Map a cloud-reported state name. Unrecognized values become `Unknown`.
    pub fn from_cloud(state: &str) -> Self {
        match state {
            "running" => Self::Running,
            "pending" => Self::Pending,
            "stopped" => Self::Stopped,
            "stopping" => Self::Stopping,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            "standby" | "Standby" => Self::Standby,
            _ => Self::Unknown,
        }
    }

    /// Phases the health poller must leave untouched.
    pub fn skips_health_poll(self) -> bool {
        matches!(self, Self::Stopped | Self::Stopping | Self::Standby)
    }

    /// Phases where dialing the worker over HTTP cannot succeed.
    pub fn is_offline(self) -> bool {
        matches!(
            self,
            Self::Stopped | Self::Stopping | Self::Standby | Self::ShuttingDown | Self::Terminated
        )
    }
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Pending => "pending",
            Self::Stopped => "stopped",
            Self::Stopping => "stopping",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Standby => "standby",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Mutable record for one managed worker.
///
/// Lives in the idle controller's state map for the life of the process.
/// `transitioning` acts as a per-worker mutex: wake and stop refuse to run
/// while another transition holds it.
#[derive(Debug, Clone)]
pub struct WorkerState {
    pub server_id: String,
    pub public_ip: String,
    /// Resolved lazily from the public IP when not known up front.
    pub instance_id: Option<String>,
    pub last_active: Instant,
    pub active_jobs: u32,
    pub phase: WorkerPhase,
    pub transitioning: bool,
    pub asg_name: Option<String>,
    pub in_standby: bool,
}

impl WorkerState {
    pub fn new(server_id: impl Into<String>, public_ip: impl Into<String>, now: Instant) -> Self {
        Self {
            server_id: server_id.into(),
            public_ip: public_ip.into(),
            instance_id: None,
            last_active: now,
            active_jobs: 0,
            phase: WorkerPhase::Unknown,
            transitioning: false,
            asg_name: None,
            in_standby: false,
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
