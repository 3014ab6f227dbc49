// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Deploy pipeline: pre-drain, rolling orchestration, rollback, and the
//! process-wide single-flight marker.

pub mod drain;
pub mod orchestrator;
pub mod rollback;
pub mod services;

pub use drain::{drain_fleet, DrainConfig, DrainError, DrainProgress, DrainStatus, DrainSummary};
pub use orchestrator::{DeployFailure, DeploySuccess, Orchestrator, OrchestratorConfig};
pub use rollback::{execute_rollback, DeployExecutor, RollbackOutcome, NO_HISTORY_MESSAGE};
pub use services::{service_definitions, ServicesConfig};

use parking_lot::Mutex;
use serde::Serialize;

/// Snapshot of the in-flight deploy, reported by `/health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentDeploy {
    pub image_tag: String,
    pub started_at_ms: u64,
    pub step: String,
}

/// Process-wide single-flight gate. Compare-and-swap at deploy entry,
/// cleared at exit; never reentrant.
pub struct DeployMarker {
    current: Mutex<Option<CurrentDeploy>>,
}

impl DeployMarker {
    pub fn new() -> Self {
        Self { current: Mutex::new(None) }
    }

    /// Claim the slot. Returns false when a deploy is already in flight.
    pub fn try_begin(&self, image_tag: &str, started_at_ms: u64) -> bool {
        let mut current = self.current.lock();
        if current.is_some() {
            return false;
        }
        *current = Some(CurrentDeploy {
            image_tag: image_tag.to_string(),
            started_at_ms,
            step: "starting".to_string(),
        });
        true
    }

    /// Record the step the in-flight deploy is on.
    pub fn set_step(&self, step: &str) {
        if let Some(current) = self.current.lock().as_mut() {
            current.step = step.to_string();
        }
    }

    pub fn clear(&self) {
        *self.current.lock() = None;
    }

    pub fn snapshot(&self) -> Option<CurrentDeploy> {
        self.current.lock().clone()
    }
}

impl Default for DeployMarker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
