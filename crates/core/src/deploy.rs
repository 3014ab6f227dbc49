// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Deploy records: one persisted row per deploy or rollback attempt.
//!
//! Field names are camelCase on the wire because the history file is served
//! verbatim through the HTTP API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Deploying,
    Completed,
    Failed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployTrigger {
    Ci,
    Manual,
    Kamal,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRecord {
    pub id: String,
    pub image_tag: String,
    /// Image tag of the last successful deploy at the moment this record was
    /// created; what a rollback would target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_image_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    pub status: DeployStatus,
    pub trigger: DeployTrigger,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeployRecord {
    pub fn new(
        image_tag: impl Into<String>,
        trigger: DeployTrigger,
        commit_sha: Option<String>,
        previous_image_tag: Option<String>,
        started_at_ms: u64,
    ) -> Self {
        Self {
            id: format!("dep-{}", nanoid::nanoid!(12)),
            image_tag: image_tag.into(),
            previous_image_tag,
            commit_sha,
            status: DeployStatus::Deploying,
            trigger,
            started_at_ms,
            completed_at_ms: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn complete(&mut self, now_ms: u64) {
        self.status = DeployStatus::Completed;
        self.completed_at_ms = Some(now_ms);
        self.duration_ms = Some(now_ms.saturating_sub(self.started_at_ms));
        self.error = None;
    }

    pub fn fail(&mut self, error: impl Into<String>, now_ms: u64) {
        self.status = DeployStatus::Failed;
        self.completed_at_ms = Some(now_ms);
        self.duration_ms = Some(now_ms.saturating_sub(self.started_at_ms));
        self.error = Some(error.into());
    }
}

/// Validate an image tag against the allowed charset.
///
/// Tags travel into shell-adjacent surfaces (registry URLs, container
/// labels), so anything outside `[A-Za-z0-9._-]` is rejected up front.
pub fn validate_image_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= 128
        && tag.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
#[path = "deploy_tests.rs"]
mod tests;
