// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Rollback planner: redeploy the last image that completed successfully.

use super::orchestrator::{DeployFailure, DeploySuccess};
use async_trait::async_trait;
use ghfleet_core::{Clock, DeployRecord, DeployStatus, DeployTrigger};
use ghfleet_store::DeployHistory;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info};

/// Message returned when history holds nothing to roll back to.
pub const NO_HISTORY_MESSAGE: &str = "No previous successful deploy found in history";

/// Seam between the planner and the orchestrator so tests can verify the
/// planner never deploys when there is no target.
#[async_trait]
pub trait DeployExecutor: Send + Sync {
    async fn run(&self, image_tag: &str) -> Result<DeploySuccess, DeployFailure>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_image_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_record: Option<DeployRecord>,
}

impl RollbackOutcome {
    fn no_history() -> Self {
        Self {
            success: false,
            message: NO_HISTORY_MESSAGE.to_string(),
            rollback_image_tag: None,
            deploy_record: None,
        }
    }
}

/// Pick the last successful deploy, run the executor against its tag, and
/// record the attempt in history.
pub async fn execute_rollback<C: Clock>(
    executor: &dyn DeployExecutor,
    history: &Mutex<DeployHistory>,
    clock: &C,
) -> RollbackOutcome {
    let (target, superseded_id) = {
        let history = history.lock();
        let target = history.last_successful().cloned();
        // The newest record is what a successful rollback supersedes.
        let superseded_id = history.records().last().map(|r| r.id.clone());
        (target, superseded_id)
    };
    let Some(target) = target else {
        info!("rollback requested with no successful deploy in history");
        return RollbackOutcome::no_history();
    };

    let mut record = {
        let history = history.lock();
        history.create_record(
            &target.image_tag,
            DeployTrigger::Rollback,
            target.commit_sha.clone(),
            clock.epoch_ms(),
        )
    };
    persist(history, |h| h.add(record.clone()));
    info!(image_tag = %target.image_tag, "rollback started");

    match executor.run(&target.image_tag).await {
        Ok(success) => {
            record.complete(clock.epoch_ms());
            persist(history, |h| h.update(&record));
            // Never flip the record we just rolled back to.
            if superseded_id.as_deref() != Some(target.id.as_str()) {
                mark_superseded(history, superseded_id.as_deref(), &record.id);
            }
            RollbackOutcome {
                success: true,
                message: format!(
                    "Rolled back to {} in {}ms",
                    target.image_tag, success.duration_ms
                ),
                rollback_image_tag: Some(target.image_tag),
                deploy_record: Some(record),
            }
        }
        Err(failure) => {
            record.fail(failure.message(), clock.epoch_ms());
            persist(history, |h| h.update(&record));
            RollbackOutcome {
                success: false,
                message: format!("Rollback to {} failed: {}", target.image_tag, failure.message()),
                rollback_image_tag: Some(target.image_tag),
                deploy_record: Some(record),
            }
        }
    }
}

/// Flip the deploy that was just undone to `rolled_back`, so history reads
/// correctly. Skipped when that record is the rollback itself or still
/// in flight.
fn mark_superseded(history: &Mutex<DeployHistory>, superseded_id: Option<&str>, own_id: &str) {
    let Some(superseded_id) = superseded_id else { return };
    if superseded_id == own_id {
        return;
    }
    let updated = {
        let history = history.lock();
        history.find(superseded_id).cloned().and_then(|mut rec| {
            matches!(rec.status, DeployStatus::Completed | DeployStatus::Failed).then(|| {
                rec.status = DeployStatus::RolledBack;
                rec
            })
        })
    };
    if let Some(rec) = updated {
        persist(history, |h| h.update(&rec));
    }
}

fn persist(
    history: &Mutex<DeployHistory>,
    f: impl FnOnce(&mut DeployHistory) -> Result<(), ghfleet_store::StoreError>,
) {
    if let Err(e) = f(&mut history.lock()) {
        error!(error = %e, "failed to persist deploy history");
    }
}

#[cfg(test)]
#[path = "rollback_tests.rs"]
mod tests;
