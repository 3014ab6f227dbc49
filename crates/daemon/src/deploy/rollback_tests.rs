// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

use super::*;
use ghfleet_core::FakeClock;
use std::sync::atomic::{AtomicU32, Ordering};

struct FakeExecutor {
    calls: AtomicU32,
    fail_with: Option<DeployFailure>,
}

impl FakeExecutor {
    fn succeeding() -> Self {
        Self { calls: AtomicU32::new(0), fail_with: None }
    }

    fn failing(step: &'static str, error: &str) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_with: Some(DeployFailure {
                error: error.to_string(),
                failed_step: step,
                failed_service: None,
            }),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeployExecutor for FakeExecutor {
    async fn run(&self, image_tag: &str) -> Result<DeploySuccess, DeployFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(failure) => Err(failure.clone()),
            None => Ok(DeploySuccess {
                duration_ms: 1234,
                image_tag: image_tag.to_string(),
                bytes_reclaimed: 0,
            }),
        }
    }
}

fn history_with(records: &[(&str, &str, DeployStatus)]) -> (tempfile::TempDir, Mutex<DeployHistory>) {
    let dir = tempfile::tempdir().unwrap();
    let mut history = DeployHistory::load(dir.path().join("deploys.json"));
    for (id, tag, status) in records {
        let mut rec = DeployRecord::new(*tag, DeployTrigger::Ci, None, None, 1_000);
        rec.id = id.to_string();
        rec.status = *status;
        history.add(rec).unwrap();
    }
    (dir, Mutex::new(history))
}

#[tokio::test]
async fn rollback_without_successful_history_never_invokes_the_executor() {
    let (_dir, history) = history_with(&[
        ("dep-1", "v1", DeployStatus::Failed),
        ("dep-2", "v2", DeployStatus::Deploying),
    ]);
    let executor = FakeExecutor::succeeding();

    let outcome = execute_rollback(&executor, &history, &FakeClock::new()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, "No previous successful deploy found in history");
    assert!(outcome.rollback_image_tag.is_none());
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn successful_rollback_targets_the_last_completed_tag() {
    let (_dir, history) = history_with(&[
        ("dep-1", "v1", DeployStatus::Completed),
        ("dep-2", "v2", DeployStatus::Completed),
        ("dep-3", "v3", DeployStatus::Failed),
    ]);
    let executor = FakeExecutor::succeeding();

    let outcome = execute_rollback(&executor, &history, &FakeClock::new()).await;

    assert!(outcome.success);
    assert_eq!(outcome.rollback_image_tag.as_deref(), Some("v2"));
    assert_eq!(executor.calls(), 1);

    let record = outcome.deploy_record.unwrap();
    assert_eq!(record.status, DeployStatus::Completed);
    assert_eq!(record.trigger, DeployTrigger::Rollback);
    assert_eq!(record.image_tag, "v2");

    // The failed deploy that was undone now reads rolled_back.
    let history = history.lock();
    assert_eq!(history.find("dep-3").map(|r| r.status), Some(DeployStatus::RolledBack));
    assert_eq!(history.find("dep-2").map(|r| r.status), Some(DeployStatus::Completed));
}

#[tokio::test]
async fn failed_rollback_records_the_failure() {
    let (_dir, history) = history_with(&[("dep-1", "v1", DeployStatus::Completed)]);
    let executor = FakeExecutor::failing("start-services", "boom");

    let outcome = execute_rollback(&executor, &history, &FakeClock::new()).await;

    assert!(!outcome.success);
    assert!(outcome.message.contains("start-services"));
    let record = outcome.deploy_record.unwrap();
    assert_eq!(record.status, DeployStatus::Failed);
    assert!(record.error.as_deref().unwrap_or_default().contains("boom"));

    // Nothing gets marked rolled_back on a failed attempt.
    assert_eq!(
        history.lock().find("dep-1").map(|r| r.status),
        Some(DeployStatus::Completed)
    );
}

#[tokio::test]
async fn rollback_record_lands_in_history() {
    let (_dir, history) = history_with(&[("dep-1", "v1", DeployStatus::Completed)]);
    let executor = FakeExecutor::succeeding();

    let outcome = execute_rollback(&executor, &history, &FakeClock::new()).await;

    let id = outcome.deploy_record.unwrap().id;
    let history = history.lock();
    let stored = history.find(&id).unwrap();
    assert_eq!(stored.status, DeployStatus::Completed);
    assert_eq!(stored.previous_image_tag.as_deref(), Some("v1"));
}
