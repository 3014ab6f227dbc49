// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

use super::super::{IdleConfig, IdleController, IdleError};
use super::{StopOutcome, WakeOutcome};
use ghfleet_adapters::{AsgMembership, CloudCompute, FakeCloud, FakeWorkerClient, InstanceView, WorkerClient};
use ghfleet_core::{FakeClock, FleetEntry, WorkerPhase};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    cloud: Arc<FakeCloud>,
    workers: Arc<FakeWorkerClient>,
    controller: Arc<IdleController<FakeClock>>,
}

fn harness(config: IdleConfig) -> Harness {
    let cloud = Arc::new(FakeCloud::new());
    let workers = Arc::new(FakeWorkerClient::new());
    let controller = Arc::new(IdleController::new(
        cloud.clone() as Arc<dyn CloudCompute>,
        workers.clone() as Arc<dyn WorkerClient>,
        FakeClock::new(),
        config,
    ));
    Harness { cloud, workers, controller }
}

fn wake_config() -> IdleConfig {
    IdleConfig {
        wake_poll_interval: Duration::from_millis(1),
        wake_timeout: Duration::from_secs(120),
        ..IdleConfig::default()
    }
}

async fn init_one(h: &Harness) {
    let mut entry = FleetEntry::new("gh-a", "10.0.0.1", "ghosthands");
    entry.instance_id = Some("i-a".into());
    h.controller.init(&[entry]).await;
}

fn view(state: WorkerPhase, ip: Option<&str>) -> InstanceView {
    InstanceView { state, public_ip: ip.map(str::to_string) }
}

fn state_of(h: &Harness) -> ghfleet_core::WorkerState {
    h.controller.get_states().into_iter().find(|s| s.server_id == "gh-a").unwrap()
}

#[tokio::test]
async fn wake_of_stopped_instance_reaches_running_and_healthy() {
    let h = harness(wake_config());
    init_one(&h).await;
    h.cloud.push_describe("i-a", view(WorkerPhase::Stopped, None));
    h.cloud.push_describe("i-a", view(WorkerPhase::Pending, None));
    h.cloud.push_describe("i-a", view(WorkerPhase::Running, Some("203.0.113.50")));
    h.workers.push_health_unreachable("203.0.113.50");
    h.workers.push_health_unreachable("203.0.113.50");
    h.workers.push_health("203.0.113.50", 0);

    let outcome = h.controller.wake("gh-a").await.unwrap();

    assert_eq!(outcome, WakeOutcome::Started { public_ip: "203.0.113.50".to_string() });
    assert_eq!(h.cloud.started(), vec!["i-a"]);
    let state = state_of(&h);
    assert_eq!(state.phase, WorkerPhase::Running);
    // The changed public IP was persisted.
    assert_eq!(state.public_ip, "203.0.113.50");
    assert!(!state.transitioning);
}

#[tokio::test]
async fn wake_already_running_is_idempotent() {
    let h = harness(wake_config());
    init_one(&h).await;
    h.cloud.push_describe("i-a", view(WorkerPhase::Running, Some("10.0.0.1")));
    h.workers.push_health("10.0.0.1", 0);

    for _ in 0..2 {
        let outcome = h.controller.wake("gh-a").await.unwrap();
        assert_eq!(outcome, WakeOutcome::AlreadyRunning { public_ip: "10.0.0.1".to_string() });
    }
    assert!(h.cloud.started().is_empty());
}

#[tokio::test]
async fn wake_refuses_while_transitioning() {
    let h = harness(wake_config());
    init_one(&h).await;
    h.controller.mark_transitioning("gh-a", true);

    let outcome = h.controller.wake("gh-a").await.unwrap();
    assert_eq!(outcome, WakeOutcome::WakingInProgress);
}

#[tokio::test]
async fn wake_of_stopping_instance_conflicts() {
    let h = harness(wake_config());
    init_one(&h).await;
    h.cloud.push_describe("i-a", view(WorkerPhase::Stopping, None));

    let err = h.controller.wake("gh-a").await.unwrap_err();
    assert!(matches!(err, IdleError::StoppingInProgress));
}

#[tokio::test]
async fn wake_requires_a_known_instance_id() {
    let h = harness(wake_config());
    h.controller.init(&[FleetEntry::new("gh-a", "10.0.0.1", "ghosthands")]).await;

    let err = h.controller.wake("gh-a").await.unwrap_err();
    assert!(matches!(err, IdleError::NoInstanceId(_)));
}

#[tokio::test]
async fn wake_unknown_server() {
    let h = harness(wake_config());
    let err = h.controller.wake("gh-nope").await.unwrap_err();
    assert!(matches!(err, IdleError::UnknownServer(_)));
}

#[tokio::test]
async fn wake_deadline_returns_started_unhealthy() {
    let h = harness(IdleConfig { wake_timeout: Duration::ZERO, ..wake_config() });
    init_one(&h).await;
    h.cloud.push_describe("i-a", view(WorkerPhase::Stopped, None));

    let outcome = h.controller.wake("gh-a").await.unwrap();

    assert_eq!(outcome, WakeOutcome::StartedUnhealthy { public_ip: "10.0.0.1".to_string() });
    assert_eq!(h.cloud.started(), vec!["i-a"]);
    assert!(!state_of(&h).transitioning);
}

#[tokio::test]
async fn wake_exits_standby_after_the_instance_comes_up() {
    let h = harness(wake_config());
    h.cloud.set_membership(
        "i-a",
        AsgMembership { asg_name: Some("gh-workers".into()), lifecycle_state: Some("Standby".into()) },
    );
    init_one(&h).await;
    h.cloud.push_describe("i-a", view(WorkerPhase::Stopped, None));
    h.cloud.push_describe("i-a", view(WorkerPhase::Running, Some("10.0.0.1")));
    h.workers.push_health("10.0.0.1", 0);

    let outcome = h.controller.wake("gh-a").await.unwrap();

    assert_eq!(outcome, WakeOutcome::Started { public_ip: "10.0.0.1".to_string() });
    assert_eq!(h.cloud.standby_exited(), vec![("i-a".to_string(), "gh-workers".to_string())]);
    assert!(!state_of(&h).in_standby);
}

#[tokio::test]
async fn stop_enters_standby_then_stops_the_instance() {
    let h = harness(wake_config());
    h.cloud.set_membership(
        "i-a",
        AsgMembership { asg_name: Some("gh-workers".into()), lifecycle_state: Some("InService".into()) },
    );
    init_one(&h).await;
    h.controller.update_worker_ec2("gh-a", WorkerPhase::Running, None);

    let outcome = h.controller.stop("gh-a").await.unwrap();

    assert_eq!(outcome, StopOutcome::Stopping);
    assert_eq!(h.cloud.standby_entered(), vec![("i-a".to_string(), "gh-workers".to_string())]);
    assert_eq!(h.cloud.stopped(), vec!["i-a"]);
    let state = state_of(&h);
    assert_eq!(state.phase, WorkerPhase::Stopping);
    assert!(!state.transitioning);
}

#[tokio::test]
async fn stop_rejects_recorded_active_jobs() {
    let h = harness(wake_config());
    init_one(&h).await;
    h.controller.update_worker_ec2("gh-a", WorkerPhase::Running, None);
    h.workers.push_health("10.0.0.1", 3);
    h.controller.tick().await;

    let err = h.controller.stop("gh-a").await.unwrap_err();
    assert!(matches!(err, IdleError::ActiveJobs(3)));
    assert!(h.cloud.stopped().is_empty());
}

#[tokio::test]
async fn stop_rejects_jobs_found_by_live_probe() {
    let h = harness(wake_config());
    init_one(&h).await;
    h.controller.update_worker_ec2("gh-a", WorkerPhase::Running, None);
    // Recorded state says idle; the live probe disagrees.
    h.workers.push_health("10.0.0.1", 2);

    let err = h.controller.stop("gh-a").await.unwrap_err();
    assert!(matches!(err, IdleError::ActiveJobs(2)));
    assert_eq!(state_of(&h).active_jobs, 2);
}

#[tokio::test]
async fn stop_rejects_already_stopped_phases() {
    for phase in [WorkerPhase::Stopped, WorkerPhase::Stopping] {
        let h = harness(wake_config());
        init_one(&h).await;
        h.controller.update_worker_ec2("gh-a", phase, None);

        let err = h.controller.stop("gh-a").await.unwrap_err();
        assert!(matches!(err, IdleError::AlreadyStopped(_)));
        assert!(h.cloud.stopped().is_empty());
    }
}

#[tokio::test]
async fn stop_standby_failure_clears_transitioning_and_surfaces() {
    let h = harness(wake_config());
    h.cloud.set_membership(
        "i-a",
        AsgMembership { asg_name: Some("gh-workers".into()), lifecycle_state: Some("InService".into()) },
    );
    h.cloud.fail_enter_standby(true);
    init_one(&h).await;
    h.controller.update_worker_ec2("gh-a", WorkerPhase::Running, None);

    let err = h.controller.stop("gh-a").await.unwrap_err();

    assert!(matches!(err, IdleError::Cloud(_)));
    assert!(h.cloud.stopped().is_empty());
    assert!(!state_of(&h).transitioning);
}

#[tokio::test]
async fn stop_refuses_while_transitioning() {
    let h = harness(wake_config());
    init_one(&h).await;
    h.controller.update_worker_ec2("gh-a", WorkerPhase::Running, None);
    h.controller.mark_transitioning("gh-a", true);

    let outcome = h.controller.stop("gh-a").await.unwrap();
    assert_eq!(outcome, StopOutcome::StopInProgress);
}
