// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

use super::*;

#[yare::parameterized(
    running = { "running", WorkerPhase::Running },
    pending = { "pending", WorkerPhase::Pending },
    stopped = { "stopped", WorkerPhase::Stopped },
    stopping = { "stopping", WorkerPhase::Stopping },
    shutting_down = { "shutting-down", WorkerPhase::ShuttingDown },
    terminated = { "terminated", WorkerPhase::Terminated },
    standby = { "standby", WorkerPhase::Standby },
    asg_standby_case = { "Standby", WorkerPhase::Standby },
    garbage = { "rebooting", WorkerPhase::Unknown },
    empty = { "", WorkerPhase::Unknown },
)]
fn from_cloud_maps_states(input: &str, expected: WorkerPhase) {
    assert_eq!(WorkerPhase::from_cloud(input), expected);
}

#[test]
fn serde_uses_kebab_case() {
    let json = serde_json::to_string(&WorkerPhase::ShuttingDown).unwrap();
    assert_eq!(json, "\"shutting-down\"");

    let parsed: WorkerPhase = serde_json::from_str("\"standby\"").unwrap();
    assert_eq!(parsed, WorkerPhase::Standby);
}

#[test]
fn display_round_trips_through_from_cloud() {
    for phase in [
        WorkerPhase::Running,
        WorkerPhase::Pending,
        WorkerPhase::Stopped,
        WorkerPhase::Stopping,
        WorkerPhase::ShuttingDown,
        WorkerPhase::Terminated,
        WorkerPhase::Standby,
    ] {
        assert_eq!(WorkerPhase::from_cloud(&phase.to_string()), phase);
    }
}

#[yare::parameterized(
    stopped = { WorkerPhase::Stopped, true },
    stopping = { WorkerPhase::Stopping, true },
    standby = { WorkerPhase::Standby, true },
    running = { WorkerPhase::Running, false },
    pending = { WorkerPhase::Pending, false },
    unknown = { WorkerPhase::Unknown, false },
)]
fn health_poll_skip_set(phase: WorkerPhase, skipped: bool) {
    assert_eq!(phase.skips_health_poll(), skipped);
}

#[test]
fn new_worker_starts_unknown_and_idle() {
    let state = WorkerState::new("gh-worker-0", "10.0.0.1", std::time::Instant::now());

    assert_eq!(state.phase, WorkerPhase::Unknown);
    assert_eq!(state.active_jobs, 0);
    assert!(!state.transitioning);
    assert!(!state.in_standby);
    assert!(state.instance_id.is_none());
}
