// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Shared fixtures for HTTP-layer tests.

use crate::bus::LogBus;
use crate::deploy::{DeployMarker, DrainConfig, Orchestrator, OrchestratorConfig, ServicesConfig};
use crate::fleet::FleetSources;
use crate::idle::{IdleConfig, IdleController};
use crate::state::AppState;
use ghfleet_adapters::{
    CloudCompute, ContainerEngine, FakeCloud, FakeEngine, FakeSecrets, FakeSpawner,
    FakeWorkerClient, SecretsBackend, Spawner, WorkerClient,
};
use ghfleet_core::{FleetEntry, SystemClock};
use ghfleet_store::DeployHistory;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const TEST_SECRET: &str = "test-secret";

pub struct TestContext {
    pub state: Arc<AppState>,
    pub engine: Arc<FakeEngine>,
    pub cloud: Arc<FakeCloud>,
    pub workers: Arc<FakeWorkerClient>,
    pub secrets: Arc<FakeSecrets>,
    pub spawner: Arc<FakeSpawner>,
    _dir: tempfile::TempDir,
}

pub fn worker_entry(id: &str, ip: &str, instance_id: Option<&str>) -> FleetEntry {
    let mut entry = FleetEntry::new(id, ip, "ghosthands");
    entry.instance_id = instance_id.map(str::to_string);
    entry
}

/// Build a full AppState over fakes, with one worker seeded in the fleet
/// and the idle controller initialized from it.
pub async fn context() -> TestContext {
    context_with_fleet(vec![worker_entry("gh-worker-0", "10.0.0.1", Some("i-0"))]).await
}

pub async fn context_with_fleet(fleet: Vec<FleetEntry>) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new());
    let cloud = Arc::new(FakeCloud::new());
    let workers = Arc::new(FakeWorkerClient::new());
    let secrets = Arc::new(FakeSecrets::new());
    let spawner = Arc::new(FakeSpawner::new());

    let idle_config = IdleConfig {
        idle_timeout: Duration::from_secs(600),
        min_running: 1,
        poll_interval: Duration::from_secs(600),
        worker_port: 8081,
        wake_poll_interval: Duration::from_millis(1),
        wake_timeout: Duration::from_millis(50),
    };
    let idle = Arc::new(IdleController::new(
        cloud.clone() as Arc<dyn CloudCompute>,
        workers.clone() as Arc<dyn WorkerClient>,
        SystemClock,
        idle_config,
    ));
    idle.init(&fleet).await;

    let bus = Arc::new(LogBus::new());
    let marker = Arc::new(DeployMarker::new());
    let services = ServicesConfig {
        registry_server: "reg.example.com".to_string(),
        repository: "ghfleet/app".to_string(),
        environment: "production".to_string(),
        worker_count: 1,
        worker_port: 8081,
        app_port: 3000,
    };
    let orchestrator = Arc::new(Orchestrator::new(
        engine.clone() as Arc<dyn ContainerEngine>,
        cloud.clone() as Arc<dyn CloudCompute>,
        workers.clone() as Arc<dyn WorkerClient>,
        bus.clone(),
        marker.clone(),
        OrchestratorConfig {
            health_poll_interval: Duration::from_millis(1),
            ..OrchestratorConfig::new(services)
        },
        SystemClock,
    ));

    let state = Arc::new(AppState {
        secret: TEST_SECRET.to_string(),
        allowed_origins: vec!["https://ops.example.com".to_string()],
        idle,
        history: Arc::new(Mutex::new(DeployHistory::load(dir.path().join("deploys.json")))),
        bus,
        engine: engine.clone() as Arc<dyn ContainerEngine>,
        cloud: cloud.clone() as Arc<dyn CloudCompute>,
        workers: workers.clone() as Arc<dyn WorkerClient>,
        secrets: Some(secrets.clone() as Arc<dyn SecretsBackend>),
        spawner: spawner.clone() as Arc<dyn Spawner>,
        fleet: Mutex::new(fleet),
        fleet_sources: FleetSources {
            env_json: None,
            discovery: Vec::new(),
            static_file: dir.path().join("fleet.json"),
        },
        marker,
        orchestrator,
        drain_config: DrainConfig {
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(1),
        },
        app_base_url: "http://app.local:3000".to_string(),
        cleanup_script: dir.path().join("cleanup.sh"),
        start_time: Instant::now(),
        clock: SystemClock,
    });

    TestContext { state, engine, cloud, workers, secrets, spawner, _dir: dir }
}

/// Make the fake engine/workers look like a healthy single-worker host so a
/// deploy can run end to end.
pub fn seed_healthy_deploy(ctx: &TestContext) {
    ctx.workers.push_health("10.0.0.1", 0);
    ctx.workers.push_url_status("http://127.0.0.1:3000/health", 200);
    ctx.workers.push_url_status("http://127.0.0.1:8081/worker/health", 200);
}
