// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Daemon lifecycle: configuration, startup wiring, shutdown handle.

use crate::bus::LogBus;
use crate::deploy::{DeployMarker, DrainConfig, Orchestrator, OrchestratorConfig, ServicesConfig};
use crate::env;
use crate::fleet::{load_fleet, FleetSources};
use crate::http::cors::parse_allowed_origins;
use crate::idle::{IdleConfig, IdleController};
use crate::state::AppState;
use ghfleet_adapters::{
    AwsCli, AwsCloud, CloudCompute, ContainerEngine, DockerEngine, HttpSecretsBackend,
    HttpWorkerClient, ProcessSpawner, SecretsBackend, Spawner, WorkerClient,
};
use ghfleet_core::SystemClock;
use ghfleet_store::DeployHistory;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The one fatal misconfiguration: without the shared secret every
    /// mutating endpoint would be open.
    #[error("GHFLEET_DEPLOY_SECRET is required")]
    MissingSecret,
    #[error("worker HTTP client init failed: {0}")]
    Client(String),
}

/// Everything the daemon reads from the environment, resolved once.
#[derive(Debug, Clone)]
pub struct Config {
    pub secret: String,
    pub listen_addr: String,
    pub allowed_origins: Vec<String>,
    pub history_path: PathBuf,
    pub fleet_sources: FleetSources,
    pub idle: IdleConfig,
    pub drain: DrainConfig,
    pub services: ServicesConfig,
    pub app_base_url: String,
    pub cleanup_script: PathBuf,
    pub docker_socket: PathBuf,
    pub aws_region: Option<String>,
    pub secrets_backend: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self, LifecycleError> {
        let secret = env::deploy_secret().ok_or(LifecycleError::MissingSecret)?;
        Ok(Self {
            secret,
            listen_addr: env::listen_addr(),
            allowed_origins: parse_allowed_origins(env::allowed_origins()),
            history_path: env::history_path(),
            fleet_sources: FleetSources {
                env_json: env::fleet_json(),
                discovery: env::discovery_configs(),
                static_file: env::fleet_file(),
            },
            idle: IdleConfig {
                idle_timeout: env::idle_timeout(),
                min_running: env::min_running(),
                poll_interval: env::idle_poll_interval(),
                worker_port: env::worker_port(),
                ..IdleConfig::default()
            },
            drain: DrainConfig {
                timeout: env::drain_timeout(),
                poll_interval: env::drain_poll_interval(),
            },
            services: ServicesConfig {
                registry_server: env::registry_server(),
                repository: env::repository(),
                environment: env::environment(),
                worker_count: env::worker_count(),
                worker_port: env::worker_port(),
                app_port: env::app_port(),
            },
            app_base_url: env::app_base_url(),
            cleanup_script: env::cleanup_script(),
            docker_socket: env::docker_socket(),
            aws_region: env::aws_region(),
            secrets_backend: env::secrets_backend(),
        })
    }
}

/// A started daemon: shared state plus the background-task handles the
/// shutdown path needs.
pub struct Daemon {
    pub state: Arc<AppState>,
    pub cancel: CancellationToken,
    pub ticker: tokio::task::JoinHandle<()>,
}

/// Wire the production adapters, seed the idle controller from the fleet
/// config, and start the background ticker.
pub async fn startup(config: Config) -> Result<Daemon, LifecycleError> {
    let spawner: Arc<dyn Spawner> = Arc::new(ProcessSpawner);
    let dispatch = Arc::new(AwsCli::new(spawner.clone(), config.aws_region.clone()));
    let cloud: Arc<dyn CloudCompute> =
        Arc::new(AwsCloud::new(dispatch, config.services.registry_server.clone()));
    let engine: Arc<dyn ContainerEngine> = Arc::new(DockerEngine::new(&config.docker_socket));
    let workers: Arc<dyn WorkerClient> =
        Arc::new(HttpWorkerClient::new().map_err(|e| LifecycleError::Client(e.to_string()))?);
    let secrets: Option<Arc<dyn SecretsBackend>> = match &config.secrets_backend {
        Some((url, token)) => match HttpSecretsBackend::new(url.clone(), token.clone()) {
            Ok(backend) => Some(Arc::new(backend)),
            Err(e) => {
                warn!(error = %e, "secrets backend unavailable, continuing without it");
                None
            }
        },
        None => None,
    };

    let history = Arc::new(Mutex::new(DeployHistory::load(&config.history_path)));
    info!(
        records = history.lock().len(),
        path = %config.history_path.display(),
        "deploy history loaded"
    );

    let fleet = match load_fleet(&config.fleet_sources) {
        Ok(fleet) => fleet,
        Err(e) => {
            warn!(error = %e, "fleet config unreadable, starting with an empty fleet");
            Vec::new()
        }
    };

    let idle = Arc::new(IdleController::new(
        cloud.clone(),
        workers.clone(),
        SystemClock,
        config.idle.clone(),
    ));
    idle.init(&fleet).await;

    let bus = Arc::new(LogBus::new());
    let marker = Arc::new(DeployMarker::new());
    let orchestrator = Arc::new(Orchestrator::new(
        engine.clone(),
        cloud.clone(),
        workers.clone(),
        bus.clone(),
        marker.clone(),
        OrchestratorConfig::new(config.services.clone()),
        SystemClock,
    ));

    let state = Arc::new(AppState {
        secret: config.secret.clone(),
        allowed_origins: config.allowed_origins.clone(),
        idle: idle.clone(),
        history,
        bus,
        engine,
        cloud,
        workers,
        secrets,
        spawner,
        fleet: Mutex::new(fleet),
        fleet_sources: config.fleet_sources.clone(),
        marker,
        orchestrator,
        drain_config: config.drain.clone(),
        app_base_url: config.app_base_url.clone(),
        cleanup_script: config.cleanup_script.clone(),
        start_time: Instant::now(),
        clock: SystemClock,
    });

    let cancel = CancellationToken::new();
    let ticker = idle.spawn_ticker(cancel.clone());
    Ok(Daemon { state, cancel, ticker })
}
