// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Shared daemon context handed to every request handler.

use crate::bus::LogBus;
use crate::deploy::{DeployMarker, DrainConfig, Orchestrator};
use crate::fleet::FleetSources;
use crate::idle::FleetIdleController;
use ghfleet_adapters::{CloudCompute, ContainerEngine, SecretsBackend, Spawner, WorkerClient};
use ghfleet_core::{FleetEntry, SystemClock};
use ghfleet_store::DeployHistory;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    /// Shared deploy secret for `X-Deploy-Secret`.
    pub secret: String,
    pub allowed_origins: Vec<String>,
    pub idle: Arc<FleetIdleController>,
    pub history: Arc<Mutex<DeployHistory>>,
    pub bus: Arc<LogBus>,
    pub engine: Arc<dyn ContainerEngine>,
    pub cloud: Arc<dyn CloudCompute>,
    pub workers: Arc<dyn WorkerClient>,
    pub secrets: Option<Arc<dyn SecretsBackend>>,
    pub spawner: Arc<dyn Spawner>,
    /// Reloadable fleet snapshot; `/fleet/reload` swaps it.
    pub fleet: Mutex<Vec<FleetEntry>>,
    pub fleet_sources: FleetSources,
    pub marker: Arc<DeployMarker>,
    pub orchestrator: Arc<Orchestrator<SystemClock>>,
    pub drain_config: DrainConfig,
    pub app_base_url: String,
    pub cleanup_script: PathBuf,
    pub start_time: Instant,
    pub clock: SystemClock,
}
