// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Rolling-deploy orchestrator.
//!
//! Step order: ecr-auth, pull-image, load-configs, stop-services,
//! start-services, prune-images. A failure short-circuits and is tagged
//! with the step and (where it applies) the service; prune never fails the
//! deploy. Every line of progress goes through the log bus.

use super::rollback::DeployExecutor;
use super::services::{service_definitions, ServicesConfig};
use super::DeployMarker;
use crate::bus::LogBus;
use async_trait::async_trait;
use ghfleet_adapters::{
    CloudCompute, ContainerEngine, CreateSpec, RegistryAuth, WorkerClient,
};
use ghfleet_core::{Clock, ServiceDefinition, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const STEP_ECR_AUTH: &str = "ecr-auth";
pub const STEP_PULL_IMAGE: &str = "pull-image";
pub const STEP_LOAD_CONFIGS: &str = "load-configs";
pub const STEP_STOP_SERVICES: &str = "stop-services";
pub const STEP_START_SERVICES: &str = "start-services";
pub const STEP_PRUNE_IMAGES: &str = "prune-images";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySuccess {
    pub duration_ms: u64,
    pub image_tag: String,
    pub bytes_reclaimed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployFailure {
    pub error: String,
    pub failed_step: &'static str,
    pub failed_service: Option<String>,
}

impl DeployFailure {
    /// Error text the deploy record stores.
    pub fn message(&self) -> String {
        match &self.failed_service {
            Some(service) => format!("{} ({}): {}", self.failed_step, service, self.error),
            None => format!("{}: {}", self.failed_step, self.error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub services: ServicesConfig,
    /// Grace given to a container between SIGTERM and SIGKILL.
    pub stop_grace: Duration,
    pub health_poll_interval: Duration,
    pub health_probe_timeout: Duration,
}

impl OrchestratorConfig {
    pub fn new(services: ServicesConfig) -> Self {
        Self {
            services,
            stop_grace: Duration::from_secs(30),
            health_poll_interval: Duration::from_secs(2),
            health_probe_timeout: Duration::from_secs(5),
        }
    }
}

pub struct Orchestrator<C: Clock = SystemClock> {
    engine: Arc<dyn ContainerEngine>,
    cloud: Arc<dyn CloudCompute>,
    workers: Arc<dyn WorkerClient>,
    bus: Arc<LogBus>,
    marker: Arc<DeployMarker>,
    config: OrchestratorConfig,
    clock: C,
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        cloud: Arc<dyn CloudCompute>,
        workers: Arc<dyn WorkerClient>,
        bus: Arc<LogBus>,
        marker: Arc<DeployMarker>,
        config: OrchestratorConfig,
        clock: C,
    ) -> Self {
        Self { engine, cloud, workers, bus, marker, config, clock }
    }

    /// Run one rolling deploy of `image_tag`. The caller owns the
    /// single-flight marker; this only updates its step field.
    pub async fn execute(&self, image_tag: &str) -> Result<DeploySuccess, DeployFailure> {
        let started_ms = self.clock.epoch_ms();
        info!(image_tag, "deploy started");

        self.step(STEP_ECR_AUTH);
        let token = self
            .cloud
            .registry_token()
            .await
            .map_err(|e| self.fail(STEP_ECR_AUTH, None, e.to_string()))?;
        let auth = RegistryAuth {
            username: "AWS".to_string(),
            password: token,
            server: self.config.services.registry_server.clone(),
        };

        self.step(STEP_PULL_IMAGE);
        let repo = format!(
            "{}/{}",
            self.config.services.registry_server, self.config.services.repository
        );
        self.bus.line(&format!("pulling {}:{}", repo, image_tag));
        self.engine
            .pull(&repo, image_tag, Some(&auth))
            .await
            .map_err(|e| self.fail(STEP_PULL_IMAGE, None, e.to_string()))?;

        self.step(STEP_LOAD_CONFIGS);
        let services = service_definitions(&self.config.services, image_tag);
        self.bus.line(&format!("loaded {} service definitions", services.len()));

        self.step(STEP_STOP_SERVICES);
        self.stop_services(&services).await?;

        self.step(STEP_START_SERVICES);
        self.start_services(&services).await?;

        self.step(STEP_PRUNE_IMAGES);
        let bytes_reclaimed = match self.engine.prune_images().await {
            Ok(bytes) => {
                self.bus.line(&format!("pruned dangling images, reclaimed {} bytes", bytes));
                bytes
            }
            Err(e) => {
                // Reclaiming space is best-effort and never fails the deploy.
                warn!(error = %e, "image prune failed");
                self.bus.line(&format!("image prune failed: {}", e));
                0
            }
        };

        let duration_ms = self.clock.epoch_ms().saturating_sub(started_ms);
        info!(image_tag, duration_ms, "deploy completed");
        Ok(DeploySuccess { duration_ms, image_tag: image_tag.to_string(), bytes_reclaimed })
    }

    async fn stop_services(&self, services: &[ServiceDefinition]) -> Result<(), DeployFailure> {
        let containers = self
            .engine
            .list(true)
            .await
            .map_err(|e| self.fail(STEP_STOP_SERVICES, None, e.to_string()))?;

        let mut ordered: Vec<&ServiceDefinition> = services.iter().collect();
        ordered.sort_by_key(|s| s.stop_order);

        for service in ordered {
            if service.skip_on_self_update {
                self.bus.line(&format!("skipping {} (self-update)", service.name));
                continue;
            }
            for container in containers.iter().filter(|c| service.matches_container(&c.name)) {
                if container.running {
                    if let Some(drain_url) = &service.drain_url {
                        self.bus.line(&format!("draining {}", container.name));
                        if let Err(e) =
                            self.workers.post_url(drain_url, service.drain_timeout).await
                        {
                            // Pre-stop drain is advisory.
                            warn!(container = %container.name, error = %e, "drain before stop failed");
                        }
                    }
                    self.bus.line(&format!("stopping {}", container.name));
                    self.engine.stop(&container.id, self.config.stop_grace).await.map_err(
                        |e| {
                            self.fail(
                                STEP_STOP_SERVICES,
                                Some(&service.name),
                                e.to_string(),
                            )
                        },
                    )?;
                }
                self.bus.line(&format!("removing {}", container.name));
                self.engine
                    .remove(&container.id)
                    .await
                    .map_err(|e| self.fail(STEP_STOP_SERVICES, Some(&service.name), e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn start_services(&self, services: &[ServiceDefinition]) -> Result<(), DeployFailure> {
        let mut ordered: Vec<&ServiceDefinition> =
            services.iter().filter(|s| !s.skip_on_self_update).collect();
        ordered.sort_by_key(|s| s.start_order);

        for service in ordered {
            self.bus.line(&format!("starting {}", service.name));
            let spec = create_spec(service);
            let id = self
                .engine
                .create(&service.name, &spec)
                .await
                .map_err(|e| self.fail(STEP_START_SERVICES, Some(&service.name), e.to_string()))?;
            self.engine
                .start(&id)
                .await
                .map_err(|e| self.fail(STEP_START_SERVICES, Some(&service.name), e.to_string()))?;

            if let Some(health_url) = &service.health_url {
                self.await_healthy(service, health_url).await?;
                self.bus.line(&format!("{} healthy", service.name));
            }
        }
        Ok(())
    }

    /// Poll the health URL until HTTP 200 or the service's health budget
    /// runs out.
    async fn await_healthy(
        &self,
        service: &ServiceDefinition,
        health_url: &str,
    ) -> Result<(), DeployFailure> {
        let deadline = self.clock.now() + service.health_timeout;
        loop {
            match self.workers.get_url(health_url, self.config.health_probe_timeout).await {
                Ok(200) => return Ok(()),
                Ok(status) => {
                    warn!(service = %service.name, status, "health probe not ready")
                }
                Err(e) => warn!(service = %service.name, error = %e, "health probe failed"),
            }
            if self.clock.now() >= deadline {
                return Err(self.fail(
                    STEP_START_SERVICES,
                    Some(&service.name),
                    format!("not healthy within {:?}", service.health_timeout),
                ));
            }
            tokio::time::sleep(self.config.health_poll_interval).await;
        }
    }

    fn step(&self, step: &'static str) {
        self.marker.set_step(step);
        self.bus.line(&format!("[{}]", step));
    }

    fn fail(&self, step: &'static str, service: Option<&str>, error: String) -> DeployFailure {
        let failure = DeployFailure {
            error,
            failed_step: step,
            failed_service: service.map(str::to_string),
        };
        warn!(step, service = service.unwrap_or("-"), error = %failure.error, "deploy step failed");
        self.bus.line(&format!("deploy failed: {}", failure.message()));
        failure
    }
}

#[async_trait]
impl<C: Clock> DeployExecutor for Orchestrator<C> {
    async fn run(&self, image_tag: &str) -> Result<DeploySuccess, DeployFailure> {
        self.execute(image_tag).await
    }
}

fn create_spec(service: &ServiceDefinition) -> CreateSpec {
    CreateSpec {
        image: service.image.clone(),
        command: service.command.clone(),
        env: service.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
        labels: service.labels.clone(),
        host_network: service.host_network,
        restart_policy: service.restart_policy.clone(),
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
