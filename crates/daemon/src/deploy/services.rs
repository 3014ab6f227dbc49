// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Materializes service definitions for a deploy.
//!
//! One image serves every container; the command decides the role. Workers
//! stop before the app (stop_order) and start after it (start_order), and
//! the control plane's own container is marked skip-on-self-update so a
//! deploy never kills the process driving it.

use ghfleet_core::service::{ServiceDefinition, WORKER_INDEX_LABEL};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServicesConfig {
    pub registry_server: String,
    pub repository: String,
    pub environment: String,
    /// Local worker containers per host.
    pub worker_count: usize,
    /// First worker port; worker `i` listens on `worker_port + i`.
    pub worker_port: u16,
    pub app_port: u16,
}

pub fn service_definitions(cfg: &ServicesConfig, image_tag: &str) -> Vec<ServiceDefinition> {
    let image = format!("{}/{}:{}", cfg.registry_server, cfg.repository, image_tag);
    let mut services = Vec::with_capacity(cfg.worker_count + 2);

    let mut app = ServiceDefinition::new("gh-app", image.clone());
    app.command = vec!["serve".to_string()];
    app.env.insert("GH_ENVIRONMENT".to_string(), cfg.environment.clone());
    app.env.insert("PORT".to_string(), cfg.app_port.to_string());
    app.health_url = Some(format!("http://127.0.0.1:{}/health", cfg.app_port));
    app.health_timeout = Duration::from_secs(120);
    app.start_order = 1;
    app.stop_order = 2;
    services.push(app);

    for index in 0..cfg.worker_count {
        let port = cfg.worker_port + index as u16;
        let mut worker = ServiceDefinition::new(format!("gh-worker-{}", index), image.clone());
        worker.command = vec!["worker".to_string()];
        worker.env.insert("GH_ENVIRONMENT".to_string(), cfg.environment.clone());
        worker.env.insert("WORKER_PORT".to_string(), port.to_string());
        worker.labels.insert(WORKER_INDEX_LABEL.to_string(), index.to_string());
        worker.health_url = Some(format!("http://127.0.0.1:{}/worker/health", port));
        worker.health_timeout = Duration::from_secs(90);
        worker.drain_url = Some(format!("http://127.0.0.1:{}/worker/drain", port));
        worker.drain_timeout = Duration::from_secs(30);
        worker.start_order = 2;
        worker.stop_order = 1;
        services.push(worker);
    }

    let mut control_plane = ServiceDefinition::new("ghfleetd", image);
    control_plane.command = vec!["fleetd".to_string()];
    control_plane.skip_on_self_update = true;
    control_plane.start_order = 3;
    control_plane.stop_order = 3;
    services.push(control_plane);

    services
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
