// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Pre-deploy drain coordinator.
//!
//! Fan out to every worker, ask the busy ones to drain, then poll until the
//! fleet is quiet or the budget runs out. Unreachable workers are treated as
//! idle during the initial check and as drained during the poll phase: a
//! worker we cannot see is not doing work we can wait for.
//!
//! Stateless across calls; safe for concurrent callers with disjoint
//! snapshots.

use ghfleet_adapters::WorkerClient;
use ghfleet_core::{worker_ips, FleetEntry};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Total budget for the whole drain.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Error)]
pub enum DrainError {
    #[error("{0}")]
    Timeout(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainStatus {
    Idle,
    Draining,
    DrainRequested,
    Drained,
    Unreachable,
}

/// One progress event; `/drain/graceful` streams these as SSE frames.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainProgress {
    pub worker: String,
    pub active_jobs: u32,
    pub status: DrainStatus,
}

impl DrainProgress {
    /// Human-readable log line for the deploy log.
    pub fn to_line(&self) -> String {
        match self.status {
            DrainStatus::Idle => format!("worker {} idle", self.worker),
            DrainStatus::Draining => {
                format!("worker {} draining ({} active jobs)", self.worker, self.active_jobs)
            }
            DrainStatus::DrainRequested => format!("Drain requested for {}", self.worker),
            DrainStatus::Drained => format!("worker {} drained (active_jobs=0)", self.worker),
            DrainStatus::Unreachable => {
                format!("worker {} unreachable, treating as drained", self.worker)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DrainSummary {
    /// Workers contacted in the initial health pass.
    pub checked: usize,
    /// Workers that reported active jobs and were asked to drain.
    pub drained: Vec<String>,
}

/// Drain every busy worker in the snapshot before a disruptive operation.
pub async fn drain_fleet(
    workers: &dyn WorkerClient,
    fleet: &[FleetEntry],
    worker_port: u16,
    fallback_host: &str,
    config: &DrainConfig,
    on_event: Option<&(dyn Fn(DrainProgress) + Send + Sync)>,
) -> Result<DrainSummary, DrainError> {
    let emit = |progress: DrainProgress| {
        info!("{}", progress.to_line());
        if let Some(on_event) = on_event {
            on_event(progress);
        }
    };

    let mut ips = worker_ips(fleet);
    if ips.is_empty() {
        ips.push(fallback_host.to_string());
    }
    let checked = ips.len();

    let mut busy: Vec<String> = Vec::new();
    for ip in &ips {
        match workers.health(ip, worker_port).await {
            Ok(health) if health.active_jobs > 0 => {
                emit(DrainProgress {
                    worker: ip.clone(),
                    active_jobs: health.active_jobs,
                    status: DrainStatus::Draining,
                });
                busy.push(ip.clone());
            }
            Ok(_) => {
                emit(DrainProgress { worker: ip.clone(), active_jobs: 0, status: DrainStatus::Idle })
            }
            Err(e) => {
                warn!(worker = %ip, error = %e, "health check failed, treating as idle");
                emit(DrainProgress {
                    worker: ip.clone(),
                    active_jobs: 0,
                    status: DrainStatus::Unreachable,
                });
            }
        }
    }

    if busy.is_empty() {
        return Ok(DrainSummary { checked, drained: Vec::new() });
    }

    for ip in &busy {
        match workers.drain(ip, worker_port).await {
            Ok(()) => emit(DrainProgress {
                worker: ip.clone(),
                active_jobs: 0,
                status: DrainStatus::DrainRequested,
            }),
            // A failed drain request does not abort; the poll decides.
            Err(e) => warn!(worker = %ip, error = %e, "drain request failed"),
        }
    }

    let deadline = Instant::now() + config.timeout;
    let mut remaining = busy.clone();
    loop {
        let mut still_busy = Vec::new();
        for ip in remaining {
            match workers.status(&ip, worker_port).await {
                Ok(health) if health.active_jobs == 0 => {
                    emit(DrainProgress {
                        worker: ip.clone(),
                        active_jobs: 0,
                        status: DrainStatus::Drained,
                    });
                }
                Ok(health) => {
                    still_busy.push(ip.clone());
                    emit(DrainProgress {
                        worker: ip,
                        active_jobs: health.active_jobs,
                        status: DrainStatus::Draining,
                    });
                }
                Err(e) => {
                    warn!(worker = %ip, error = %e, "status poll failed, treating as drained");
                    emit(DrainProgress {
                        worker: ip,
                        active_jobs: 0,
                        status: DrainStatus::Unreachable,
                    });
                }
            }
        }

        if still_busy.is_empty() {
            return Ok(DrainSummary { checked, drained: busy });
        }
        if Instant::now() >= deadline {
            return Err(DrainError::Timeout(format!(
                "drain timed out after {:?}; still busy: {}; retry with ?force=true to bypass",
                config.timeout,
                still_busy.join(", ")
            )));
        }
        remaining = still_busy;
        tokio::time::sleep(config.poll_interval).await;
    }
}

#[cfg(test)]
#[path = "drain_tests.rs"]
mod tests;
