// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Wake and stop flows invoked from the fleet HTTP handlers.

use super::{IdleController, IdleError};
use ghfleet_core::{Clock, WorkerPhase};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeOutcome {
    /// Instance already running; health was probed once either way.
    AlreadyRunning { public_ip: String },
    /// Another wake/stop holds the transition flag.
    WakingInProgress,
    /// Instance running and the worker answered its health check.
    Started { public_ip: String },
    /// Instance running but the worker never turned healthy in time.
    StartedUnhealthy { public_ip: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopping,
    /// Another wake/stop holds the transition flag.
    StopInProgress,
}

impl<C: Clock> IdleController<C> {
    /// Wake one stopped worker and wait for it to come up healthy.
    pub async fn wake(&self, server_id: &str) -> Result<WakeOutcome, IdleError> {
        let state = self
            .worker_snapshot(server_id)
            .ok_or_else(|| IdleError::UnknownServer(server_id.to_string()))?;
        if state.transitioning {
            return Ok(WakeOutcome::WakingInProgress);
        }
        let instance_id =
            state.instance_id.clone().ok_or_else(|| IdleError::NoInstanceId(server_id.to_string()))?;

        let view = self.cloud.describe_instance(&instance_id).await?;
        match view.state {
            WorkerPhase::Running => {
                let ip = view.public_ip.unwrap_or(state.public_ip);
                // Single probe; already-running is the answer regardless.
                let _ = self.workers.health(&ip, self.config.worker_port).await;
                self.update_worker_ec2(server_id, WorkerPhase::Running, Some(ip.clone()));
                return Ok(WakeOutcome::AlreadyRunning { public_ip: ip });
            }
            WorkerPhase::Stopping => return Err(IdleError::StoppingInProgress),
            _ => {}
        }

        self.mark_transitioning(server_id, true);
        if let Err(e) = self.cloud.start_instance(&instance_id).await {
            self.mark_transitioning(server_id, false);
            return Err(e.into());
        }
        self.update_worker_ec2(server_id, WorkerPhase::Pending, None);
        self.mark_active(server_id);
        info!(worker = server_id, instance = %instance_id, "instance start requested");

        let deadline = self.clock_now() + self.config.wake_timeout;
        let mut public_ip = state.public_ip.clone();
        let mut healthy = false;
        while self.clock_now() < deadline {
            tokio::time::sleep(self.config.wake_poll_interval).await;
            let view = match self.cloud.describe_instance(&instance_id).await {
                Ok(view) => view,
                Err(e) => {
                    warn!(worker = server_id, error = %e, "describe during wake failed");
                    continue;
                }
            };
            if let Some(ip) = &view.public_ip {
                if *ip != public_ip {
                    info!(worker = server_id, ip = %ip, "public IP changed during wake");
                    public_ip = ip.clone();
                }
            }
            self.update_worker_ec2(server_id, view.state, Some(public_ip.clone()));
            if view.state == WorkerPhase::Running
                && self.workers.health(&public_ip, self.config.worker_port).await.is_ok()
            {
                healthy = true;
                break;
            }
        }

        if state.in_standby {
            if let Some(asg) = &state.asg_name {
                match self.cloud.exit_standby(&instance_id, asg).await {
                    Ok(()) => {
                        self.with_worker(server_id, |s| s.in_standby = false);
                    }
                    Err(e) => warn!(worker = server_id, error = %e, "exit-standby failed"),
                }
            }
        }

        self.mark_transitioning(server_id, false);
        if healthy {
            self.mark_active(server_id);
            Ok(WakeOutcome::Started { public_ip })
        } else {
            Ok(WakeOutcome::StartedUnhealthy { public_ip })
        }
    }

    /// Stop one worker, entering ASG standby first when managed.
    pub async fn stop(&self, server_id: &str) -> Result<StopOutcome, IdleError> {
        let state = self
            .worker_snapshot(server_id)
            .ok_or_else(|| IdleError::UnknownServer(server_id.to_string()))?;
        if state.transitioning {
            return Ok(StopOutcome::StopInProgress);
        }
        let instance_id =
            state.instance_id.clone().ok_or_else(|| IdleError::NoInstanceId(server_id.to_string()))?;

        if matches!(state.phase, WorkerPhase::Stopped | WorkerPhase::Stopping) {
            return Err(IdleError::AlreadyStopped(state.phase));
        }
        if state.active_jobs > 0 {
            return Err(IdleError::ActiveJobs(state.active_jobs));
        }
        // A live probe beats possibly-stale polled state.
        if let Ok(health) = self.workers.health(&state.public_ip, self.config.worker_port).await {
            if health.active_jobs > 0 {
                let now = self.clock_now();
                self.with_worker(server_id, |s| {
                    s.active_jobs = health.active_jobs;
                    s.last_active = now;
                });
                return Err(IdleError::ActiveJobs(health.active_jobs));
            }
        }

        self.mark_transitioning(server_id, true);
        if let Some(asg) = &state.asg_name {
            if !state.in_standby {
                if let Err(e) = self.cloud.enter_standby(&instance_id, asg).await {
                    self.mark_transitioning(server_id, false);
                    return Err(e.into());
                }
                self.with_worker(server_id, |s| s.in_standby = true);
            }
        }

        match self.cloud.stop_instance(&instance_id).await {
            Ok(()) => {
                self.update_worker_ec2(server_id, WorkerPhase::Stopping, None);
            }
            Err(e) => {
                self.mark_transitioning(server_id, false);
                return Err(e.into());
            }
        }
        self.mark_transitioning(server_id, false);
        info!(worker = server_id, instance = %instance_id, "instance stop requested");
        Ok(StopOutcome::Stopping)
    }
}

#[cfg(test)]
#[path = "flows_tests.rs"]
mod tests;
