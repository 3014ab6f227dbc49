// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Fleet idle controller.
//!
//! Owns the per-worker state map and the background tick that polls worker
//! health and shuts down instances that have been idle past the timeout,
//! never dropping below the configured running floor. Wake and stop entry
//! points for the HTTP handlers live in [`flows`].
//!
//! Locking discipline: take the state lock, snapshot what the next network
//! call needs, release, then await. Nothing holds the lock across I/O.

mod flows;

pub use flows::{StopOutcome, WakeOutcome};

use ghfleet_adapters::{CloudCompute, CloudError, WorkerClient};
use ghfleet_core::{Clock, FleetEntry, SystemClock, WorkerPhase, WorkerState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Controller with production clock; what the daemon wires up.
pub type FleetIdleController = IdleController<SystemClock>;

#[derive(Debug, Clone)]
pub struct IdleConfig {
    /// How long a worker must sit at zero active jobs before it is eligible
    /// for shutdown.
    pub idle_timeout: Duration,
    /// Floor of running workers the controller will not go below.
    pub min_running: usize,
    pub poll_interval: Duration,
    pub worker_port: u16,
    pub wake_poll_interval: Duration,
    pub wake_timeout: Duration,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
            min_running: 1,
            poll_interval: Duration::from_secs(60),
            worker_port: 8081,
            wake_poll_interval: Duration::from_secs(5),
            wake_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Error)]
pub enum IdleError {
    #[error("unknown server id: {0}")]
    UnknownServer(String),
    #[error("no instance id known for {0}")]
    NoInstanceId(String),
    #[error("instance is stopping; retry once it reaches stopped")]
    StoppingInProgress,
    #[error("instance already {0}")]
    AlreadyStopped(WorkerPhase),
    #[error("worker has {0} active jobs")]
    ActiveJobs(u32),
    #[error(transparent)]
    Cloud(#[from] CloudError),
}

/// Shutdown candidate snapshotted out of the state lock.
struct Candidate {
    server_id: String,
    instance_id: String,
    last_active: Instant,
    asg_name: Option<String>,
    in_standby: bool,
}

pub struct IdleController<C: Clock = SystemClock> {
    cloud: Arc<dyn CloudCompute>,
    workers: Arc<dyn WorkerClient>,
    clock: C,
    config: IdleConfig,
    /// Insertion order is fleet order; ties in idle-candidate sorting stay
    /// stable because of it.
    states: Mutex<Vec<WorkerState>>,
    tick_gate: tokio::sync::Mutex<()>,
}

impl<C: Clock> IdleController<C> {
    pub fn new(
        cloud: Arc<dyn CloudCompute>,
        workers: Arc<dyn WorkerClient>,
        clock: C,
        config: IdleConfig,
    ) -> Self {
        Self {
            cloud,
            workers,
            clock,
            config,
            states: Mutex::new(Vec::new()),
            tick_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &IdleConfig {
        &self.config
    }

    /// Seed worker states from a fleet snapshot: resolve unknown instance
    /// ids by public IP in one batch, then record ASG membership for every
    /// resolved instance.
    pub async fn init(&self, fleet: &[FleetEntry]) {
        let now = self.clock.now();
        {
            let mut states = self.states.lock();
            states.clear();
            for entry in fleet.iter().filter(|e| e.is_worker()) {
                let mut state = WorkerState::new(&entry.id, &entry.ip, now);
                state.instance_id = entry.instance_id.clone();
                states.push(state);
            }
        }

        let unresolved: Vec<String> = {
            let states = self.states.lock();
            states
                .iter()
                .filter(|s| s.instance_id.is_none())
                .map(|s| s.public_ip.clone())
                .collect()
        };
        if !unresolved.is_empty() {
            match self.cloud.describe_by_ip(&unresolved).await {
                Ok(rows) => {
                    let mut states = self.states.lock();
                    for row in rows {
                        if let Some(state) =
                            states.iter_mut().find(|s| s.public_ip == row.public_ip)
                        {
                            state.instance_id = Some(row.instance_id);
                            state.phase = row.state;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "instance resolution by IP failed"),
            }
        }

        let resolved: Vec<(String, String)> = {
            let states = self.states.lock();
            states
                .iter()
                .filter_map(|s| Some((s.server_id.clone(), s.instance_id.clone()?)))
                .collect()
        };
        for (server_id, instance_id) in resolved {
            match self.cloud.asg_membership(&instance_id).await {
                Ok(membership) => {
                    let standby = membership.in_standby();
                    self.with_worker(&server_id, |s| {
                        s.asg_name = membership.asg_name.clone();
                        if standby {
                            s.in_standby = true;
                            s.phase = WorkerPhase::Standby;
                        }
                    });
                }
                Err(e) => {
                    warn!(worker = %server_id, error = %e, "ASG membership lookup failed")
                }
            }
        }

        info!(workers = self.states.lock().len(), "idle controller initialized");
    }

    /// Run the recurring tick until cancelled. A fire that lands while the
    /// previous tick is still running is skipped, not queued.
    pub fn spawn_ticker(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("idle ticker stopped");
                        break;
                    }
                    _ = interval.tick() => self.tick().await,
                }
            }
        })
    }

    /// One poll-then-evaluate pass. Ticks never overlap.
    pub async fn tick(&self) {
        let Ok(_gate) = self.tick_gate.try_lock() else {
            debug!("previous tick still running, skipping");
            return;
        };
        self.poll_worker_health().await;
        self.evaluate_idle_workers().await;
    }

    async fn poll_worker_health(&self) {
        let targets: Vec<(String, String, Option<String>)> = {
            let states = self.states.lock();
            states
                .iter()
                .filter(|s| !s.phase.skips_health_poll())
                .map(|s| (s.server_id.clone(), s.public_ip.clone(), s.instance_id.clone()))
                .collect()
        };

        for (server_id, ip, instance_id) in targets {
            match self.workers.health(&ip, self.config.worker_port).await {
                Ok(health) => {
                    let now = self.clock.now();
                    self.with_worker(&server_id, |s| {
                        s.active_jobs = health.active_jobs;
                        s.phase = WorkerPhase::Running;
                        if health.active_jobs > 0 {
                            s.last_active = now;
                        }
                    });
                }
                Err(e) => {
                    debug!(worker = %server_id, error = %e, "health poll failed, reconciling");
                    match instance_id {
                        Some(instance_id) => match self.cloud.describe_instance(&instance_id).await
                        {
                            Ok(view) => {
                                self.with_worker(&server_id, |s| {
                                    s.phase = view.state;
                                    if let Some(ip) = &view.public_ip {
                                        if *ip != s.public_ip {
                                            info!(worker = %s.server_id, ip = %ip, "public IP changed");
                                            s.public_ip = ip.clone();
                                        }
                                    }
                                });
                            }
                            Err(e) => {
                                warn!(worker = %server_id, error = %e, "instance reconcile failed")
                            }
                        },
                        None => {
                            self.with_worker(&server_id, |s| s.phase = WorkerPhase::Unknown);
                        }
                    }
                }
            }
        }
    }

    async fn evaluate_idle_workers(&self) {
        let now = self.clock.now();
        let (running_count, mut candidates) = {
            let states = self.states.lock();
            let mut running = 0usize;
            let mut candidates = Vec::new();
            for s in states.iter() {
                if matches!(s.phase, WorkerPhase::Running | WorkerPhase::Pending) {
                    running += 1;
                }
                let Some(instance_id) = &s.instance_id else { continue };
                if s.phase == WorkerPhase::Running
                    && !s.transitioning
                    && s.active_jobs == 0
                    && now.duration_since(s.last_active) > self.config.idle_timeout
                {
                    candidates.push(Candidate {
                        server_id: s.server_id.clone(),
                        instance_id: instance_id.clone(),
                        last_active: s.last_active,
                        asg_name: s.asg_name.clone(),
                        in_standby: s.in_standby,
                    });
                }
            }
            (running, candidates)
        };

        // Longest idle first; stable sort keeps fleet order on ties.
        candidates.sort_by_key(|c| c.last_active);
        let can_stop = running_count.saturating_sub(self.config.min_running);
        if can_stop == 0 && !candidates.is_empty() {
            debug!(
                candidates = candidates.len(),
                min_running = self.config.min_running,
                "idle workers held at the running floor"
            );
        }

        for candidate in candidates.into_iter().take(can_stop) {
            self.shut_down_idle(candidate).await;
        }
    }

    async fn shut_down_idle(&self, candidate: Candidate) {
        let Candidate { server_id, instance_id, asg_name, in_standby, .. } = candidate;
        info!(worker = %server_id, instance = %instance_id, "stopping idle worker");
        self.mark_transitioning(&server_id, true);

        if let Some(asg) = &asg_name {
            if !in_standby {
                if let Err(e) = self.cloud.enter_standby(&instance_id, asg).await {
                    warn!(worker = %server_id, error = %e, "enter-standby failed, skipping shutdown");
                    self.mark_transitioning(&server_id, false);
                    return;
                }
                self.with_worker(&server_id, |s| s.in_standby = true);
            }
        }

        match self.cloud.stop_instance(&instance_id).await {
            Ok(()) => {
                self.with_worker(&server_id, |s| s.phase = WorkerPhase::Stopping);
            }
            Err(e) => warn!(worker = %server_id, error = %e, "stop-instance failed"),
        }
        self.mark_transitioning(&server_id, false);
    }

    // ---- public operations for request handlers ----

    /// Reset a worker's idle timer to now. Returns false for unknown ids.
    pub fn mark_active(&self, server_id: &str) -> bool {
        let now = self.clock.now();
        self.with_worker(server_id, |s| s.last_active = now).is_some()
    }

    /// Idempotent set/clear of the per-worker transition flag.
    pub fn mark_transitioning(&self, server_id: &str, transitioning: bool) -> bool {
        self.with_worker(server_id, |s| s.transitioning = transitioning).is_some()
    }

    /// Record a post-wake/post-stop cloud observation.
    pub fn update_worker_ec2(&self, server_id: &str, phase: WorkerPhase, ip: Option<String>) {
        self.with_worker(server_id, |s| {
            s.phase = phase;
            if let Some(ip) = ip {
                s.public_ip = ip;
            }
        });
    }

    /// Snapshot of every worker state, in fleet order.
    pub fn get_states(&self) -> Vec<WorkerState> {
        self.states.lock().clone()
    }

    /// Count of workers in running or pending phase.
    pub fn running_count(&self) -> usize {
        self.states
            .lock()
            .iter()
            .filter(|s| matches!(s.phase, WorkerPhase::Running | WorkerPhase::Pending))
            .count()
    }

    pub fn worker_port(&self) -> u16 {
        self.config.worker_port
    }

    pub(crate) fn clock_now(&self) -> Instant {
        self.clock.now()
    }

    fn with_worker<T>(&self, server_id: &str, f: impl FnOnce(&mut WorkerState) -> T) -> Option<T> {
        let mut states = self.states.lock();
        states.iter_mut().find(|s| s.server_id == server_id).map(f)
    }

    fn worker_snapshot(&self, server_id: &str) -> Option<WorkerState> {
        self.states.lock().iter().find(|s| s.server_id == server_id).cloned()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
