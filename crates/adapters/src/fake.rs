// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! In-memory fakes for every adapter trait.
//!
//! Scripted queues are "sticky last": once a queue is down to one reply it
//! keeps returning it, so a test can script `stopped, pending, running` and
//! let the controller poll `running` as long as it likes.

use crate::cloud::{AsgMembership, CloudCompute, CloudDispatch, CloudError, InstanceView, IpLookup};
use crate::engine::{ContainerEngine, ContainerSummary, CreateSpec, EngineError, RegistryAuth};
use crate::secrets::{SecretsBackend, SecretsError, SecretsStatus};
use crate::spawn::{SpawnError, SpawnOutput, Spawner};
use crate::worker::{WorkerClient, WorkerError, WorkerHealth};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

fn pop_sticky<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    match queue.len() {
        0 => None,
        1 => queue.front().cloned(),
        _ => queue.pop_front(),
    }
}

// ---------------------------------------------------------------------------
// Cloud

/// Scripted [`CloudDispatch`] returning queued stdout blobs in call order.
#[derive(Default)]
pub struct FakeDispatch {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, stdout: impl Into<String>) {
        self.responses.lock().push_back(Ok(stdout.into()));
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.responses.lock().push_back(Err(message.into()));
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CloudDispatch for FakeDispatch {
    async fn run(&self, service: &str, args: &[String]) -> Result<String, CloudError> {
        self.calls.lock().push((service.to_string(), args.to_vec()));
        let op = args.first().cloned().unwrap_or_default();
        match self.responses.lock().pop_front() {
            Some(Ok(stdout)) => Ok(stdout),
            Some(Err(message)) => Err(CloudError::Api { op, message }),
            None => Err(CloudError::Api { op, message: "no scripted response".to_string() }),
        }
    }
}

/// Scripted [`CloudCompute`] for controller tests.
#[derive(Default)]
pub struct FakeCloud {
    describes: Mutex<HashMap<String, VecDeque<InstanceView>>>,
    ip_lookups: Mutex<Vec<IpLookup>>,
    memberships: Mutex<HashMap<String, AsgMembership>>,
    started: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
    standby_entered: Mutex<Vec<(String, String)>>,
    standby_exited: Mutex<Vec<(String, String)>>,
    fail_enter_standby: Mutex<bool>,
    fail_stop: Mutex<bool>,
    fail_registry_token: Mutex<bool>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a describe result for an instance (sticky last).
    pub fn push_describe(&self, id: &str, view: InstanceView) {
        self.describes.lock().entry(id.to_string()).or_default().push_back(view);
    }

    pub fn set_ip_lookups(&self, rows: Vec<IpLookup>) {
        *self.ip_lookups.lock() = rows;
    }

    pub fn set_membership(&self, id: &str, membership: AsgMembership) {
        self.memberships.lock().insert(id.to_string(), membership);
    }

    pub fn fail_enter_standby(&self, fail: bool) {
        *self.fail_enter_standby.lock() = fail;
    }

    pub fn fail_stop(&self, fail: bool) {
        *self.fail_stop.lock() = fail;
    }

    pub fn fail_registry_token(&self, fail: bool) {
        *self.fail_registry_token.lock() = fail;
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().clone()
    }

    pub fn standby_entered(&self) -> Vec<(String, String)> {
        self.standby_entered.lock().clone()
    }

    pub fn standby_exited(&self) -> Vec<(String, String)> {
        self.standby_exited.lock().clone()
    }
}

#[async_trait]
impl CloudCompute for FakeCloud {
    async fn start_instance(&self, id: &str) -> Result<(), CloudError> {
        self.started.lock().push(id.to_string());
        Ok(())
    }

    async fn stop_instance(&self, id: &str) -> Result<(), CloudError> {
        if *self.fail_stop.lock() {
            return Err(CloudError::Api {
                op: "stop-instances".to_string(),
                message: "scripted stop failure".to_string(),
            });
        }
        self.stopped.lock().push(id.to_string());
        Ok(())
    }

    async fn describe_instance(&self, id: &str) -> Result<InstanceView, CloudError> {
        let mut describes = self.describes.lock();
        match describes.get_mut(id).and_then(pop_sticky) {
            Some(view) => Ok(view),
            None => Err(CloudError::NotFound(id.to_string())),
        }
    }

    async fn describe_by_ip(&self, ips: &[String]) -> Result<Vec<IpLookup>, CloudError> {
        Ok(self
            .ip_lookups
            .lock()
            .iter()
            .filter(|row| ips.contains(&row.public_ip))
            .cloned()
            .collect())
    }

    async fn asg_membership(&self, id: &str) -> Result<AsgMembership, CloudError> {
        Ok(self.memberships.lock().get(id).cloned().unwrap_or_default())
    }

    async fn enter_standby(&self, id: &str, asg: &str) -> Result<(), CloudError> {
        if *self.fail_enter_standby.lock() {
            return Err(CloudError::Api {
                op: "enter-standby".to_string(),
                message: "scripted standby failure".to_string(),
            });
        }
        self.standby_entered.lock().push((id.to_string(), asg.to_string()));
        Ok(())
    }

    async fn exit_standby(&self, id: &str, asg: &str) -> Result<(), CloudError> {
        self.standby_exited.lock().push((id.to_string(), asg.to_string()));
        Ok(())
    }

    async fn registry_token(&self) -> Result<String, CloudError> {
        if *self.fail_registry_token.lock() {
            return Err(CloudError::Api {
                op: "get-login-password".to_string(),
                message: "scripted token failure".to_string(),
            });
        }
        Ok("fake-registry-token".to_string())
    }
}

// ---------------------------------------------------------------------------
// Worker client

type HealthReply = Result<WorkerHealth, String>;

/// Scripted [`WorkerClient`]. Unscripted IPs are unreachable.
#[derive(Default)]
pub struct FakeWorkerClient {
    health: Mutex<HashMap<String, VecDeque<HealthReply>>>,
    status: Mutex<HashMap<String, VecDeque<HealthReply>>>,
    drain_failures: Mutex<HashMap<String, String>>,
    drains: Mutex<Vec<String>>,
    proxy: Mutex<HashMap<String, (u16, String)>>,
    urls: Mutex<HashMap<String, VecDeque<Result<u16, String>>>>,
    url_bodies: Mutex<HashMap<String, (u16, String)>>,
    url_calls: Mutex<Vec<String>>,
}

impl FakeWorkerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_health(&self, ip: &str, active_jobs: u32) {
        self.health
            .lock()
            .entry(ip.to_string())
            .or_default()
            .push_back(Ok(WorkerHealth { active_jobs }));
    }

    pub fn push_health_unreachable(&self, ip: &str) {
        self.health
            .lock()
            .entry(ip.to_string())
            .or_default()
            .push_back(Err("connection refused".to_string()));
    }

    pub fn push_status(&self, ip: &str, active_jobs: u32) {
        self.status
            .lock()
            .entry(ip.to_string())
            .or_default()
            .push_back(Ok(WorkerHealth { active_jobs }));
    }

    pub fn push_status_unreachable(&self, ip: &str) {
        self.status
            .lock()
            .entry(ip.to_string())
            .or_default()
            .push_back(Err("connection refused".to_string()));
    }

    pub fn fail_drain(&self, ip: &str, message: &str) {
        self.drain_failures.lock().insert(ip.to_string(), message.to_string());
    }

    pub fn drains(&self) -> Vec<String> {
        self.drains.lock().clone()
    }

    pub fn set_proxy(&self, ip: &str, path: &str, status: u16, body: &str) {
        self.proxy.lock().insert(format!("{}{}", ip, path), (status, body.to_string()));
    }

    pub fn set_url_body(&self, url: &str, status: u16, body: &str) {
        self.url_bodies.lock().insert(url.to_string(), (status, body.to_string()));
    }

    pub fn push_url_status(&self, url: &str, status: u16) {
        self.urls.lock().entry(url.to_string()).or_default().push_back(Ok(status));
    }

    pub fn push_url_unreachable(&self, url: &str) {
        self.urls
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(Err("connection refused".to_string()));
    }

    pub fn url_calls(&self) -> Vec<String> {
        self.url_calls.lock().clone()
    }

    fn reply(
        map: &Mutex<HashMap<String, VecDeque<HealthReply>>>,
        ip: &str,
    ) -> Result<WorkerHealth, WorkerError> {
        let mut map = map.lock();
        match map.get_mut(ip).and_then(pop_sticky) {
            Some(Ok(health)) => Ok(health),
            Some(Err(message)) => {
                Err(WorkerError::Unreachable { target: ip.to_string(), message })
            }
            None => Err(WorkerError::Unreachable {
                target: ip.to_string(),
                message: "no scripted reply".to_string(),
            }),
        }
    }
}

#[async_trait]
impl WorkerClient for FakeWorkerClient {
    async fn health(&self, ip: &str, _port: u16) -> Result<WorkerHealth, WorkerError> {
        Self::reply(&self.health, ip)
    }

    async fn status(&self, ip: &str, _port: u16) -> Result<WorkerHealth, WorkerError> {
        Self::reply(&self.status, ip)
    }

    async fn drain(&self, ip: &str, _port: u16) -> Result<(), WorkerError> {
        self.drains.lock().push(ip.to_string());
        match self.drain_failures.lock().get(ip) {
            Some(message) => Err(WorkerError::Unreachable {
                target: ip.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn proxy_get(
        &self,
        ip: &str,
        _port: u16,
        path: &str,
    ) -> Result<(u16, String), WorkerError> {
        match self.proxy.lock().get(&format!("{}{}", ip, path)) {
            Some((status, body)) => Ok((*status, body.clone())),
            None => Err(WorkerError::Unreachable {
                target: ip.to_string(),
                message: "no scripted proxy reply".to_string(),
            }),
        }
    }

    async fn get_url(&self, url: &str, _timeout: Duration) -> Result<u16, WorkerError> {
        self.url_calls.lock().push(format!("GET {}", url));
        match self.urls.lock().get_mut(url).and_then(pop_sticky) {
            Some(Ok(status)) => Ok(status),
            Some(Err(message)) => {
                Err(WorkerError::Unreachable { target: url.to_string(), message })
            }
            None => Err(WorkerError::Unreachable {
                target: url.to_string(),
                message: "no scripted reply".to_string(),
            }),
        }
    }

    async fn post_url(&self, url: &str, _timeout: Duration) -> Result<u16, WorkerError> {
        self.url_calls.lock().push(format!("POST {}", url));
        match self.urls.lock().get_mut(url).and_then(pop_sticky) {
            Some(Ok(status)) => Ok(status),
            Some(Err(message)) => {
                Err(WorkerError::Unreachable { target: url.to_string(), message })
            }
            None => Ok(200),
        }
    }

    async fn get_text(&self, url: &str, _timeout: Duration) -> Result<(u16, String), WorkerError> {
        self.url_calls.lock().push(format!("GET {}", url));
        match self.url_bodies.lock().get(url) {
            Some((status, body)) => Ok((*status, body.clone())),
            None => Err(WorkerError::Unreachable {
                target: url.to_string(),
                message: "no scripted reply".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Container engine

/// Recording [`ContainerEngine`] with scripted failures by operation name.
#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<String>>,
    containers: Mutex<Vec<ContainerSummary>>,
    failures: Mutex<HashMap<String, String>>,
    reclaimed: Mutex<u64>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_containers(&self, containers: Vec<ContainerSummary>) {
        *self.containers.lock() = containers;
    }

    /// Make one operation (`pull`, `create`, `start`, `stop`, `remove`,
    /// `list`, `prune`) fail with the given message.
    pub fn fail(&self, op: &str, message: &str) {
        self.failures.lock().insert(op.to_string(), message.to_string());
    }

    pub fn set_reclaimed(&self, bytes: u64) {
        *self.reclaimed.lock() = bytes;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn check(&self, op: &'static str) -> Result<(), EngineError> {
        match self.failures.lock().get(op) {
            Some(message) => Err(EngineError::Api { op: "fake", message: message.clone() }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn pull(
        &self,
        image: &str,
        tag: &str,
        _auth: Option<&RegistryAuth>,
    ) -> Result<(), EngineError> {
        self.calls.lock().push(format!("pull {}:{}", image, tag));
        self.check("pull")
    }

    async fn create(&self, name: &str, spec: &CreateSpec) -> Result<String, EngineError> {
        self.calls.lock().push(format!("create {} {}", name, spec.image));
        self.check("create")?;
        Ok(format!("ctr-{}", name))
    }

    async fn start(&self, id: &str) -> Result<(), EngineError> {
        self.calls.lock().push(format!("start {}", id));
        self.check("start")
    }

    async fn stop(&self, id: &str, grace: Duration) -> Result<(), EngineError> {
        self.calls.lock().push(format!("stop {} grace={}", id, grace.as_secs()));
        self.check("stop")
    }

    async fn remove(&self, id: &str) -> Result<(), EngineError> {
        self.calls.lock().push(format!("remove {}", id));
        self.check("remove")
    }

    async fn list(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
        self.calls.lock().push(format!("list all={}", all));
        self.check("list")?;
        Ok(self.containers.lock().clone())
    }

    async fn prune_images(&self) -> Result<u64, EngineError> {
        self.calls.lock().push("prune".to_string());
        self.check("prune")?;
        Ok(*self.reclaimed.lock())
    }
}

// ---------------------------------------------------------------------------
// Secrets

#[derive(Default)]
pub struct FakeSecrets {
    values: Mutex<HashMap<String, Vec<(String, String)>>>,
    connected: Mutex<bool>,
    refreshes: Mutex<u32>,
}

impl FakeSecrets {
    pub fn new() -> Self {
        let fake = Self::default();
        *fake.connected.lock() = true;
        fake
    }

    pub fn insert(&self, path: &str, key: &str, value: &str) {
        self.values
            .lock()
            .entry(path.to_string())
            .or_default()
            .push((key.to_string(), value.to_string()));
    }

    pub fn set_connected(&self, connected: bool) {
        *self.connected.lock() = connected;
    }

    pub fn refreshes(&self) -> u32 {
        *self.refreshes.lock()
    }
}

#[async_trait]
impl SecretsBackend for FakeSecrets {
    async fn status(&self) -> SecretsStatus {
        if *self.connected.lock() {
            SecretsStatus { connected: true, error: None }
        } else {
            SecretsStatus { connected: false, error: Some("scripted outage".to_string()) }
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, SecretsError> {
        if !*self.connected.lock() {
            return Err(SecretsError::Unavailable("scripted outage".to_string()));
        }
        Ok(self
            .values
            .lock()
            .get(path)
            .map(|entries| entries.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default())
    }

    async fn get(&self, path: &str, key: &str) -> Result<String, SecretsError> {
        if !*self.connected.lock() {
            return Err(SecretsError::Unavailable("scripted outage".to_string()));
        }
        self.values
            .lock()
            .get(path)
            .and_then(|entries| entries.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| SecretsError::NotFound(key.to_string()))
    }

    async fn refresh(&self) -> Result<(), SecretsError> {
        *self.refreshes.lock() += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Spawner

#[derive(Default)]
pub struct FakeSpawner {
    outputs: Mutex<VecDeque<SpawnOutput>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_output(&self, status: i32, stdout: &str, stderr: &str) {
        self.outputs.lock().push_back(SpawnOutput {
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Spawner for FakeSpawner {
    async fn run(&self, program: &str, args: &[String]) -> Result<SpawnOutput, SpawnError> {
        self.calls.lock().push((program.to_string(), args.to_vec()));
        Ok(self.outputs.lock().pop_front().unwrap_or_default())
    }
}
