// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! HTTP client for the worker agents' local API.
//!
//! Workers expose `/worker/health`, `/worker/status`, and `/worker/drain` on
//! a fixed port. Timeouts are per operation: 5s for health/status probes,
//! 10s for drain, 8s for proxied reads.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker {target} unreachable: {message}")]
    Unreachable { target: String, message: String },
    #[error("worker {target}: HTTP {status}")]
    Status { target: String, status: u16 },
    #[error("worker {target}: invalid response: {message}")]
    Parse { target: String, message: String },
}

/// What a healthy worker reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WorkerHealth {
    #[serde(default)]
    pub active_jobs: u32,
}

#[async_trait]
pub trait WorkerClient: Send + Sync {
    async fn health(&self, ip: &str, port: u16) -> Result<WorkerHealth, WorkerError>;
    async fn status(&self, ip: &str, port: u16) -> Result<WorkerHealth, WorkerError>;
    async fn drain(&self, ip: &str, port: u16) -> Result<(), WorkerError>;
    /// Smart-proxy read: returns upstream status and body verbatim.
    async fn proxy_get(&self, ip: &str, port: u16, path: &str)
        -> Result<(u16, String), WorkerError>;
    /// Generic probe used by the orchestrator's health gate.
    async fn get_url(&self, url: &str, timeout: Duration) -> Result<u16, WorkerError>;
    /// GET returning status and body, for upstream-version probes.
    async fn get_text(&self, url: &str, timeout: Duration) -> Result<(u16, String), WorkerError>;
    /// Generic POST used for per-service drain URLs.
    async fn post_url(&self, url: &str, timeout: Duration) -> Result<u16, WorkerError>;
}

pub struct HttpWorkerClient {
    client: reqwest::Client,
}

impl HttpWorkerClient {
    pub fn new() -> Result<Self, WorkerError> {
        let client = reqwest::Client::builder().build().map_err(|e| WorkerError::Unreachable {
            target: "client".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { client })
    }

    async fn fetch_health(
        &self,
        target: String,
        url: String,
    ) -> Result<WorkerHealth, WorkerError> {
        let response = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| WorkerError::Unreachable { target: target.clone(), message: e.to_string() })?;
        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::Status { target, status: status.as_u16() });
        }
        response
            .json::<WorkerHealth>()
            .await
            .map_err(|e| WorkerError::Parse { target, message: e.to_string() })
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn health(&self, ip: &str, port: u16) -> Result<WorkerHealth, WorkerError> {
        self.fetch_health(ip.to_string(), format!("http://{}:{}/worker/health", ip, port)).await
    }

    async fn status(&self, ip: &str, port: u16) -> Result<WorkerHealth, WorkerError> {
        self.fetch_health(ip.to_string(), format!("http://{}:{}/worker/status", ip, port)).await
    }

    async fn drain(&self, ip: &str, port: u16) -> Result<(), WorkerError> {
        let url = format!("http://{}:{}/worker/drain", ip, port);
        let response = self
            .client
            .post(&url)
            .timeout(DRAIN_TIMEOUT)
            .send()
            .await
            .map_err(|e| WorkerError::Unreachable { target: ip.to_string(), message: e.to_string() })?;
        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::Status { target: ip.to_string(), status: status.as_u16() });
        }
        Ok(())
    }

    async fn proxy_get(
        &self,
        ip: &str,
        port: u16,
        path: &str,
    ) -> Result<(u16, String), WorkerError> {
        let url = format!("http://{}:{}{}", ip, port, path);
        let response = self
            .client
            .get(&url)
            .timeout(PROXY_TIMEOUT)
            .send()
            .await
            .map_err(|e| WorkerError::Unreachable { target: ip.to_string(), message: e.to_string() })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| WorkerError::Parse {
            target: ip.to_string(),
            message: e.to_string(),
        })?;
        Ok((status, body))
    }

    async fn get_url(&self, url: &str, timeout: Duration) -> Result<u16, WorkerError> {
        let response = self.client.get(url).timeout(timeout).send().await.map_err(|e| {
            WorkerError::Unreachable { target: url.to_string(), message: e.to_string() }
        })?;
        Ok(response.status().as_u16())
    }

    async fn post_url(&self, url: &str, timeout: Duration) -> Result<u16, WorkerError> {
        let response = self.client.post(url).timeout(timeout).send().await.map_err(|e| {
            WorkerError::Unreachable { target: url.to_string(), message: e.to_string() }
        })?;
        Ok(response.status().as_u16())
    }

    async fn get_text(&self, url: &str, timeout: Duration) -> Result<(u16, String), WorkerError> {
        let response = self.client.get(url).timeout(timeout).send().await.map_err(|e| {
            WorkerError::Unreachable { target: url.to_string(), message: e.to_string() }
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| WorkerError::Parse {
            target: url.to_string(),
            message: e.to_string(),
        })?;
        Ok((status, body))
    }
}
