// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Centralized environment variable access for the daemon crate.
//!
//! Every variable the process reads lives here, with its default next to it.

use std::path::PathBuf;
use std::time::Duration;

/// Control-plane version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn duration_ms(name: &str, default: Duration) -> Duration {
    var(name).and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis).unwrap_or(default)
}

/// Shared deploy secret. The process refuses to start without it.
pub fn deploy_secret() -> Option<String> {
    var("GHFLEET_DEPLOY_SECRET")
}

pub fn listen_addr() -> String {
    var("GHFLEET_LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8090".to_string())
}

/// Port the worker agents listen on for health/status/drain.
pub fn worker_port() -> u16 {
    var("GHFLEET_WORKER_PORT").and_then(|s| s.parse().ok()).unwrap_or(8081)
}

pub fn history_path() -> PathBuf {
    var("GHFLEET_HISTORY_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/var/lib/ghfleet/deploys.json"))
}

/// Static fleet metadata file (JSON).
pub fn fleet_file() -> PathBuf {
    var("GHFLEET_FLEET_FILE").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("config/fleet.json"))
}

/// Deployment-tool YAML files scanned for `servers.<role>.hosts`, as
/// `environment=path` pairs separated by commas.
pub fn discovery_configs() -> Vec<(String, PathBuf)> {
    let raw = var("GHFLEET_DISCOVERY_CONFIGS")
        .unwrap_or_else(|| "production=config/deploy.yml,staging=config/deploy.staging.yml".to_string());
    raw.split(',')
        .filter_map(|pair| {
            let (env, path) = pair.split_once('=')?;
            let env = env.trim();
            let path = path.trim();
            if env.is_empty() || path.is_empty() {
                return None;
            }
            Some((env.to_string(), PathBuf::from(path)))
        })
        .collect()
}

/// Full fleet as a JSON blob; overrides file-based discovery entirely.
pub fn fleet_json() -> Option<String> {
    var("GHFLEET_FLEET_JSON")
}

/// Comma-separated CORS origin allow list.
pub fn allowed_origins() -> Option<String> {
    std::env::var("GHFLEET_ALLOWED_ORIGINS").ok()
}

pub fn idle_timeout() -> Duration {
    duration_ms("GHFLEET_IDLE_TIMEOUT_MS", Duration::from_secs(30 * 60))
}

/// Floor below which the idle controller never reduces running workers.
pub fn min_running() -> usize {
    var("GHFLEET_MIN_RUNNING").and_then(|s| s.parse().ok()).unwrap_or(1)
}

pub fn idle_poll_interval() -> Duration {
    duration_ms("GHFLEET_POLL_INTERVAL_MS", Duration::from_secs(60))
}

pub fn registry_server() -> String {
    var("GHFLEET_REGISTRY_SERVER").unwrap_or_else(|| "localhost:5000".to_string())
}

pub fn repository() -> String {
    var("GHFLEET_REPOSITORY").unwrap_or_else(|| "ghfleet/app".to_string())
}

pub fn environment() -> String {
    var("GHFLEET_ENVIRONMENT").unwrap_or_else(|| "production".to_string())
}

/// Base URL of the application this fleet serves; probed for /version.
pub fn app_base_url() -> String {
    var("GHFLEET_APP_BASE_URL").unwrap_or_else(|| "http://localhost:3000".to_string())
}

pub fn app_port() -> u16 {
    var("GHFLEET_APP_PORT").and_then(|s| s.parse().ok()).unwrap_or(3000)
}

pub fn secrets_backend() -> Option<(String, String)> {
    Some((var("GHFLEET_SECRETS_URL")?, var("GHFLEET_SECRETS_TOKEN")?))
}

pub fn cleanup_script() -> PathBuf {
    var("GHFLEET_CLEANUP_SCRIPT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("scripts/cleanup.sh"))
}

/// Local worker containers per host during a deploy.
pub fn worker_count() -> usize {
    var("GHFLEET_WORKER_COUNT").and_then(|s| s.parse().ok()).unwrap_or(2)
}

pub fn docker_socket() -> PathBuf {
    var("GHFLEET_DOCKER_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/var/run/docker.sock"))
}

pub fn aws_region() -> Option<String> {
    var("GHFLEET_AWS_REGION")
}

/// Optional daemon log file; stderr only when unset.
pub fn log_path() -> Option<PathBuf> {
    var("GHFLEET_LOG_PATH").map(PathBuf::from)
}

/// Pre-deploy drain budget.
pub fn drain_timeout() -> Duration {
    duration_ms("GHFLEET_DRAIN_TIMEOUT_MS", Duration::from_secs(5 * 60))
}

pub fn drain_poll_interval() -> Duration {
    duration_ms("GHFLEET_DRAIN_POLL_MS", Duration::from_secs(5))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
