// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Fleet surface: listing, reload, idle status, wake/stop, smart proxy.

use crate::fleet::load_fleet;
use crate::http::auth;
use crate::http::error::ApiError;
use crate::idle::{StopOutcome, WakeOutcome};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ghfleet_core::{Clock, WorkerPhase, WORKER_ROLE};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<serde_json::Value>> {
    let environment = params.get("environment");
    let include_terminated =
        params.get("includeTerminated").map(|v| v == "true").unwrap_or(false);
    let phases: HashMap<String, WorkerPhase> = state
        .idle
        .get_states()
        .into_iter()
        .map(|s| (s.server_id.clone(), s.phase))
        .collect();

    let fleet = state.fleet.lock().clone();
    let entries = fleet
        .into_iter()
        .filter(|e| environment.is_none_or(|env| e.environment.as_deref() == Some(env.as_str())))
        .filter_map(|e| {
            let phase = phases.get(&e.id).copied();
            if !include_terminated
                && matches!(phase, Some(WorkerPhase::Terminated | WorkerPhase::ShuttingDown))
            {
                return None;
            }
            let mut value = serde_json::to_value(&e).ok()?;
            if let (Some(obj), Some(phase)) = (value.as_object_mut(), phase) {
                obj.insert("phase".to_string(), serde_json::json!(phase));
            }
            Some(value)
        })
        .collect();
    Json(entries)
}

pub async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let entries = load_fleet(&state.fleet_sources)
        .map_err(|e| ApiError::BadRequest(format!("fleet reload failed: {}", e)))?;
    let count = entries.len();
    *state.fleet.lock() = entries;
    info!(entries = count, "fleet configuration reloaded");
    Ok(Json(serde_json::json!({ "reloaded": true, "entries": count })))
}

pub async fn idle_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let now = state.clock.now();
    let config = state.idle.config();
    let workers: Vec<serde_json::Value> = state
        .idle
        .get_states()
        .into_iter()
        .map(|s| {
            serde_json::json!({
                "id": s.server_id,
                "ip": s.public_ip,
                "instanceId": s.instance_id,
                "phase": s.phase,
                "activeJobs": s.active_jobs,
                "transitioning": s.transitioning,
                "idleMs": now.saturating_duration_since(s.last_active).as_millis() as u64,
                "asg": s.asg_name,
                "inStandby": s.in_standby,
            })
        })
        .collect();

    Json(serde_json::json!({
        "workers": workers,
        "config": {
            "idleTimeoutMs": config.idle_timeout.as_millis() as u64,
            "minRunning": config.min_running,
            "pollIntervalMs": config.poll_interval.as_millis() as u64,
            "workerPort": config.worker_port,
        },
    }))
}

#[derive(Deserialize)]
pub struct WakeManyRequest {
    #[serde(default = "default_wake_count")]
    count: usize,
}

fn default_wake_count() -> usize {
    1
}

/// Wake the first N stopped workers; wakes run in the background.
pub async fn wake_many(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WakeManyRequest>,
) -> Json<serde_json::Value> {
    let targets: Vec<String> = state
        .idle
        .get_states()
        .into_iter()
        .filter(|s| {
            matches!(s.phase, WorkerPhase::Stopped | WorkerPhase::Standby) && !s.transitioning
        })
        .take(request.count)
        .map(|s| s.server_id)
        .collect();

    for server_id in &targets {
        let idle = state.idle.clone();
        let server_id = server_id.clone();
        tokio::spawn(async move {
            if let Err(e) = idle.wake(&server_id).await {
                warn!(worker = %server_id, error = %e, "background wake failed");
            }
        });
    }
    Json(serde_json::json!({ "requested": targets }))
}

/// Guard shared by wake/stop: the id must name a managed worker.
fn check_role(state: &AppState, id: &str) -> Result<(), ApiError> {
    let fleet = state.fleet.lock();
    match fleet.iter().find(|e| e.id == id) {
        Some(entry) if entry.role != WORKER_ROLE => {
            Err(ApiError::BadRequest(format!("{} is not a managed worker", id)))
        }
        _ => Ok(()),
    }
}

pub async fn wake_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_role(&state, &id)?;
    let outcome = state.idle.wake(&id).await?;
    let body = match outcome {
        WakeOutcome::Started { public_ip } => {
            serde_json::json!({ "status": "started", "server": id, "ip": public_ip })
        }
        WakeOutcome::StartedUnhealthy { public_ip } => {
            serde_json::json!({ "status": "started_unhealthy", "server": id, "ip": public_ip })
        }
        WakeOutcome::AlreadyRunning { public_ip } => {
            serde_json::json!({ "status": "already_running", "server": id, "ip": public_ip })
        }
        WakeOutcome::WakingInProgress => {
            serde_json::json!({ "status": "waking_in_progress", "server": id })
        }
    };
    Ok(Json(body))
}

pub async fn stop_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_role(&state, &id)?;
    let outcome = state.idle.stop(&id).await?;
    let body = match outcome {
        StopOutcome::Stopping => serde_json::json!({ "status": "stopping", "server": id }),
        StopOutcome::StopInProgress => {
            serde_json::json!({ "status": "stop_in_progress", "server": id })
        }
    };
    Ok(Json(body))
}

/// Sub-paths the smart proxy forwards, and whether they need the secret.
const PROXY_PATHS: &[(&str, bool)] = &[
    ("health", false),
    ("version", false),
    ("workers", true),
    ("metrics", true),
    ("deploys", true),
    ("containers", true),
];

/// Smart proxy: forward a read to one fleet member, short-circuiting
/// workers the controller already knows are offline.
pub async fn proxy(
    State(state): State<Arc<AppState>>,
    Path((id, what)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some((_, needs_auth)) = PROXY_PATHS.iter().find(|(p, _)| *p == what) else {
        return Err(ApiError::NotFound(format!("unknown proxy path: {}", what)));
    };
    if *needs_auth && !auth::verify(&state, &headers) {
        return Err(ApiError::Unauthorized);
    }

    let entry = {
        let fleet = state.fleet.lock();
        fleet.iter().find(|e| e.id == id).cloned()
    };
    let Some(entry) = entry else {
        return Err(ApiError::NotFound(format!("unknown server id: {}", id)));
    };

    // Offline short-circuit: no point dialing a stopped instance.
    let phase = state
        .idle
        .get_states()
        .into_iter()
        .find(|s| s.server_id == id)
        .map(|s| s.phase);
    if let Some(phase) = phase {
        if phase.is_offline() {
            let body = Json(serde_json::json!({
                "offline": true,
                "server": id,
                "phase": phase,
            }));
            return Ok(body.into_response());
        }
    }

    let port = state.idle.worker_port();
    let (status, body) =
        state.workers.proxy_get(&entry.ip, port, &format!("/{}", what)).await.map_err(|e| {
            ApiError::Upstream(format!("proxy to {} failed: {}", id, e))
        })?;

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, [(axum::http::header::CONTENT_TYPE, "application/json")], body).into_response())
}
