// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! `/health`, `/version`, `/metrics`.

use crate::env::VERSION;
use crate::metrics;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkerStatusLine {
    id: String,
    phase: String,
    active_jobs: u32,
    transitioning: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let states = state.idle.get_states();
    let active_workers = state.idle.running_count();
    let current = state.marker.snapshot();

    let api_healthy = matches!(
        state
            .workers
            .get_url(&format!("{}/health", state.app_base_url), Duration::from_secs(2))
            .await,
        Ok(200)
    );

    let worker_status: Vec<WorkerStatusLine> = states
        .iter()
        .map(|s| WorkerStatusLine {
            id: s.server_id.clone(),
            phase: s.phase.to_string(),
            active_jobs: s.active_jobs,
            transitioning: s.transitioning,
        })
        .collect();

    let status = if active_workers > 0 { "ok" } else { "idle" };
    Json(serde_json::json!({
        "status": status,
        "activeWorkers": active_workers,
        "deploySafe": current.is_none(),
        "apiHealthy": api_healthy,
        "workerStatus": worker_status,
        "currentDeploy": current,
        "uptimeMs": state.start_time.elapsed().as_millis() as u64,
    }))
}

pub async fn version(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    // Best effort: the upstream app may be down; that is not our failure.
    let service = match state
        .workers
        .get_text(&format!("{}/version", state.app_base_url), Duration::from_secs(3))
        .await
    {
        Ok((200, body)) => serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("version").cloned()),
        _ => None,
    };

    Json(serde_json::json!({
        "version": VERSION,
        "service": service,
    }))
}

pub async fn metrics() -> Json<metrics::MetricsReport> {
    Json(metrics::sample().await)
}
