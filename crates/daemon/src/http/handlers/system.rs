// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! `/containers` and `/workers`.

use crate::http::error::ApiError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerLine {
    id: String,
    name: String,
    image: String,
    running: bool,
    status: String,
}

pub async fn containers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<ContainerLine>>, ApiError> {
    let all = params.get("all").map(|v| v == "true").unwrap_or(false);
    let containers = state.engine.list(all).await?;
    Ok(Json(
        containers
            .into_iter()
            .map(|c| ContainerLine {
                id: c.id,
                name: c.name,
                image: c.image,
                running: c.running,
                status: c.status,
            })
            .collect(),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerLine {
    id: String,
    ip: String,
    phase: String,
    active_jobs: u32,
    healthy: bool,
    transitioning: bool,
}

/// Composite health + status view of every managed worker.
pub async fn workers(State(state): State<Arc<AppState>>) -> Json<Vec<WorkerLine>> {
    let port = state.idle.worker_port();
    let mut lines = Vec::new();
    for s in state.idle.get_states() {
        let (healthy, active_jobs) = if s.phase.is_offline() {
            (false, s.active_jobs)
        } else {
            match state.workers.health(&s.public_ip, port).await {
                Ok(health) => (true, health.active_jobs),
                Err(_) => (false, s.active_jobs),
            }
        };
        lines.push(WorkerLine {
            id: s.server_id,
            ip: s.public_ip,
            phase: s.phase.to_string(),
            active_jobs,
            healthy,
            transitioning: s.transitioning,
        });
    }
    Json(lines)
}
