// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Deploy surface: trigger, rollback, drains, cleanup, log stream.

use crate::deploy::{drain_fleet, execute_rollback, DeployExecutor, DrainProgress};
use crate::http::error::ApiError;
use crate::http::sse::sse_response;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use ghfleet_core::{validate_image_tag, Clock, DeployTrigger};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Deserialize)]
pub struct DeployRequest {
    image_tag: String,
    #[serde(default)]
    commit_sha: Option<String>,
    #[serde(default)]
    trigger: Option<DeployTrigger>,
}

/// POST /deploy — validate, claim the single-flight slot, and run the
/// pre-drain plus orchestration in the background. CI follows progress via
/// `/deploy/stream` or `/deploys/:id`.
pub async fn start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    Json(request): Json<DeployRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if !validate_image_tag(&request.image_tag) {
        return Err(ApiError::BadRequest(format!(
            "invalid image tag: {:?}",
            request.image_tag
        )));
    }
    let force = params.get("force").map(|v| v == "true").unwrap_or(false);

    let now_ms = state.clock.epoch_ms();
    if !state.marker.try_begin(&request.image_tag, now_ms) {
        return Err(ApiError::Conflict("deploy already in progress".to_string()));
    }

    let record = {
        let history = state.history.lock();
        history.create_record(
            &request.image_tag,
            request.trigger.unwrap_or(DeployTrigger::Manual),
            request.commit_sha.clone(),
            now_ms,
        )
    };
    if let Err(e) = state.history.lock().add(record.clone()) {
        error!(error = %e, "failed to persist deploy record");
    }

    let deploy_id = record.id.clone();
    let image_tag = request.image_tag.clone();
    tokio::spawn(run_deploy(state.clone(), record, force));

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "deployId": deploy_id,
            "imageTag": image_tag,
            "status": "deploying",
        })),
    ))
}

/// Background half of POST /deploy: pre-drain the fleet (unless forced),
/// run the orchestrator, settle the record, notify subscribers, release
/// the marker.
async fn run_deploy(state: Arc<AppState>, mut record: ghfleet_core::DeployRecord, force: bool) {
    let image_tag = record.image_tag.clone();

    if !force {
        state.marker.set_step("pre-drain");
        let fleet = state.fleet.lock().clone();
        let bus = state.bus.clone();
        let on_event = move |progress: DrainProgress| bus.line(&progress.to_line());
        let drained = drain_fleet(
            state.workers.as_ref(),
            &fleet,
            state.idle.worker_port(),
            "127.0.0.1",
            &state.drain_config,
            Some(&on_event),
        )
        .await;
        if let Err(e) = drained {
            let message = format!("pre-drain: {}", e);
            warn!(image_tag, error = %message, "deploy aborted before orchestration");
            record.fail(message.clone(), state.clock.epoch_ms());
            if let Err(e) = state.history.lock().update(&record) {
                error!(error = %e, "failed to persist deploy record");
            }
            state.bus.complete(false, Some(&message));
            state.marker.clear();
            return;
        }
    } else {
        state.bus.line("pre-drain skipped (force)");
    }

    match state.orchestrator.execute(&image_tag).await {
        Ok(success) => {
            record.complete(state.clock.epoch_ms());
            info!(image_tag, duration_ms = success.duration_ms, "deploy succeeded");
            state.bus.complete(true, None);
        }
        Err(failure) => {
            record.fail(failure.message(), state.clock.epoch_ms());
            state.bus.complete(false, Some(&failure.message()));
        }
    }
    if let Err(e) = state.history.lock().update(&record) {
        error!(error = %e, "failed to persist deploy record");
    }
    state.marker.clear();
}

/// POST /rollback — runs inline; the caller gets the final outcome.
pub async fn rollback(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let now_ms = state.clock.epoch_ms();
    if !state.marker.try_begin("rollback", now_ms) {
        return Err(ApiError::Conflict("deploy already in progress".to_string()));
    }

    let executor: &dyn DeployExecutor = state.orchestrator.as_ref();
    let outcome = execute_rollback(executor, &state.history, &state.clock).await;
    state.bus.complete(outcome.success, (!outcome.success).then(|| outcome.message.clone()).as_deref());
    state.marker.clear();

    let value = serde_json::to_value(&outcome)
        .map_err(|e| ApiError::Internal(format!("encode rollback outcome: {}", e)))?;
    Ok(Json(value))
}

#[derive(Deserialize)]
pub struct DrainRequest {
    #[serde(default)]
    server: Option<String>,
    #[serde(default)]
    ip: Option<String>,
}

/// POST /drain — proxy one drain request to a single worker.
pub async fn drain_one(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DrainRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ip = match (&request.ip, &request.server) {
        (Some(ip), _) => ip.clone(),
        (None, Some(server)) => state
            .idle
            .get_states()
            .into_iter()
            .find(|s| s.server_id == *server)
            .map(|s| s.public_ip)
            .ok_or_else(|| ApiError::NotFound(format!("unknown server id: {}", server)))?,
        (None, None) => {
            return Err(ApiError::BadRequest("server or ip required".to_string()))
        }
    };

    state.workers.drain(&ip, state.idle.worker_port()).await?;
    Ok(Json(serde_json::json!({ "drained": true, "worker": ip })))
}

/// POST /drain/graceful — SSE stream of per-worker drain progress.
pub async fn drain_graceful(State(state): State<Arc<AppState>>) -> Response {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let fleet = state.fleet.lock().clone();
        let events = tx.clone();
        let on_event = move |progress: DrainProgress| {
            if let Ok(mut value) = serde_json::to_value(&progress) {
                if let Some(obj) = value.as_object_mut() {
                    obj.insert("type".to_string(), serde_json::json!("drain"));
                }
                let _ = events.send(format!("data: {}\n\n", value));
            }
        };

        let result = drain_fleet(
            state.workers.as_ref(),
            &fleet,
            state.idle.worker_port(),
            "127.0.0.1",
            &state.drain_config,
            Some(&on_event),
        )
        .await;

        let final_frame = match result {
            Ok(_) => serde_json::json!({ "type": "complete", "success": true }),
            Err(e) => serde_json::json!({ "type": "error", "error": e.to_string() }),
        };
        let _ = tx.send(format!("data: {}\n\n", final_frame));
    });

    sse_response(rx)
}

/// POST /cleanup — run the local cleanup script.
pub async fn cleanup(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let script = state.cleanup_script.display().to_string();
    info!(script = %script, "running cleanup script");
    let output = state.spawner.run(&script, &[]).await?;
    if output.status != 0 {
        return Err(ApiError::Internal(format!(
            "cleanup script exited {}: {}",
            output.status,
            output.stderr.trim()
        )));
    }
    Ok(Json(serde_json::json!({
        "status": "ok",
        "output": output.stdout.trim(),
    })))
}

/// GET /deploy/stream — SSE stream of deploy log lines.
pub async fn stream(State(state): State<Arc<AppState>>) -> Response {
    sse_response(state.bus.subscribe())
}

#[cfg(test)]
#[path = "deploy_tests.rs"]
mod tests;
