// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Secrets-backend surface.

use crate::http::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use ghfleet_adapters::SecretsBackend;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

fn backend(state: &AppState) -> Result<&Arc<dyn SecretsBackend>, ApiError> {
    state
        .secrets
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("secrets backend not configured".to_string()))
}

fn path_param(params: &HashMap<String, String>) -> String {
    params.get("path").cloned().unwrap_or_else(|| "/".to_string())
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match &state.secrets {
        Some(secrets) => {
            let status = secrets.status().await;
            Json(serde_json::json!(status))
        }
        None => Json(serde_json::json!({ "connected": false, "error": "not configured" })),
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = path_param(&params);
    let keys = backend(&state)?.list(&path).await?;
    Ok(Json(serde_json::json!({ "path": path, "keys": keys })))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = path_param(&params);
    let value = backend(&state)?.get(&path, &key).await?;
    Ok(Json(serde_json::json!({ "key": key, "value": value })))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    backend(&state)?.refresh().await?;
    info!("secrets refreshed from backend");
    Ok(Json(serde_json::json!({ "refreshed": true })))
}
