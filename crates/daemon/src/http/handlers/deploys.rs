// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Deploy-history reads.

use crate::http::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use ghfleet_core::DeployRecord;
use ghfleet_store::HISTORY_CAP;
use std::collections::HashMap;
use std::sync::Arc;

/// Records newest-first, optionally limited; never more than the cap.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<DeployRecord>> {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(HISTORY_CAP)
        .min(HISTORY_CAP);
    let history = state.history.lock();
    Json(history.records().iter().rev().take(limit).cloned().collect())
}

pub async fn get_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeployRecord>, ApiError> {
    let history = state.history.lock();
    history
        .find(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("unknown deploy id: {}", id)))
}
