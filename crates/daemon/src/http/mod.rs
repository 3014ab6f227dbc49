// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! HTTP surface: routing, auth, CORS, and the request handlers.

pub mod auth;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod sse;

#[cfg(test)]
pub(crate) mod test_support;

use crate::state::AppState;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    let open = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/version", get(handlers::health::version))
        .route("/metrics", get(handlers::health::metrics))
        .route("/containers", get(handlers::system::containers))
        .route("/workers", get(handlers::system::workers))
        .route("/deploys", get(handlers::deploys::list))
        .route("/deploys/:id", get(handlers::deploys::get_by_id))
        .route("/fleet", get(handlers::fleet::list))
        // Mixed auth: the proxy checks the secret itself per sub-path.
        .route("/fleet/:id/:what", get(handlers::fleet::proxy))
        .route("/deploy/stream", get(handlers::deploy::stream))
        .route("/secrets/status", get(handlers::secrets::status));

    let protected = Router::new()
        .route("/fleet/reload", post(handlers::fleet::reload))
        .route("/fleet/idle-status", get(handlers::fleet::idle_status))
        .route("/fleet/wake", post(handlers::fleet::wake_many))
        .route("/fleet/:id/wake", post(handlers::fleet::wake_one))
        .route("/fleet/:id/stop", post(handlers::fleet::stop_one))
        .route("/deploy", post(handlers::deploy::start))
        .route("/drain", post(handlers::deploy::drain_one))
        .route("/drain/graceful", post(handlers::deploy::drain_graceful))
        .route("/cleanup", post(handlers::deploy::cleanup))
        .route("/rollback", post(handlers::deploy::rollback))
        .route("/admin/refresh-secrets", post(handlers::secrets::refresh))
        .route("/secrets/list", get(handlers::secrets::list))
        .route("/secrets/:key", get(handlers::secrets::get_one))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_secret));

    open.merge(protected)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), cors::apply_cors))
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
