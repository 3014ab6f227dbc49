// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

use super::test_support::{context, context_with_fleet, seed_healthy_deploy, worker_entry, TEST_SECRET};
use super::*;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, secret: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-deploy-secret", secret);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn unknown_path_is_json_404() {
    let ctx = context().await;
    let response = router(ctx.state.clone()).oneshot(get("/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not found");
}

#[tokio::test]
async fn protected_endpoints_reject_missing_or_wrong_secret() {
    let ctx = context().await;

    let response = router(ctx.state.clone())
        .oneshot(post_json("/fleet/reload", None, serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router(ctx.state.clone())
        .oneshot(post_json("/fleet/reload", Some("wrong"), serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "unauthorized");
}

#[tokio::test]
async fn correct_secret_passes_the_auth_layer() {
    let ctx = context().await;
    let response = router(ctx.state.clone())
        .oneshot(post_json("/fleet/reload", Some(TEST_SECRET), serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["reloaded"], true);
}

#[tokio::test]
async fn health_reports_idle_without_running_workers() {
    let ctx = context().await;
    let response = router(ctx.state.clone()).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "idle");
    assert_eq!(body["activeWorkers"], 0);
    assert_eq!(body["deploySafe"], true);
    assert_eq!(body["apiHealthy"], false);
    assert!(body["currentDeploy"].is_null());
    assert_eq!(body["workerStatus"][0]["id"], "gh-worker-0");
}

#[tokio::test]
async fn version_reports_upstream_when_reachable() {
    let ctx = context().await;
    ctx.workers.set_url_body("http://app.local:3000/version", 200, r#"{"version":"9.9.9"}"#);

    let body =
        body_json(router(ctx.state.clone()).oneshot(get("/version")).await.unwrap()).await;

    assert_eq!(body["version"], crate::env::VERSION);
    assert_eq!(body["service"], "9.9.9");
}

#[tokio::test]
async fn version_upstream_down_is_null() {
    let ctx = context().await;
    let body =
        body_json(router(ctx.state.clone()).oneshot(get("/version")).await.unwrap()).await;
    assert!(body["service"].is_null());
}

#[tokio::test]
async fn preflight_from_allowed_origin_gets_cors_headers() {
    let ctx = context().await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/deploy")
        .header(header::ORIGIN, "https://ops.example.com")
        .body(Body::empty())
        .unwrap();

    let response = router(ctx.state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://ops.example.com"
    );
    assert_eq!(headers.get(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "86400");
    assert_eq!(headers.get(header::VARY).unwrap(), "Origin");
}

#[tokio::test]
async fn unknown_origin_receives_no_cors_headers() {
    let ctx = context().await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/deploy")
        .header(header::ORIGIN, "https://evil.example.com")
        .body(Body::empty())
        .unwrap();

    let response = router(ctx.state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn allowed_origin_is_echoed_on_plain_requests() {
    let ctx = context().await;
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://ops.example.com")
        .body(Body::empty())
        .unwrap();

    let response = router(ctx.state.clone()).oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://ops.example.com"
    );
    assert_eq!(response.headers().get(header::VARY).unwrap(), "Origin");
}

#[tokio::test]
async fn deploys_list_is_empty_and_unknown_id_404s() {
    let ctx = context().await;

    let body =
        body_json(router(ctx.state.clone()).oneshot(get("/deploys")).await.unwrap()).await;
    assert_eq!(body, serde_json::json!([]));

    let response =
        router(ctx.state.clone()).oneshot(get("/deploys/dep-missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fleet_listing_attaches_worker_phase() {
    let ctx = context().await;
    let body = body_json(router(ctx.state.clone()).oneshot(get("/fleet")).await.unwrap()).await;

    assert_eq!(body[0]["id"], "gh-worker-0");
    assert_eq!(body[0]["phase"], "unknown");
}

#[tokio::test]
async fn fleet_listing_filters_by_environment() {
    let mut staging = worker_entry("gh-worker-1", "10.0.0.2", None);
    staging.environment = Some("staging".to_string());
    let mut production = worker_entry("gh-worker-0", "10.0.0.1", Some("i-0"));
    production.environment = Some("production".to_string());
    let ctx = context_with_fleet(vec![production, staging]).await;

    let body = body_json(
        router(ctx.state.clone()).oneshot(get("/fleet?environment=staging")).await.unwrap(),
    )
    .await;

    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "gh-worker-1");
}

#[tokio::test]
async fn proxy_health_is_open_and_forwards_upstream_body() {
    let ctx = context().await;
    ctx.workers.set_proxy("10.0.0.1", "/health", 200, r#"{"ok":true}"#);

    let response =
        router(ctx.state.clone()).oneshot(get("/fleet/gh-worker-0/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ok"], true);
}

#[tokio::test]
async fn proxy_metrics_requires_the_secret() {
    let ctx = context().await;
    let response =
        router(ctx.state.clone()).oneshot(get("/fleet/gh-worker-0/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn proxy_short_circuits_offline_workers() {
    let ctx = context().await;
    ctx.state.idle.update_worker_ec2("gh-worker-0", ghfleet_core::WorkerPhase::Stopped, None);

    let response =
        router(ctx.state.clone()).oneshot(get("/fleet/gh-worker-0/health")).await.unwrap();

    let body = body_json(response).await;
    assert_eq!(body["offline"], true);
    assert_eq!(body["phase"], "stopped");
}

#[tokio::test]
async fn proxy_unknown_server_404s() {
    let ctx = context().await;
    let response =
        router(ctx.state.clone()).oneshot(get("/fleet/gh-nope/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deploy_rejects_bad_image_tags() {
    let ctx = context().await;
    let response = router(ctx.state.clone())
        .oneshot(post_json(
            "/deploy",
            Some(TEST_SECRET),
            serde_json::json!({ "image_tag": "v1;rm -rf" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn concurrent_deploys_conflict() {
    let ctx = context().await;
    assert!(ctx.state.marker.try_begin("v1", 0));

    let response = router(ctx.state.clone())
        .oneshot(post_json(
            "/deploy",
            Some(TEST_SECRET),
            serde_json::json!({ "image_tag": "v2" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn accepted_deploy_lands_in_history_and_completes() {
    let ctx = context().await;
    seed_healthy_deploy(&ctx);

    let response = router(ctx.state.clone())
        .oneshot(post_json(
            "/deploy",
            Some(TEST_SECRET),
            serde_json::json!({ "image_tag": "v7", "trigger": "ci" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    let deploy_id = body["deployId"].as_str().unwrap().to_string();

    // The background task settles the record shortly after.
    let mut status = None;
    for _ in 0..200 {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        status = ctx.state.history.lock().find(&deploy_id).map(|r| r.status);
        if status == Some(ghfleet_core::DeployStatus::Completed) {
            break;
        }
    }
    assert_eq!(status, Some(ghfleet_core::DeployStatus::Completed));
    assert!(ctx.state.marker.snapshot().is_none());
}

#[tokio::test]
async fn secrets_status_is_open_and_list_is_protected() {
    let ctx = context().await;
    ctx.secrets.insert("/app", "DATABASE_URL", "postgres://x");

    let body = body_json(
        router(ctx.state.clone()).oneshot(get("/secrets/status")).await.unwrap(),
    )
    .await;
    assert_eq!(body["connected"], true);

    let response =
        router(ctx.state.clone()).oneshot(get("/secrets/list?path=/app")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/secrets/list?path=/app")
        .header("x-deploy-secret", TEST_SECRET)
        .body(Body::empty())
        .unwrap();
    let body = body_json(router(ctx.state.clone()).oneshot(request).await.unwrap()).await;
    assert_eq!(body["keys"][0], "DATABASE_URL");
}

#[tokio::test]
async fn secret_value_lookup_and_404() {
    let ctx = context().await;
    ctx.secrets.insert("/app", "API_KEY", "k-123");

    let request = Request::builder()
        .uri("/secrets/API_KEY?path=/app")
        .header("x-deploy-secret", TEST_SECRET)
        .body(Body::empty())
        .unwrap();
    let body = body_json(router(ctx.state.clone()).oneshot(request).await.unwrap()).await;
    assert_eq!(body["value"], "k-123");

    let request = Request::builder()
        .uri("/secrets/MISSING?path=/app")
        .header("x-deploy-secret", TEST_SECRET)
        .body(Body::empty())
        .unwrap();
    let response = router(ctx.state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn idle_status_exposes_controller_config() {
    let ctx = context().await;
    let request = Request::builder()
        .uri("/fleet/idle-status")
        .header("x-deploy-secret", TEST_SECRET)
        .body(Body::empty())
        .unwrap();

    let body = body_json(router(ctx.state.clone()).oneshot(request).await.unwrap()).await;

    assert_eq!(body["config"]["minRunning"], 1);
    assert_eq!(body["workers"][0]["id"], "gh-worker-0");
    assert_eq!(body["workers"][0]["inStandby"], false);
}
