// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! `ghfleetd` — the fleet control-plane daemon.

use ghfleet_daemon::env;
use ghfleet_daemon::http;
use ghfleet_daemon::lifecycle::{startup, Config};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _log_guard = init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "startup aborted");
            std::process::exit(1);
        }
    };
    let listen_addr = config.listen_addr.clone();

    let daemon = match startup(config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!(error = %e, "startup failed");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %listen_addr, error = %e, "failed to bind listener");
            std::process::exit(1);
        }
    };
    info!(addr = %listen_addr, version = env::VERSION, "control plane listening");

    let app = http::router(daemon.state.clone());
    let cancel = daemon.cancel.clone();
    let serve =
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(cancel.clone()));
    if let Err(e) = serve.await {
        error!(error = %e, "server error");
    }

    cancel.cancel();
    let _ = daemon.ticker.await;
    info!("shutdown complete");
}

/// Resolve on SIGINT or SIGTERM and cancel the background tasks.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
    cancel.cancel();
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_env("GHFLEET_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    match env::log_path() {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file = path.file_name().map(Path::new).unwrap_or(Path::new("ghfleetd.log"));
            let appender = tracing_appender::rolling::never(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
