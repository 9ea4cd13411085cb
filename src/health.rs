// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health, readiness, and metrics HTTP surface.
//!
//! Three endpoints served on the configured health port:
//!
//! - `GET /health`: 200 `{"status":"healthy"}` unconditionally while the
//!   process runs (liveness)
//! - `GET /ready`: 200 `ready`, 200 `degraded` (providers still pending),
//!   or 503 `not_ready` (runtime connection lost), with a JSON body listing
//!   components and degradations
//! - `GET /metrics`: Prometheus text exposition

use crate::metrics;
use crate::providers::manager::ProviderManager;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Shared state behind the readiness endpoint.
#[derive(Clone)]
pub struct HealthState {
    manager: Arc<ProviderManager>,
    runtime_ok: Arc<AtomicBool>,
}

impl HealthState {
    /// Create health state; the runtime starts out considered healthy.
    #[must_use]
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self {
            manager,
            runtime_ok: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Flag the container runtime connection up or down.
    pub fn set_runtime_ok(&self, ok: bool) {
        self.runtime_ok.store(ok, Ordering::SeqCst);
    }
}

/// One component's contribution to readiness.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// `ok`, `degraded`, or `failed`
    pub status: String,
}

/// Body of the `/ready` endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyResponse {
    /// `ready`, `degraded`, or `not_ready`
    pub status: String,
    /// Component statuses
    pub components: Vec<ComponentHealth>,
    /// Names of degraded items (pending provider instances)
    pub degraded: Vec<String>,
}

/// Compute the readiness verdict from current state.
#[must_use]
pub fn readiness(state: &HealthState) -> (StatusCode, ReadyResponse) {
    let runtime_ok = state.runtime_ok.load(Ordering::SeqCst);
    let pending = state.manager.pending_names();
    let (ready, total_pending) = state.manager.counts();
    metrics::set_provider_counts(ready, total_pending);

    let mut components = vec![ComponentHealth {
        name: "runtime".to_string(),
        status: if runtime_ok { "ok" } else { "failed" }.to_string(),
    }];
    components.push(ComponentHealth {
        name: "providers".to_string(),
        status: if pending.is_empty() { "ok" } else { "degraded" }.to_string(),
    });

    if !runtime_ok {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            ReadyResponse {
                status: "not_ready".to_string(),
                components,
                degraded: pending,
            },
        );
    }

    let status = if pending.is_empty() { "ready" } else { "degraded" };
    (
        StatusCode::OK,
        ReadyResponse {
            status: status.to_string(),
            components,
            degraded: pending,
        },
    )
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy"}))
}

async fn ready_handler(State(state): State<HealthState>) -> (StatusCode, Json<ReadyResponse>) {
    let (code, body) = readiness(&state);
    (code, Json(body))
}

async fn metrics_handler() -> String {
    match metrics::gather_metrics() {
        Ok(text) => text,
        Err(e) => {
            error!("failed to gather metrics: {e}");
            String::from("# Error gathering metrics\n")
        }
    }
}

/// Build the HTTP router.
#[must_use]
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Serve the health endpoints until shutdown.
///
/// # Errors
///
/// Returns an error when the listener cannot bind or the server fails.
pub async fn serve(
    bind_addr: &str,
    state: HealthState,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("health server listening on http://{bind_addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod health_tests;
