//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use core_kernel::{AdapterHealth, HealthCheckResult, HealthCheckable};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub version: String,
    pub checks: Vec<HealthCheckResult>,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check over every storage port
///
/// The bank data provider is reported but does not gate readiness; a sync
/// against a down provider fails per account instead.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let ports = &state.ports;
    let storage = vec![
        ports.buildings.health_check().await,
        ports.payments.health_check().await,
        ports.projects.health_check().await,
        ports.banking.health_check().await,
    ];
    let ready = storage.iter().all(|c| c.status != AdapterHealth::Unhealthy);

    let mut checks = storage;
    checks.push(ports.provider.health_check().await);

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            status: if ready { "ready" } else { "not_ready" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks,
        }),
    )
}
