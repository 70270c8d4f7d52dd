//! Request handlers.
//!
//! # Responsibilities
//! - Answer demo calls through the external service's breaker
//! - Report breaker status for every id or one id (404 when unknown)
//! - Liveness with the running version

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::resilience::registry::BreakerStatusEntry;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

/// Call the demo dependency through its breaker. Always answers.
pub async fn call_external(State(state): State<AppState>) -> String {
    let response = state.external.call_external_api().await;
    tracing::debug!(
        breaker = state.external.breaker_id(),
        state = %state.external.status().state,
        "External call finished"
    );
    response
}

pub async fn list_status(State(state): State<AppState>) -> Json<Vec<BreakerStatusEntry>> {
    Json(state.registry.statuses())
}

pub async fn breaker_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BreakerStatusEntry>, StatusCode> {
    state
        .registry
        .status(&id)
        .map(|status| Json(BreakerStatusEntry { id, status }))
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
