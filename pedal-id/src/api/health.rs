//! Liveness and diagnostics
//!
//! `/health` answers 200 whenever the server is up. Whether identification
//! can actually succeed is reported under `vision`, since a missing API key
//! only shows up once a request reaches the provider.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct VisionStatus {
    pub model: String,
    pub api_key_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
    pub vision: VisionStatus,
    /// Most recent identification failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = u64::try_from(
        (Utc::now() - state.startup_time).num_seconds(),
    )
    .unwrap_or(0);

    Json(HealthResponse {
        status: "ok",
        module: "pedal-id",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.startup_time,
        uptime_seconds,
        active_sessions: state.sessions.len().await,
        vision: VisionStatus {
            model: state.identifier.name().to_string(),
            api_key_configured: state.config.vision.api_key.is_some(),
        },
        last_error: state.last_error.read().await.clone(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
