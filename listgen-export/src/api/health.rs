//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the photo share is not mounted
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Exports still run without photos when false
    pub image_root_available: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    let image_root = state.service.image_root().to_path_buf();
    let image_root_available = tokio::fs::metadata(&image_root)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);

    Json(HealthResponse {
        status: if image_root_available { "ok" } else { "degraded" }.to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        image_root_available,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
