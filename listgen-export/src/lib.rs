//! listgen-export library interface
//!
//! The export pipeline, its stores and the HTTP surface, exposed for the
//! binary and for integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{ExportService, ProgressPoller, ProgressStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ExportService>,
    /// Same store the service reports into; read by the status endpoint
    pub progress: Arc<dyn ProgressStore>,
    pub poller: ProgressPoller,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<ExportService>, poller: ProgressPoller) -> Self {
        Self {
            progress: service.progress_store(),
            service,
            poller,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::export_routes())
        .merge(api::progress_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
