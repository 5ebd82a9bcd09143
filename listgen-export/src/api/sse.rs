//! Server-Sent Events for export progress
//!
//! The stream is backed by [`ProgressPoller`](crate::services::ProgressPoller)
//! and therefore always ends: on completion, on failure, when the job id is
//! never seen, or when the poll budget runs out.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{JobState, ProgressState},
    AppState,
};

/// Progress payload sent to clients
#[derive(Debug, Serialize)]
pub struct ProgressPayload {
    pub job_id: Uuid,
    pub current: u64,
    pub total: u64,
    pub percentage: f64,
    pub status: String,
    pub state: JobState,
}

impl From<&ProgressState> for ProgressPayload {
    fn from(progress: &ProgressState) -> Self {
        Self {
            job_id: progress.job_id,
            current: progress.current,
            total: progress.total,
            percentage: progress.percentage(),
            status: progress.status.clone(),
            state: progress.state,
        }
    }
}

/// GET /progress/:job_id
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(job_id = %job_id, "Progress stream opened");

    let mut updates = Box::pin(state.poller.stream(job_id));
    let stream = async_stream::stream! {
        while let Some(progress) = updates.next().await {
            match serde_json::to_string(&ProgressPayload::from(&progress)) {
                Ok(json) => yield Ok(Event::default().event("progress").data(json)),
                Err(e) => warn!(job_id = %job_id, error = %e, "Failed to serialize progress"),
            }
        }
        debug!(job_id = %job_id, "Progress stream closed");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

/// GET /progress/:job_id/status
pub async fn progress_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<ProgressPayload>> {
    let progress = state
        .progress
        .read(job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Export job not found: {}", job_id)))?;

    Ok(Json(ProgressPayload::from(&progress)))
}

/// Build progress routes
pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/progress/:job_id", get(progress_stream))
        .route("/progress/:job_id/status", get(progress_status))
}
