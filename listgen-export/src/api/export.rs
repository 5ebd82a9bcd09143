//! Export API handlers
//!
//! POST /export, POST /export/precheck

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::Response,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    models::{ExportRequest, PrecheckResult},
    services::ExportOutcome,
    AppState,
};

/// Response headers browsers may read on a cross-origin download
const EXPOSED_HEADERS: &str =
    "Content-Disposition, X-Filename, X-Total-Items, X-Images-Found, X-Job-Id";

/// POST /export/precheck request
#[derive(Debug, Deserialize)]
pub struct PrecheckRequest {
    pub company: String,
    pub sales_code: String,
    pub price_memo: String,
}

/// POST /export
///
/// Runs the job to completion and returns the artifact as the response body.
/// Job metadata travels in headers; failures are structured JSON errors.
pub async fn export(
    State(state): State<AppState>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let ExportOutcome { job_id, artifact } = state.service.run(request).await?;
    let filename = header_safe(&artifact.filename);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header("X-Filename", filename.as_str())
        .header("X-Total-Items", artifact.total_items.to_string())
        .header("X-Images-Found", artifact.images_found.to_string())
        .header("X-Job-Id", job_id.to_string())
        .header(header::ACCESS_CONTROL_EXPOSE_HEADERS, EXPOSED_HEADERS)
        .body(Body::from(artifact.bytes))
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}

/// POST /export/precheck
pub async fn precheck(
    State(state): State<AppState>,
    payload: Result<Json<PrecheckRequest>, JsonRejection>,
) -> ApiResult<Json<PrecheckResult>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let result = state
        .service
        .precheck(&request.company, &request.sales_code, &request.price_memo)
        .await?;
    Ok(Json(result))
}

/// Printable-ASCII rendering of a file name for use in a header value
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build export routes
pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/export", post(export))
        .route("/export/precheck", post(precheck))
}
