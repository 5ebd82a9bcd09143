//! Error types for listgen-export
//!
//! Stage errors (`CatalogError`, `ReferenceError`) fold into the pipeline
//! taxonomy `ExportError`; `ApiError` renders everything as structured JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// True for sqlx failures that mean "could not reach the database"
pub(crate) fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_)
            | sqlx::Error::WorkerCrashed
    )
}

/// Catalog source failures
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Source database unreachable or not configured
    #[error("Catalog database {database} unreachable: {message}")]
    Connection { database: String, message: String },

    /// Query rejected or result undecodable
    #[error("Catalog query failed: {0}")]
    Query(String),
}

impl CatalogError {
    pub fn from_sqlx(database: &str, err: sqlx::Error) -> Self {
        if is_connection_error(&err) {
            CatalogError::Connection {
                database: database.to_string(),
                message: err.to_string(),
            }
        } else {
            CatalogError::Query(err.to_string())
        }
    }
}

/// Reference store failures
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Reference store unreachable: {0}")]
    Unavailable(String),

    #[error("Reference query failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for ReferenceError {
    fn from(err: sqlx::Error) -> Self {
        if is_connection_error(&err) {
            ReferenceError::Unavailable(err.to_string())
        } else {
            ReferenceError::Query(err.to_string())
        }
    }
}

/// Export pipeline errors
///
/// Everything here aborts the job. Row-level image problems and bucket-level
/// formatting problems never reach this type; they are contained where they occur.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Catalog or reference store unreachable
    #[error("{0}")]
    Connection(String),

    /// No priced items for the given codes
    #[error("No records found: {0}")]
    NotFound(String),

    /// Result set over the safety threshold
    #[error("Too many items: {count} matched, limit is {limit}")]
    Capacity { count: usize, limit: usize },

    #[error("Unknown company: {0}")]
    UnknownCompany(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Reference data error: {0}")]
    Reference(String),

    /// Every brand bucket failed to serialize
    #[error("No sheets could be generated")]
    NoSheets,

    #[error("Packaging failed: {0}")]
    Packaging(String),

    #[error("Export cancelled")]
    Cancelled,

    #[error("Export exceeded the {0}s deadline")]
    DeadlineExceeded(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExportError {
    /// Stable machine-readable code for API payloads
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::Connection(_) => "CONNECTION_ERROR",
            ExportError::NotFound(_) => "NOT_FOUND",
            ExportError::Capacity { .. } => "CAPACITY_EXCEEDED",
            ExportError::UnknownCompany(_) => "UNKNOWN_COMPANY",
            ExportError::InvalidRequest(_) => "BAD_REQUEST",
            ExportError::Catalog(_) => "CATALOG_ERROR",
            ExportError::Reference(_) => "REFERENCE_ERROR",
            ExportError::NoSheets => "NO_SHEETS",
            ExportError::Packaging(_) => "PACKAGING_ERROR",
            ExportError::Cancelled => "CANCELLED",
            ExportError::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            ExportError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ExportError::NotFound(_) => StatusCode::NOT_FOUND,
            ExportError::InvalidRequest(_) | ExportError::UnknownCompany(_) => {
                StatusCode::BAD_REQUEST
            }
            ExportError::Capacity { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ExportError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            ExportError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CatalogError> for ExportError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Connection { .. } => ExportError::Connection(err.to_string()),
            CatalogError::Query(msg) => ExportError::Catalog(msg),
        }
    }
}

impl From<ReferenceError> for ExportError {
    fn from(err: ReferenceError) -> Self {
        match err {
            ReferenceError::Unavailable(_) => ExportError::Connection(err.to_string()),
            ReferenceError::Query(msg) => ExportError::Reference(msg),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Pipeline error, mapped per variant
    #[error(transparent)]
    Export(#[from] ExportError),

    /// listgen-common error
    #[error("Common error: {0}")]
    Common(#[from] listgen_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Export(ref err) => (err.status_code(), err.code(), err.to_string()),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
