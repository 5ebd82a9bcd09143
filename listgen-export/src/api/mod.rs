//! HTTP API handlers for listgen-export
//!
//! Export and pre-check endpoints, progress stream and snapshot, health.

pub mod export;
pub mod health;
pub mod sse;

pub use export::export_routes;
pub use health::health_routes;
pub use sse::progress_routes;
