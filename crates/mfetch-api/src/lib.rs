//! Axum HTTP/WS API server.
//!
//! This crate provides:
//! - The realtime status channel (`/ws`) for format lookups and downloads
//! - Artifact retrieval under `/downloads/{id}`
//! - Health, readiness and Prometheus metrics endpoints
//! - The periodic artifact sweeper

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::ArtifactSweeper;
pub use state::AppState;
