//! Axum HTTP API server.
//!
//! This crate provides:
//! - Job submission, query, cancel and retry endpoints
//! - A server-sent progress stream per job
//! - The persistent pause switch, cost estimates and download URLs
//! - The stalled-job reconciliation sweep
//! - Rate limiting and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{StalledJobSweeper, SweepReport};
pub use state::{AppState, Backends};
