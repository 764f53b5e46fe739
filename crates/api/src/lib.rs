//! HTTP API layer for the citizen appeals service.
//!
//! - **Endpoints**: appeals, statistics and dashboards, directory management
//! - **Extractors**: the caller identity set by the gateway
//! - **Middleware**: shared state and identity resolution
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

use axum::{Router, routing::get};

pub use endpoints::{health, router};
pub use middleware::AppState;

/// Full application: `/health`, the API under `/api` and identity resolution.
///
/// Transport layers (CORS, tracing, timeouts) are added by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", router())
        .layer(axum::middleware::from_fn(middleware::identity_middleware))
        .with_state(state)
}
