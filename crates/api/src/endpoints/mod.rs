//! API endpoints.

mod appeals;
mod categories;
mod category_services;
mod health;
mod services;
mod settings;
mod statistics;
mod user_services;

use axum::Router;

use crate::middleware::AppState;

pub use appeals::{AppealListResponse, ListQuery};
pub use health::{HealthResponse, health};

/// Create the API router, to be nested under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/appeals", appeals::router().merge(statistics::router()))
        .nest("/categories", categories::router())
        .nest("/services", services::router())
        .nest("/category-services", category_services::router())
        .nest("/user-services", user_services::router())
        .nest("/system-settings", settings::router())
}
