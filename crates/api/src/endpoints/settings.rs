//! Read-only system settings.

use appeals_common::AppResult;
use appeals_core::SystemSettings;
use axum::{Router, extract::State, routing::get};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

async fn show(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<SystemSettings>> {
    let settings = state.settings.get_settings().await?;
    Ok(ApiResponse::ok(settings))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(show))
}
