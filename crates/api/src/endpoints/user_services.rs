//! Services linked to the caller.

use appeals_common::AppResult;
use appeals_db::entities::service;
use axum::{Router, extract::State, routing::get};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

async fn mine(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<service::Model>>> {
    let services = state.directory_service.my_services(&user).await?;
    Ok(ApiResponse::ok(services))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/me", get(mine))
}
