//! Category to service assignments.

use appeals_common::AppResult;
use appeals_core::{AssignCategoryServicesInput, CategoryWithServices};
use appeals_db::entities::service;
use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

async fn overview(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<CategoryWithServices>>> {
    let assignments = state.directory_service.category_assignments(&user).await?;
    Ok(ApiResponse::ok(assignments))
}

async fn of_category(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
) -> AppResult<ApiResponse<Vec<service::Model>>> {
    let services = state
        .directory_service
        .category_services(&user, category_id)
        .await?;
    Ok(ApiResponse::ok(services))
}

async fn assign(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AssignCategoryServicesInput>,
) -> AppResult<ApiResponse<Vec<service::Model>>> {
    let services = state
        .directory_service
        .assign_category_services(&user, req)
        .await?;
    Ok(ApiResponse::ok(services))
}

async fn unassign(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((category_id, service_id)): Path<(i64, i64)>,
) -> AppResult<impl IntoResponse> {
    state
        .directory_service
        .unassign_category_service(&user, category_id, service_id)
        .await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/category/{category_id}", get(of_category))
        .route("/assign", post(assign))
        .route(
            "/category/{category_id}/service/{service_id}",
            delete(unassign),
        )
}
