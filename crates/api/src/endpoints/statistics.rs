//! Statistics and dashboard endpoints.
//!
//! Every endpoint accepts optional `from_date` / `to_date` (RFC 3339) that
//! restrict appeals by creation time.

use appeals_common::AppResult;
use appeals_core::{
    DateRange,
    aggregate::{
        AdminDashboard, DispatcherDashboard, ExecutorDashboard, OverallStatistics,
        ServiceStatistics,
    },
};
use axum::{
    Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

async fn overall(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<ApiResponse<OverallStatistics>> {
    let stats = state.statistics_service.overall(&user, range).await?;
    Ok(ApiResponse::ok(stats))
}

async fn dispatcher_dashboard(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<ApiResponse<DispatcherDashboard>> {
    let dashboard = state
        .statistics_service
        .dispatcher_dashboard(&user, range)
        .await?;
    Ok(ApiResponse::ok(dashboard))
}

async fn admin_dashboard(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<ApiResponse<AdminDashboard>> {
    let dashboard = state.statistics_service.admin_dashboard(&user, range).await?;
    Ok(ApiResponse::ok(dashboard))
}

async fn executor_dashboard(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<ApiResponse<ExecutorDashboard>> {
    let dashboard = state
        .statistics_service
        .executor_dashboard(&user, range)
        .await?;
    Ok(ApiResponse::ok(dashboard))
}

async fn service_statistics(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(service_id): Path<i64>,
    Query(range): Query<DateRange>,
) -> AppResult<ApiResponse<ServiceStatistics>> {
    let stats = state
        .statistics_service
        .service_statistics(&user, service_id, range)
        .await?;
    Ok(ApiResponse::ok(stats))
}

/// Mounted under `/appeals` next to the lifecycle routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/statistics", get(overall))
        .route("/dashboard/dispatcher", get(dispatcher_dashboard))
        .route("/dashboard/admin", get(admin_dashboard))
        .route("/dashboard/executor", get(executor_dashboard))
        .route("/services/{service_id}/statistics", get(service_statistics))
}
