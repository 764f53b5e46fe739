//! Category endpoints.

use appeals_common::AppResult;
use appeals_core::{CreateCategoryInput, UpdateCategoryInput};
use appeals_db::entities::category;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, Created, no_content},
};

#[derive(Debug, Default, Deserialize)]
pub struct ListCategoriesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListCategoriesQuery>,
) -> AppResult<ApiResponse<Vec<category::Model>>> {
    let categories = state
        .directory_service
        .list_categories(&user, query.include_inactive)
        .await?;
    Ok(ApiResponse::ok(categories))
}

async fn show(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<category::Model>> {
    let category = state.directory_service.get_category(id).await?;
    Ok(ApiResponse::ok(category))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateCategoryInput>,
) -> AppResult<Created<category::Model>> {
    let category = state.directory_service.create_category(&user, req).await?;
    Ok(Created(category))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCategoryInput>,
) -> AppResult<ApiResponse<category::Model>> {
    let category = state.directory_service.update_category(&user, id, req).await?;
    Ok(ApiResponse::ok(category))
}

async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    state.directory_service.delete_category(&user, id).await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
}
