//! Service directory endpoints: services, keyword corpora, executor links
//! and the classifier feed.

use appeals_common::AppResult;
use appeals_core::{
    ClassificationEntry, CreateServiceInput, KeywordsInput, LinkExecutorInput, UpdateServiceInput,
};
use appeals_db::entities::{service, service_keywords};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, Created, no_content},
};

// ==================== Request/Response Types ====================

#[derive(Debug, Default, Deserialize)]
pub struct ListServicesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Serialize)]
pub struct KeywordsResponse {
    pub service_id: i64,
    pub keywords: String,
}

#[derive(Serialize)]
pub struct ExecutorsResponse {
    pub service_id: i64,
    pub user_ids: Vec<i64>,
}

// ==================== Services ====================

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListServicesQuery>,
) -> AppResult<ApiResponse<Vec<service::Model>>> {
    let services = state
        .directory_service
        .list_services(&user, query.include_inactive)
        .await?;
    Ok(ApiResponse::ok(services))
}

async fn show(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<service::Model>> {
    let service = state.directory_service.get_service(id).await?;
    Ok(ApiResponse::ok(service))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateServiceInput>,
) -> AppResult<Created<service::Model>> {
    let service = state.directory_service.create_service(&user, req).await?;
    Ok(Created(service))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateServiceInput>,
) -> AppResult<ApiResponse<service::Model>> {
    let service = state.directory_service.update_service(&user, id, req).await?;
    Ok(ApiResponse::ok(service))
}

async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    state.directory_service.delete_service(&user, id).await?;
    Ok(no_content())
}

/// Served without caller identity; the classifier pulls it.
async fn for_classification(
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ClassificationEntry>>> {
    let entries = state.directory_service.services_for_classification().await?;
    Ok(ApiResponse::ok(entries))
}

// ==================== Keywords ====================

async fn keywords(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<KeywordsResponse>> {
    let keywords = state.directory_service.keywords(&user, id).await?;
    Ok(ApiResponse::ok(KeywordsResponse {
        service_id: id,
        keywords,
    }))
}

async fn set_keywords(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<KeywordsInput>,
) -> AppResult<ApiResponse<service_keywords::Model>> {
    let saved = state.directory_service.set_keywords(&user, id, req).await?;
    Ok(ApiResponse::ok(saved))
}

// ==================== Executors ====================

async fn executors(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<ExecutorsResponse>> {
    let user_ids = state.directory_service.executors(&user, id).await?;
    Ok(ApiResponse::ok(ExecutorsResponse {
        service_id: id,
        user_ids,
    }))
}

async fn link_executor(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<LinkExecutorInput>,
) -> AppResult<impl IntoResponse> {
    state.directory_service.link_executor(&user, id, req).await?;
    Ok(no_content())
}

async fn unlink_executor(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> AppResult<impl IntoResponse> {
    state
        .directory_service
        .unlink_executor(&user, id, user_id)
        .await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/for-classification", get(for_classification))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/keywords", get(keywords).put(set_keywords))
        .route("/{id}/executors", get(executors).post(link_executor))
        .route("/{id}/executors/{user_id}", delete(unlink_executor))
}
