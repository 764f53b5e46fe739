//! Appeal lifecycle endpoints.

use appeals_common::AppResult;
use appeals_core::{
    AssignInput, ClassifyResult, CommentInput, CreateAppealInput, UpdateAppealInput,
    UpdatePriorityInput, UpdateStatusInput,
};
use appeals_db::{
    entities::{
        appeal::{self, AppealStatus},
        appeal_history, comment,
    },
    store::{AppealFilter, AppealSort, Pagination, SortField, SortOrder},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, Created, no_content},
};

// ==================== Request/Response Types ====================

/// Listing query string.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<AppealStatus>,
    pub category_id: Option<i64>,
    pub service_id: Option<i64>,
    pub user_id: Option<i64>,
    pub search: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
}

impl ListQuery {
    fn into_parts(self) -> (AppealFilter, Pagination, AppealSort) {
        let filter = AppealFilter {
            status: self.status,
            category_id: self.category_id,
            service_id: self.service_id,
            user_id: self.user_id,
            created_from: self.from_date,
            created_to: self.to_date,
            search: self.search,
        };
        let sort = AppealSort {
            field: self.sort_by.unwrap_or_default(),
            order: self.sort_order.unwrap_or_default(),
        };
        (filter, Pagination::new(self.page, self.limit), sort)
    }
}

/// One page of appeals.
#[derive(Serialize)]
pub struct AppealListResponse {
    pub items: Vec<appeal::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

// ==================== Handlers ====================

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<AppealListResponse>> {
    let (filter, page, sort) = query.into_parts();
    let result = state.appeal_service.list(&user, &filter, page, sort).await?;

    Ok(ApiResponse::ok(AppealListResponse {
        items: result.items,
        total: result.total,
        page: page.page,
        limit: page.limit,
    }))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateAppealInput>,
) -> AppResult<Created<appeal::Model>> {
    let appeal = state.appeal_service.create(&user, req).await?;
    Ok(Created(appeal))
}

async fn classify(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> AppResult<ApiResponse<ClassifyResult>> {
    let result = state.appeal_service.classify_text(&req.text).await?;
    Ok(ApiResponse::ok(result))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<appeal::Model>> {
    let appeal = state.appeal_service.get(&user, id).await?;
    Ok(ApiResponse::ok(appeal))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAppealInput>,
) -> AppResult<ApiResponse<appeal::Model>> {
    let appeal = state.appeal_service.update(&user, id, req).await?;
    Ok(ApiResponse::ok(appeal))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    state.appeal_service.delete(&user, id).await?;
    Ok(no_content())
}

async fn update_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusInput>,
) -> AppResult<ApiResponse<appeal::Model>> {
    let appeal = state.appeal_service.update_status(&user, id, req).await?;
    Ok(ApiResponse::ok(appeal))
}

async fn assign(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AssignInput>,
) -> AppResult<ApiResponse<appeal::Model>> {
    let appeal = state.appeal_service.assign(&user, id, req).await?;
    Ok(ApiResponse::ok(appeal))
}

async fn update_priority(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePriorityInput>,
) -> AppResult<ApiResponse<appeal::Model>> {
    let appeal = state.appeal_service.update_priority(&user, id, req).await?;
    Ok(ApiResponse::ok(appeal))
}

async fn history(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<Vec<appeal_history::Model>>> {
    let entries = state.appeal_service.history(&user, id).await?;
    Ok(ApiResponse::ok(entries))
}

async fn comments(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<Vec<comment::Model>>> {
    let comments = state.appeal_service.comments(&user, id).await?;
    Ok(ApiResponse::ok(comments))
}

async fn add_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CommentInput>,
) -> AppResult<Created<comment::Model>> {
    let comment = state.appeal_service.add_comment(&user, id, req).await?;
    Ok(Created(comment))
}

// ==================== Router ====================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/classify", post(classify))
        .route("/{id}", get(show).put(update).delete(delete))
        .route("/{id}/status", patch(update_status))
        .route("/{id}/assign", patch(assign))
        .route("/{id}/priority", patch(update_priority))
        .route("/{id}/history", get(history))
        .route("/{id}/comments", get(comments).post(add_comment))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let (filter, page, sort) = ListQuery::default().into_parts();
        assert!(filter.status.is_none());
        assert_eq!(page, Pagination::default());
        assert_eq!(sort, AppealSort::default());
    }

    #[test]
    fn test_list_query_maps_dates_to_filter() {
        let from: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let query = ListQuery {
            from_date: Some(from),
            sort_by: Some(SortField::Priority),
            sort_order: Some(SortOrder::Asc),
            page: Some(3),
            ..Default::default()
        };
        let (filter, page, sort) = query.into_parts();
        assert_eq!(filter.created_from, Some(from));
        assert_eq!(page.page, 3);
        assert_eq!(sort.field, SortField::Priority);
        assert_eq!(sort.order, SortOrder::Asc);
    }
}
