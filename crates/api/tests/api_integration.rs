//! API integration tests.
//!
//! These run the full router against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use std::sync::Arc;

use appeals_api::{AppState, app};
use appeals_common::AppResult;
use appeals_core::{
    AppealService, Classification, Classifier, DirectoryService, NoOpSink, Notifier,
    StaticSettings, StatisticsService,
};
use appeals_db::{
    DirectoryStore, MemoryStore,
    entities::user::UserRole,
    store::{NewCategory, NewService},
};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

const CITIZEN: (i64, &str) = (1, "citizen");
const DISPATCHER: (i64, &str) = (2, "dispatcher");
const EXECUTOR: (i64, &str) = (3, "executor");
const ADMIN: (i64, &str) = (4, "admin");

/// Sends "pothole" texts to road maintenance with high confidence.
struct KeywordClassifier;

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> AppResult<Classification> {
        if text.to_lowercase().contains("pothole") {
            Ok(Classification {
                label: "Road Maintenance".to_string(),
                confidence: 0.92,
                ..Classification::none()
            })
        } else {
            Ok(Classification {
                label: "Parks".to_string(),
                confidence: 0.4,
                ..Classification::none()
            })
        }
    }
}

struct TestApp {
    router: Router,
    category_id: i64,
    service_id: i64,
}

async fn create_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    for (id, role) in [
        (CITIZEN.0, UserRole::Citizen),
        (DISPATCHER.0, UserRole::Dispatcher),
        (EXECUTOR.0, UserRole::Executor),
        (ADMIN.0, UserRole::Admin),
    ] {
        store.add_user(id, role).unwrap();
    }

    let category = store
        .create_category(NewCategory {
            name: "Roads & pavements".into(),
            description: String::new(),
            default_priority: 2,
        })
        .await
        .unwrap();
    let service = store
        .create_service(NewService {
            name: "Road Maintenance".into(),
            description: "Potholes and pavement".into(),
            contact_person: String::new(),
            contact_phone: String::new(),
            contact_email: String::new(),
        })
        .await
        .unwrap();
    store.link_executor(EXECUTOR.0, service.id).await.unwrap();

    let settings = Arc::new(StaticSettings::with_threshold(0.75));
    let notifier = Notifier::new(store.clone(), Arc::new(NoOpSink));
    let state = AppState {
        appeal_service: AppealService::new(
            store.clone(),
            store.clone(),
            Arc::new(KeywordClassifier),
            settings.clone(),
            notifier,
        ),
        statistics_service: StatisticsService::new(store.clone(), store.clone()),
        directory_service: DirectoryService::new(store.clone()),
        settings,
    };

    TestApp {
        router: app(state),
        category_id: category.id,
        service_id: service.id,
    }
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    who: Option<(i64, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .uri(uri)
        .method(method)
        .header("Content-Type", "application/json");
    if let Some((id, role)) = who {
        builder = builder
            .header("X-User-Id", id.to_string())
            .header("X-User-Role", role);
    }
    let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));

    let response = app
        .router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn appeal_body(category_id: i64, description: &str) -> Value {
    json!({
        "title": "Road damage on Main St",
        "description": description,
        "category_id": category_id,
        "address": "Main St 12",
        "latitude": 50.45,
        "longitude": 30.52,
    })
}

#[tokio::test]
async fn test_health_needs_no_identity() {
    let app = create_test_app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = create_test_app().await;

    let (status, _) = send(&app, "GET", "/api/appeals", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/appeals", Some((5, "mayor")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_confident_classification_routes_new_appeal() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/appeals",
        Some(CITIZEN),
        Some(appeal_body(app.category_id, "Deep pothole near the bus stop")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "assigned");
    assert_eq!(body["data"]["service_id"], app.service_id);

    let id = body["data"]["id"].as_i64().unwrap();
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/appeals/{id}/history"),
        Some(CITIZEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["old_status"], "new");
    assert_eq!(history[0]["new_status"], "assigned");
}

#[tokio::test]
async fn test_unconfident_classification_leaves_appeal_new() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/appeals",
        Some(CITIZEN),
        Some(appeal_body(app.category_id, "The fountain in the park is dry")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "new");
    assert!(body["data"]["service_id"].is_null());
}

#[tokio::test]
async fn test_create_rules() {
    let app = create_test_app().await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/appeals",
        Some(DISPATCHER),
        Some(appeal_body(app.category_id, "Deep pothole near the bus stop")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut short = appeal_body(app.category_id, "Deep pothole near the bus stop");
    short["title"] = json!("Hole");
    let (status, body) = send(&app, "POST", "/api/appeals", Some(CITIZEN), Some(short)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        "POST",
        "/api/appeals",
        Some(CITIZEN),
        Some(appeal_body(9999, "Deep pothole near the bus stop")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_workflow_across_roles() {
    let app = create_test_app().await;
    let (_, body) = send(
        &app,
        "POST",
        "/api/appeals",
        Some(CITIZEN),
        Some(appeal_body(app.category_id, "Deep pothole near the bus stop")),
    )
    .await;
    let id = body["data"]["id"].as_i64().unwrap();
    let status_uri = format!("/api/appeals/{id}/status");

    let (status, _) = send(
        &app,
        "PATCH",
        &status_uri,
        Some(CITIZEN),
        Some(json!({"status": "closed"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "PATCH",
        &status_uri,
        Some(EXECUTOR),
        Some(json!({"status": "in_progress", "comment": "Crew dispatched"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in_progress");

    let (status, body) = send(
        &app,
        "PATCH",
        &status_uri,
        Some(DISPATCHER),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["data"]["closed_at"].is_null());

    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/appeals/{id}/history"),
        Some(ADMIN),
        None,
    )
    .await;
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1]["comment"], "Crew dispatched");
}

#[tokio::test]
async fn test_delete_is_always_refused() {
    let app = create_test_app().await;
    let (_, body) = send(
        &app,
        "POST",
        "/api/appeals",
        Some(CITIZEN),
        Some(appeal_body(app.category_id, "Deep pothole near the bus stop")),
    )
    .await;
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = send(&app, "DELETE", &format!("/api/appeals/{id}"), Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", "/api/appeals/9999", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_paginates_and_filters() {
    let app = create_test_app().await;
    for description in [
        "Deep pothole near the bus stop",
        "The fountain in the park is dry",
        "Another pothole by the school",
    ] {
        send(
            &app,
            "POST",
            "/api/appeals",
            Some(CITIZEN),
            Some(appeal_body(app.category_id, description)),
        )
        .await;
    }

    let (status, body) = send(
        &app,
        "GET",
        "/api/appeals?limit=2&page=1",
        Some(DISPATCHER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);

    let (_, body) = send(
        &app,
        "GET",
        "/api/appeals?status=new",
        Some(DISPATCHER),
        None,
    )
    .await;
    assert_eq!(body["data"]["total"], 1);

    let (_, body) = send(
        &app,
        "GET",
        "/api/appeals?search=POTHOLE&sort_by=created_at&sort_order=asc",
        Some(DISPATCHER),
        None,
    )
    .await;
    assert_eq!(body["data"]["total"], 2);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/appeals?page={}&limit=100", u64::MAX),
        Some(DISPATCHER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_dashboards_are_role_gated() {
    let app = create_test_app().await;
    send(
        &app,
        "POST",
        "/api/appeals",
        Some(CITIZEN),
        Some(appeal_body(app.category_id, "Deep pothole near the bus stop")),
    )
    .await;

    let (status, _) = send(&app, "GET", "/api/appeals/statistics", Some(CITIZEN), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/api/appeals/statistics", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    let (status, _) = send(
        &app,
        "GET",
        "/api/appeals/dashboard/admin",
        Some(DISPATCHER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "GET",
        "/api/appeals/dashboard/executor",
        Some(EXECUTOR),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active_appeals"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/appeals/services/{}/statistics", app.service_id),
        Some(CITIZEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"]["name"], "Road Maintenance");
}

#[tokio::test]
async fn test_inverted_date_range_is_bad_request() {
    let app = create_test_app().await;
    let (status, _) = send(
        &app,
        "GET",
        "/api/appeals/dashboard/dispatcher?from_date=2026-03-01T00:00:00Z&to_date=2026-02-01T00:00:00Z",
        Some(DISPATCHER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_classify_endpoint() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/appeals/classify",
        Some(CITIZEN),
        Some(json!({"text": "pothole on the corner"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"], "Road Maintenance");
    assert_eq!(body["data"]["meets_threshold"], true);

    let (status, _) = send(
        &app,
        "POST",
        "/api/appeals/classify",
        Some(CITIZEN),
        Some(json!({"text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_directory_management() {
    let app = create_test_app().await;

    let service = json!({"name": "Street Lighting", "contact_email": "light@city.example"});
    let (status, _) = send(&app, "POST", "/api/services", Some(DISPATCHER), Some(service.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "POST", "/api/services", Some(ADMIN), Some(service)).await;
    assert_eq!(status, StatusCode::CREATED);
    let lighting = body["data"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/services/{lighting}/keywords"),
        Some(ADMIN),
        Some(json!({"keywords": "lamp streetlight dark"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/services/{lighting}/keywords"),
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(body["data"]["keywords"], "lamp streetlight dark");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/services/{lighting}/executors"),
        Some(ADMIN),
        Some(json!({"user_id": EXECUTOR.0})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", "/api/user-services/me", Some(EXECUTOR), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/services/{lighting}/executors/{}", EXECUTOR.0),
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", "/api/categories", Some(CITIZEN), None).await;
    assert_eq!(body["data"][0]["name"], "Roads & pavements");
}

#[tokio::test]
async fn test_system_settings() {
    let app = create_test_app().await;
    let (status, body) = send(&app, "GET", "/api/system-settings", Some(CITIZEN), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["confidence_threshold"], 0.75);
}

#[tokio::test]
async fn test_category_lifecycle() {
    let app = create_test_app().await;
    let uri = format!("/api/categories/{}", app.category_id);

    let (status, _) = send(&app, "PUT", &uri, Some(DISPATCHER), Some(json!({"name": "Roads"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(ADMIN),
        Some(json!({"name": "Roads", "default_priority": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Roads");
    assert_eq!(body["data"]["default_priority"], 3);

    let (status, _) = send(&app, "DELETE", &uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", "/api/categories", Some(CITIZEN), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
    let (_, body) = send(
        &app,
        "GET",
        "/api/categories?include_inactive=true",
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(body["data"][0]["is_active"], false);

    let (status, _) = send(&app, "DELETE", "/api/categories/9999", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_service_assignments() {
    let app = create_test_app().await;
    let assign = json!({"category_id": app.category_id, "service_ids": [app.service_id]});

    let (status, _) = send(
        &app,
        "POST",
        "/api/category-services/assign",
        Some(EXECUTOR),
        Some(assign.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        "/api/category-services/assign",
        Some(DISPATCHER),
        Some(assign),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "Road Maintenance");

    let (_, body) = send(&app, "GET", "/api/category-services", Some(ADMIN), None).await;
    assert_eq!(body["data"][0]["category"]["id"], app.category_id);
    assert_eq!(body["data"][0]["services"][0]["id"], app.service_id);

    let one = format!(
        "/api/category-services/category/{}/service/{}",
        app.category_id, app.service_id
    );
    let (status, _) = send(&app, "DELETE", &one, Some(DISPATCHER), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", &one, Some(DISPATCHER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/category-services/category/{}", app.category_id),
        Some(DISPATCHER),
        None,
    )
    .await;
    assert!(body["data"].as_array().unwrap().is_empty());

    // Assignments never influence routing.
    let (_, body) = send(
        &app,
        "POST",
        "/api/appeals",
        Some(CITIZEN),
        Some(appeal_body(app.category_id, "The fountain in the park is dry")),
    )
    .await;
    assert_eq!(body["data"]["status"], "new");
}

#[tokio::test]
async fn test_classification_feed_and_service_delete() {
    let app = create_test_app().await;
    send(
        &app,
        "PUT",
        &format!("/api/services/{}/keywords", app.service_id),
        Some(ADMIN),
        Some(json!({"keywords": "pothole; asphalt"})),
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/services/for-classification", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "Road Maintenance");
    assert_eq!(
        body["data"][0]["description"],
        "Potholes and pavement; pothole; asphalt"
    );

    let uri = format!("/api/services/{}", app.service_id);
    let (status, _) = send(&app, "DELETE", &uri, Some(DISPATCHER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", "/api/services/for-classification", None, None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
    let (_, body) = send(&app, "GET", &uri, Some(CITIZEN), None).await;
    assert_eq!(body["data"]["is_active"], false);
}
