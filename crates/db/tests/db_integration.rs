//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test -p appeals-db --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `appeals_test`)
//!   `TEST_DB_PASSWORD` (default: `appeals_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use appeals_db::{
    AppealRepository, AppealStore, DirectoryRepository, DirectoryStore,
    entities::appeal::AppealStatus,
    store::{AppealFilter, AppealSort, NewAppeal, NewService, Pagination},
    test_utils::{TestDatabase, TestDbConfig},
};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement};

fn pothole(user_id: i64) -> NewAppeal {
    NewAppeal {
        user_id,
        category_id: None,
        title: "Pothole on Main St".to_string(),
        description: "Deep pothole near the bus stop".to_string(),
        address: "Main St 12".to_string(),
        latitude: 50.45,
        longitude: 30.52,
        priority: 2,
    }
}

async fn seed_user(db: &TestDatabase, id: i64, role: &str) {
    db.connection()
        .execute(Statement::from_string(
            DatabaseBackend::Postgres,
            format!(
                "INSERT INTO users (id, email, first_name, last_name, role, is_active, created_at) \
                 VALUES ({id}, 'u{id}@city.example', 'Test', 'User', '{role}', true, NOW())"
            ),
        ))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_status_change_persists_history() {
    let db = TestDatabase::create_unique().await.unwrap();
    seed_user(&db, 1, "citizen").await;
    seed_user(&db, 2, "dispatcher").await;

    let conn = Arc::new(Database::connect(&db.config.database_url()).await.unwrap());
    let repo = AppealRepository::new(conn);

    let appeal = repo.create(pothole(1)).await.unwrap();
    assert_eq!(appeal.status, AppealStatus::New);

    let outcome = repo
        .update_status(appeal.id, AppealStatus::Completed, 2, Some("patched".into()))
        .await
        .unwrap();
    assert!(outcome.appeal.closed_at.is_some());

    let history = repo.history(appeal.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].old_status.as_deref(), Some("new"));
    assert_eq!(history[0].new_status, "completed");
    assert_eq!(history[0].comment.as_deref(), Some("patched"));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_failed_history_insert_rolls_back_status() {
    let db = TestDatabase::create_unique().await.unwrap();
    seed_user(&db, 1, "citizen").await;

    let conn = Arc::new(Database::connect(&db.config.database_url()).await.unwrap());
    let repo = AppealRepository::new(conn);
    let appeal = repo.create(pothole(1)).await.unwrap();

    // Make the history insert fail after the appeal row has been updated.
    db.connection()
        .execute(Statement::from_string(
            DatabaseBackend::Postgres,
            "ALTER TABLE appeal_history ADD CONSTRAINT reject_marker \
             CHECK (comment IS DISTINCT FROM 'reject-me')"
                .to_string(),
        ))
        .await
        .unwrap();

    let result = repo
        .update_status(appeal.id, AppealStatus::InProgress, 2, Some("reject-me".into()))
        .await;
    assert!(result.is_err());

    let reloaded = repo.get_by_id(appeal.id).await.unwrap();
    assert_eq!(reloaded.status, AppealStatus::New);
    assert!(repo.history(appeal.id).await.unwrap().is_empty());

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_search_and_service_lookup() {
    let db = TestDatabase::create_unique().await.unwrap();
    seed_user(&db, 1, "citizen").await;

    let conn = Arc::new(Database::connect(&db.config.database_url()).await.unwrap());
    let appeals = AppealRepository::new(conn.clone());
    let directory = DirectoryRepository::new(conn);

    appeals.create(pothole(1)).await.unwrap();
    let service = directory
        .create_service(NewService {
            name: "Road Maintenance".to_string(),
            description: String::new(),
            contact_person: String::new(),
            contact_phone: String::new(),
            contact_email: String::new(),
        })
        .await
        .unwrap();

    let page = appeals
        .list(
            &AppealFilter {
                search: Some("POTHOLE".to_string()),
                ..Default::default()
            },
            Pagination::default(),
            AppealSort::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let found = directory
        .find_active_service_by_name("road maintenance")
        .await
        .unwrap();
    assert_eq!(found.map(|s| s.id), Some(service.id));

    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}
