//! Directory repository: categories, services, keywords and executor links.

use std::sync::Arc;

use appeals_common::{AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
    sea_query::{Expr, Func},
};

use crate::entities::{
    Category, CategoryService, Service, ServiceKeywords, User, UserService, category,
    category_service, service, service_keywords,
    user::{self, UserRole},
    user_service,
};
use crate::store::{
    CategoryChanges, DirectoryStore, NewCategory, NewService, ServiceChanges,
};

/// Directory repository backed by `PostgreSQL`.
#[derive(Clone)]
pub struct DirectoryRepository {
    db: Arc<DatabaseConnection>,
}

impl DirectoryRepository {
    /// Create a new directory repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DirectoryStore for DirectoryRepository {
    async fn find_category(&self, id: i64) -> AppResult<Option<category::Model>> {
        Category::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_categories(&self, active_only: bool) -> AppResult<Vec<category::Model>> {
        let mut query = Category::find();
        if active_only {
            query = query.filter(category::Column::IsActive.eq(true));
        }
        query
            .order_by_asc(category::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn create_category(&self, input: NewCategory) -> AppResult<category::Model> {
        let now = Utc::now();
        category::ActiveModel {
            name: Set(input.name),
            description: Set(input.description),
            default_priority: Set(input.default_priority),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update_category(
        &self,
        id: i64,
        changes: CategoryChanges,
    ) -> AppResult<category::Model> {
        let existing = self
            .find_category(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {id}")))?;
        let mut active: category::ActiveModel = existing.into();

        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(default_priority) = changes.default_priority {
            active.default_priority = Set(default_priority);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_service(&self, id: i64) -> AppResult<Option<service::Model>> {
        Service::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_active_service_by_name(&self, name: &str) -> AppResult<Option<service::Model>> {
        Service::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(service::Column::Name)))
                    .eq(name.trim().to_lowercase()),
            )
            .filter(service::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_services(&self, active_only: bool) -> AppResult<Vec<service::Model>> {
        let mut query = Service::find();
        if active_only {
            query = query.filter(service::Column::IsActive.eq(true));
        }
        query
            .order_by_asc(service::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn create_service(&self, input: NewService) -> AppResult<service::Model> {
        let now = Utc::now();
        service::ActiveModel {
            name: Set(input.name),
            description: Set(input.description),
            contact_person: Set(input.contact_person),
            contact_phone: Set(input.contact_phone),
            contact_email: Set(input.contact_email),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update_service(&self, id: i64, changes: ServiceChanges) -> AppResult<service::Model> {
        let existing = self
            .find_service(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Service {id}")))?;
        let mut active: service::ActiveModel = existing.into();

        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(contact_person) = changes.contact_person {
            active.contact_person = Set(contact_person);
        }
        if let Some(contact_phone) = changes.contact_phone {
            active.contact_phone = Set(contact_phone);
        }
        if let Some(contact_email) = changes.contact_email {
            active.contact_email = Set(contact_email);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn service_keywords(
        &self,
        service_id: i64,
    ) -> AppResult<Option<service_keywords::Model>> {
        ServiceKeywords::find_by_id(service_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn all_service_keywords(&self) -> AppResult<Vec<service_keywords::Model>> {
        ServiceKeywords::find()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_service_keywords(
        &self,
        service_id: i64,
        keywords: String,
    ) -> AppResult<service_keywords::Model> {
        let now = Utc::now();
        match self.service_keywords(service_id).await? {
            Some(existing) => {
                let mut active: service_keywords::ActiveModel = existing.into();
                active.keywords = Set(keywords);
                active.updated_at = Set(now);
                active.update(self.db.as_ref()).await
            }
            None => {
                service_keywords::ActiveModel {
                    service_id: Set(service_id),
                    keywords: Set(keywords),
                    updated_at: Set(now),
                }
                .insert(self.db.as_ref())
                .await
            }
        }
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn services_for_user(&self, user_id: i64) -> AppResult<Vec<service::Model>> {
        let ids: Vec<i64> = UserService::find()
            .filter(user_service::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .map(|link| link.service_id)
            .collect();

        if ids.is_empty() {
            return Ok(vec![]);
        }

        Service::find()
            .filter(service::Column::Id.is_in(ids))
            .order_by_asc(service::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn executors_of_service(&self, service_id: i64) -> AppResult<Vec<i64>> {
        Ok(UserService::find()
            .filter(user_service::Column::ServiceId.eq(service_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .map(|link| link.user_id)
            .collect())
    }

    async fn link_executor(&self, user_id: i64, service_id: i64) -> AppResult<()> {
        let existing = UserService::find_by_id((user_id, service_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if existing.is_some() {
            return Ok(());
        }

        user_service::ActiveModel {
            user_id: Set(user_id),
            service_id: Set(service_id),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn unlink_executor(&self, user_id: i64, service_id: i64) -> AppResult<bool> {
        let result = UserService::delete_by_id((user_id, service_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    async fn category_service_links(
        &self,
        category_id: Option<i64>,
    ) -> AppResult<Vec<category_service::Model>> {
        let mut query = CategoryService::find();
        if let Some(category_id) = category_id {
            query = query.filter(category_service::Column::CategoryId.eq(category_id));
        }
        query
            .order_by_asc(category_service::Column::CategoryId)
            .order_by_asc(category_service::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn replace_category_services(
        &self,
        category_id: i64,
        service_ids: &[i64],
    ) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        CategoryService::delete_many()
            .filter(category_service::Column::CategoryId.eq(category_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !service_ids.is_empty() {
            let now = Utc::now();
            let rows = service_ids
                .iter()
                .zip(0_i32..)
                .map(|(service_id, position)| category_service::ActiveModel {
                    category_id: Set(category_id),
                    service_id: Set(*service_id),
                    position: Set(position),
                    created_at: Set(now),
                });
            CategoryService::insert_many(rows)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn remove_category_service(
        &self,
        category_id: i64,
        service_id: i64,
    ) -> AppResult<bool> {
        let result = CategoryService::delete_by_id((category_id, service_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    async fn find_user(&self, id: i64) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn users_with_roles(&self, roles: &[UserRole]) -> AppResult<Vec<user::Model>> {
        if roles.is_empty() {
            return Ok(vec![]);
        }

        User::find()
            .filter(user::Column::Role.is_in(roles.to_vec()))
            .filter(user::Column::IsActive.eq(true))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_service(id: i64, name: &str) -> service::Model {
        let now = Utc::now();
        service::Model {
            id,
            name: name.to_string(),
            description: "Road maintenance".to_string(),
            contact_person: "Olena".to_string(),
            contact_phone: "+380440000000".to_string(),
            contact_email: "roads@city.example".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_find_active_service_by_name() {
        let service = create_test_service(3, "Roads");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[service]])
                .into_connection(),
        );

        let repo = DirectoryRepository::new(db);
        let found = repo.find_active_service_by_name("  ROADS ").await.unwrap();

        assert_eq!(found.unwrap().id, 3);
    }

    #[tokio::test]
    async fn test_services_for_user_without_links() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user_service::Model>::new()])
                .into_connection(),
        );

        let repo = DirectoryRepository::new(db);
        let services = repo.services_for_user(7).await.unwrap();

        assert!(services.is_empty());
    }

    #[tokio::test]
    async fn test_services_for_user_resolves_links() {
        let link = user_service::Model {
            user_id: 7,
            service_id: 3,
            created_at: Utc::now(),
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[link]])
                .append_query_results([[create_test_service(3, "Roads")]])
                .into_connection(),
        );

        let repo = DirectoryRepository::new(db);
        let services = repo.services_for_user(7).await.unwrap();

        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "Roads");
    }

    #[tokio::test]
    async fn test_unlink_executor_reports_missing_link() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = DirectoryRepository::new(db);
        assert!(!repo.unlink_executor(7, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_service_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<service::Model>::new()])
                .into_connection(),
        );

        let repo = DirectoryRepository::new(db);
        let result = repo.update_service(9, ServiceChanges::default()).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_replace_category_services_runs_in_transaction() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 2,
                    },
                ])
                .into_connection(),
        );

        let repo = DirectoryRepository::new(Arc::clone(&db));
        repo.replace_category_services(5, &[3, 1]).await.unwrap();

        drop(repo);
        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_update_category_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<category::Model>::new()])
                .into_connection(),
        );

        let repo = DirectoryRepository::new(db);
        let result = repo.update_category(9, CategoryChanges::default()).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
