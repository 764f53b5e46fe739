//! Appeal repository.

use std::sync::Arc;

use appeals_common::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    QueryTrait, Set, TransactionTrait,
    sea_query::{Expr, Func, LikeExpr},
};
use tracing::debug;

use crate::entities::{
    Appeal, AppealHistory, Comment,
    appeal::{self, AppealStatus},
    appeal_history, comment,
};
use crate::store::{
    AppealChanges, AppealFilter, AppealPage, AppealScope, AppealSort, AppealStore, LIKE_ESCAPE,
    NewAppeal, NewComment, Pagination, SortField, SortOrder, TransitionOutcome,
};
use crate::transition::{
    HistoryDraft, closed_at_after, plan_assignment, plan_auto_route, plan_status_change,
};

/// Appeal repository backed by `PostgreSQL`.
///
/// Every status change runs in one transaction that locks the appeal row,
/// so the status column and the history table never disagree.
#[derive(Clone)]
pub struct AppealRepository {
    db: Arc<DatabaseConnection>,
}

impl AppealRepository {
    /// Create a new appeal repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// `SELECT ... FOR UPDATE` on one appeal.
    async fn lock_appeal(txn: &DatabaseTransaction, id: i64) -> AppResult<appeal::Model> {
        Appeal::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or(AppError::AppealNotFound(id))
    }

    async fn insert_history<C: ConnectionTrait>(
        conn: &C,
        appeal_id: i64,
        actor_id: i64,
        draft: HistoryDraft,
        now: DateTime<Utc>,
    ) -> AppResult<appeal_history::Model> {
        appeal_history::ActiveModel {
            appeal_id: Set(appeal_id),
            user_id: Set(actor_id),
            old_status: Set(draft.old_status),
            new_status: Set(draft.new_status),
            action: Set(draft.action),
            comment: Set(draft.comment),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn commit(txn: DatabaseTransaction) -> AppResult<()> {
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    fn filter_condition(filter: &AppealFilter) -> Condition {
        let mut condition = Condition::all();

        if let Some(status) = filter.status {
            condition = condition.add(appeal::Column::Status.eq(status));
        }
        if let Some(category_id) = filter.category_id {
            condition = condition.add(appeal::Column::CategoryId.eq(category_id));
        }
        if let Some(service_id) = filter.service_id {
            condition = condition.add(appeal::Column::ServiceId.eq(service_id));
        }
        if let Some(user_id) = filter.user_id {
            condition = condition.add(appeal::Column::UserId.eq(user_id));
        }
        if let Some(from) = filter.created_from {
            condition = condition.add(appeal::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.created_to {
            condition = condition.add(appeal::Column::CreatedAt.lte(to));
        }
        if let Some(pattern) = filter.search_pattern() {
            let like = || LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE);
            condition = condition.add(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(appeal::Column::Title))).like(like()))
                    .add(
                        Expr::expr(Func::lower(Expr::col(appeal::Column::Description)))
                            .like(like()),
                    ),
            );
        }

        condition
    }
}

#[async_trait]
impl AppealStore for AppealRepository {
    async fn create(&self, input: NewAppeal) -> AppResult<appeal::Model> {
        let now = Utc::now();
        appeal::ActiveModel {
            user_id: Set(input.user_id),
            category_id: Set(input.category_id),
            service_id: Set(None),
            status: Set(AppealStatus::New),
            title: Set(input.title),
            description: Set(input.description),
            address: Set(input.address),
            latitude: Set(input.latitude),
            longitude: Set(input.longitude),
            priority: Set(input.priority),
            created_at: Set(now),
            updated_at: Set(now),
            closed_at: Set(None),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<appeal::Model>> {
        Appeal::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list(
        &self,
        filter: &AppealFilter,
        page: Pagination,
        sort: AppealSort,
    ) -> AppResult<AppealPage> {
        let query = Appeal::find().filter(Self::filter_condition(filter));

        let total = query
            .clone()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let order = match sort.order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };
        let query = match sort.field {
            SortField::CreatedAt => query.order_by(appeal::Column::CreatedAt, order),
            SortField::Priority => query
                .order_by(appeal::Column::Priority, order)
                .order_by_desc(appeal::Column::CreatedAt),
            SortField::Status => query
                .order_by(appeal::Column::Status, order)
                .order_by_desc(appeal::Column::CreatedAt),
        };

        let items = query
            .offset(page.offset())
            .limit(page.limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(AppealPage { items, total })
    }

    async fn update_details(&self, id: i64, changes: AppealChanges) -> AppResult<appeal::Model> {
        let existing = self.get_by_id(id).await?;
        let mut active: appeal::ActiveModel = existing.into();

        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(category_id) = changes.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(address) = changes.address {
            active.address = Set(address);
        }
        if let Some(latitude) = changes.latitude {
            active.latitude = Set(latitude);
        }
        if let Some(longitude) = changes.longitude {
            active.longitude = Set(longitude);
        }
        active.updated_at = Set(Utc::now());

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update_status(
        &self,
        id: i64,
        target: AppealStatus,
        actor_id: i64,
        comment: Option<String>,
    ) -> AppResult<TransitionOutcome> {
        let now = Utc::now();
        let txn = self.begin().await?;
        let current = Self::lock_appeal(&txn, id).await?;
        let previous_status = current.status;
        let previous_closed_at = current.closed_at;

        let Some(draft) = plan_status_change(previous_status, target, comment) else {
            debug!(appeal_id = id, status = %target, "Status unchanged, touching updated_at");
            let mut active: appeal::ActiveModel = current.into();
            active.updated_at = Set(now);
            let appeal = active
                .update(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            Self::commit(txn).await?;
            return Ok(TransitionOutcome {
                appeal,
                previous_status,
                history: None,
            });
        };

        let mut active: appeal::ActiveModel = current.into();
        active.status = Set(target);
        active.closed_at = Set(closed_at_after(target, previous_closed_at, now));
        active.updated_at = Set(now);
        let appeal = active
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let entry = Self::insert_history(&txn, id, actor_id, draft, now).await?;
        Self::commit(txn).await?;

        debug!(appeal_id = id, from = %previous_status, to = %target, "Appeal status changed");

        Ok(TransitionOutcome {
            appeal,
            previous_status,
            history: Some(entry),
        })
    }

    async fn assign(
        &self,
        id: i64,
        service_id: i64,
        priority: Option<i16>,
        actor_id: i64,
    ) -> AppResult<TransitionOutcome> {
        let now = Utc::now();
        let txn = self.begin().await?;
        let current = Self::lock_appeal(&txn, id).await?;
        let previous_status = current.status;
        let draft = plan_assignment(previous_status);

        let mut active: appeal::ActiveModel = current.into();
        active.service_id = Set(Some(service_id));
        active.status = Set(AppealStatus::Assigned);
        if let Some(priority) = priority {
            active.priority = Set(priority);
        }
        active.updated_at = Set(now);
        let appeal = active
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let entry = Self::insert_history(&txn, id, actor_id, draft, now).await?;
        Self::commit(txn).await?;

        Ok(TransitionOutcome {
            appeal,
            previous_status,
            history: Some(entry),
        })
    }

    async fn auto_route(
        &self,
        id: i64,
        service_id: i64,
        actor_id: i64,
    ) -> AppResult<Option<TransitionOutcome>> {
        let now = Utc::now();
        let txn = self.begin().await?;
        let current = Self::lock_appeal(&txn, id).await?;

        if current.status != AppealStatus::New || current.service_id.is_some() {
            // Someone got there first; dropping the transaction rolls it back.
            return Ok(None);
        }

        let mut active: appeal::ActiveModel = current.into();
        active.service_id = Set(Some(service_id));
        active.status = Set(AppealStatus::Assigned);
        active.updated_at = Set(now);
        let appeal = active
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let entry = Self::insert_history(&txn, id, actor_id, plan_auto_route(), now).await?;
        Self::commit(txn).await?;

        Ok(Some(TransitionOutcome {
            appeal,
            previous_status: AppealStatus::New,
            history: Some(entry),
        }))
    }

    async fn update_priority(&self, id: i64, priority: i16) -> AppResult<appeal::Model> {
        let existing = self.get_by_id(id).await?;
        let mut active: appeal::ActiveModel = existing.into();
        active.priority = Set(priority);
        active.updated_at = Set(Utc::now());
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn history(&self, id: i64) -> AppResult<Vec<appeal_history::Model>> {
        AppealHistory::find()
            .filter(appeal_history::Column::AppealId.eq(id))
            .order_by_asc(appeal_history::Column::CreatedAt)
            .order_by_asc(appeal_history::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn load(&self, scope: &AppealScope) -> AppResult<Vec<appeal::Model>> {
        let mut condition = Condition::all();
        if let Some(from) = scope.created_from {
            condition = condition.add(appeal::Column::CreatedAt.gte(from));
        }
        if let Some(to) = scope.created_to {
            condition = condition.add(appeal::Column::CreatedAt.lte(to));
        }
        if let Some(ids) = &scope.service_ids {
            if ids.is_empty() {
                return Ok(vec![]);
            }
            condition = condition.add(appeal::Column::ServiceId.is_in(ids.clone()));
        }

        Appeal::find()
            .filter(condition)
            .order_by_desc(appeal::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn resolved_by_actor(
        &self,
        actor_id: i64,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<appeal::Model>> {
        let closed_ids = AppealHistory::find()
            .select_only()
            .column(appeal_history::Column::AppealId)
            .filter(appeal_history::Column::UserId.eq(actor_id))
            .filter(appeal_history::Column::NewStatus.is_in([
                AppealStatus::Completed.as_str(),
                AppealStatus::Closed.as_str(),
            ]))
            .filter(appeal_history::Column::CreatedAt.gte(since))
            .into_query();

        Appeal::find()
            .filter(appeal::Column::Id.in_subquery(closed_ids))
            .order_by_asc(appeal::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn add_comment(&self, input: NewComment) -> AppResult<comment::Model> {
        comment::ActiveModel {
            appeal_id: Set(input.appeal_id),
            user_id: Set(input.user_id),
            text: Set(input.text),
            is_internal: Set(input.is_internal),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn comments(
        &self,
        appeal_id: i64,
        include_internal: bool,
    ) -> AppResult<Vec<comment::Model>> {
        let mut query = Comment::find().filter(comment::Column::AppealId.eq(appeal_id));
        if !include_internal {
            query = query.filter(comment::Column::IsInternal.eq(false));
        }
        query
            .order_by_asc(comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_appeal(id: i64, status: AppealStatus) -> appeal::Model {
        let now = Utc::now();
        appeal::Model {
            id,
            user_id: 10,
            category_id: Some(1),
            service_id: None,
            status,
            title: "Pothole on Main St".to_string(),
            description: "Deep pothole near the bus stop".to_string(),
            address: "Main St 12".to_string(),
            latitude: 50.45,
            longitude: 30.52,
            priority: 2,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    fn create_test_entry(
        appeal_id: i64,
        old: &str,
        new: &str,
        action: &str,
    ) -> appeal_history::Model {
        appeal_history::Model {
            id: 1,
            appeal_id,
            user_id: 20,
            old_status: Some(old.to_string()),
            new_status: new.to_string(),
            action: action.to_string(),
            comment: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_find_by_id_found() {
        let appeal = create_test_appeal(1, AppealStatus::New);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[appeal.clone()]])
                .into_connection(),
        );

        let repo = AppealRepository::new(db);
        let result = repo.find_by_id(1).await.unwrap();

        assert_eq!(result.unwrap().title, "Pothole on Main St");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<appeal::Model>::new()])
                .into_connection(),
        );

        let repo = AppealRepository::new(db);
        let result = repo.get_by_id(99).await;

        assert!(matches!(result, Err(AppError::AppealNotFound(99))));
    }

    #[tokio::test]
    async fn test_list_returns_total() {
        let a = create_test_appeal(1, AppealStatus::New);
        let b = create_test_appeal(2, AppealStatus::Assigned);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(7)),
                }]])
                .append_query_results([[a, b]])
                .into_connection(),
        );

        let repo = AppealRepository::new(db);
        let page = repo
            .list(
                &AppealFilter {
                    search: Some("pothole".into()),
                    ..Default::default()
                },
                Pagination::new(Some(1), Some(2)),
                AppealSort::default(),
            )
            .await
            .unwrap();

        assert_eq!(page.total, 7);
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn test_update_status_writes_history_in_transaction() {
        let current = create_test_appeal(1, AppealStatus::Assigned);
        let mut updated = current.clone();
        updated.status = AppealStatus::InProgress;
        let entry = create_test_entry(
            1,
            "assigned",
            "in_progress",
            "Status changed from Assigned to In Progress",
        );

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[current]])
                .append_query_results([[updated]])
                .append_query_results([[entry]])
                .into_connection(),
        );

        let repo = AppealRepository::new(db);
        let outcome = repo
            .update_status(1, AppealStatus::InProgress, 20, None)
            .await
            .unwrap();

        assert_eq!(outcome.previous_status, AppealStatus::Assigned);
        assert_eq!(outcome.appeal.status, AppealStatus::InProgress);
        assert_eq!(
            outcome.history.unwrap().action,
            "Status changed from Assigned to In Progress"
        );
    }

    #[tokio::test]
    async fn test_update_status_same_status_skips_history() {
        let current = create_test_appeal(1, AppealStatus::InProgress);
        let touched = current.clone();

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[current]])
                .append_query_results([[touched]])
                .into_connection(),
        );

        let repo = AppealRepository::new(db);
        let outcome = repo
            .update_status(1, AppealStatus::InProgress, 20, Some("still on it".into()))
            .await
            .unwrap();

        assert!(outcome.history.is_none());
        assert_eq!(outcome.appeal.status, AppealStatus::InProgress);
    }

    #[tokio::test]
    async fn test_update_status_missing_appeal() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<appeal::Model>::new()])
                .into_connection(),
        );

        let repo = AppealRepository::new(db);
        let result = repo
            .update_status(5, AppealStatus::Completed, 20, None)
            .await;

        assert!(matches!(result, Err(AppError::AppealNotFound(5))));
    }

    #[tokio::test]
    async fn test_auto_route_skips_already_routed() {
        let mut current = create_test_appeal(1, AppealStatus::Assigned);
        current.service_id = Some(3);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[current]])
                .into_connection(),
        );

        let repo = AppealRepository::new(db);
        let outcome = repo.auto_route(1, 4, 10).await.unwrap();

        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_assign_records_single_entry() {
        let current = create_test_appeal(1, AppealStatus::New);
        let mut updated = current.clone();
        updated.status = AppealStatus::Assigned;
        updated.service_id = Some(3);
        updated.priority = 3;
        let entry = create_test_entry(
            1,
            "new",
            "assigned",
            "Appeal assigned to service. Status changed from New to Assigned",
        );

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[current]])
                .append_query_results([[updated]])
                .append_query_results([[entry]])
                .into_connection(),
        );

        let repo = AppealRepository::new(db);
        let outcome = repo.assign(1, 3, Some(3), 20).await.unwrap();

        assert_eq!(outcome.appeal.service_id, Some(3));
        assert_eq!(outcome.appeal.priority, 3);
        assert!(outcome.history.is_some());
    }

    #[tokio::test]
    async fn test_load_with_empty_service_scope_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = AppealRepository::new(db);
        let rows = repo
            .load(&AppealScope {
                service_ids: Some(vec![]),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(rows.is_empty());
    }

    #[test]
    fn test_search_condition_escapes_wildcards() {
        let filter = AppealFilter {
            search: Some("50%_off".to_string()),
            ..Default::default()
        };
        let stmt = Appeal::find()
            .filter(AppealRepository::filter_condition(&filter))
            .build(DatabaseBackend::Postgres);

        assert!(stmt.sql.contains("ESCAPE"));
        let values = stmt.values.unwrap().0;
        assert!(values.contains(&sea_orm::Value::from("%50\\%\\_off%")));
    }

    #[tokio::test]
    async fn test_resolved_by_actor_is_one_query() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_appeal(1, AppealStatus::Completed),
                    create_test_appeal(2, AppealStatus::Closed),
                ]])
                .into_connection(),
        );

        let repo = AppealRepository::new(Arc::clone(&db));
        let rows = repo
            .resolved_by_actor(20, Utc::now() - chrono::Duration::days(90))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        drop(repo);
        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert_eq!(log.len(), 1);
    }
}
