//! In-memory store for tests.
//!
//! Implements both storage traits over one mutex-guarded state. Every
//! mutating call works on a copy of the state and swaps it in only when the
//! whole operation succeeds, mirroring a database transaction.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use appeals_common::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::entities::{
    appeal::{self, AppealStatus},
    appeal_history, category, category_service, comment, service, service_keywords,
    user::{self, UserRole},
    user_service,
};
use crate::store::{
    AppealChanges, AppealFilter, AppealPage, AppealScope, AppealSort, AppealStore,
    CategoryChanges, DirectoryStore, NewAppeal, NewCategory, NewComment, NewService, Pagination,
    ServiceChanges, SortField, SortOrder, TransitionOutcome,
};
use crate::transition::{
    HistoryDraft, closed_at_after, plan_assignment, plan_auto_route, plan_status_change,
};

#[derive(Debug, Clone, Default)]
struct State {
    next_id: i64,
    appeals: BTreeMap<i64, appeal::Model>,
    history: Vec<appeal_history::Model>,
    comments: Vec<comment::Model>,
    categories: BTreeMap<i64, category::Model>,
    services: BTreeMap<i64, service::Model>,
    keywords: BTreeMap<i64, service_keywords::Model>,
    links: Vec<user_service::Model>,
    category_services: Vec<category_service::Model>,
    users: BTreeMap<i64, user::Model>,
    fail_history_writes: bool,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn appeal_mut(&mut self, id: i64) -> AppResult<&mut appeal::Model> {
        self.appeals
            .get_mut(&id)
            .ok_or(AppError::AppealNotFound(id))
    }

    fn push_history(
        &mut self,
        appeal_id: i64,
        actor_id: i64,
        draft: HistoryDraft,
        now: DateTime<Utc>,
    ) -> AppResult<appeal_history::Model> {
        if self.fail_history_writes {
            return Err(AppError::Database(
                "history insert failed: connection reset".to_string(),
            ));
        }
        let entry = appeal_history::Model {
            id: self.next_id(),
            appeal_id,
            user_id: actor_id,
            old_status: draft.old_status,
            new_status: draft.new_status,
            action: draft.action,
            comment: draft.comment,
            created_at: now,
        };
        self.history.push(entry.clone());
        Ok(entry)
    }
}

/// Mutex-backed implementation of [`AppealStore`] and [`DirectoryStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    pinned_now: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryStore {
    /// Create an empty store running on the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time as seen by the store.
    pub fn now(&self) -> AppResult<DateTime<Utc>> {
        let pinned = self
            .pinned_now
            .lock()
            .map_err(|_| AppError::Internal("clock lock poisoned".to_string()))?;
        Ok(pinned.unwrap_or_else(Utc::now))
    }

    /// Freeze the clock at `at`.
    pub fn pin_clock(&self, at: DateTime<Utc>) -> AppResult<()> {
        let mut pinned = self
            .pinned_now
            .lock()
            .map_err(|_| AppError::Internal("clock lock poisoned".to_string()))?;
        *pinned = Some(at);
        Ok(())
    }

    /// Move a pinned clock forward. Pins the wall clock first if needed.
    pub fn advance_clock(&self, by: Duration) -> AppResult<()> {
        let at = self.now()? + by;
        self.pin_clock(at)
    }

    /// Make every subsequent history insert fail.
    pub fn fail_history_writes(&self, fail: bool) -> AppResult<()> {
        self.with_state(|state| state.fail_history_writes = fail)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> AppResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::Internal("store lock poisoned".to_string()))?;
        Ok(f(&mut state))
    }

    /// Run `f` against a copy of the state and commit it only on success.
    fn transact<T>(
        &self,
        f: impl FnOnce(&mut State, DateTime<Utc>) -> AppResult<T>,
    ) -> AppResult<T> {
        let now = self.now()?;
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::Internal("store lock poisoned".to_string()))?;
        let mut draft = state.clone();
        let value = f(&mut draft, now)?;
        *state = draft;
        Ok(value)
    }

    /// Register a user.
    pub fn add_user(&self, id: i64, role: UserRole) -> AppResult<user::Model> {
        let now = self.now()?;
        let model = user::Model {
            id,
            email: format!("user{id}@city.example"),
            first_name: "Test".to_string(),
            last_name: format!("User{id}"),
            role,
            is_active: true,
            created_at: now,
        };
        self.with_state(|state| {
            state.users.insert(id, model.clone());
            model
        })
    }

    /// Insert a fully specified appeal, bypassing creation rules.
    pub fn put_appeal(&self, model: appeal::Model) -> AppResult<appeal::Model> {
        self.with_state(|state| {
            state.next_id = state.next_id.max(model.id);
            state.appeals.insert(model.id, model.clone());
            model
        })
    }

    /// Append a history entry directly.
    pub fn put_history(&self, entry: appeal_history::Model) -> AppResult<()> {
        self.with_state(|state| {
            state.next_id = state.next_id.max(entry.id);
            state.history.push(entry);
        })
    }

    /// Number of history entries across all appeals.
    pub fn history_len(&self) -> AppResult<usize> {
        self.with_state(|state| state.history.len())
    }
}

fn sort_appeals(items: &mut [appeal::Model], sort: AppealSort) {
    items.sort_by(|a, b| {
        let primary = match sort.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        };
        let primary = match sort.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[async_trait]
impl AppealStore for MemoryStore {
    async fn create(&self, input: NewAppeal) -> AppResult<appeal::Model> {
        self.transact(|state, now| {
            let model = appeal::Model {
                id: state.next_id(),
                user_id: input.user_id,
                category_id: input.category_id,
                service_id: None,
                status: AppealStatus::New,
                title: input.title,
                description: input.description,
                address: input.address,
                latitude: input.latitude,
                longitude: input.longitude,
                priority: input.priority,
                created_at: now,
                updated_at: now,
                closed_at: None,
            };
            state.appeals.insert(model.id, model.clone());
            Ok(model)
        })
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<appeal::Model>> {
        self.with_state(|state| state.appeals.get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &AppealFilter,
        page: Pagination,
        sort: AppealSort,
    ) -> AppResult<AppealPage> {
        self.with_state(|state| {
            let mut matching: Vec<appeal::Model> = state
                .appeals
                .values()
                .filter(|a| filter.matches(a))
                .cloned()
                .collect();
            let total = matching.len() as u64;
            sort_appeals(&mut matching, sort);
            let items = matching
                .into_iter()
                .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
                .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
                .collect();
            AppealPage { items, total }
        })
    }

    async fn update_details(&self, id: i64, changes: AppealChanges) -> AppResult<appeal::Model> {
        self.transact(|state, now| {
            let appeal = state.appeal_mut(id)?;
            changes.apply_to(appeal);
            appeal.updated_at = now;
            Ok(appeal.clone())
        })
    }

    async fn update_status(
        &self,
        id: i64,
        target: AppealStatus,
        actor_id: i64,
        comment: Option<String>,
    ) -> AppResult<TransitionOutcome> {
        self.transact(|state, now| {
            let appeal = state.appeal_mut(id)?;
            let previous_status = appeal.status;
            let draft = plan_status_change(previous_status, target, comment);

            appeal.updated_at = now;
            if draft.is_some() {
                appeal.status = target;
                appeal.closed_at = closed_at_after(target, appeal.closed_at, now);
            }
            let appeal = appeal.clone();

            let history = match draft {
                Some(draft) => Some(state.push_history(id, actor_id, draft, now)?),
                None => None,
            };

            Ok(TransitionOutcome {
                appeal,
                previous_status,
                history,
            })
        })
    }

    async fn assign(
        &self,
        id: i64,
        service_id: i64,
        priority: Option<i16>,
        actor_id: i64,
    ) -> AppResult<TransitionOutcome> {
        self.transact(|state, now| {
            let appeal = state.appeal_mut(id)?;
            let previous_status = appeal.status;
            let draft = plan_assignment(previous_status);

            appeal.service_id = Some(service_id);
            appeal.status = AppealStatus::Assigned;
            if let Some(priority) = priority {
                appeal.priority = priority;
            }
            appeal.updated_at = now;
            let appeal = appeal.clone();

            let entry = state.push_history(id, actor_id, draft, now)?;
            Ok(TransitionOutcome {
                appeal,
                previous_status,
                history: Some(entry),
            })
        })
    }

    async fn auto_route(
        &self,
        id: i64,
        service_id: i64,
        actor_id: i64,
    ) -> AppResult<Option<TransitionOutcome>> {
        self.transact(|state, now| {
            let appeal = state.appeal_mut(id)?;
            if appeal.status != AppealStatus::New || appeal.service_id.is_some() {
                return Ok(None);
            }

            appeal.service_id = Some(service_id);
            appeal.status = AppealStatus::Assigned;
            appeal.updated_at = now;
            let appeal = appeal.clone();

            let entry = state.push_history(id, actor_id, plan_auto_route(), now)?;
            Ok(Some(TransitionOutcome {
                appeal,
                previous_status: AppealStatus::New,
                history: Some(entry),
            }))
        })
    }

    async fn update_priority(&self, id: i64, priority: i16) -> AppResult<appeal::Model> {
        self.transact(|state, now| {
            let appeal = state.appeal_mut(id)?;
            appeal.priority = priority;
            appeal.updated_at = now;
            Ok(appeal.clone())
        })
    }

    async fn history(&self, id: i64) -> AppResult<Vec<appeal_history::Model>> {
        self.with_state(|state| {
            let mut entries: Vec<_> = state
                .history
                .iter()
                .filter(|h| h.appeal_id == id)
                .cloned()
                .collect();
            entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            entries
        })
    }

    async fn load(&self, scope: &AppealScope) -> AppResult<Vec<appeal::Model>> {
        self.with_state(|state| {
            state
                .appeals
                .values()
                .filter(|a| scope.contains(a))
                .cloned()
                .collect()
        })
    }

    async fn resolved_by_actor(
        &self,
        actor_id: i64,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<appeal::Model>> {
        self.with_state(|state| {
            let ids: BTreeSet<i64> = state
                .history
                .iter()
                .filter(|h| h.user_id == actor_id && h.created_at >= since)
                .filter(|h| {
                    AppealStatus::from_token(&h.new_status).is_some_and(AppealStatus::is_closing)
                })
                .map(|h| h.appeal_id)
                .collect();
            ids.iter()
                .filter_map(|id| state.appeals.get(id).cloned())
                .collect()
        })
    }

    async fn add_comment(&self, input: NewComment) -> AppResult<comment::Model> {
        self.transact(|state, now| {
            let model = comment::Model {
                id: state.next_id(),
                appeal_id: input.appeal_id,
                user_id: input.user_id,
                text: input.text,
                is_internal: input.is_internal,
                created_at: now,
            };
            state.comments.push(model.clone());
            Ok(model)
        })
    }

    async fn comments(
        &self,
        appeal_id: i64,
        include_internal: bool,
    ) -> AppResult<Vec<comment::Model>> {
        self.with_state(|state| {
            state
                .comments
                .iter()
                .filter(|c| c.appeal_id == appeal_id)
                .filter(|c| include_internal || !c.is_internal)
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn find_category(&self, id: i64) -> AppResult<Option<category::Model>> {
        self.with_state(|state| state.categories.get(&id).cloned())
    }

    async fn list_categories(&self, active_only: bool) -> AppResult<Vec<category::Model>> {
        self.with_state(|state| {
            let mut items: Vec<_> = state
                .categories
                .values()
                .filter(|c| !active_only || c.is_active)
                .cloned()
                .collect();
            items.sort_by(|a, b| a.name.cmp(&b.name));
            items
        })
    }

    async fn create_category(&self, input: NewCategory) -> AppResult<category::Model> {
        self.transact(|state, now| {
            let model = category::Model {
                id: state.next_id(),
                name: input.name,
                description: input.description,
                default_priority: input.default_priority,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            state.categories.insert(model.id, model.clone());
            Ok(model)
        })
    }

    async fn update_category(
        &self,
        id: i64,
        changes: CategoryChanges,
    ) -> AppResult<category::Model> {
        self.transact(|state, now| {
            let category = state
                .categories
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Category {id}")))?;
            if let Some(name) = changes.name {
                category.name = name;
            }
            if let Some(description) = changes.description {
                category.description = description;
            }
            if let Some(default_priority) = changes.default_priority {
                category.default_priority = default_priority;
            }
            if let Some(is_active) = changes.is_active {
                category.is_active = is_active;
            }
            category.updated_at = now;
            Ok(category.clone())
        })
    }

    async fn find_service(&self, id: i64) -> AppResult<Option<service::Model>> {
        self.with_state(|state| state.services.get(&id).cloned())
    }

    async fn find_active_service_by_name(&self, name: &str) -> AppResult<Option<service::Model>> {
        let wanted = name.trim().to_lowercase();
        self.with_state(|state| {
            state
                .services
                .values()
                .find(|s| s.is_active && s.name.to_lowercase() == wanted)
                .cloned()
        })
    }

    async fn list_services(&self, active_only: bool) -> AppResult<Vec<service::Model>> {
        self.with_state(|state| {
            let mut items: Vec<_> = state
                .services
                .values()
                .filter(|s| !active_only || s.is_active)
                .cloned()
                .collect();
            items.sort_by(|a, b| a.name.cmp(&b.name));
            items
        })
    }

    async fn create_service(&self, input: NewService) -> AppResult<service::Model> {
        self.transact(|state, now| {
            let model = service::Model {
                id: state.next_id(),
                name: input.name,
                description: input.description,
                contact_person: input.contact_person,
                contact_phone: input.contact_phone,
                contact_email: input.contact_email,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            state.services.insert(model.id, model.clone());
            Ok(model)
        })
    }

    async fn update_service(&self, id: i64, changes: ServiceChanges) -> AppResult<service::Model> {
        self.transact(|state, now| {
            let service = state
                .services
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Service {id}")))?;
            if let Some(name) = changes.name {
                service.name = name;
            }
            if let Some(description) = changes.description {
                service.description = description;
            }
            if let Some(contact_person) = changes.contact_person {
                service.contact_person = contact_person;
            }
            if let Some(contact_phone) = changes.contact_phone {
                service.contact_phone = contact_phone;
            }
            if let Some(contact_email) = changes.contact_email {
                service.contact_email = contact_email;
            }
            if let Some(is_active) = changes.is_active {
                service.is_active = is_active;
            }
            service.updated_at = now;
            Ok(service.clone())
        })
    }

    async fn service_keywords(
        &self,
        service_id: i64,
    ) -> AppResult<Option<service_keywords::Model>> {
        self.with_state(|state| state.keywords.get(&service_id).cloned())
    }

    async fn all_service_keywords(&self) -> AppResult<Vec<service_keywords::Model>> {
        self.with_state(|state| state.keywords.values().cloned().collect())
    }

    async fn set_service_keywords(
        &self,
        service_id: i64,
        keywords: String,
    ) -> AppResult<service_keywords::Model> {
        self.transact(|state, now| {
            let model = service_keywords::Model {
                service_id,
                keywords,
                updated_at: now,
            };
            state.keywords.insert(service_id, model.clone());
            Ok(model)
        })
    }

    async fn services_for_user(&self, user_id: i64) -> AppResult<Vec<service::Model>> {
        self.with_state(|state| {
            let mut items: Vec<_> = state
                .links
                .iter()
                .filter(|l| l.user_id == user_id)
                .filter_map(|l| state.services.get(&l.service_id).cloned())
                .collect();
            items.sort_by(|a, b| a.name.cmp(&b.name));
            items
        })
    }

    async fn executors_of_service(&self, service_id: i64) -> AppResult<Vec<i64>> {
        self.with_state(|state| {
            state
                .links
                .iter()
                .filter(|l| l.service_id == service_id)
                .map(|l| l.user_id)
                .collect()
        })
    }

    async fn link_executor(&self, user_id: i64, service_id: i64) -> AppResult<()> {
        self.transact(|state, now| {
            let exists = state
                .links
                .iter()
                .any(|l| l.user_id == user_id && l.service_id == service_id);
            if !exists {
                state.links.push(user_service::Model {
                    user_id,
                    service_id,
                    created_at: now,
                });
            }
            Ok(())
        })
    }

    async fn unlink_executor(&self, user_id: i64, service_id: i64) -> AppResult<bool> {
        self.with_state(|state| {
            let before = state.links.len();
            state
                .links
                .retain(|l| !(l.user_id == user_id && l.service_id == service_id));
            state.links.len() != before
        })
    }

    async fn category_service_links(
        &self,
        category_id: Option<i64>,
    ) -> AppResult<Vec<category_service::Model>> {
        self.with_state(|state| {
            let mut items: Vec<_> = state
                .category_services
                .iter()
                .filter(|l| category_id.is_none_or(|id| l.category_id == id))
                .cloned()
                .collect();
            items.sort_by_key(|l| (l.category_id, l.position));
            items
        })
    }

    async fn replace_category_services(
        &self,
        category_id: i64,
        service_ids: &[i64],
    ) -> AppResult<()> {
        self.transact(|state, now| {
            state
                .category_services
                .retain(|l| l.category_id != category_id);
            for (service_id, position) in service_ids.iter().zip(0_i32..) {
                state.category_services.push(category_service::Model {
                    category_id,
                    service_id: *service_id,
                    position,
                    created_at: now,
                });
            }
            Ok(())
        })
    }

    async fn remove_category_service(
        &self,
        category_id: i64,
        service_id: i64,
    ) -> AppResult<bool> {
        self.with_state(|state| {
            let before = state.category_services.len();
            state
                .category_services
                .retain(|l| !(l.category_id == category_id && l.service_id == service_id));
            state.category_services.len() != before
        })
    }

    async fn find_user(&self, id: i64) -> AppResult<Option<user::Model>> {
        self.with_state(|state| state.users.get(&id).cloned())
    }

    async fn users_with_roles(&self, roles: &[UserRole]) -> AppResult<Vec<user::Model>> {
        self.with_state(|state| {
            state
                .users
                .values()
                .filter(|u| u.is_active && roles.contains(&u.role))
                .cloned()
                .collect()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_appeal(user_id: i64) -> NewAppeal {
        NewAppeal {
            user_id,
            category_id: None,
            title: "Broken bench".to_string(),
            description: "The bench in the park is broken".to_string(),
            address: "Park Ave 3".to_string(),
            latitude: 50.0,
            longitude: 30.0,
            priority: 2,
        }
    }

    #[tokio::test]
    async fn test_failed_history_write_rolls_back_status() {
        let store = MemoryStore::new();
        let appeal = store.create(new_appeal(1)).await.unwrap();

        store.fail_history_writes(true).unwrap();
        let result = store
            .update_status(appeal.id, AppealStatus::Completed, 2, None)
            .await;
        assert!(matches!(result, Err(AppError::Database(_))));

        let after = store.get_by_id(appeal.id).await.unwrap();
        assert_eq!(after.status, AppealStatus::New);
        assert!(after.closed_at.is_none());
        assert_eq!(store.history_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pinned_clock_stamps_rows() {
        let store = MemoryStore::new();
        let at = Utc::now() - Duration::days(3);
        store.pin_clock(at).unwrap();

        let appeal = store.create(new_appeal(1)).await.unwrap();
        assert_eq!(appeal.created_at, at);

        store.advance_clock(Duration::hours(2)).unwrap();
        let outcome = store
            .update_status(appeal.id, AppealStatus::Closed, 2, None)
            .await
            .unwrap();
        assert_eq!(outcome.appeal.closed_at, Some(at + Duration::hours(2)));
    }

    #[tokio::test]
    async fn test_list_sorts_priority_with_created_at_tiebreak() {
        let store = MemoryStore::new();
        let base = Utc::now() - Duration::days(1);
        store.pin_clock(base).unwrap();
        let low = store.create(new_appeal(1)).await.unwrap();
        store.advance_clock(Duration::minutes(1)).unwrap();
        let high_old = store.create(new_appeal(1)).await.unwrap();
        store.advance_clock(Duration::minutes(1)).unwrap();
        let high_new = store.create(new_appeal(1)).await.unwrap();
        store.update_priority(low.id, 1).await.unwrap();
        store.update_priority(high_old.id, 3).await.unwrap();
        store.update_priority(high_new.id, 3).await.unwrap();

        let page = store
            .list(
                &AppealFilter::default(),
                Pagination::default(),
                AppealSort {
                    field: SortField::Priority,
                    order: SortOrder::Desc,
                },
            )
            .await
            .unwrap();

        let ids: Vec<i64> = page.items.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![high_new.id, high_old.id, low.id]);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_executor_links() {
        let store = MemoryStore::new();
        let service = store
            .create_service(NewService {
                name: "Roads".into(),
                description: String::new(),
                contact_person: String::new(),
                contact_phone: String::new(),
                contact_email: String::new(),
            })
            .await
            .unwrap();

        store.link_executor(7, service.id).await.unwrap();
        store.link_executor(7, service.id).await.unwrap();
        assert_eq!(store.executors_of_service(service.id).await.unwrap(), vec![7]);

        assert!(store.unlink_executor(7, service.id).await.unwrap());
        assert!(!store.unlink_executor(7, service.id).await.unwrap());
    }
}
