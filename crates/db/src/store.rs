//! Storage seams for the appeal lifecycle.
//!
//! [`AppealStore`] owns appeals, their history and comments, and guarantees
//! that a status change and its history entry commit together.
//! [`DirectoryStore`] holds the reference data used for routing and reporting.

use appeals_common::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::entities::{
    appeal::{self, AppealStatus},
    appeal_history, category, category_service, comment, service, service_keywords,
    user::{self, UserRole},
};

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: u64 = 20;
/// Upper bound on page size.
pub const MAX_PAGE_SIZE: u64 = 100;
/// Escape character used in search patterns.
pub const LIKE_ESCAPE: char = '\\';

/// Fields of a freshly filed appeal.
#[derive(Debug, Clone)]
pub struct NewAppeal {
    pub user_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub priority: i16,
}

/// Editable descriptive fields. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct AppealChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl AppealChanges {
    /// Nothing to change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category_id.is_none()
            && self.address.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }

    /// Touches nothing but the category.
    #[must_use]
    pub const fn is_category_only(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.address.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }

    /// Apply the changes to a model in place.
    pub fn apply_to(&self, appeal: &mut appeal::Model) {
        if let Some(title) = &self.title {
            appeal.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            appeal.description.clone_from(description);
        }
        if let Some(category_id) = self.category_id {
            appeal.category_id = Some(category_id);
        }
        if let Some(address) = &self.address {
            appeal.address.clone_from(address);
        }
        if let Some(latitude) = self.latitude {
            appeal.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            appeal.longitude = longitude;
        }
    }
}

/// Listing filters. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct AppealFilter {
    pub status: Option<AppealStatus>,
    pub category_id: Option<i64>,
    pub service_id: Option<i64>,
    pub user_id: Option<i64>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// Case-insensitive substring of title or description
    pub search: Option<String>,
}

impl AppealFilter {
    /// Whether `appeal` passes every set filter.
    #[must_use]
    pub fn matches(&self, appeal: &appeal::Model) -> bool {
        if self.status.is_some_and(|s| s != appeal.status) {
            return false;
        }
        if self.category_id.is_some() && self.category_id != appeal.category_id {
            return false;
        }
        if self.service_id.is_some() && self.service_id != appeal.service_id {
            return false;
        }
        if self.user_id.is_some_and(|u| u != appeal.user_id) {
            return false;
        }
        if self.created_from.is_some_and(|from| appeal.created_at < from) {
            return false;
        }
        if self.created_to.is_some_and(|to| appeal.created_at > to) {
            return false;
        }
        if let Some(needle) = self.search_term() {
            let needle = needle.to_lowercase();
            return appeal.title.to_lowercase().contains(&needle)
                || appeal.description.to_lowercase().contains(&needle);
        }
        true
    }

    /// Trimmed, non-empty search term.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Lower-cased `LIKE` pattern for the search term. Wildcards and the
    /// escape character itself match literally.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search_term()?.to_lowercase();
        let mut pattern = String::with_capacity(term.len() + 2);
        pattern.push('%');
        for c in term.chars() {
            if matches!(c, '\\' | '%' | '_') {
                pattern.push(LIKE_ESCAPE);
            }
            pattern.push(c);
        }
        pattern.push('%');
        Some(pattern)
    }
}

/// Highest page number accepted.
const MAX_PAGE: u64 = i64::MAX.unsigned_abs() / MAX_PAGE_SIZE;

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    /// Normalize raw query values: page starts at 1, limit defaults to 20 and caps at 100.
    /// Pages past the last addressable row are clamped so the offset fits a `BIGINT`.
    #[must_use]
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1).min(MAX_PAGE);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        Self { page, limit }
    }

    /// Rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Sortable listing columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    Priority,
    Status,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Listing order. Ties always break on `created_at` descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppealSort {
    pub field: SortField,
    pub order: SortOrder,
}

/// One page of appeals plus the unpaged total.
#[derive(Debug, Clone)]
pub struct AppealPage {
    pub items: Vec<appeal::Model>,
    pub total: u64,
}

/// Result of a status-changing operation.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// Appeal as committed.
    pub appeal: appeal::Model,
    /// Status read inside the transaction, before the change.
    pub previous_status: AppealStatus,
    /// Entry written by the transaction, if any.
    pub history: Option<appeal_history::Model>,
}

/// Row selection for statistics.
#[derive(Debug, Clone, Default)]
pub struct AppealScope {
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// Restrict to these services; `None` means all appeals
    pub service_ids: Option<Vec<i64>>,
}

impl AppealScope {
    /// Whether `appeal` falls inside the scope.
    #[must_use]
    pub fn contains(&self, appeal: &appeal::Model) -> bool {
        if self.created_from.is_some_and(|from| appeal.created_at < from) {
            return false;
        }
        if self.created_to.is_some_and(|to| appeal.created_at > to) {
            return false;
        }
        match &self.service_ids {
            Some(ids) => appeal.service_id.is_some_and(|id| ids.contains(&id)),
            None => true,
        }
    }
}

/// A comment about to be written.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub appeal_id: i64,
    pub user_id: i64,
    pub text: String,
    pub is_internal: bool,
}

/// A category about to be written.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    pub default_priority: i16,
}

/// Editable category fields. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub default_priority: Option<i16>,
    pub is_active: Option<bool>,
}

/// A service about to be written.
#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub description: String,
    pub contact_person: String,
    pub contact_phone: String,
    pub contact_email: String,
}

/// Editable service fields. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ServiceChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub is_active: Option<bool>,
}

/// Transactional persistence for appeals and their history.
#[async_trait]
pub trait AppealStore: Send + Sync {
    /// Insert a new appeal in status `new`.
    async fn create(&self, appeal: NewAppeal) -> AppResult<appeal::Model>;

    /// Find an appeal by ID.
    async fn find_by_id(&self, id: i64) -> AppResult<Option<appeal::Model>>;

    /// Get an appeal by ID, failing with [`AppError::AppealNotFound`].
    async fn get_by_id(&self, id: i64) -> AppResult<appeal::Model> {
        self.find_by_id(id)
            .await?
            .ok_or(AppError::AppealNotFound(id))
    }

    /// Filtered, sorted, paginated listing.
    async fn list(
        &self,
        filter: &AppealFilter,
        page: Pagination,
        sort: AppealSort,
    ) -> AppResult<AppealPage>;

    /// Update descriptive fields. Never touches status or history.
    async fn update_details(&self, id: i64, changes: AppealChanges) -> AppResult<appeal::Model>;

    /// Atomically move an appeal to `target`.
    ///
    /// Reads the current status inside the transaction. A same-status call only
    /// refreshes `updated_at`; otherwise the status, `closed_at` and one history
    /// entry are written together.
    async fn update_status(
        &self,
        id: i64,
        target: AppealStatus,
        actor_id: i64,
        comment: Option<String>,
    ) -> AppResult<TransitionOutcome>;

    /// Atomically set the service, optionally the priority, force status
    /// `assigned`, and write exactly one history entry.
    async fn assign(
        &self,
        id: i64,
        service_id: i64,
        priority: Option<i16>,
        actor_id: i64,
    ) -> AppResult<TransitionOutcome>;

    /// Route a fresh appeal to a service.
    ///
    /// Applies only while the appeal is `new` with no service; returns `None`
    /// when that no longer holds.
    async fn auto_route(
        &self,
        id: i64,
        service_id: i64,
        actor_id: i64,
    ) -> AppResult<Option<TransitionOutcome>>;

    /// Update priority only.
    async fn update_priority(&self, id: i64, priority: i16) -> AppResult<appeal::Model>;

    /// History of an appeal, oldest first.
    async fn history(&self, id: i64) -> AppResult<Vec<appeal_history::Model>>;

    /// All appeals inside `scope`, for statistics.
    async fn load(&self, scope: &AppealScope) -> AppResult<Vec<appeal::Model>>;

    /// Appeals that `actor_id` moved to `completed` or `closed` at or after
    /// `since`, each once, in one round trip.
    async fn resolved_by_actor(
        &self,
        actor_id: i64,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<appeal::Model>>;

    /// Add a comment to an appeal.
    async fn add_comment(&self, comment: NewComment) -> AppResult<comment::Model>;

    /// Comments of an appeal, oldest first.
    async fn comments(&self, appeal_id: i64, include_internal: bool)
    -> AppResult<Vec<comment::Model>>;
}

/// Reference data: categories, services, keywords, executor links,
/// category assignments and users.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn find_category(&self, id: i64) -> AppResult<Option<category::Model>>;

    /// Categories by name; inactive ones too unless `active_only`.
    async fn list_categories(&self, active_only: bool) -> AppResult<Vec<category::Model>>;

    async fn create_category(&self, category: NewCategory) -> AppResult<category::Model>;

    async fn update_category(
        &self,
        id: i64,
        changes: CategoryChanges,
    ) -> AppResult<category::Model>;

    async fn find_service(&self, id: i64) -> AppResult<Option<service::Model>>;

    /// Active service whose name equals `name`, ignoring case.
    async fn find_active_service_by_name(&self, name: &str) -> AppResult<Option<service::Model>>;

    async fn list_services(&self, active_only: bool) -> AppResult<Vec<service::Model>>;

    async fn create_service(&self, service: NewService) -> AppResult<service::Model>;

    async fn update_service(&self, id: i64, changes: ServiceChanges) -> AppResult<service::Model>;

    async fn service_keywords(
        &self,
        service_id: i64,
    ) -> AppResult<Option<service_keywords::Model>>;

    /// Every stored keyword corpus.
    async fn all_service_keywords(&self) -> AppResult<Vec<service_keywords::Model>>;

    /// Replace the keyword corpus of a service.
    async fn set_service_keywords(
        &self,
        service_id: i64,
        keywords: String,
    ) -> AppResult<service_keywords::Model>;

    /// Services an executor is linked to.
    async fn services_for_user(&self, user_id: i64) -> AppResult<Vec<service::Model>>;

    /// IDs of users linked to a service.
    async fn executors_of_service(&self, service_id: i64) -> AppResult<Vec<i64>>;

    async fn link_executor(&self, user_id: i64, service_id: i64) -> AppResult<()>;

    /// Returns whether a link existed.
    async fn unlink_executor(&self, user_id: i64, service_id: i64) -> AppResult<bool>;

    /// Category to service assignments ordered by category and position,
    /// restricted to one category when given.
    async fn category_service_links(
        &self,
        category_id: Option<i64>,
    ) -> AppResult<Vec<category_service::Model>>;

    /// Replace the services assigned to a category, atomically, keeping
    /// the given order.
    async fn replace_category_services(
        &self,
        category_id: i64,
        service_ids: &[i64],
    ) -> AppResult<()>;

    /// Returns whether an assignment existed.
    async fn remove_category_service(&self, category_id: i64, service_id: i64)
    -> AppResult<bool>;

    async fn find_user(&self, id: i64) -> AppResult<Option<user::Model>>;

    /// Active users holding any of `roles`.
    async fn users_with_roles(&self, roles: &[UserRole]) -> AppResult<Vec<user::Model>>;
}

/// Shared handle to an appeal store.
pub type AppealStoreRef = Arc<dyn AppealStore>;

/// Shared handle to a directory store.
pub type DirectoryStoreRef = Arc<dyn DirectoryStore>;
