//! Statistics and dashboards service.

use appeals_common::{AppError, AppResult};
use appeals_db::{
    AppealStoreRef, DirectoryStoreRef,
    entities::{appeal, user::UserRole},
    store::AppealScope,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::services::{
    aggregate::{
        self, AdminDashboard, DispatcherDashboard, ExecutorDashboard, Names, OverallStatistics,
        RECENT_WINDOW_DAYS, ServiceStatistics,
    },
    permissions::Actor,
};

/// Optional creation-time window.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DateRange {
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

impl DateRange {
    fn scope(self, service_ids: Option<Vec<i64>>) -> AppResult<AppealScope> {
        if let (Some(from), Some(to)) = (self.from_date, self.to_date)
            && from > to
        {
            return Err(AppError::BadRequest(
                "from_date must not be after to_date".to_string(),
            ));
        }
        Ok(AppealScope {
            created_from: self.from_date,
            created_to: self.to_date,
            service_ids,
        })
    }
}

/// Read-only rollups over appeals and their history.
#[derive(Clone)]
pub struct StatisticsService {
    appeals: AppealStoreRef,
    directory: DirectoryStoreRef,
}

fn require_role(actor: &Actor, allowed: &[UserRole]) -> AppResult<()> {
    if allowed.contains(&actor.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role {} cannot view this dashboard",
            actor.role.as_str()
        )))
    }
}

impl StatisticsService {
    #[must_use]
    pub fn new(appeals: AppealStoreRef, directory: DirectoryStoreRef) -> Self {
        Self { appeals, directory }
    }

    async fn names(&self) -> AppResult<Names> {
        let categories = self.directory.list_categories(false).await?;
        let services = self.directory.list_services(false).await?;
        Ok(Names::new(&categories, &services))
    }

    /// Overall statistics. Dispatchers and admins.
    pub async fn overall(&self, actor: &Actor, range: DateRange) -> AppResult<OverallStatistics> {
        require_role(actor, &[UserRole::Dispatcher, UserRole::Admin])?;

        let appeals = self.appeals.load(&range.scope(None)?).await?;
        let names = self.names().await?;
        debug!(rows = appeals.len(), "Computing overall statistics");
        Ok(aggregate::overall(&appeals, &names, Utc::now()))
    }

    /// Deadline tracking. Dispatchers and admins.
    pub async fn dispatcher_dashboard(
        &self,
        actor: &Actor,
        range: DateRange,
    ) -> AppResult<DispatcherDashboard> {
        require_role(actor, &[UserRole::Dispatcher, UserRole::Admin])?;

        let appeals = self.appeals.load(&range.scope(None)?).await?;
        let names = self.names().await?;
        Ok(aggregate::dispatcher(&appeals, &names, Utc::now()))
    }

    /// Service performance overview. Admins only.
    pub async fn admin_dashboard(
        &self,
        actor: &Actor,
        range: DateRange,
    ) -> AppResult<AdminDashboard> {
        require_role(actor, &[UserRole::Admin])?;

        let appeals = self.appeals.load(&range.scope(None)?).await?;
        let services = self.directory.list_services(false).await?;
        Ok(aggregate::admin(&appeals, &services, Utc::now()))
    }

    /// The caller's work queue. Executors only.
    pub async fn executor_dashboard(
        &self,
        actor: &Actor,
        range: DateRange,
    ) -> AppResult<ExecutorDashboard> {
        require_role(actor, &[UserRole::Executor])?;

        let services = self.directory.services_for_user(actor.id).await?;
        if services.is_empty() {
            range.scope(None)?;
            return Ok(aggregate::executor(&[], &[], &[], Utc::now()));
        }

        let service_ids = services.iter().map(|s| s.id).collect();
        let appeals = self.appeals.load(&range.scope(Some(service_ids))?).await?;
        let resolved_by_me = self.resolved_by(actor.id, range).await?;

        Ok(aggregate::executor(
            &services,
            &appeals,
            &resolved_by_me,
            Utc::now(),
        ))
    }

    /// Appeals `user_id` moved to a closing status inside the recent window, once each.
    async fn resolved_by(&self, user_id: i64, range: DateRange) -> AppResult<Vec<appeal::Model>> {
        let scope = range.scope(None)?;
        let since = Utc::now() - Duration::days(RECENT_WINDOW_DAYS);
        let mut appeals = self.appeals.resolved_by_actor(user_id, since).await?;
        appeals.retain(|a| scope.contains(a));
        Ok(appeals)
    }

    /// Detailed figures for one service. Any authenticated user.
    pub async fn service_statistics(
        &self,
        _actor: &Actor,
        service_id: i64,
        range: DateRange,
    ) -> AppResult<ServiceStatistics> {
        let service = self
            .directory
            .find_service(service_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Service {service_id}")))?;

        let appeals = self
            .appeals
            .load(&range.scope(Some(vec![service_id]))?)
            .await?;
        let names = self.names().await?;
        Ok(aggregate::service_statistics(
            &service,
            &appeals,
            &names,
            Utc::now(),
        ))
    }
}
