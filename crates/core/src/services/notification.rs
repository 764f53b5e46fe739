//! Appeal notifications.
//!
//! Lifecycle operations hand an [`AppealEvent`] to the [`Notifier`], which
//! resolves recipients and delivers on a background task. Delivery never
//! affects the operation that raised the event.

use std::sync::Arc;

use appeals_common::AppResult;
use appeals_db::{
    DirectoryStoreRef,
    entities::{appeal::AppealStatus, user::UserRole},
};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Something worth telling people about.
#[derive(Debug, Clone, PartialEq)]
pub enum AppealEvent {
    Created {
        appeal_id: i64,
        title: String,
    },
    Assigned {
        appeal_id: i64,
        title: String,
        service_id: i64,
    },
    StatusChanged {
        appeal_id: i64,
        title: String,
        reporter_id: i64,
        new_status: AppealStatus,
    },
    CommentAdded {
        appeal_id: i64,
        title: String,
        reporter_id: i64,
    },
}

impl AppealEvent {
    #[must_use]
    pub const fn appeal_id(&self) -> i64 {
        match self {
            Self::Created { appeal_id, .. }
            | Self::Assigned { appeal_id, .. }
            | Self::StatusChanged { appeal_id, .. }
            | Self::CommentAdded { appeal_id, .. } => *appeal_id,
        }
    }
}

/// Notification category shown to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AppealCreated,
    AppealAssigned,
    StatusChanged,
    AppealCompleted,
    CommentAdded,
}

/// One rendered message for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub user_id: i64,
    pub appeal_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    /// Render `event` for `user_id`.
    #[must_use]
    pub fn render(event: &AppealEvent, user_id: i64) -> Self {
        let (kind, title, message) = match event {
            AppealEvent::Created { title, .. } => (
                NotificationKind::AppealCreated,
                "New appeal",
                format!("A new appeal was filed: {title}"),
            ),
            AppealEvent::Assigned { title, .. } => (
                NotificationKind::AppealAssigned,
                "Appeal assigned",
                format!("Appeal '{title}' was assigned to your service"),
            ),
            AppealEvent::StatusChanged {
                title, new_status, ..
            } if new_status.is_closing() => (
                NotificationKind::AppealCompleted,
                "Appeal resolved",
                format!("Your appeal '{title}' has been resolved"),
            ),
            AppealEvent::StatusChanged {
                title, new_status, ..
            } => (
                NotificationKind::StatusChanged,
                "Appeal status changed",
                format!("Appeal '{title}' is now: {}", new_status.label()),
            ),
            AppealEvent::CommentAdded { title, .. } => (
                NotificationKind::CommentAdded,
                "New comment",
                format!("A new comment was added to appeal '{title}'"),
            ),
        };

        Self {
            user_id,
            appeal_id: event.appeal_id(),
            kind,
            title: title.to_string(),
            message,
        }
    }
}

/// Delivery channel for rendered notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> AppResult<()>;
}

/// Shared sink handle.
pub type NotificationSinkService = Arc<dyn NotificationSink>;

/// Drops everything.
pub struct NoOpSink;

#[async_trait]
impl NotificationSink for NoOpSink {
    async fn deliver(&self, _notification: &Notification) -> AppResult<()> {
        Ok(())
    }
}

/// Writes every notification to the log.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> AppResult<()> {
        info!(
            user_id = notification.user_id,
            appeal_id = notification.appeal_id,
            kind = ?notification.kind,
            message = %notification.message,
            "Notification"
        );
        Ok(())
    }
}

/// Resolves recipients and hands notifications to a sink.
#[derive(Clone)]
pub struct Notifier {
    directory: DirectoryStoreRef,
    sink: NotificationSinkService,
}

impl Notifier {
    #[must_use]
    pub fn new(directory: DirectoryStoreRef, sink: NotificationSinkService) -> Self {
        Self { directory, sink }
    }

    /// Users who should hear about `event`. The acting user is never included.
    pub async fn recipients(&self, event: &AppealEvent, actor_id: i64) -> AppResult<Vec<i64>> {
        let mut users = match event {
            AppealEvent::Created { .. } => self
                .directory
                .users_with_roles(&[UserRole::Dispatcher, UserRole::Admin])
                .await?
                .into_iter()
                .map(|u| u.id)
                .collect(),
            AppealEvent::Assigned { service_id, .. } => {
                self.directory.executors_of_service(*service_id).await?
            }
            AppealEvent::StatusChanged { reporter_id, .. }
            | AppealEvent::CommentAdded { reporter_id, .. } => vec![*reporter_id],
        };

        users.retain(|id| *id != actor_id);
        users.sort_unstable();
        users.dedup();
        Ok(users)
    }

    /// Resolve and deliver in the current task. Returns the number delivered.
    ///
    /// A failing recipient is logged and skipped.
    pub async fn deliver(&self, event: &AppealEvent, actor_id: i64) -> AppResult<usize> {
        let recipients = self.recipients(event, actor_id).await?;
        let mut delivered = 0;

        for user_id in recipients {
            let notification = Notification::render(event, user_id);
            match self.sink.deliver(&notification).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    appeal_id = event.appeal_id(),
                    user_id,
                    error = %e,
                    "Failed to deliver notification"
                ),
            }
        }

        debug!(appeal_id = event.appeal_id(), delivered, "Notifications delivered");
        Ok(delivered)
    }

    /// Fire and forget.
    pub fn dispatch(&self, event: AppealEvent, actor_id: i64) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(&event, actor_id).await {
                warn!(
                    appeal_id = event.appeal_id(),
                    error = %e,
                    "Failed to resolve notification recipients"
                );
            }
        });
    }
}

/// Sink that remembers what it was given.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    delivered: std::sync::Mutex<Vec<Notification>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl RecordingSink {
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap().clone()
    }

    /// Yield until at least `count` notifications arrived or give up.
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            if self.delivered.lock().unwrap().len() >= count {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.delivered()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &Notification) -> AppResult<()> {
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use appeals_common::AppError;
    use appeals_db::{DirectoryStore, MemoryStore, store::NewService};

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, _notification: &Notification) -> AppResult<()> {
            Err(AppError::ExternalService("push gateway down".to_string()))
        }
    }

    fn store_with_staff() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.add_user(1, UserRole::Citizen).unwrap();
        store.add_user(2, UserRole::Dispatcher).unwrap();
        store.add_user(3, UserRole::Admin).unwrap();
        store.add_user(4, UserRole::Executor).unwrap();
        store
    }

    #[tokio::test]
    async fn test_created_goes_to_staff() {
        let store = store_with_staff();
        let notifier = Notifier::new(store, Arc::new(NoOpSink));

        let event = AppealEvent::Created {
            appeal_id: 9,
            title: "Pothole".into(),
        };
        assert_eq!(notifier.recipients(&event, 1).await.unwrap(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_assigned_goes_to_linked_executors() {
        let store = store_with_staff();
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
        store.link_executor(4, service.id).await.unwrap();
        let notifier = Notifier::new(store, Arc::new(NoOpSink));

        let event = AppealEvent::Assigned {
            appeal_id: 9,
            title: "Pothole".into(),
            service_id: service.id,
        };
        assert_eq!(notifier.recipients(&event, 2).await.unwrap(), vec![4]);
    }

    #[tokio::test]
    async fn test_reporter_acting_is_not_notified() {
        let notifier = Notifier::new(store_with_staff(), Arc::new(NoOpSink));
        let event = AppealEvent::CommentAdded {
            appeal_id: 9,
            title: "Pothole".into(),
            reporter_id: 1,
        };
        assert!(notifier.recipients(&event, 1).await.unwrap().is_empty());
        assert_eq!(notifier.recipients(&event, 2).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let notifier = Notifier::new(store_with_staff(), Arc::new(FailingSink));
        let event = AppealEvent::Created {
            appeal_id: 9,
            title: "Pothole".into(),
        };
        assert_eq!(notifier.deliver(&event, 1).await.unwrap(), 0);
    }

    #[test]
    fn test_render_completed_status() {
        let event = AppealEvent::StatusChanged {
            appeal_id: 9,
            title: "Pothole".into(),
            reporter_id: 1,
            new_status: AppealStatus::Completed,
        };
        let rendered = Notification::render(&event, 1);
        assert_eq!(rendered.kind, NotificationKind::AppealCompleted);

        let event = AppealEvent::StatusChanged {
            appeal_id: 9,
            title: "Pothole".into(),
            reporter_id: 1,
            new_status: AppealStatus::InProgress,
        };
        let rendered = Notification::render(&event, 1);
        assert_eq!(rendered.kind, NotificationKind::StatusChanged);
        assert_eq!(rendered.message, "Appeal 'Pothole' is now: In Progress");
    }
}
