//! Appeal lifecycle service.

use appeals_common::{AppError, AppResult};
use appeals_db::{
    AppealStoreRef, DirectoryStoreRef,
    entities::{
        appeal::{self, AppealStatus, DEFAULT_PRIORITY},
        appeal_history, comment,
        user::UserRole,
    },
    store::{
        AppealChanges, AppealFilter, AppealPage, AppealSort, NewAppeal, NewComment, Pagination,
        TransitionOutcome,
    },
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::services::{
    classifier::{Alternative, ClassifierService},
    notification::{AppealEvent, Notifier},
    permissions::{AccessContext, Actor, Operation, authorize},
    settings::{DEFAULT_CONFIDENCE_THRESHOLD, SettingsService},
};

/// Input for filing a new appeal.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAppealInput {
    #[validate(length(min = 5, max = 200))]
    pub title: String,

    #[validate(length(min = 10))]
    pub description: String,

    pub category_id: i64,

    #[validate(length(min = 1, max = 500))]
    pub address: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[validate(range(min = 1, max = 3))]
    pub priority: Option<i16>,
}

/// Input for editing descriptive fields. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAppealInput {
    #[validate(length(min = 5, max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 10))]
    pub description: Option<String>,

    pub category_id: Option<i64>,

    #[validate(length(min = 1, max = 500))]
    pub address: Option<String>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

impl UpdateAppealInput {
    fn into_changes(self) -> AppealChanges {
        AppealChanges {
            title: self.title,
            description: self.description,
            category_id: self.category_id,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Input for a status transition.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateStatusInput {
    pub status: AppealStatus,

    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

/// Input for assigning an appeal to a service.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignInput {
    pub service_id: i64,

    #[validate(range(min = 1, max = 3))]
    pub priority: Option<i16>,
}

/// Input for a priority change.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePriorityInput {
    #[validate(range(min = 1, max = 3))]
    pub priority: i16,
}

/// Input for a comment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,

    #[serde(default)]
    pub is_internal: bool,
}

/// Classifier verdict as shown to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifyResult {
    /// Suggested service name, empty when there is none
    pub service: String,
    pub confidence: f64,
    pub needs_moderation: bool,
    pub top_alternatives: Vec<Alternative>,
    /// Whether the suggestion would be used for auto-routing
    pub meets_threshold: bool,
}

/// Orchestrates the appeal lifecycle.
#[derive(Clone)]
pub struct AppealService {
    appeals: AppealStoreRef,
    directory: DirectoryStoreRef,
    classifier: ClassifierService,
    settings: SettingsService,
    notifier: Notifier,
}

impl AppealService {
    /// Create a new appeal service.
    #[must_use]
    pub fn new(
        appeals: AppealStoreRef,
        directory: DirectoryStoreRef,
        classifier: ClassifierService,
        settings: SettingsService,
        notifier: Notifier,
    ) -> Self {
        Self {
            appeals,
            directory,
            classifier,
            settings,
            notifier,
        }
    }

    /// File a new appeal and try to route it.
    pub async fn create(&self, actor: &Actor, input: CreateAppealInput) -> AppResult<appeal::Model> {
        authorize(actor, Operation::Create, &AccessContext::default())?;
        input.validate()?;

        self.require_category(input.category_id).await?;

        let appeal = self
            .appeals
            .create(NewAppeal {
                user_id: actor.id,
                category_id: Some(input.category_id),
                title: input.title,
                description: input.description,
                address: input.address,
                latitude: input.latitude,
                longitude: input.longitude,
                priority: input.priority.unwrap_or(DEFAULT_PRIORITY),
            })
            .await?;

        info!(appeal_id = appeal.id, user_id = actor.id, "Appeal created");
        self.notifier.dispatch(
            AppealEvent::Created {
                appeal_id: appeal.id,
                title: appeal.title.clone(),
            },
            actor.id,
        );

        match self.try_auto_route(&appeal).await {
            Ok(Some(outcome)) => {
                if let Some(service_id) = outcome.appeal.service_id {
                    self.notifier.dispatch(
                        AppealEvent::Assigned {
                            appeal_id: appeal.id,
                            title: appeal.title.clone(),
                            service_id,
                        },
                        actor.id,
                    );
                }
                Ok(outcome.appeal)
            }
            Ok(None) => Ok(appeal),
            Err(e) => {
                warn!(appeal_id = appeal.id, error = %e, "Auto-routing failed");
                Ok(appeal)
            }
        }
    }

    /// Classify the description and route the appeal when the verdict is
    /// confident enough and names an active service.
    async fn try_auto_route(&self, appeal: &appeal::Model) -> AppResult<Option<TransitionOutcome>> {
        let threshold = self.threshold().await;
        let verdict = self.classifier.classify(&appeal.description).await?;

        if !verdict.accepts(threshold) {
            debug!(
                appeal_id = appeal.id,
                label = %verdict.label,
                confidence = verdict.confidence,
                threshold,
                "No confident classification"
            );
            return Ok(None);
        }

        let Some(service) = self
            .directory
            .find_active_service_by_name(verdict.label.trim())
            .await?
        else {
            debug!(appeal_id = appeal.id, label = %verdict.label, "Classified service not found");
            return Ok(None);
        };

        let routed = self
            .appeals
            .auto_route(appeal.id, service.id, appeal.user_id)
            .await?;

        if routed.is_some() {
            info!(
                appeal_id = appeal.id,
                service_id = service.id,
                confidence = verdict.confidence,
                "Appeal auto-routed"
            );
        }
        Ok(routed)
    }

    async fn threshold(&self) -> f64 {
        match self.settings.get_settings().await {
            Ok(settings) => settings.effective_threshold(),
            Err(e) => {
                warn!(error = %e, "Failed to load settings, using default threshold");
                DEFAULT_CONFIDENCE_THRESHOLD
            }
        }
    }

    /// Get an appeal. Every authenticated user may view any appeal.
    pub async fn get(&self, _actor: &Actor, id: i64) -> AppResult<appeal::Model> {
        self.appeals.get_by_id(id).await
    }

    /// Filtered listing.
    pub async fn list(
        &self,
        _actor: &Actor,
        filter: &AppealFilter,
        page: Pagination,
        sort: AppealSort,
    ) -> AppResult<AppealPage> {
        self.appeals.list(filter, page, sort).await
    }

    /// Edit descriptive fields.
    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateAppealInput,
    ) -> AppResult<appeal::Model> {
        input.validate()?;
        let changes = input.into_changes();
        if changes.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }

        let appeal = self.appeals.get_by_id(id).await?;
        let ctx = AccessContext::for_appeal(actor, &appeal)
            .with_category_only(changes.is_category_only());
        authorize(actor, Operation::Update, &ctx)?;

        if let Some(category_id) = changes.category_id {
            self.require_category(category_id).await?;
        }

        let updated = self.appeals.update_details(id, changes).await?;
        info!(appeal_id = id, user_id = actor.id, "Appeal updated");
        Ok(updated)
    }

    /// Move an appeal to another status.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateStatusInput,
    ) -> AppResult<appeal::Model> {
        input.validate()?;

        let appeal = self.appeals.get_by_id(id).await?;
        let linked = match (actor.role, appeal.service_id) {
            (UserRole::Executor, Some(service_id)) => self
                .directory
                .executors_of_service(service_id)
                .await?
                .contains(&actor.id),
            _ => false,
        };
        let ctx = AccessContext::for_appeal(actor, &appeal).with_executor_linked(linked);
        authorize(actor, Operation::UpdateStatus, &ctx)?;

        let outcome = self
            .appeals
            .update_status(id, input.status, actor.id, input.comment)
            .await?;

        if outcome.history.is_some() {
            info!(
                appeal_id = id,
                user_id = actor.id,
                from = %outcome.previous_status,
                to = %outcome.appeal.status,
                "Appeal status changed"
            );
            self.notifier.dispatch(
                AppealEvent::StatusChanged {
                    appeal_id: id,
                    title: outcome.appeal.title.clone(),
                    reporter_id: outcome.appeal.user_id,
                    new_status: outcome.appeal.status,
                },
                actor.id,
            );
        }

        Ok(outcome.appeal)
    }

    /// Assign an appeal to a service.
    pub async fn assign(
        &self,
        actor: &Actor,
        id: i64,
        input: AssignInput,
    ) -> AppResult<appeal::Model> {
        authorize(actor, Operation::Assign, &AccessContext::default())?;
        input.validate()?;

        self.appeals.get_by_id(id).await?;
        let service = self
            .directory
            .find_service(input.service_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Service {}", input.service_id)))?;

        let outcome = self
            .appeals
            .assign(id, service.id, input.priority, actor.id)
            .await?;

        info!(
            appeal_id = id,
            service_id = service.id,
            user_id = actor.id,
            "Appeal assigned"
        );
        self.notifier.dispatch(
            AppealEvent::Assigned {
                appeal_id: id,
                title: outcome.appeal.title.clone(),
                service_id: service.id,
            },
            actor.id,
        );

        Ok(outcome.appeal)
    }

    /// Change the priority. Status and history are untouched.
    pub async fn update_priority(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdatePriorityInput,
    ) -> AppResult<appeal::Model> {
        authorize(actor, Operation::UpdatePriority, &AccessContext::default())?;
        input.validate()?;

        self.appeals.update_priority(id, input.priority).await
    }

    /// History of an appeal, oldest first.
    pub async fn history(
        &self,
        _actor: &Actor,
        id: i64,
    ) -> AppResult<Vec<appeal_history::Model>> {
        self.appeals.get_by_id(id).await?;
        self.appeals.history(id).await
    }

    /// Appeals are permanent; deletion is always refused.
    pub async fn delete(&self, _actor: &Actor, id: i64) -> AppResult<()> {
        self.appeals.get_by_id(id).await?;
        Err(AppError::Forbidden(
            "Appeals cannot be deleted; reject the appeal instead".to_string(),
        ))
    }

    /// Run the classifier on arbitrary text.
    pub async fn classify_text(&self, text: &str) -> AppResult<ClassifyResult> {
        if text.trim().is_empty() {
            return Err(AppError::Validation("text must not be empty".to_string()));
        }

        let threshold = self.threshold().await;
        let verdict = self.classifier.classify(text).await?;
        let meets_threshold = verdict.accepts(threshold);

        Ok(ClassifyResult {
            service: verdict.label,
            confidence: verdict.confidence,
            needs_moderation: verdict.needs_moderation,
            top_alternatives: verdict.alternatives,
            meets_threshold,
        })
    }

    /// Comment on an appeal.
    pub async fn add_comment(
        &self,
        actor: &Actor,
        id: i64,
        input: CommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;
        if input.is_internal && !can_see_internal(actor) {
            return Err(AppError::Forbidden(
                "Citizens cannot post internal comments".to_string(),
            ));
        }

        let appeal = self.appeals.get_by_id(id).await?;
        let comment = self
            .appeals
            .add_comment(NewComment {
                appeal_id: id,
                user_id: actor.id,
                text: input.text,
                is_internal: input.is_internal,
            })
            .await?;

        if !comment.is_internal {
            self.notifier.dispatch(
                AppealEvent::CommentAdded {
                    appeal_id: id,
                    title: appeal.title,
                    reporter_id: appeal.user_id,
                },
                actor.id,
            );
        }

        Ok(comment)
    }

    /// Comments visible to `actor`.
    pub async fn comments(&self, actor: &Actor, id: i64) -> AppResult<Vec<comment::Model>> {
        self.appeals.get_by_id(id).await?;
        self.appeals.comments(id, can_see_internal(actor)).await
    }

    async fn require_category(&self, id: i64) -> AppResult<()> {
        match self.directory.find_category(id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("Category {id}"))),
        }
    }
}

const fn can_see_internal(actor: &Actor) -> bool {
    !matches!(actor.role, UserRole::Citizen)
}
