//! Categories, services, keyword corpora, executor links and
//! category assignments.

use std::collections::{HashMap, HashSet};

use appeals_common::{AppError, AppResult};
use appeals_db::{
    DirectoryStoreRef,
    entities::{
        appeal::DEFAULT_PRIORITY, category, service, service_keywords, user::UserRole,
    },
    store::{CategoryChanges, NewCategory, NewService, ServiceChanges},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::services::permissions::Actor;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: String,

    #[validate(range(min = 1, max = 3))]
    pub default_priority: Option<i16>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[validate(range(min = 1, max = 3))]
    pub default_priority: Option<i16>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateServiceInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,

    #[serde(default)]
    #[validate(length(max = 200))]
    pub contact_person: String,

    #[serde(default)]
    #[validate(length(max = 50))]
    pub contact_phone: String,

    #[validate(email)]
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateServiceInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(length(max = 200))]
    pub contact_person: Option<String>,

    #[validate(length(max = 50))]
    pub contact_phone: Option<String>,

    #[validate(email)]
    pub contact_email: Option<String>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct KeywordsInput {
    #[validate(length(max = 20000))]
    pub keywords: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LinkExecutorInput {
    pub user_id: i64,
}

/// Replacement set of services for a category. An empty list clears it.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignCategoryServicesInput {
    pub category_id: i64,

    #[validate(length(max = 100))]
    pub service_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryWithServices {
    pub category: category::Model,
    pub services: Vec<service::Model>,
}

/// One service as the classifier sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationEntry {
    pub name: String,
    /// Service description and keyword corpus joined by `"; "`
    pub description: String,
}

/// Reference data management.
#[derive(Clone)]
pub struct DirectoryService {
    directory: DirectoryStoreRef,
}

fn require_admin(actor: &Actor) -> AppResult<()> {
    if actor.role == UserRole::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".to_string()))
    }
}

fn require_staff(actor: &Actor) -> AppResult<()> {
    if matches!(actor.role, UserRole::Dispatcher | UserRole::Admin) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Dispatcher or admin access required".to_string(),
        ))
    }
}

fn join_corpus(description: &str, keywords: &str) -> String {
    match (description.trim(), keywords.trim()) {
        (d, "") => d.to_string(),
        ("", k) => k.to_string(),
        (d, k) => format!("{d}; {k}"),
    }
}

impl DirectoryService {
    #[must_use]
    pub fn new(directory: DirectoryStoreRef) -> Self {
        Self { directory }
    }

    // ==================== Categories ====================

    /// Categories, inactive ones only for admins who ask for them.
    pub async fn list_categories(
        &self,
        actor: &Actor,
        include_inactive: bool,
    ) -> AppResult<Vec<category::Model>> {
        let active_only = !(include_inactive && actor.role == UserRole::Admin);
        self.directory.list_categories(active_only).await
    }

    pub async fn get_category(&self, id: i64) -> AppResult<category::Model> {
        self.directory
            .find_category(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {id}")))
    }

    pub async fn create_category(
        &self,
        actor: &Actor,
        input: CreateCategoryInput,
    ) -> AppResult<category::Model> {
        require_admin(actor)?;
        input.validate()?;

        let category = self
            .directory
            .create_category(NewCategory {
                name: input.name.trim().to_string(),
                description: input.description,
                default_priority: input.default_priority.unwrap_or(DEFAULT_PRIORITY),
            })
            .await?;
        info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn update_category(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateCategoryInput,
    ) -> AppResult<category::Model> {
        require_admin(actor)?;
        input.validate()?;

        let category = self
            .directory
            .update_category(
                id,
                CategoryChanges {
                    name: input.name.map(|n| n.trim().to_string()),
                    description: input.description,
                    default_priority: input.default_priority,
                    is_active: input.is_active,
                },
            )
            .await?;
        info!(category_id = id, is_active = category.is_active, "Category updated");
        Ok(category)
    }

    /// Deactivate a category. Appeals keep pointing at it.
    pub async fn delete_category(&self, actor: &Actor, id: i64) -> AppResult<()> {
        require_admin(actor)?;
        self.directory
            .update_category(
                id,
                CategoryChanges {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await?;
        info!(category_id = id, "Category deactivated");
        Ok(())
    }

    // ==================== Services ====================

    /// Services, inactive ones only for admins who ask for them.
    pub async fn list_services(
        &self,
        actor: &Actor,
        include_inactive: bool,
    ) -> AppResult<Vec<service::Model>> {
        let active_only = !(include_inactive && actor.role == UserRole::Admin);
        self.directory.list_services(active_only).await
    }

    pub async fn get_service(&self, id: i64) -> AppResult<service::Model> {
        self.directory
            .find_service(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Service {id}")))
    }

    pub async fn create_service(
        &self,
        actor: &Actor,
        input: CreateServiceInput,
    ) -> AppResult<service::Model> {
        require_admin(actor)?;
        input.validate()?;

        let service = self
            .directory
            .create_service(NewService {
                name: input.name.trim().to_string(),
                description: input.description,
                contact_person: input.contact_person,
                contact_phone: input.contact_phone,
                contact_email: input.contact_email.unwrap_or_default(),
            })
            .await?;
        info!(service_id = service.id, name = %service.name, "Service created");
        Ok(service)
    }

    pub async fn update_service(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateServiceInput,
    ) -> AppResult<service::Model> {
        require_admin(actor)?;
        input.validate()?;

        let service = self
            .directory
            .update_service(
                id,
                ServiceChanges {
                    name: input.name.map(|n| n.trim().to_string()),
                    description: input.description,
                    contact_person: input.contact_person,
                    contact_phone: input.contact_phone,
                    contact_email: input.contact_email,
                    is_active: input.is_active,
                },
            )
            .await?;
        info!(service_id = id, is_active = service.is_active, "Service updated");
        Ok(service)
    }

    /// Deactivate a service. Appeals keep pointing at it.
    pub async fn delete_service(&self, actor: &Actor, id: i64) -> AppResult<()> {
        require_admin(actor)?;
        self.directory
            .update_service(
                id,
                ServiceChanges {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await?;
        info!(service_id = id, "Service deactivated");
        Ok(())
    }

    /// Active services with their keyword corpora, for the classifier.
    pub async fn services_for_classification(&self) -> AppResult<Vec<ClassificationEntry>> {
        let services = self.directory.list_services(true).await?;
        let keywords: HashMap<i64, String> = self
            .directory
            .all_service_keywords()
            .await?
            .into_iter()
            .map(|k| (k.service_id, k.keywords))
            .collect();

        Ok(services
            .into_iter()
            .map(|s| ClassificationEntry {
                description: join_corpus(
                    &s.description,
                    keywords.get(&s.id).map_or("", String::as_str),
                ),
                name: s.name,
            })
            .collect())
    }

    // ==================== Keywords ====================

    /// Keyword corpus of a service; empty when none was stored.
    pub async fn keywords(&self, actor: &Actor, service_id: i64) -> AppResult<String> {
        require_admin(actor)?;
        self.get_service(service_id).await?;
        Ok(self
            .directory
            .service_keywords(service_id)
            .await?
            .map(|k| k.keywords)
            .unwrap_or_default())
    }

    pub async fn set_keywords(
        &self,
        actor: &Actor,
        service_id: i64,
        input: KeywordsInput,
    ) -> AppResult<service_keywords::Model> {
        require_admin(actor)?;
        input.validate()?;
        self.get_service(service_id).await?;

        let saved = self
            .directory
            .set_service_keywords(service_id, input.keywords.trim().to_string())
            .await?;
        info!(service_id, "Service keywords replaced");
        Ok(saved)
    }

    // ==================== Executor links ====================

    pub async fn executors(&self, actor: &Actor, service_id: i64) -> AppResult<Vec<i64>> {
        require_admin(actor)?;
        self.get_service(service_id).await?;
        self.directory.executors_of_service(service_id).await
    }

    /// Link an executor to a service. Linking twice is a no-op.
    pub async fn link_executor(
        &self,
        actor: &Actor,
        service_id: i64,
        input: LinkExecutorInput,
    ) -> AppResult<()> {
        require_admin(actor)?;
        self.get_service(service_id).await?;

        let user = self
            .directory
            .find_user(input.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", input.user_id)))?;
        if user.role != UserRole::Executor {
            return Err(AppError::Validation(
                "Only executors can be linked to services".to_string(),
            ));
        }

        self.directory.link_executor(user.id, service_id).await?;
        info!(service_id, user_id = user.id, "Executor linked");
        Ok(())
    }

    pub async fn unlink_executor(
        &self,
        actor: &Actor,
        service_id: i64,
        user_id: i64,
    ) -> AppResult<()> {
        require_admin(actor)?;
        if self.directory.unlink_executor(user_id, service_id).await? {
            info!(service_id, user_id, "Executor unlinked");
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "User {user_id} is not linked to service {service_id}"
            )))
        }
    }

    /// Services the caller is linked to.
    pub async fn my_services(&self, actor: &Actor) -> AppResult<Vec<service::Model>> {
        self.directory.services_for_user(actor.id).await
    }

    // ==================== Category assignments ====================

    /// Every active category with the active services assigned to it.
    pub async fn category_assignments(&self, actor: &Actor) -> AppResult<Vec<CategoryWithServices>> {
        require_staff(actor)?;

        let categories = self.directory.list_categories(true).await?;
        let services = self.active_services_by_id().await?;
        let mut by_category: HashMap<i64, Vec<service::Model>> = HashMap::new();
        for link in self.directory.category_service_links(None).await? {
            if let Some(service) = services.get(&link.service_id) {
                by_category
                    .entry(link.category_id)
                    .or_default()
                    .push(service.clone());
            }
        }

        Ok(categories
            .into_iter()
            .map(|category| CategoryWithServices {
                services: by_category.remove(&category.id).unwrap_or_default(),
                category,
            })
            .collect())
    }

    /// Active services assigned to one category, in assignment order.
    pub async fn category_services(
        &self,
        actor: &Actor,
        category_id: i64,
    ) -> AppResult<Vec<service::Model>> {
        require_staff(actor)?;
        self.get_category(category_id).await?;
        self.assigned_services(category_id).await
    }

    /// Replace the services of a category and return the new assignment.
    pub async fn assign_category_services(
        &self,
        actor: &Actor,
        input: AssignCategoryServicesInput,
    ) -> AppResult<Vec<service::Model>> {
        require_staff(actor)?;
        input.validate()?;
        self.get_category(input.category_id).await?;

        let known: HashSet<i64> = self
            .directory
            .list_services(false)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let mut seen = HashSet::new();
        let mut service_ids = Vec::with_capacity(input.service_ids.len());
        for id in input.service_ids {
            if !known.contains(&id) {
                return Err(AppError::NotFound(format!("Service {id}")));
            }
            if seen.insert(id) {
                service_ids.push(id);
            }
        }

        self.directory
            .replace_category_services(input.category_id, &service_ids)
            .await?;
        info!(
            category_id = input.category_id,
            services = service_ids.len(),
            "Category services replaced"
        );
        self.assigned_services(input.category_id).await
    }

    pub async fn unassign_category_service(
        &self,
        actor: &Actor,
        category_id: i64,
        service_id: i64,
    ) -> AppResult<()> {
        require_staff(actor)?;
        if self
            .directory
            .remove_category_service(category_id, service_id)
            .await?
        {
            info!(category_id, service_id, "Category service removed");
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "Service {service_id} is not assigned to category {category_id}"
            )))
        }
    }

    async fn active_services_by_id(&self) -> AppResult<HashMap<i64, service::Model>> {
        Ok(self
            .directory
            .list_services(true)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect())
    }

    async fn assigned_services(&self, category_id: i64) -> AppResult<Vec<service::Model>> {
        let mut services = self.active_services_by_id().await?;
        Ok(self
            .directory
            .category_service_links(Some(category_id))
            .await?
            .into_iter()
            .filter_map(|link| services.remove(&link.service_id))
            .collect())
    }
}
