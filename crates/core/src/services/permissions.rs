//! Role-based access rules for appeal operations.
//!
//! [`permits`] is the whole matrix in one pure function; [`authorize`] turns a
//! denial into the right error category.

use appeals_common::{AppError, AppResult};
use appeals_db::entities::{
    appeal::{self, AppealStatus},
    user::UserRole,
};
use serde::{Deserialize, Serialize};

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: UserRole,
}

impl Actor {
    #[must_use]
    pub const fn new(id: i64, role: UserRole) -> Self {
        Self { id, role }
    }

    /// Dispatcher or admin.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

/// Gated lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    UpdateStatus,
    UpdatePriority,
    Assign,
}

/// Facts about the target appeal that the matrix depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessContext {
    /// Caller filed the appeal.
    pub is_owner: bool,
    /// Appeal is still in status `new`.
    pub is_new: bool,
    /// Appeal has a responsible service.
    pub service_assigned: bool,
    /// Caller is linked to the appeal's service.
    pub executor_linked: bool,
    /// The requested update touches nothing but the category.
    pub category_only: bool,
}

impl AccessContext {
    /// Context for `actor` acting on `appeal`.
    #[must_use]
    pub fn for_appeal(actor: &Actor, appeal: &appeal::Model) -> Self {
        Self {
            is_owner: appeal.user_id == actor.id,
            is_new: appeal.status == AppealStatus::New,
            service_assigned: appeal.service_id.is_some(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_executor_linked(mut self, linked: bool) -> Self {
        self.executor_linked = linked;
        self
    }

    #[must_use]
    pub const fn with_category_only(mut self, category_only: bool) -> Self {
        self.category_only = category_only;
        self
    }
}

/// Whether `role` may perform `op` under `ctx`.
#[must_use]
pub const fn permits(role: UserRole, op: Operation, ctx: &AccessContext) -> bool {
    use Operation::{Assign, Create, Update, UpdatePriority, UpdateStatus};
    use UserRole::{Admin, Citizen, Dispatcher, Executor};

    match (op, role) {
        (Create, Citizen) => true,
        (Create, Dispatcher | Executor | Admin) => false,

        (Update, Citizen) => ctx.is_owner && ctx.is_new,
        (Update, Dispatcher) => ctx.category_only,
        (Update, Executor) => false,
        (Update, Admin) => true,

        (UpdateStatus, Dispatcher | Admin) => true,
        (UpdateStatus, Executor) => ctx.service_assigned && ctx.executor_linked,
        (UpdateStatus, Citizen) => false,

        (UpdatePriority, Dispatcher | Executor | Admin) => true,
        (UpdatePriority, Citizen) => false,

        (Assign, Dispatcher | Admin) => true,
        (Assign, Citizen | Executor) => false,
    }
}

/// Check the matrix and map a denial to an error.
///
/// An owner editing an appeal that left `new` gets [`AppError::Conflict`];
/// every other denial is [`AppError::Forbidden`].
pub fn authorize(actor: &Actor, op: Operation, ctx: &AccessContext) -> AppResult<()> {
    if permits(actor.role, op, ctx) {
        return Ok(());
    }

    if op == Operation::Update && actor.role == UserRole::Citizen && ctx.is_owner && !ctx.is_new {
        return Err(AppError::Conflict(
            "Appeal can no longer be edited once processing has started".to_string(),
        ));
    }

    let message = match op {
        Operation::Create => "Only citizens can file appeals",
        Operation::Update if actor.role == UserRole::Dispatcher => {
            "Dispatchers can only change the category"
        }
        Operation::Update => "You don't have permission to update this appeal",
        Operation::UpdateStatus => "You don't have permission to update this appeal status",
        Operation::UpdatePriority => "You don't have permission to update this appeal priority",
        Operation::Assign => "Only dispatchers and admins can assign appeals",
    };
    Err(AppError::Forbidden(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLES: [UserRole; 4] = [
        UserRole::Citizen,
        UserRole::Dispatcher,
        UserRole::Executor,
        UserRole::Admin,
    ];

    fn allowed(op: Operation, ctx: &AccessContext) -> Vec<UserRole> {
        ROLES
            .into_iter()
            .filter(|role| permits(*role, op, ctx))
            .collect()
    }

    #[test]
    fn test_create_is_citizen_only() {
        assert_eq!(
            allowed(Operation::Create, &AccessContext::default()),
            vec![UserRole::Citizen]
        );
    }

    #[test]
    fn test_update_matrix() {
        let owner_new = AccessContext {
            is_owner: true,
            is_new: true,
            ..Default::default()
        };
        assert_eq!(
            allowed(Operation::Update, &owner_new),
            vec![UserRole::Citizen, UserRole::Admin]
        );

        let owner_processed = AccessContext {
            is_owner: true,
            ..Default::default()
        };
        assert_eq!(
            allowed(Operation::Update, &owner_processed),
            vec![UserRole::Admin]
        );

        let stranger_new = AccessContext {
            is_new: true,
            ..Default::default()
        };
        assert!(!permits(UserRole::Citizen, Operation::Update, &stranger_new));

        let category_change = AccessContext {
            category_only: true,
            ..Default::default()
        };
        assert_eq!(
            allowed(Operation::Update, &category_change),
            vec![UserRole::Dispatcher, UserRole::Admin]
        );
    }

    #[test]
    fn test_update_status_matrix() {
        let unassigned = AccessContext::default();
        assert_eq!(
            allowed(Operation::UpdateStatus, &unassigned),
            vec![UserRole::Dispatcher, UserRole::Admin]
        );

        let assigned_elsewhere = AccessContext {
            service_assigned: true,
            ..Default::default()
        };
        assert!(!permits(
            UserRole::Executor,
            Operation::UpdateStatus,
            &assigned_elsewhere
        ));

        let assigned_mine = assigned_elsewhere.with_executor_linked(true);
        assert_eq!(
            allowed(Operation::UpdateStatus, &assigned_mine),
            vec![UserRole::Dispatcher, UserRole::Executor, UserRole::Admin]
        );
    }

    #[test]
    fn test_priority_and_assign_matrix() {
        let ctx = AccessContext::default();
        assert_eq!(
            allowed(Operation::UpdatePriority, &ctx),
            vec![UserRole::Dispatcher, UserRole::Executor, UserRole::Admin]
        );
        assert_eq!(
            allowed(Operation::Assign, &ctx),
            vec![UserRole::Dispatcher, UserRole::Admin]
        );
    }

    #[test]
    fn test_authorize_owner_of_processed_appeal_conflicts() {
        let actor = Actor::new(1, UserRole::Citizen);
        let ctx = AccessContext {
            is_owner: true,
            is_new: false,
            ..Default::default()
        };
        assert!(matches!(
            authorize(&actor, Operation::Update, &ctx),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_authorize_denial_is_forbidden() {
        let actor = Actor::new(1, UserRole::Executor);
        assert!(matches!(
            authorize(&actor, Operation::Assign, &AccessContext::default()),
            Err(AppError::Forbidden(_))
        ));
    }
}
