//! User entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of an authenticated actor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[sea_orm(string_value = "citizen")]
    Citizen,
    #[sea_orm(string_value = "dispatcher")]
    Dispatcher,
    #[sea_orm(string_value = "executor")]
    Executor,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl UserRole {
    /// Wire token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Dispatcher => "dispatcher",
            Self::Executor => "executor",
            Self::Admin => "admin",
        }
    }

    /// Parse a wire token, case-insensitively.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "citizen" => Some(Self::Citizen),
            "dispatcher" => Some(Self::Dispatcher),
            "executor" => Some(Self::Executor),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Dispatchers and admins.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Dispatcher | Self::Admin)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(unique)]
    pub email: String,

    pub first_name: String,

    pub last_name: String,

    pub role: UserRole,

    #[sea_orm(default_value = true)]
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_service::Entity")]
    Services,
}

impl Related<super::user_service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Services.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(UserRole::parse("Dispatcher"), Some(UserRole::Dispatcher));
        assert_eq!(UserRole::parse(" admin "), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("moderator"), None);
    }

    #[test]
    fn test_staff_roles() {
        assert!(UserRole::Admin.is_staff());
        assert!(UserRole::Dispatcher.is_staff());
        assert!(!UserRole::Executor.is_staff());
        assert!(!UserRole::Citizen.is_staff());
    }
}
