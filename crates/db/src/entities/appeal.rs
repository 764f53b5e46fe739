//! Appeal entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an appeal.
///
/// Stored and serialized as one of six fixed lowercase tokens.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum AppealStatus {
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl AppealStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::New,
        Self::Assigned,
        Self::InProgress,
        Self::Completed,
        Self::Closed,
        Self::Rejected,
    ];

    /// Wire and storage token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
        }
    }

    /// Parse a storage token. Unknown tokens yield `None`.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == token)
    }

    /// Human-readable label used in history entries.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Assigned => "Assigned",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Closed => "Closed",
            Self::Rejected => "Rejected",
        }
    }

    /// Entering this status stamps `closed_at`.
    #[must_use]
    pub const fn is_closing(self) -> bool {
        matches!(self, Self::Completed | Self::Closed)
    }

    /// Counts as resolved for resolution-time statistics.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        self.is_closing()
    }

    /// Still awaiting work for overdue and deadline tracking.
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Closed | Self::Rejected)
    }
}

impl std::fmt::Display for AppealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowest accepted priority.
pub const MIN_PRIORITY: i16 = 1;
/// Highest accepted priority.
pub const MAX_PRIORITY: i16 = 3;
/// Priority used when the reporter does not pick one.
pub const DEFAULT_PRIORITY: i16 = 2;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "appeals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Reporter
    pub user_id: i64,

    #[sea_orm(nullable)]
    pub category_id: Option<i64>,

    /// Responsible service, set by auto-routing or assignment
    #[sea_orm(nullable)]
    pub service_id: Option<i64>,

    pub status: AppealStatus,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub address: String,

    pub latitude: f64,

    pub longitude: f64,

    /// 1 (low) to 3 (high)
    pub priority: i16,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set when the appeal enters `completed` or `closed`; never cleared
    #[sea_orm(nullable)]
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,

    #[sea_orm(
        belongs_to = "super::service::Entity",
        from = "Column::ServiceId",
        to = "super::service::Column::Id",
        on_delete = "SetNull"
    )]
    Service,

    #[sea_orm(has_many = "super::appeal_history::Entity")]
    History,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Service.def()
    }
}

impl Related<super::appeal_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::History.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_round_trip() {
        for status in AppealStatus::ALL {
            assert_eq!(AppealStatus::from_token(status.as_str()), Some(status));
        }
        assert_eq!(AppealStatus::from_token("archived"), None);
    }

    #[test]
    fn test_serde_uses_snake_case_tokens() {
        let json = serde_json::to_string(&AppealStatus::InProgress).unwrap_or_default();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_open_and_closing_sets() {
        assert!(AppealStatus::Completed.is_closing());
        assert!(AppealStatus::Closed.is_closing());
        assert!(!AppealStatus::Rejected.is_closing());
        assert!(AppealStatus::Completed.is_open());
        assert!(!AppealStatus::Rejected.is_open());
        assert!(!AppealStatus::Closed.is_open());
    }
}
