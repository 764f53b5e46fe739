//! Appeal history entity.
//!
//! Append-only audit trail of status transitions. Status columns hold raw
//! tokens so that rows written by other tooling still load.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "appeal_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub appeal_id: i64,

    /// Acting user
    pub user_id: i64,

    #[sea_orm(nullable)]
    pub old_status: Option<String>,

    pub new_status: String,

    #[sea_orm(column_type = "Text")]
    pub action: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::appeal::Entity",
        from = "Column::AppealId",
        to = "super::appeal::Column::Id",
        on_delete = "Cascade"
    )]
    Appeal,
}

impl Related<super::appeal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Appeal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
