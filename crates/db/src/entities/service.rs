//! Service entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Municipal unit an appeal can be routed to.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "services")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Matched case-insensitively against classifier labels
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub contact_person: String,

    pub contact_phone: String,

    pub contact_email: String,

    /// Inactive services are never auto-routed to
    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::appeal::Entity")]
    Appeals,

    #[sea_orm(has_one = "super::service_keywords::Entity")]
    Keywords,

    #[sea_orm(has_many = "super::user_service::Entity")]
    Executors,

    #[sea_orm(has_many = "super::category_service::Entity")]
    Categories,
}

impl Related<super::appeal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Appeals.def()
    }
}

impl Related<super::service_keywords::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Keywords.def()
    }
}

impl Related<super::user_service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Executors.def()
    }
}

impl Related<super::category_service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
