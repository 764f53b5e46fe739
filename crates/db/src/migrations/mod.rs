//! Database migrations.
//!
//! Schema migrations for the appeals database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users_table;
mod m20250101_000002_create_categories_table;
mod m20250101_000003_create_services_tables;
mod m20250101_000004_create_user_services_table;
mod m20250101_000005_create_appeals_table;
mod m20250101_000006_create_appeal_history_table;
mod m20250101_000007_create_comments_table;
mod m20250101_000008_create_category_services_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users_table::Migration),
            Box::new(m20250101_000002_create_categories_table::Migration),
            Box::new(m20250101_000003_create_services_tables::Migration),
            Box::new(m20250101_000004_create_user_services_table::Migration),
            Box::new(m20250101_000005_create_appeals_table::Migration),
            Box::new(m20250101_000006_create_appeal_history_table::Migration),
            Box::new(m20250101_000007_create_comments_table::Migration),
            Box::new(m20250101_000008_create_category_services_table::Migration),
        ]
    }
}
