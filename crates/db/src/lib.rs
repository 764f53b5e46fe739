//! Persistence layer for the citizen appeals service.
//!
//! Entities and migrations describe the `PostgreSQL` schema. The [`store`]
//! traits are the seam the domain services talk to; [`repositories`] holds
//! the sea-orm implementations and `memory` an in-process one for tests.

pub mod entities;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod migrations;
pub mod repositories;
pub mod store;
pub mod test_utils;
pub mod transition;

use appeals_common::{AppError, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::log::LevelFilter;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
pub use repositories::{AppealRepository, DirectoryRepository};
pub use store::{AppealStore, AppealStoreRef, DirectoryStore, DirectoryStoreRef};

/// Open the connection pool.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(&config.database.url);

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
