//! Create appeals table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Appeals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Appeals::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Appeals::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Appeals::CategoryId).big_integer())
                    .col(ColumnDef::new(Appeals::ServiceId).big_integer())
                    .col(
                        ColumnDef::new(Appeals::Status)
                            .string_len(32)
                            .not_null()
                            .default("new"),
                    )
                    .col(ColumnDef::new(Appeals::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Appeals::Description).text().not_null())
                    .col(ColumnDef::new(Appeals::Address).string_len(500).not_null())
                    .col(ColumnDef::new(Appeals::Latitude).double().not_null())
                    .col(ColumnDef::new(Appeals::Longitude).double().not_null())
                    .col(
                        ColumnDef::new(Appeals::Priority)
                            .small_integer()
                            .not_null()
                            .default(2)
                            .check(Expr::col(Appeals::Priority).between(1, 3)),
                    )
                    .col(
                        ColumnDef::new(Appeals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Appeals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Appeals::ClosedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appeals_category")
                            .from(Appeals::Table, Appeals::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appeals_service")
                            .from(Appeals::Table, Appeals::ServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: status (filters, dashboards)
        manager
            .create_index(
                Index::create()
                    .name("idx_appeals_status")
                    .table(Appeals::Table)
                    .col(Appeals::Status)
                    .to_owned(),
            )
            .await?;

        // Index: service_id (executor views, service statistics)
        manager
            .create_index(
                Index::create()
                    .name("idx_appeals_service_id")
                    .table(Appeals::Table)
                    .col(Appeals::ServiceId)
                    .to_owned(),
            )
            .await?;

        // Index: user_id (reporter listing)
        manager
            .create_index(
                Index::create()
                    .name("idx_appeals_user_id")
                    .table(Appeals::Table)
                    .col(Appeals::UserId)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (pagination, date ranges)
        manager
            .create_index(
                Index::create()
                    .name("idx_appeals_created_at")
                    .table(Appeals::Table)
                    .col(Appeals::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Appeals::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Appeals {
    Table,
    Id,
    UserId,
    CategoryId,
    ServiceId,
    Status,
    Title,
    Description,
    Address,
    Latitude,
    Longitude,
    Priority,
    CreatedAt,
    UpdatedAt,
    ClosedAt,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
}

#[derive(Iden)]
enum Services {
    Table,
    Id,
}
