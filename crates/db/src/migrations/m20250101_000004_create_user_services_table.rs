//! Create user_services table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserServices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserServices::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(UserServices::ServiceId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserServices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(UserServices::UserId)
                            .col(UserServices::ServiceId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_services_user")
                            .from(UserServices::Table, UserServices::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_services_service")
                            .from(UserServices::Table, UserServices::ServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: service_id (executors of a service)
        manager
            .create_index(
                Index::create()
                    .name("idx_user_services_service_id")
                    .table(UserServices::Table)
                    .col(UserServices::ServiceId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserServices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UserServices {
    Table,
    UserId,
    ServiceId,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}

#[derive(Iden)]
enum Services {
    Table,
    Id,
}
