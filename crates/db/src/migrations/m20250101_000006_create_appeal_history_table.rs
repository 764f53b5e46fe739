//! Create appeal_history table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AppealHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AppealHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AppealHistory::AppealId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AppealHistory::UserId).big_integer().not_null())
                    .col(ColumnDef::new(AppealHistory::OldStatus).string_len(32))
                    .col(
                        ColumnDef::new(AppealHistory::NewStatus)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AppealHistory::Action).text().not_null())
                    .col(ColumnDef::new(AppealHistory::Comment).text())
                    .col(
                        ColumnDef::new(AppealHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appeal_history_appeal")
                            .from(AppealHistory::Table, AppealHistory::AppealId)
                            .to(Appeals::Table, Appeals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (appeal_id, created_at) (ordered history reads)
        manager
            .create_index(
                Index::create()
                    .name("idx_appeal_history_appeal_created")
                    .table(AppealHistory::Table)
                    .col(AppealHistory::AppealId)
                    .col(AppealHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, new_status) (executor resolution averages)
        manager
            .create_index(
                Index::create()
                    .name("idx_appeal_history_user_new_status")
                    .table(AppealHistory::Table)
                    .col(AppealHistory::UserId)
                    .col(AppealHistory::NewStatus)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AppealHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AppealHistory {
    Table,
    Id,
    AppealId,
    UserId,
    OldStatus,
    NewStatus,
    Action,
    Comment,
    CreatedAt,
}

#[derive(Iden)]
enum Appeals {
    Table,
    Id,
}
