/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Build::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Build::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Build::App).uuid().not_null())
                    .col(ColumnDef::new(Build::Status).integer().not_null())
                    .col(ColumnDef::new(Build::Trigger).integer().not_null())
                    .col(ColumnDef::new(Build::CommitHash).string())
                    .col(ColumnDef::new(Build::CommitMessage).string())
                    .col(ColumnDef::new(Build::CommitAuthor).string())
                    .col(ColumnDef::new(Build::ImageReference).string())
                    .col(ColumnDef::new(Build::ErrorMessage).string())
                    .col(ColumnDef::new(Build::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Build::StartedAt).date_time())
                    .col(ColumnDef::new(Build::FinishedAt).date_time())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-build-app")
                            .from(Build::Table, Build::App)
                            .to(App::Table, App::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Build::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Build {
    Table,
    Id,
    App,
    Status,
    Trigger,
    CommitHash,
    CommitMessage,
    CommitAuthor,
    ImageReference,
    ErrorMessage,
    CreatedAt,
    StartedAt,
    FinishedAt,
}

#[derive(DeriveIden)]
enum App {
    Table,
    Id,
}
