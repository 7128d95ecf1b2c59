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
                    .table(BuildLog::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BuildLog::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(BuildLog::Build).uuid().not_null())
                    .col(ColumnDef::new(BuildLog::Seq).big_integer().not_null())
                    .col(ColumnDef::new(BuildLog::Level).integer().not_null())
                    .col(ColumnDef::new(BuildLog::Origin).integer().not_null())
                    .col(ColumnDef::new(BuildLog::Message).text().not_null())
                    .col(ColumnDef::new(BuildLog::CreatedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-build-log-build")
                            .from(BuildLog::Table, BuildLog::Build)
                            .to(Build::Table, Build::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-build-log-build-seq")
                    .table(BuildLog::Table)
                    .col(BuildLog::Build)
                    .col(BuildLog::Seq)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BuildLog::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BuildLog {
    Table,
    Id,
    Build,
    Seq,
    Level,
    Origin,
    Message,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Build {
    Table,
    Id,
}
