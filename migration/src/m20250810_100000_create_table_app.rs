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
                    .table(App::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(App::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(App::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(App::Repository).string().not_null())
                    .col(ColumnDef::new(App::Branch).string().not_null())
                    .col(ColumnDef::new(App::Strategy).integer().not_null())
                    .col(ColumnDef::new(App::Dockerfile).string().not_null())
                    .col(ColumnDef::new(App::ComposeFile).string())
                    .col(ColumnDef::new(App::BuildContext).string())
                    .col(ColumnDef::new(App::ContainerName).string().not_null())
                    .col(ColumnDef::new(App::ImageName).string().not_null())
                    .col(ColumnDef::new(App::Environment).json().not_null())
                    .col(ColumnDef::new(App::WebhookSecret).string())
                    .col(ColumnDef::new(App::Enabled).boolean().not_null())
                    .col(ColumnDef::new(App::AutoDeploy).boolean().not_null())
                    .col(ColumnDef::new(App::Subdomain).string())
                    .col(ColumnDef::new(App::ContainerPort).integer())
                    .col(ColumnDef::new(App::CreatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(App::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum App {
    Table,
    Id,
    Name,
    Repository,
    Branch,
    Strategy,
    Dockerfile,
    ComposeFile,
    BuildContext,
    ContainerName,
    ImageName,
    Environment,
    WebhookSecret,
    Enabled,
    AutoDeploy,
    Subdomain,
    ContainerPort,
    CreatedAt,
}
