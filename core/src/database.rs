/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::Utc;
use entity::build::BuildStatus;
use migration::Migrator;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectOptions, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter,
};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::log::LevelFilter;
use tracing::warn;

use super::types::*;

pub async fn connect_db(cli: &Cli) -> Result<DatabaseConnection> {
    let db_url = if let Some(file) = &cli.database_url_file {
        super::input::load_secret(file)
    } else if let Some(url) = &cli.database_url {
        url.clone()
    } else {
        anyhow::bail!("No database url provided")
    };

    let mut opt = ConnectOptions::new(db_url);

    if cli.log_level == "debug" {
        opt.sqlx_logging(true)
            .sqlx_logging_level(LevelFilter::Debug);
    } else {
        opt.sqlx_logging(false);
    }

    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8));

    let db = Database::connect(opt)
        .await
        .context("Failed to connect to database")?;
    Migrator::up(&db, None)
        .await
        .context("Failed to run database migrations")?;
    update_db(&db)
        .await
        .context("Failed to update database")?;
    Ok(db)
}

/// Restart recovery: the build queue does not survive the process, so any
/// build still in a non-terminal status belongs to a previous run and is
/// known-lost. It must be cancelled, never silently treated as running.
pub async fn update_db(db: &DatabaseConnection) -> Result<(), DbErr> {
    let builds = EBuild::find()
        .filter(
            Condition::any()
                .add(CBuild::Status.eq(BuildStatus::Pending))
                .add(CBuild::Status.eq(BuildStatus::Cloning))
                .add(CBuild::Status.eq(BuildStatus::Building))
                .add(CBuild::Status.eq(BuildStatus::Deploying)),
        )
        .all(db)
        .await?;

    for build in builds {
        warn!(build_id = %build.id, status = ?build.status, "Cancelling build left over from previous run");

        let mut abuild: ABuild = build.into();
        abuild.status = Set(BuildStatus::Cancelled);
        abuild.error_message = Set(Some("Cancelled by server restart".to_string()));
        abuild.finished_at = Set(Some(Utc::now().naive_utc()));
        abuild.update(db).await?;
    }

    Ok(())
}
