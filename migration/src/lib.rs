/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub use sea_orm_migration::prelude::*;

mod m20250810_100000_create_table_app;
mod m20250810_100100_create_table_build;
mod m20250810_100200_create_table_build_log;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250810_100000_create_table_app::Migration),
            Box::new(m20250810_100100_create_table_build::Migration),
            Box::new(m20250810_100200_create_table_build_log::Migration),
        ]
    }
}
