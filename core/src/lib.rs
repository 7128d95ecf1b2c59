/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod consts;
pub mod database;
pub mod executer;
pub mod input;
pub mod logsink;
pub mod sources;
pub mod types;

use database::connect_db;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use types::*;

pub async fn init_state(cli: Cli) -> anyhow::Result<Arc<ServerState>> {
    info!("Starting Drydock server on {}:{}", cli.ip, cli.port);

    let db = connect_db(&cli).await?;

    Ok(Arc::new(ServerState {
        db,
        queue: BuildQueue::new(cli.queue_capacity),
        locks: AppLocks::default(),
        shutdown: CancellationToken::new(),
        cli,
    }))
}
