/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod compose;
pub mod dispatch;
pub mod scheduler;
pub mod strategy;

use drydock_core::types::ServerState;
use std::sync::Arc;
use tracing::info;

/// Spawns the build worker pool. Workers run until the server's shutdown
/// token fires.
pub async fn start_builder(state: Arc<ServerState>) -> std::io::Result<()> {
    info!(
        workers = state.cli.max_concurrent_builds,
        "Starting build workers"
    );

    for worker in 0..state.cli.max_concurrent_builds {
        tokio::spawn(scheduler::worker_loop(Arc::clone(&state), worker));
    }

    Ok(())
}
