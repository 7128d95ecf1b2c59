/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use super::input::{greater_than_zero, port_in_range};
use clap::Parser;
use entity::*;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "Drydock", display_name = "Drydock", bin_name = "drydock-server", author = "Drydock Contributors", version, about, long_about = None)]
pub struct Cli {
    #[arg(long, env = "DRYDOCK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
    #[arg(long, env = "DRYDOCK_IP", default_value = "127.0.0.1")]
    pub ip: String,
    #[arg(long, env = "DRYDOCK_PORT", value_parser = port_in_range, default_value_t = 3000)]
    pub port: u16,
    #[arg(long, env = "DRYDOCK_SERVE_URL", default_value = "http://127.0.0.1:3000")]
    pub serve_url: String,
    #[arg(long, env = "DRYDOCK_DATABASE_URL")]
    pub database_url: Option<String>,
    #[arg(long, env = "DRYDOCK_DATABASE_URL_FILE")]
    pub database_url_file: Option<String>,
    #[arg(long, env = "DRYDOCK_MAX_CONCURRENT_BUILDS", value_parser = greater_than_zero::<usize>, default_value = "2")]
    pub max_concurrent_builds: usize,
    #[arg(long, env = "DRYDOCK_QUEUE_CAPACITY", value_parser = greater_than_zero::<usize>, default_value = "64")]
    pub queue_capacity: usize,
    #[arg(long, env = "DRYDOCK_BASE_PATH", default_value = "/var/lib/drydock")]
    pub base_path: String,
    #[arg(long, env = "DRYDOCK_CLONE_DEPTH", value_parser = greater_than_zero::<u32>, default_value = "1")]
    pub clone_depth: u32,
    #[arg(long, env = "DRYDOCK_INSIDE_CONTAINER", default_value = "false")]
    pub inside_container: bool,
    #[arg(long, env = "DRYDOCK_DATA_VOLUME")]
    pub data_volume: Option<String>,
    #[arg(long, env = "DRYDOCK_BUILDPACKS_BUILDER", default_value = "paketobuildpacks/builder-jammy-base")]
    pub buildpacks_builder: String,
    #[arg(long, env = "DRYDOCK_BINPATH_GIT", default_value = "git")]
    pub binpath_git: String,
    #[arg(long, env = "DRYDOCK_BINPATH_DOCKER", default_value = "docker")]
    pub binpath_docker: String,
    #[arg(long, env = "DRYDOCK_BINPATH_PACK", default_value = "pack")]
    pub binpath_pack: String,
    #[arg(long, env = "DRYDOCK_REPORT_ERRORS", default_value = "false")]
    pub report_errors: bool,
    #[arg(long, env = "DRYDOCK_SENTRY_DSN")]
    pub sentry_dsn: Option<String>,
}

/// Bounded, process-local build queue. Not persistent: builds queued before a
/// restart are recovered as cancelled, never replayed.
#[derive(Debug)]
pub struct BuildQueue {
    sender: mpsc::Sender<Uuid>,
    receiver: Mutex<mpsc::Receiver<Uuid>>,
}

impl BuildQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        BuildQueue {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Non-blocking enqueue. A full queue drops the build with a warning;
    /// callers must not assume delivery.
    pub fn push(&self, build_id: Uuid) -> bool {
        match self.sender.try_send(build_id) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(build_id = %build_id, "Build queue is full, dropping build");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(build_id = %build_id, "Build queue is closed, dropping build");
                false
            }
        }
    }

    pub async fn pop(&self) -> Option<Uuid> {
        self.receiver.lock().await.recv().await
    }
}

/// One lock per app, created lazily and kept for the process lifetime, so at
/// most one build pipeline runs for a given app at any time.
#[derive(Debug, Default)]
pub struct AppLocks {
    locks: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl AppLocks {
    pub fn get(&self, app_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .unwrap()
            .entry(app_id)
            .or_default()
            .clone()
    }
}

#[derive(Debug)]
pub struct ServerState {
    pub db: DatabaseConnection,
    pub cli: Cli,
    pub queue: BuildQueue,
    pub locks: AppLocks,
    pub shutdown: CancellationToken,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BaseResponse<T> {
    pub error: bool,
    pub message: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItem {
    pub id: Uuid,
    pub name: String,
}

pub type ListResponse = Vec<ListItem>;

pub type EApp = app::Entity;
pub type EBuild = build::Entity;
pub type EBuildLog = build_log::Entity;

pub type MApp = app::Model;
pub type MBuild = build::Model;
pub type MBuildLog = build_log::Model;

pub type AApp = app::ActiveModel;
pub type ABuild = build::ActiveModel;
pub type ABuildLog = build_log::ActiveModel;

pub type CApp = app::Column;
pub type CBuild = build::Column;
pub type CBuildLog = build_log::Column;
