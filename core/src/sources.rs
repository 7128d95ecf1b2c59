/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use entity::build_log::{LogLevel, LogOrigin};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use super::consts::CHECKOUTS_DIR;
use super::executer::stream_command;
use super::logsink::LogSink;
use super::types::*;

/// A working tree for one app, kept between builds so updates can fetch
/// instead of re-cloning.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author: String,
}

pub fn checkout_path(cli: &Cli, app_id: Uuid) -> PathBuf {
    Path::new(&cli.base_path)
        .join(CHECKOUTS_DIR)
        .join(app_id.to_string())
}

/// Clones the app's repository at its branch, or updates an existing checkout
/// to the remote head. Git output streams through the sink while it runs.
pub async fn clone_or_update(
    state: &ServerState,
    app: &MApp,
    sink: &Arc<LogSink>,
) -> Result<Checkout> {
    let path = checkout_path(&state.cli, app.id);
    let depth = state.cli.clone_depth.to_string();

    if path.join(".git").is_dir() {
        debug!(app_id = %app.id, path = %path.display(), "Updating existing checkout");

        run_git(
            state,
            sink,
            &["fetch", "--depth", &depth, "origin", &app.branch],
            Some(&path),
        )
        .await?;
        run_git(
            state,
            sink,
            &["reset", "--hard", &format!("origin/{}", app.branch)],
            Some(&path),
        )
        .await?;
    } else {
        debug!(app_id = %app.id, path = %path.display(), "Cloning fresh checkout");

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create checkout directory")?;
        }

        let path_arg = path.to_string_lossy().into_owned();
        run_git(
            state,
            sink,
            &[
                "clone",
                "--depth",
                &depth,
                "--branch",
                &app.branch,
                "--single-branch",
                &app.repository,
                &path_arg,
            ],
            None,
        )
        .await?;
    }

    Ok(Checkout { path })
}

/// Hash, subject and author of the checked-out head commit.
pub async fn head_commit(state: &ServerState, checkout: &Checkout) -> Result<CommitInfo> {
    let output = Command::new(&state.cli.binpath_git)
        .args(["log", "-1", "--format=%H%x1f%s%x1f%an"])
        .current_dir(&checkout.path)
        .output()
        .await
        .context("Failed to execute git log")?;

    if !output.status.success() {
        anyhow::bail!(
            "git log failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut fields = stdout.trim().split('\u{1f}');

    let hash = fields
        .next()
        .filter(|hash| !hash.is_empty())
        .context("No commit hash in git log output")?
        .to_string();
    let message = fields.next().unwrap_or_default().to_string();
    let author = fields.next().unwrap_or_default().to_string();

    Ok(CommitInfo {
        hash,
        message,
        author,
    })
}

async fn run_git(
    state: &ServerState,
    sink: &Arc<LogSink>,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<()> {
    let mut cmd = Command::new(&state.cli.binpath_git);
    cmd.args(args);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }

    let status = stream_command(cmd, sink, LogLevel::Info, LogOrigin::Git)
        .await
        .with_context(|| format!("Failed to run git {}", args.first().unwrap_or(&"")))?;

    if !status.success() {
        anyhow::bail!(
            "git {} exited with status {}",
            args.first().unwrap_or(&""),
            status
        );
    }

    Ok(())
}
