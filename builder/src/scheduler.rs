/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{bail, Context, Result};
use chrono::Utc;
use drydock_core::executer::{self, RunContainerOptions};
use drydock_core::input::short_prefix;
use drydock_core::logsink::LogSink;
use drydock_core::sources;
use drydock_core::types::*;
use entity::build::BuildStatus;
use entity::build_log::{LogLevel, LogOrigin};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DbErr, EntityTrait, IntoActiveModel};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::strategy::{identity_labels, BuildStrategy};

/// One queue consumer. Workers share the queue; the per-app lock inside
/// [`run_build`] keeps builds for the same app serialized even across
/// workers.
pub async fn worker_loop(state: Arc<ServerState>, worker: usize) {
    debug!(worker, "Build worker started");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                debug!(worker, "Build worker shutting down");
                break;
            }
            build_id = state.queue.pop() => {
                match build_id {
                    Some(build_id) => run_build(&state, build_id).await,
                    None => break,
                }
            }
        }
    }
}

/// Runs one queued build end to end. Failures are terminal for the build but
/// never for the worker: every error path lands in the `failed` state with
/// the cause persisted as a log line and on the build row.
#[instrument(skip(state), fields(build_id = %build_id))]
pub async fn run_build(state: &Arc<ServerState>, build_id: Uuid) {
    let build = match EBuild::find_by_id(build_id).one(&state.db).await {
        Ok(Some(build)) => build,
        Ok(None) => {
            error!("Dequeued build no longer exists");
            return;
        }
        Err(e) => {
            error!(error = %e, "Failed to load dequeued build");
            return;
        }
    };

    // anything non-pending was already handled (or cancelled by recovery)
    if build.status != BuildStatus::Pending {
        warn!(status = ?build.status, "Skipping dequeued build in unexpected state");
        return;
    }

    let app = match EApp::find_by_id(build.app).one(&state.db).await {
        Ok(Some(app)) => app,
        Ok(None) => {
            error!(app_id = %build.app, "Build references a missing app, aborting run");
            return;
        }
        Err(e) => {
            error!(error = %e, "Failed to load app for build");
            return;
        }
    };

    let lock = state.locks.get(app.id);
    let _guard = lock.lock().await;

    let sink = match LogSink::for_build(&state.db, build.id).await {
        Ok(sink) => sink,
        Err(e) => {
            error!(error = %e, "Failed to open log sink for build");
            return;
        }
    };

    info!(app = %app.name, "Starting build");

    if let Err(e) = execute_pipeline(state, &app, build, &sink).await {
        warn!(app = %app.name, error = %e, "Build failed");

        if let Err(log_err) = sink
            .append(
                LogLevel::Error,
                LogOrigin::System,
                &format!("Build failed: {:#}", e),
            )
            .await
        {
            error!(error = %log_err, "Failed to persist failure log line");
        }

        // re-fetch: the pipeline advanced the row since our copy
        match EBuild::find_by_id(build_id).one(&state.db).await {
            Ok(Some(current)) => {
                if let Err(db_err) = update_build_status(
                    state,
                    current,
                    BuildStatus::Failed,
                    Some(format!("{:#}", e)),
                )
                .await
                {
                    error!(error = %db_err, "Failed to mark build as failed");
                }
            }
            Ok(None) => error!("Build row vanished while marking it failed"),
            Err(db_err) => error!(error = %db_err, "Failed to re-load build for failure update"),
        }
    }
}

/// Applies one status transition, enforcing the lifecycle state machine.
/// An invalid transition is logged and leaves the row untouched.
pub async fn update_build_status(
    state: &Arc<ServerState>,
    build: MBuild,
    status: BuildStatus,
    error_message: Option<String>,
) -> Result<MBuild, DbErr> {
    if !build.status.can_transition_to(status) {
        warn!(
            build_id = %build.id,
            from = ?build.status,
            to = ?status,
            "Refusing invalid build status transition"
        );
        return Ok(build);
    }

    let now = Utc::now().naive_utc();
    let mut active = build.into_active_model();
    active.status = Set(status);

    if status == BuildStatus::Cloning {
        active.started_at = Set(Some(now));
    }

    if status.is_terminal() {
        active.finished_at = Set(Some(now));
    }

    if let Some(message) = error_message {
        active.error_message = Set(Some(message));
    }

    active.update(&state.db).await
}

async fn execute_pipeline(
    state: &Arc<ServerState>,
    app: &MApp,
    build: MBuild,
    sink: &Arc<LogSink>,
) -> Result<MBuild> {
    let mut build = update_build_status(state, build, BuildStatus::Cloning, None).await?;
    sink.append(
        LogLevel::Info,
        LogOrigin::System,
        &format!("Cloning {} ({})", app.repository, app.branch),
    )
    .await?;

    let checkout = sources::clone_or_update(state, app, sink).await?;

    match sources::head_commit(state, &checkout).await {
        Ok(commit) => {
            sink.append(
                LogLevel::Info,
                LogOrigin::System,
                &format!(
                    "Checked out {} {}",
                    short_prefix(&commit.hash, 8),
                    commit.message
                ),
            )
            .await?;

            let mut active = build.into_active_model();
            active.commit_hash = Set(Some(commit.hash));
            active.commit_message = Set(Some(commit.message));
            active.commit_author = Set(Some(commit.author));
            build = active.update(&state.db).await?;
        }
        Err(e) => {
            // commit metadata is informational, not load-bearing
            warn!(error = %e, "Could not read head commit");
        }
    }

    let strategy = BuildStrategy::resolve(app, &checkout.path);

    build = update_build_status(state, build, BuildStatus::Building, None).await?;
    sink.append(
        LogLevel::Info,
        LogOrigin::System,
        &format!("Building with {} strategy", strategy.name()),
    )
    .await?;

    strategy.validate(state, app, &checkout.path).await?;

    let outcome = strategy.build(state, app, &build, &checkout.path, sink).await?;

    let mut active = build.into_active_model();
    active.image_reference = Set(Some(outcome.image_reference.clone()));
    build = active.update(&state.db).await?;

    build = update_build_status(state, build, BuildStatus::Deploying, None).await?;

    // the auto-deploy flag only gates webhook dispatch; a build that made it
    // into the pipeline always deploys
    sink.append(
        LogLevel::Info,
        LogOrigin::System,
        &format!("Deploying {}", app.name),
    )
    .await?;

    deploy(state, app, &build, &checkout.path, &outcome.image_reference, strategy, sink)
        .await?;

    let build = update_build_status(state, build, BuildStatus::Success, None).await?;
    sink.append(LogLevel::Info, LogOrigin::System, "Build succeeded")
        .await?;

    info!(build_id = %build.id, app = %app.name, "Build succeeded");

    Ok(build)
}

async fn deploy(
    state: &Arc<ServerState>,
    app: &MApp,
    build: &MBuild,
    checkout: &std::path::Path,
    image_reference: &str,
    strategy: BuildStrategy,
    sink: &Arc<LogSink>,
) -> Result<()> {
    if strategy.supports_up() {
        return strategy.up(state, app, build, checkout, sink).await;
    }

    if app.container_name.is_empty() {
        bail!("App has no container name configured");
    }

    let opts = RunContainerOptions {
        name: app.container_name.clone(),
        image: image_reference.to_string(),
        env: app.environment_vars(),
        labels: identity_labels(app, Some(build)),
        port: app.container_port,
    };

    executer::replace_container(state, &opts, sink)
        .await
        .context("Failed to start the new container")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity::app::BuildStrategyKind;
    use entity::build::BuildTrigger;
    use migration::{Migrator, MigratorTrait};
    use std::path::Path;
    use tokio_util::sync::CancellationToken;

    async fn sqlite_state(dir: &Path) -> Arc<ServerState> {
        use clap::Parser;

        let db_path = dir.join("scheduler-test.sqlite");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let db = sea_orm::Database::connect(&url).await.expect("sqlite connect");
        Migrator::up(&db, None).await.expect("migrations");

        Arc::new(ServerState {
            db,
            cli: Cli::parse_from(["drydock-server"]),
            queue: BuildQueue::new(4),
            locks: AppLocks::default(),
            shutdown: CancellationToken::new(),
        })
    }

    async fn insert_build(state: &Arc<ServerState>, status: BuildStatus) -> MBuild {
        let app = AApp {
            id: Set(Uuid::new_v4()),
            name: Set("web".to_string()),
            repository: Set("https://git.example.com/team/web.git".to_string()),
            branch: Set("main".to_string()),
            strategy: Set(BuildStrategyKind::Dockerfile),
            dockerfile: Set("Dockerfile".to_string()),
            compose_file: Set(None),
            build_context: Set(None),
            container_name: Set("web".to_string()),
            image_name: Set("web".to_string()),
            environment: Set(serde_json::json!({})),
            webhook_secret: Set(None),
            enabled: Set(true),
            auto_deploy: Set(true),
            subdomain: Set(None),
            container_port: Set(None),
            created_at: Set(Utc::now().naive_utc()),
        };
        let app = app.insert(&state.db).await.expect("insert app");

        let build = ABuild {
            id: Set(Uuid::new_v4()),
            app: Set(app.id),
            status: Set(status),
            trigger: Set(BuildTrigger::Manual),
            commit_hash: Set(None),
            commit_message: Set(None),
            commit_author: Set(None),
            image_reference: Set(None),
            error_message: Set(None),
            created_at: Set(Utc::now().naive_utc()),
            started_at: Set(None),
            finished_at: Set(None),
        };
        build.insert(&state.db).await.expect("insert build")
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_row_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let state = sqlite_state(dir.path()).await;

        let build = insert_build(&state, BuildStatus::Pending).await;
        let id = build.id;

        // pending -> success skips the whole pipeline, refused
        let unchanged = update_build_status(&state, build, BuildStatus::Success, None)
            .await
            .unwrap();
        assert_eq!(unchanged.id, id);
        assert_eq!(unchanged.status, BuildStatus::Pending);

        let row = EBuild::find_by_id(id).one(&state.db).await.unwrap().unwrap();
        assert_eq!(row.status, BuildStatus::Pending);
        assert!(row.finished_at.is_none());
    }

    #[tokio::test]
    async fn test_terminal_transition_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let state = sqlite_state(dir.path()).await;

        let build = insert_build(&state, BuildStatus::Success).await;
        let id = build.id;

        let unchanged = update_build_status(
            &state,
            build,
            BuildStatus::Failed,
            Some("late failure".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(unchanged.status, BuildStatus::Success);
        assert!(unchanged.error_message.is_none());

        let row = EBuild::find_by_id(id).one(&state.db).await.unwrap().unwrap();
        assert_eq!(row.status, BuildStatus::Success);
        assert!(row.error_message.is_none());
    }
}
