/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{bail, Context, Result};
use drydock_core::consts::*;
use drydock_core::executer::{self, ImageBuildOptions};
use drydock_core::logsink::LogSink;
use drydock_core::types::*;
use entity::app::BuildStrategyKind;
use entity::build_log::{LogLevel, LogOrigin};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use super::compose;

/// The build method driven by the pipeline. A closed set: each variant
/// implements the same validate/build contract, and compose additionally
/// knows how to bring the resulting stack up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStrategy {
    Dockerfile,
    Compose,
    Buildpacks,
}

#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub image_reference: String,
}

impl BuildStrategy {
    /// The effective strategy for one run. Autodetection inspects the
    /// checked-out tree: a compose file wins over a Dockerfile, and a tree
    /// with neither still resolves to Dockerfile so that validation reports
    /// the real problem instead of detection.
    pub fn resolve(app: &MApp, checkout: &Path) -> BuildStrategy {
        match app.strategy {
            BuildStrategyKind::Dockerfile => BuildStrategy::Dockerfile,
            BuildStrategyKind::Compose => BuildStrategy::Compose,
            BuildStrategyKind::Buildpacks => BuildStrategy::Buildpacks,
            BuildStrategyKind::Autodetect => {
                if compose::find_compose_file(checkout, app.compose_file.as_deref()).is_some() {
                    debug!(app_id = %app.id, "Autodetected compose strategy");
                    BuildStrategy::Compose
                } else {
                    debug!(app_id = %app.id, "Autodetected dockerfile strategy");
                    BuildStrategy::Dockerfile
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuildStrategy::Dockerfile => "dockerfile",
            BuildStrategy::Compose => "compose",
            BuildStrategy::Buildpacks => "buildpacks",
        }
    }

    pub fn supports_up(&self) -> bool {
        matches!(self, BuildStrategy::Compose)
    }

    /// Confirms the declared build inputs resolve inside the checkout.
    pub async fn validate(&self, state: &ServerState, app: &MApp, checkout: &Path) -> Result<()> {
        match self {
            BuildStrategy::Dockerfile => {
                let context = context_dir(app, checkout)?;
                let dockerfile = resolve_in_checkout(&context, &app.dockerfile)?;
                if !dockerfile.is_file() {
                    bail!("Dockerfile not found at '{}'", app.dockerfile);
                }
                Ok(())
            }
            BuildStrategy::Compose => {
                if compose::find_compose_file(checkout, app.compose_file.as_deref()).is_none() {
                    bail!(
                        "No compose file found (tried {} and {})",
                        app.compose_file.as_deref().unwrap_or("the default names"),
                        COMPOSE_FILE_NAMES.join(", ")
                    );
                }
                Ok(())
            }
            BuildStrategy::Buildpacks => {
                let available = Command::new(&state.cli.binpath_pack)
                    .arg("--version")
                    .output()
                    .await
                    .map(|output| output.status.success())
                    .unwrap_or(false);

                if !available {
                    bail!(
                        "Buildpacks builder '{}' is not available",
                        state.cli.binpath_pack
                    );
                }
                Ok(())
            }
        }
    }

    pub async fn build(
        &self,
        state: &ServerState,
        app: &MApp,
        build: &MBuild,
        checkout: &Path,
        sink: &Arc<LogSink>,
    ) -> Result<StrategyOutcome> {
        match self {
            BuildStrategy::Dockerfile => build_dockerfile(state, app, build, checkout, sink).await,
            BuildStrategy::Compose => compose::build(state, app, checkout, sink).await,
            BuildStrategy::Buildpacks => build_buildpacks(state, app, build, checkout, sink).await,
        }
    }

    /// Bring-up for strategies that own the whole running stack.
    pub async fn up(
        &self,
        state: &ServerState,
        app: &MApp,
        build: &MBuild,
        checkout: &Path,
        sink: &Arc<LogSink>,
    ) -> Result<()> {
        match self {
            BuildStrategy::Compose => compose::up(state, app, build, checkout, sink).await,
            _ => bail!("Strategy '{}' has no bring-up capability", self.name()),
        }
    }
}

/// Resolves a user-supplied relative path against the checkout root,
/// rejecting anything that would escape it. The build file name is partially
/// user-controlled, so this is a hard requirement, not a nicety.
pub fn resolve_in_checkout(root: &Path, declared: &str) -> Result<PathBuf> {
    let declared_path = Path::new(declared);

    if declared_path.is_absolute() {
        bail!(
            "Build file path must be relative to the repository root: '{}'",
            declared
        );
    }

    let mut depth: i32 = 0;
    for component in declared_path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    bail!("Build file path escapes the repository root: '{}'", declared);
                }
            }
            _ => bail!("Invalid build file path: '{}'", declared),
        }
    }

    Ok(root.join(declared_path))
}

pub fn context_dir(app: &MApp, checkout: &Path) -> Result<PathBuf> {
    match app.build_context.as_deref().filter(|sub| !sub.is_empty()) {
        Some(sub) => resolve_in_checkout(checkout, sub),
        None => Ok(checkout.to_path_buf()),
    }
}

pub fn short_build_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

pub fn image_tag(app: &MApp, build: &MBuild) -> String {
    format!("{}:{}", app.image_name, short_build_id(build.id))
}

pub fn identity_labels(app: &MApp, build: Option<&MBuild>) -> Vec<(String, String)> {
    let mut labels = vec![
        (LABEL_APP_ID.to_string(), app.id.to_string()),
        (LABEL_APP_NAME.to_string(), app.name.clone()),
    ];
    if let Some(build) = build {
        labels.push((LABEL_BUILD_ID.to_string(), build.id.to_string()));
    }
    labels
}

async fn build_dockerfile(
    state: &ServerState,
    app: &MApp,
    build: &MBuild,
    checkout: &Path,
    sink: &Arc<LogSink>,
) -> Result<StrategyOutcome> {
    let context = context_dir(app, checkout)?;
    let dockerfile = resolve_in_checkout(&context, &app.dockerfile)?;

    let opts = ImageBuildOptions {
        context: context.clone(),
        dockerfile,
        tag: image_tag(app, build),
        labels: identity_labels(app, Some(build)),
        pull: false,
    };

    // keep version-control metadata and known noise out of the context when
    // the repository ships no ignore rules of its own
    let ephemeral_ignore = write_context_excludes(&context).await?;

    let result = executer::build_image(state, &opts, sink).await;

    if let Some(path) = ephemeral_ignore {
        let _ = tokio::fs::remove_file(path).await;
    }

    let image_reference = result?;
    Ok(StrategyOutcome { image_reference })
}

async fn write_context_excludes(context: &Path) -> Result<Option<PathBuf>> {
    let path = context.join(".dockerignore");
    if path.exists() {
        return Ok(None);
    }

    let mut contents = BUILD_CONTEXT_EXCLUDES.join("\n");
    contents.push('\n');
    tokio::fs::write(&path, contents)
        .await
        .context("Failed to write build context excludes")?;

    Ok(Some(path))
}

async fn build_buildpacks(
    state: &ServerState,
    app: &MApp,
    build: &MBuild,
    checkout: &Path,
    sink: &Arc<LogSink>,
) -> Result<StrategyOutcome> {
    let context = context_dir(app, checkout)?;
    let tag = image_tag(app, build);

    let mut cmd = Command::new(&state.cli.binpath_pack);
    cmd.arg("build")
        .arg(&tag)
        .arg("--path")
        .arg(&context)
        .arg("--builder")
        .arg(&state.cli.buildpacks_builder);

    for (key, value) in app.environment_vars() {
        cmd.arg("--env").arg(format!("{}={}", key, value));
    }

    let status = executer::stream_command(cmd, sink, LogLevel::Info, LogOrigin::Build).await?;

    if !status.success() {
        bail!("pack build exited with status {}", status);
    }

    Ok(StrategyOutcome {
        image_reference: tag,
    })
}
