/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{bail, Context, Result};
use drydock_core::consts::*;
use drydock_core::executer::stream_command;
use drydock_core::input::short_prefix;
use drydock_core::logsink::LogSink;
use drydock_core::types::*;
use entity::build_log::{LogLevel, LogOrigin};
use serde_yaml::{Mapping, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

use super::strategy::{resolve_in_checkout, StrategyOutcome};

/// Locates the compose file: the configured name first, then the fixed
/// fallback list. Configured names are resolved inside the checkout only.
pub fn find_compose_file(root: &Path, configured: Option<&str>) -> Option<PathBuf> {
    if let Some(name) = configured.filter(|name| !name.is_empty()) {
        if let Ok(path) = resolve_in_checkout(root, name) {
            if path.is_file() {
                return Some(path);
            }
        }
    }

    COMPOSE_FILE_NAMES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

fn compose_command(state: &ServerState, files: &[&Path]) -> Command {
    let mut cmd = Command::new(&state.cli.binpath_docker);
    cmd.arg("compose");
    for file in files {
        cmd.arg("--file").arg(file);
    }
    cmd
}

/// Builds all services with a forced re-pull of base layers.
pub async fn build(
    state: &ServerState,
    app: &MApp,
    checkout: &Path,
    sink: &Arc<LogSink>,
) -> Result<StrategyOutcome> {
    let compose_path = find_compose_file(checkout, app.compose_file.as_deref())
        .context("No compose file found")?;

    let mut cmd = compose_command(state, &[&compose_path]);
    cmd.args(["build", "--pull"]);
    cmd.current_dir(checkout);
    for (key, value) in app.environment_vars() {
        cmd.env(key, value);
    }

    let status = stream_command(cmd, sink, LogLevel::Info, LogOrigin::Build).await?;

    if !status.success() {
        bail!("docker compose build exited with status {}", status);
    }

    Ok(StrategyOutcome {
        image_reference: format!("compose:{}", app.name),
    })
}

/// Starts or updates the stack from the built artifacts, through a derived
/// overlay file so the original compose file is never mutated. Containerized
/// deployments hand the command off to a detached helper instead, so a stack
/// that replaces this very server still comes up after the process dies.
pub async fn up(
    state: &ServerState,
    app: &MApp,
    build: &MBuild,
    checkout: &Path,
    sink: &Arc<LogSink>,
) -> Result<()> {
    let compose_path = find_compose_file(checkout, app.compose_file.as_deref())
        .context("No compose file found")?;

    let overlay_path = write_overlay(&state.cli, app, build, checkout, &compose_path).await?;

    if state.cli.inside_container {
        return launch_detached_up(state, app, &[&compose_path, &overlay_path], checkout, sink)
            .await;
    }

    let mut cmd = compose_command(state, &[&compose_path, &overlay_path]);
    cmd.args(["up", "--detach", "--remove-orphans"]);
    cmd.current_dir(checkout);

    let status = stream_command(cmd, sink, LogLevel::Info, LogOrigin::Deploy).await?;

    if !status.success() {
        bail!("docker compose up exited with status {}", status);
    }

    sink.append(LogLevel::Info, LogOrigin::Deploy, "Compose stack is up")
        .await?;

    Ok(())
}

async fn launch_detached_up(
    state: &ServerState,
    app: &MApp,
    files: &[&Path],
    checkout: &Path,
    sink: &Arc<LogSink>,
) -> Result<()> {
    let volume = state
        .cli
        .data_volume
        .as_deref()
        .context("Detached bring-up requires a configured data volume")?;

    let mut cmd = Command::new(&state.cli.binpath_docker);
    cmd.args(["run", "--detach", "--rm"]);
    cmd.arg("--label")
        .arg(format!("{}={}", LABEL_APP_ID, app.id));
    cmd.arg("--volume")
        .arg(format!("{}:{}", DOCKER_SOCKET, DOCKER_SOCKET));
    // the data volume is mounted at the same location, so the compose file
    // paths below stay valid inside the helper
    cmd.arg("--volume")
        .arg(format!("{}:{}", volume, state.cli.base_path));
    cmd.arg("--workdir").arg(checkout);
    cmd.arg(DETACH_HELPER_IMAGE);
    cmd.args(["docker", "compose"]);
    for file in files {
        cmd.arg("--file").arg(file);
    }
    cmd.args(["up", "--detach", "--remove-orphans"]);

    let output = cmd
        .output()
        .await
        .context("Failed to launch detached compose helper")?;

    if !output.status.success() {
        bail!(
            "Failed to start compose helper: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let helper_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!(app_id = %app.id, helper_id = %helper_id, "Launched detached compose helper");

    sink.append(
        LogLevel::Info,
        LogOrigin::Deploy,
        &format!(
            "Compose bring-up handed off to helper container {} (not awaited)",
            short_prefix(&helper_id, 12)
        ),
    )
    .await?;

    Ok(())
}

/// Writes the derived overlay next to the compose file: app-identity labels
/// for every service, plus rewritten bind mounts when running containerized.
pub async fn write_overlay(
    cli: &Cli,
    app: &MApp,
    build: &MBuild,
    checkout: &Path,
    compose_path: &Path,
) -> Result<PathBuf> {
    let raw = tokio::fs::read_to_string(compose_path)
        .await
        .context("Failed to read compose file")?;
    let doc: Value = serde_yaml::from_str(&raw).context("Failed to parse compose file")?;

    let services = doc
        .get("services")
        .and_then(|services| services.as_mapping())
        .context("Compose file has no services section")?;

    let mut overlay_services = Mapping::new();
    let mut uses_data_volume = false;

    for (name, service) in services {
        let mut entry = Mapping::new();

        let mut labels = Mapping::new();
        labels.insert(LABEL_APP_ID.into(), app.id.to_string().into());
        labels.insert(LABEL_APP_NAME.into(), app.name.clone().into());
        labels.insert(LABEL_BUILD_ID.into(), build.id.to_string().into());
        entry.insert("labels".into(), Value::Mapping(labels));

        if cli.inside_container {
            if let (Some(volume), Some(mounts)) = (
                cli.data_volume.as_deref(),
                service.get("volumes").and_then(|volumes| volumes.as_sequence()),
            ) {
                let rewritten: Vec<Value> = mounts
                    .iter()
                    .filter_map(|mount| {
                        rewrite_bind_mount(mount, Path::new(&cli.base_path), checkout, volume)
                    })
                    .collect();

                if !rewritten.is_empty() {
                    uses_data_volume = true;
                    entry.insert("volumes".into(), Value::Sequence(rewritten));
                }
            }
        }

        overlay_services.insert(name.clone(), Value::Mapping(entry));
    }

    let mut overlay = Mapping::new();
    overlay.insert("services".into(), Value::Mapping(overlay_services));

    if uses_data_volume {
        if let Some(volume) = cli.data_volume.as_deref() {
            let mut external = Mapping::new();
            external.insert("external".into(), Value::Bool(true));
            let mut volumes = Mapping::new();
            volumes.insert(volume.into(), Value::Mapping(external));
            overlay.insert("volumes".into(), Value::Mapping(volumes));
        }
    }

    let overlay_path = checkout.join(COMPOSE_OVERLAY_FILE);
    let contents =
        serde_yaml::to_string(&Value::Mapping(overlay)).context("Failed to render overlay")?;
    tokio::fs::write(&overlay_path, contents)
        .await
        .context("Failed to write overlay file")?;

    Ok(overlay_path)
}

/// Rewrites one relative bind mount into a subpath-scoped mount of the data
/// volume. Handles the string short form `host:container[:mode]` and the map
/// long form; anything that is not a `./`- or `../`-prefixed bind is left
/// untouched (returns None).
fn rewrite_bind_mount(
    mount: &Value,
    data_root: &Path,
    checkout: &Path,
    volume: &str,
) -> Option<Value> {
    if let Some(short) = mount.as_str() {
        let parts: Vec<&str> = short.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return None;
        }

        let (source, target) = (parts[0], parts[1]);
        if !is_relative_bind(source) {
            return None;
        }

        let read_only = parts
            .get(2)
            .map(|mode| mode.split(',').any(|flag| flag == "ro"))
            .unwrap_or(false);

        let subpath = volume_subpath(data_root, checkout, source)?;
        return Some(volume_mount(volume, target, &subpath, read_only));
    }

    if mount.is_mapping() {
        let kind = mount.get("type").and_then(|kind| kind.as_str())?;
        if kind != "bind" {
            return None;
        }

        let source = mount.get("source").and_then(|source| source.as_str())?;
        if !is_relative_bind(source) {
            return None;
        }

        let target = mount.get("target").and_then(|target| target.as_str())?;
        let read_only = mount
            .get("read_only")
            .and_then(|ro| ro.as_bool())
            .unwrap_or(false);

        let subpath = volume_subpath(data_root, checkout, source)?;
        return Some(volume_mount(volume, target, &subpath, read_only));
    }

    None
}

fn is_relative_bind(source: &str) -> bool {
    source.starts_with("./") || source.starts_with("../")
}

fn volume_mount(volume: &str, target: &str, subpath: &str, read_only: bool) -> Value {
    let mut mount = Mapping::new();
    mount.insert("type".into(), "volume".into());
    mount.insert("source".into(), volume.into());
    mount.insert("target".into(), target.into());
    if read_only {
        mount.insert("read_only".into(), Value::Bool(true));
    }

    let mut options = Mapping::new();
    options.insert("subpath".into(), subpath.into());
    mount.insert("volume".into(), Value::Mapping(options));

    Value::Mapping(mount)
}

/// The mount source, expressed as a path inside the data volume. None when
/// the path cannot be expressed there (it escapes the data root).
fn volume_subpath(data_root: &Path, checkout: &Path, source: &str) -> Option<String> {
    let absolute = normalize_path(&checkout.join(source))?;
    let relative = absolute.strip_prefix(data_root).ok()?;
    Some(relative.to_string_lossy().into_owned())
}

// Lexical normalization only: the path may not exist before bring-up.
fn normalize_path(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push("/"),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
            Component::Prefix(_) => return None,
        }
    }
    Some(out)
}
