/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine};
use entity::build_log::{LogLevel, LogOrigin};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use super::logsink::LogSink;
use super::types::*;

#[derive(Debug, Clone)]
pub struct ImageBuildOptions {
    pub context: PathBuf,
    pub dockerfile: PathBuf,
    pub tag: String,
    pub labels: Vec<(String, String)>,
    pub pull: bool,
}

#[derive(Debug, Clone)]
pub struct RunContainerOptions {
    pub name: String,
    pub image: String,
    pub env: Vec<(String, String)>,
    pub labels: Vec<(String, String)>,
    pub port: Option<i32>,
}

/// Drains a subprocess' stdout and stderr concurrently into the log sink and
/// waits for it to exit. Output is visible while the process runs; nothing is
/// buffered past completion.
pub async fn stream_command(
    mut cmd: Command,
    sink: &Arc<LogSink>,
    level: LogLevel,
    origin: LogOrigin,
) -> Result<std::process::ExitStatus> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().context("Failed to spawn command")?;
    let stdout = child.stdout.take().context("Failed to open stdout")?;
    let stderr = child.stderr.take().context("Failed to open stderr")?;

    let out_writer = sink.writer(level, origin);
    let err_writer = sink.writer(level, origin);

    let out_task = tokio::spawn(drain(stdout, out_writer));
    let err_task = tokio::spawn(drain(stderr, err_writer));

    let status = child.wait().await.context("Failed to wait for command")?;
    out_task.await.context("stdout drain task panicked")??;
    err_task.await.context("stderr drain task panicked")??;

    Ok(status)
}

async fn drain<R: AsyncRead + Unpin + Send>(
    mut reader: R,
    mut writer: super::logsink::LogWriter,
) -> Result<()> {
    let mut buffer = [0u8; 8192];
    loop {
        let len = reader.read(&mut buffer).await?;
        if len == 0 {
            break;
        }
        writer.write(&buffer[..len]).await?;
    }
    writer.finish().await?;
    Ok(())
}

// Buildkit rawjson progress frames, one JSON object per stderr line. Only the
// fields the pipeline acts on are modeled; unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct ProgressFrame {
    #[serde(default)]
    vertexes: Vec<ProgressVertex>,
    #[serde(default)]
    logs: Vec<ProgressLog>,
}

#[derive(Debug, Deserialize)]
struct ProgressVertex {
    #[serde(default)]
    digest: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    error: String,
    #[serde(default)]
    cached: bool,
}

#[derive(Debug, Deserialize)]
struct ProgressLog {
    #[serde(default)]
    data: String,
}

/// Builds a single image via the docker CLI, surfacing the structured
/// progress stream through the sink. The first error frame fails the build.
pub async fn build_image(
    state: &ServerState,
    opts: &ImageBuildOptions,
    sink: &Arc<LogSink>,
) -> Result<String> {
    let mut cmd = Command::new(&state.cli.binpath_docker);
    cmd.arg("build")
        .arg("--progress=rawjson")
        .arg("--tag")
        .arg(&opts.tag)
        .arg("--file")
        .arg(&opts.dockerfile);

    for (key, value) in &opts.labels {
        cmd.arg("--label").arg(format!("{}={}", key, value));
    }

    if opts.pull {
        cmd.arg("--pull");
    }

    cmd.arg(&opts.context);
    cmd.env("DOCKER_BUILDKIT", "1");
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(tag = %opts.tag, context = %opts.context.display(), "Running docker build");

    let mut child = cmd.spawn().context("Failed to spawn docker build")?;
    let stdout = child.stdout.take().context("Failed to open stdout")?;
    let stderr = child.stderr.take().context("Failed to open stderr")?;

    let out_task = tokio::spawn(drain(stdout, sink.writer(LogLevel::Info, LogOrigin::Build)));

    let first_error = process_progress_stream(stderr, sink).await?;

    let status = child.wait().await.context("Failed to wait for docker build")?;
    out_task.await.context("stdout drain task panicked")??;

    if let Some(error) = first_error {
        anyhow::bail!("{}", error);
    }

    if !status.success() {
        anyhow::bail!("docker build exited with status {}", status);
    }

    Ok(opts.tag.clone())
}

/// Decodes the frame stream, persisting step names and log output as lines.
/// Returns the first error frame, if any; lines that are not valid frames
/// pass through verbatim.
async fn process_progress_stream<R: AsyncRead + Unpin>(
    reader: R,
    sink: &Arc<LogSink>,
) -> Result<Option<String>> {
    let mut lines = BufReader::new(reader).lines();
    let mut seen: HashSet<String> = HashSet::new();
    let mut first_error = None;
    let mut writer = sink.writer(LogLevel::Info, LogOrigin::Build);

    while let Some(line) = lines.next_line().await? {
        let frame: ProgressFrame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(_) => {
                if !line.trim().is_empty() {
                    sink.append(LogLevel::Info, LogOrigin::Build, &line).await?;
                }
                continue;
            }
        };

        for vertex in &frame.vertexes {
            if !vertex.name.is_empty() && seen.insert(vertex.digest.clone()) {
                let suffix = if vertex.cached { " (cached)" } else { "" };
                sink.append(
                    LogLevel::Info,
                    LogOrigin::Build,
                    &format!("{}{}", vertex.name, suffix),
                )
                .await?;
            }

            if !vertex.error.is_empty() && first_error.is_none() {
                sink.append(LogLevel::Error, LogOrigin::Build, &vertex.error)
                    .await?;
                first_error = Some(vertex.error.clone());
            }
        }

        for log in &frame.logs {
            if let Ok(data) = general_purpose::STANDARD.decode(&log.data) {
                writer.write(&data).await?;
            }
        }
    }

    writer.finish().await?;
    Ok(first_error)
}

/// Replaces the named container with a fresh one running the given image.
/// The previous instance is removed first; a missing one is not an error.
pub async fn replace_container(
    state: &ServerState,
    opts: &RunContainerOptions,
    sink: &Arc<LogSink>,
) -> Result<String> {
    let removed = Command::new(&state.cli.binpath_docker)
        .args(["rm", "--force", &opts.name])
        .output()
        .await
        .context("Failed to execute docker rm")?;

    if removed.status.success() {
        sink.append(
            LogLevel::Info,
            LogOrigin::Deploy,
            &format!("Removed previous container {}", opts.name),
        )
        .await?;
    }

    let mut cmd = Command::new(&state.cli.binpath_docker);
    cmd.args(["run", "--detach", "--restart", "unless-stopped"])
        .arg("--name")
        .arg(&opts.name);

    for (key, value) in &opts.labels {
        cmd.arg("--label").arg(format!("{}={}", key, value));
    }

    for (key, value) in &opts.env {
        cmd.arg("--env").arg(format!("{}={}", key, value));
    }

    if let Some(port) = opts.port {
        cmd.arg("--publish").arg(port.to_string());
    }

    cmd.arg(&opts.image);

    let output = cmd.output().await.context("Failed to execute docker run")?;

    if !output.status.success() {
        anyhow::bail!(
            "docker run failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();

    sink.append(
        LogLevel::Info,
        LogOrigin::Deploy,
        &format!("Started container {} ({})", opts.name, container_id),
    )
    .await?;

    Ok(container_id)
}

/// Whether the named container exists and is running. `None` means no such
/// container.
pub async fn container_running(state: &ServerState, name: &str) -> Result<Option<bool>> {
    let output = Command::new(&state.cli.binpath_docker)
        .args(["inspect", "--format", "{{.State.Running}}", name])
        .output()
        .await
        .context("Failed to execute docker inspect")?;

    if !output.status.success() {
        return Ok(None);
    }

    Ok(Some(
        String::from_utf8_lossy(&output.stdout).trim() == "true",
    ))
}

pub async fn stop_container(state: &ServerState, name: &str) -> Result<()> {
    let output = Command::new(&state.cli.binpath_docker)
        .args(["stop", name])
        .output()
        .await
        .context("Failed to execute docker stop")?;

    if !output.status.success() {
        anyhow::bail!(
            "docker stop failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}

pub async fn restart_container(state: &ServerState, name: &str) -> Result<()> {
    let output = Command::new(&state.cli.binpath_docker)
        .args(["restart", name])
        .output()
        .await
        .context("Failed to execute docker restart")?;

    if !output.status.success() {
        anyhow::bail!(
            "docker restart failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}
