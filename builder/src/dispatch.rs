/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::Utc;
use drydock_core::input::{hex_to_vec, normalize_repository_url, short_prefix};
use drydock_core::logsink::LogSink;
use drydock_core::types::*;
use entity::build::{BuildStatus, BuildTrigger};
use entity::build_log::{LogLevel, LogOrigin};
use hmac::{Hmac, Mac};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter};
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// The subset of a forge push payload the dispatcher acts on. GitHub, Gitea
/// and Forgejo all deliver this shape.
#[derive(Debug, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repository: PushRepository,
    #[serde(default)]
    pub head_commit: Option<PushCommit>,
}

#[derive(Debug, Deserialize)]
pub struct PushRepository {
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub ssh_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PushCommit {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author: Option<PushAuthor>,
}

#[derive(Debug, Deserialize)]
pub struct PushAuthor {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug)]
pub enum DispatchError {
    Unauthorized,
    NotFound,
    Disabled,
    InvalidPayload(String),
    Database(DbErr),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Unauthorized => write!(f, "Webhook signature verification failed"),
            DispatchError::NotFound => write!(f, "App not found"),
            DispatchError::Disabled => write!(f, "App is disabled"),
            DispatchError::InvalidPayload(msg) => write!(f, "Invalid webhook payload: {}", msg),
            DispatchError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<DbErr> for DispatchError {
    fn from(e: DbErr) -> Self {
        DispatchError::Database(e)
    }
}

/// What a delivery resulted in. A delivery that matched nothing is still
/// `accepted: false` rather than an error, so probing the endpoint reveals
/// nothing about which apps exist.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub accepted: bool,
    pub builds: Vec<Uuid>,
}

/// Verifies a `sha256=<hex>` signature header against the raw request body.
/// Comparison is constant-time; a malformed header never authenticates.
pub fn verify_signature(secret: &str, signature: Option<&str>, body: &[u8]) -> bool {
    let Some(signature) = signature else {
        return false;
    };
    let Some(hex) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex_to_vec(hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

fn authorized(app: &MApp, signature: Option<&str>, body: &[u8]) -> bool {
    match app.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => verify_signature(secret, signature, body),
        None => true,
    }
}

fn payload_repositories(payload: &PushPayload) -> Vec<String> {
    let mut repos = Vec::new();
    for url in [
        payload.repository.clone_url.as_deref(),
        payload.repository.ssh_url.as_deref(),
        payload.repository.html_url.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        if let Ok(normalized) = normalize_repository_url(url) {
            if !repos.contains(&normalized) {
                repos.push(normalized);
            }
        }
    }
    repos
}

/// Routes one webhook delivery to zero or more builds.
///
/// Deliveries without an event type header, non-push events, non-branch
/// refs, branch mismatches and disabled apps are ignored without error. Signature checks for every matched app run before
/// any build row is created, so an unauthorized delivery leaves no trace.
pub async fn dispatch_webhook(
    state: &Arc<ServerState>,
    scope: Option<Uuid>,
    event: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<DispatchOutcome, DispatchError> {
    let Some(event) = event else {
        debug!("Ignoring delivery without an event type header");
        return Ok(DispatchOutcome::default());
    };
    if event != "push" {
        debug!(event = %event, "Ignoring non-push webhook event");
        return Ok(DispatchOutcome::default());
    }

    let payload: PushPayload = serde_json::from_slice(body)
        .map_err(|e| DispatchError::InvalidPayload(e.to_string()))?;

    let Some(branch) = payload.git_ref.strip_prefix("refs/heads/") else {
        debug!(git_ref = %payload.git_ref, "Ignoring push to non-branch ref");
        return Ok(DispatchOutcome::default());
    };

    let candidates = match scope {
        Some(app_id) => {
            let app = EApp::find_by_id(app_id)
                .one(&state.db)
                .await?
                .ok_or(DispatchError::NotFound)?;
            vec![app]
        }
        None => {
            let repos = payload_repositories(&payload);
            EApp::find()
                .filter(CApp::Enabled.eq(true))
                .all(&state.db)
                .await?
                .into_iter()
                .filter(|app| {
                    normalize_repository_url(&app.repository)
                        .map(|normalized| repos.contains(&normalized))
                        .unwrap_or(false)
                })
                .collect()
        }
    };

    let matched: Vec<MApp> = candidates
        .into_iter()
        .filter(|app| {
            if !app.enabled {
                debug!(app_id = %app.id, "Ignoring push for disabled app");
                return false;
            }
            if !app.auto_deploy {
                debug!(app_id = %app.id, "Ignoring push for app with auto-deploy off");
                return false;
            }
            if app.branch != branch {
                debug!(app_id = %app.id, branch = %branch, "Ignoring push to non-deploy branch");
                return false;
            }
            true
        })
        .collect();

    if matched.is_empty() {
        return Ok(DispatchOutcome::default());
    }

    // authenticate every match before creating anything
    if !matched.iter().all(|app| authorized(app, signature, body)) {
        warn!(branch = %branch, "Rejected webhook delivery with bad signature");
        return Err(DispatchError::Unauthorized);
    }

    let mut builds = Vec::with_capacity(matched.len());
    for app in &matched {
        let build = create_build(
            state,
            app,
            BuildTrigger::Webhook,
            payload.head_commit.as_ref(),
        )
        .await?;
        builds.push(build.id);
    }

    Ok(DispatchOutcome {
        accepted: true,
        builds,
    })
}

/// Creates a pending build, writes its first log line and enqueues it. The
/// row exists even when the queue is full; such builds are recovered as
/// cancelled on the next restart.
pub async fn create_build(
    state: &Arc<ServerState>,
    app: &MApp,
    trigger: BuildTrigger,
    commit: Option<&PushCommit>,
) -> Result<MBuild, DispatchError> {
    let build = ABuild {
        id: Set(Uuid::new_v4()),
        app: Set(app.id),
        status: Set(BuildStatus::Pending),
        trigger: Set(trigger),
        commit_hash: Set(commit.map(|c| c.id.clone())),
        commit_message: Set(commit.and_then(|c| c.message.clone())),
        commit_author: Set(commit
            .and_then(|c| c.author.as_ref())
            .and_then(|a| a.name.clone())),
        image_reference: Set(None),
        error_message: Set(None),
        created_at: Set(Utc::now().naive_utc()),
        started_at: Set(None),
        finished_at: Set(None),
    };

    let build = build.insert(&state.db).await?;

    let sink = LogSink::for_build(&state.db, build.id).await?;
    let line = match commit {
        Some(commit) => format!(
            "Build queued for {} ({})",
            app.name,
            short_prefix(&commit.id, 8)
        ),
        None => format!("Build queued for {}", app.name),
    };
    sink.append(LogLevel::Info, LogOrigin::System, &line).await?;

    info!(build_id = %build.id, app_id = %app.id, trigger = ?trigger, "Queued build");

    state.queue.push(build.id);

    Ok(build)
}

/// Build creation for the non-webhook surfaces (API trigger, rollback).
pub async fn enqueue_manual_build(
    state: &Arc<ServerState>,
    app_id: Uuid,
    trigger: BuildTrigger,
) -> Result<MBuild, DispatchError> {
    let app = EApp::find_by_id(app_id)
        .one(&state.db)
        .await?
        .ok_or(DispatchError::NotFound)?;

    if !app.enabled {
        return Err(DispatchError::Disabled);
    }

    create_build(state, &app, trigger, None).await
}
