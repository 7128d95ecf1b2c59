/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

mod common;

use builder::dispatch::{self, DispatchError};
use common::*;
use drydock_core::input::vec_to_hex;
use drydock_core::logsink::list_logs;
use drydock_core::types::*;
use entity::app::BuildStrategyKind;
use entity::build::{BuildStatus, BuildTrigger};
use hmac::{Hmac, Mac};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, PaginatorTrait};
use sha2::Sha256;
use uuid::Uuid;

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", vec_to_hex(&mac.finalize().into_bytes()))
}

fn push_body(repo: &str, branch: &str) -> Vec<u8> {
    serde_json::json!({
        "ref": format!("refs/heads/{}", branch),
        "repository": {
            "clone_url": format!("https://git.example.com/team/{}.git", repo),
            "html_url": format!("https://git.example.com/team/{}", repo),
        },
        "head_commit": {
            "id": "feedfacefeedfacefeedfacefeedfacefeedface",
            "message": "Ship it",
            "author": {"name": "dev"},
        },
    })
    .to_string()
    .into_bytes()
}

async fn set_secret(db: &sea_orm::DatabaseConnection, app: MApp, secret: &str) -> MApp {
    let mut active = app.into_active_model();
    active.webhook_secret = Set(Some(secret.to_string()));
    active.update(db).await.unwrap()
}

#[tokio::test]
async fn test_push_creates_builds_for_every_matching_app() {
    let dir = tempfile::tempdir().unwrap();
    let db = connect_test_db(dir.path()).await;
    let state = make_state(db, test_cli(dir.path()));

    // two apps deploy the same repository and branch
    let first = insert_app(&state.db, "web", BuildStrategyKind::Dockerfile).await;
    let first = set_secret(&state.db, first, "s3cret").await;

    let second = insert_app(&state.db, "web-canary", BuildStrategyKind::Dockerfile).await;
    let mut active = second.into_active_model();
    active.repository = Set(first.repository.clone());
    active.webhook_secret = Set(Some("s3cret".to_string()));
    active.update(&state.db).await.unwrap();

    // and one app on another branch of the same repository
    let other_branch = insert_app(&state.db, "web-dev", BuildStrategyKind::Dockerfile).await;
    let mut active = other_branch.into_active_model();
    active.repository = Set(first.repository.clone());
    active.branch = Set("dev".to_string());
    active.update(&state.db).await.unwrap();

    let body = push_body("web", "main");
    let signature = sign("s3cret", &body);

    let outcome = dispatch::dispatch_webhook(&state, None, Some("push"), Some(&signature), &body)
        .await
        .unwrap();

    assert!(outcome.accepted);
    assert_eq!(outcome.builds.len(), 2);

    for build_id in &outcome.builds {
        let build = EBuild::find_by_id(*build_id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(build.status, BuildStatus::Pending);
        assert_eq!(build.trigger, BuildTrigger::Webhook);
        assert_eq!(
            build.commit_hash.as_deref(),
            Some("feedfacefeedfacefeedfacefeedfacefeedface")
        );
    }

    // both were enqueued
    assert!(state.queue.pop().await.is_some());
    assert!(state.queue.pop().await.is_some());
}

#[tokio::test]
async fn test_bad_signature_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let db = connect_test_db(dir.path()).await;
    let state = make_state(db, test_cli(dir.path()));

    let app = insert_app(&state.db, "web", BuildStrategyKind::Dockerfile).await;
    set_secret(&state.db, app, "s3cret").await;

    let body = push_body("web", "main");
    let signature = sign("wrong", &body);

    let result =
        dispatch::dispatch_webhook(&state, None, Some("push"), Some(&signature), &body).await;
    assert!(matches!(result, Err(DispatchError::Unauthorized)));

    // a missing header fails the same way
    let result = dispatch::dispatch_webhook(&state, None, Some("push"), None, &body).await;
    assert!(matches!(result, Err(DispatchError::Unauthorized)));

    let builds = EBuild::find().count(&state.db).await.unwrap();
    assert_eq!(builds, 0);
}

#[tokio::test]
async fn test_unrelated_deliveries_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let db = connect_test_db(dir.path()).await;
    let state = make_state(db, test_cli(dir.path()));

    let app = insert_app(&state.db, "web", BuildStrategyKind::Dockerfile).await;
    let app = set_secret(&state.db, app, "s3cret").await;

    let body = push_body("web", "main");
    let signature = sign("s3cret", &body);

    // non-push events
    let outcome = dispatch::dispatch_webhook(&state, None, Some("ping"), Some(&signature), &body)
        .await
        .unwrap();
    assert!(!outcome.accepted);

    // deliveries without an event type header at all
    let outcome = dispatch::dispatch_webhook(&state, None, None, Some(&signature), &body)
        .await
        .unwrap();
    assert!(!outcome.accepted);

    // pushes to a branch no app deploys
    let body = push_body("web", "feature/x");
    let signature = sign("s3cret", &body);
    let outcome = dispatch::dispatch_webhook(&state, None, Some("push"), Some(&signature), &body)
        .await
        .unwrap();
    assert!(!outcome.accepted);

    // tag pushes
    let mut tag_body: serde_json::Value =
        serde_json::from_slice(&push_body("web", "main")).unwrap();
    tag_body["ref"] = serde_json::json!("refs/tags/v1.0.0");
    let tag_body = tag_body.to_string().into_bytes();
    let signature = sign("s3cret", &tag_body);
    let outcome =
        dispatch::dispatch_webhook(&state, None, Some("push"), Some(&signature), &tag_body)
            .await
            .unwrap();
    assert!(!outcome.accepted);

    // pushes for a disabled app
    let mut active = app.into_active_model();
    active.enabled = Set(false);
    active.update(&state.db).await.unwrap();

    let body = push_body("web", "main");
    let signature = sign("s3cret", &body);
    let outcome = dispatch::dispatch_webhook(&state, None, Some("push"), Some(&signature), &body)
        .await
        .unwrap();
    assert!(!outcome.accepted);

    let builds = EBuild::find().count(&state.db).await.unwrap();
    assert_eq!(builds, 0);
}

#[tokio::test]
async fn test_scoped_delivery_targets_one_app() {
    let dir = tempfile::tempdir().unwrap();
    let db = connect_test_db(dir.path()).await;
    let state = make_state(db, test_cli(dir.path()));

    let app = insert_app(&state.db, "web", BuildStrategyKind::Dockerfile).await;
    let app = set_secret(&state.db, app, "s3cret").await;

    // the payload repository does not have to match on the scoped endpoint
    let body = push_body("something-else", "main");
    let signature = sign("s3cret", &body);

    let outcome = dispatch::dispatch_webhook(
        &state,
        Some(app.id),
        Some("push"),
        Some(&signature),
        &body,
    )
    .await
    .unwrap();

    assert!(outcome.accepted);
    assert_eq!(outcome.builds.len(), 1);

    // an unknown scope is an error, not a silent ignore
    let result = dispatch::dispatch_webhook(
        &state,
        Some(Uuid::new_v4()),
        Some("push"),
        Some(&signature),
        &body,
    )
    .await;
    assert!(matches!(result, Err(DispatchError::NotFound)));
}

#[tokio::test]
async fn test_multibyte_commit_id_does_not_break_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let db = connect_test_db(dir.path()).await;
    let state = make_state(db, test_cli(dir.path()));

    insert_app(&state.db, "web", BuildStrategyKind::Dockerfile).await;

    let mut body: serde_json::Value = serde_json::from_slice(&push_body("web", "main")).unwrap();
    body["head_commit"]["id"] = serde_json::json!("日本語のコミットです");
    let body = body.to_string().into_bytes();

    let outcome = dispatch::dispatch_webhook(&state, None, Some("push"), None, &body)
        .await
        .unwrap();

    assert!(outcome.accepted);
    assert_eq!(outcome.builds.len(), 1);

    let build = EBuild::find_by_id(outcome.builds[0])
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(build.commit_hash.as_deref(), Some("日本語のコミットです"));

    // the queued-build line truncates the hash without slicing a character
    let logs = list_logs(&state.db, build.id, None).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].message.contains("日本語のコミット"));
}

#[tokio::test]
async fn test_secretless_app_accepts_unsigned_push() {
    let dir = tempfile::tempdir().unwrap();
    let db = connect_test_db(dir.path()).await;
    let state = make_state(db, test_cli(dir.path()));

    insert_app(&state.db, "web", BuildStrategyKind::Dockerfile).await;

    let body = push_body("web", "main");
    let outcome = dispatch::dispatch_webhook(&state, None, Some("push"), None, &body)
        .await
        .unwrap();

    assert!(outcome.accepted);
    assert_eq!(outcome.builds.len(), 1);
}
