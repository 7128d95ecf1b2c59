/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

#![allow(dead_code)]

use chrono::Utc;
use drydock_core::types::*;
use entity::app::BuildStrategyKind;
use migration::{Migrator, MigratorTrait};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub async fn connect_test_db(dir: &Path) -> DatabaseConnection {
    let db_path = dir.join("drydock-test.sqlite");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    let db = Database::connect(&url).await.expect("sqlite connect");
    Migrator::up(&db, None).await.expect("migrations");
    db
}

pub fn test_cli(dir: &Path) -> Cli {
    Cli {
        log_level: "info".to_string(),
        ip: "127.0.0.1".to_string(),
        port: 3000,
        serve_url: "http://127.0.0.1:3000".to_string(),
        database_url: None,
        database_url_file: None,
        max_concurrent_builds: 2,
        queue_capacity: 16,
        base_path: dir.to_string_lossy().into_owned(),
        clone_depth: 1,
        inside_container: false,
        data_volume: None,
        buildpacks_builder: "paketobuildpacks/builder-jammy-base".to_string(),
        binpath_git: "git".to_string(),
        binpath_docker: "docker".to_string(),
        binpath_pack: "pack".to_string(),
        report_errors: false,
        sentry_dsn: None,
    }
}

pub fn make_state(db: DatabaseConnection, cli: Cli) -> Arc<ServerState> {
    Arc::new(ServerState {
        db,
        queue: BuildQueue::new(cli.queue_capacity),
        locks: AppLocks::default(),
        shutdown: CancellationToken::new(),
        cli,
    })
}

pub async fn insert_app(
    db: &DatabaseConnection,
    name: &str,
    strategy: BuildStrategyKind,
) -> MApp {
    let app = AApp {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        repository: Set(format!("https://git.example.com/team/{}.git", name)),
        branch: Set("main".to_string()),
        strategy: Set(strategy),
        dockerfile: Set("Dockerfile".to_string()),
        compose_file: Set(None),
        build_context: Set(None),
        container_name: Set(name.to_string()),
        image_name: Set(name.to_string()),
        environment: Set(serde_json::json!({})),
        webhook_secret: Set(None),
        enabled: Set(true),
        auto_deploy: Set(true),
        subdomain: Set(None),
        container_port: Set(None),
        created_at: Set(Utc::now().naive_utc()),
    };

    app.insert(db).await.expect("insert app")
}

/// Writes an executable shell script that stands in for an external binary.
pub fn write_stub(dir: &Path, name: &str, script: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, script).expect("write stub");

    let mut perms = std::fs::metadata(&path).expect("stub metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod stub");

    path.to_string_lossy().into_owned()
}

pub const GIT_STUB: &str = r#"#!/bin/sh
cmd="$1"
case "$cmd" in
  clone)
    dest=""
    for arg in "$@"; do dest="$arg"; done
    mkdir -p "$dest/.git"
    printf 'FROM scratch\n' > "$dest/Dockerfile"
    echo "Cloning into '$dest'..." >&2
    ;;
  log)
    printf 'deadbeefdeadbeefdeadbeefdeadbeefdeadbeef\037Initial commit\037Dev\n'
    ;;
  fetch|reset)
    ;;
esac
exit 0
"#;

pub const DOCKER_STUB: &str = r#"#!/bin/sh
case "$1" in
  build)
    echo '{"vertexes":[{"digest":"sha256:aaa","name":"[1/1] FROM scratch"}]}' >&2
    ;;
  rm)
    ;;
  run)
    echo "0123456789abcdef"
    ;;
  inspect)
    echo "true"
    ;;
esac
exit 0
"#;

pub const DOCKER_FAIL_STUB: &str = r#"#!/bin/sh
case "$1" in
  build)
    echo '{"vertexes":[{"digest":"sha256:bbb","name":"[1/1] RUN make","error":"process exited with code 2"}]}' >&2
    exit 1
    ;;
esac
exit 0
"#;
