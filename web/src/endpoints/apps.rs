/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::extract::{Path, State};
use axum::Json;
use builder::dispatch;
use chrono::Utc;
use drydock_core::executer;
use drydock_core::input::{check_index_name, normalize_repository_url};
use drydock_core::types::*;
use entity::app::BuildStrategyKind;
use entity::build::BuildTrigger;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{WebError, WebResult};
use crate::requests::{AppStatusResponse, MakeAppRequest};

pub async fn get_apps(
    state: State<Arc<ServerState>>,
) -> WebResult<Json<BaseResponse<ListResponse>>> {
    let apps = EApp::find()
        .order_by_asc(CApp::Name)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|app| ListItem {
            id: app.id,
            name: app.name,
        })
        .collect();

    Ok(Json(BaseResponse {
        error: false,
        message: apps,
    }))
}

pub async fn post_apps(
    state: State<Arc<ServerState>>,
    Json(body): Json<MakeAppRequest>,
) -> WebResult<Json<BaseResponse<MApp>>> {
    check_index_name(&body.name)?;
    normalize_repository_url(&body.repository)?;

    let existing = EApp::find()
        .filter(CApp::Name.eq(body.name.clone()))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(WebError::already_exists("App"));
    }

    let app = AApp {
        id: Set(Uuid::new_v4()),
        name: Set(body.name.clone()),
        repository: Set(body.repository),
        branch: Set(body.branch),
        strategy: Set(body.strategy.unwrap_or(BuildStrategyKind::Autodetect)),
        dockerfile: Set(body.dockerfile.unwrap_or_else(|| {
            drydock_core::consts::DEFAULT_DOCKERFILE.to_string()
        })),
        compose_file: Set(body.compose_file),
        build_context: Set(body.build_context),
        container_name: Set(body.container_name.unwrap_or_else(|| body.name.clone())),
        image_name: Set(body.image_name.unwrap_or(body.name)),
        environment: Set(body.environment.unwrap_or_else(|| serde_json::json!({}))),
        webhook_secret: Set(body.webhook_secret),
        enabled: Set(true),
        auto_deploy: Set(body.auto_deploy),
        subdomain: Set(body.subdomain),
        container_port: Set(body.container_port),
        created_at: Set(Utc::now().naive_utc()),
    };

    let app = app.insert(&state.db).await?;

    Ok(Json(BaseResponse {
        error: false,
        message: app,
    }))
}

pub async fn get_app(
    state: State<Arc<ServerState>>,
    Path(app_id): Path<Uuid>,
) -> WebResult<Json<BaseResponse<MApp>>> {
    let app = EApp::find_by_id(app_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("App"))?;

    Ok(Json(BaseResponse {
        error: false,
        message: app,
    }))
}

pub async fn get_app_builds(
    state: State<Arc<ServerState>>,
    Path(app_id): Path<Uuid>,
) -> WebResult<Json<BaseResponse<Vec<MBuild>>>> {
    EApp::find_by_id(app_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("App"))?;

    let builds = EBuild::find()
        .filter(CBuild::App.eq(app_id))
        .order_by_desc(CBuild::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(BaseResponse {
        error: false,
        message: builds,
    }))
}

pub async fn post_app_build(
    state: State<Arc<ServerState>>,
    Path(app_id): Path<Uuid>,
) -> WebResult<Json<BaseResponse<MBuild>>> {
    let build = dispatch::enqueue_manual_build(&state, app_id, BuildTrigger::Manual).await?;

    Ok(Json(BaseResponse {
        error: false,
        message: build,
    }))
}

pub async fn get_app_status(
    state: State<Arc<ServerState>>,
    Path(app_id): Path<Uuid>,
) -> WebResult<Json<BaseResponse<AppStatusResponse>>> {
    let app = EApp::find_by_id(app_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("App"))?;

    let running = executer::container_running(&state, &app.container_name).await?;

    Ok(Json(BaseResponse {
        error: false,
        message: AppStatusResponse { running },
    }))
}

pub async fn post_app_restart(
    state: State<Arc<ServerState>>,
    Path(app_id): Path<Uuid>,
) -> WebResult<Json<BaseResponse<String>>> {
    let app = EApp::find_by_id(app_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("App"))?;

    if executer::container_running(&state, &app.container_name)
        .await?
        .is_none()
    {
        return Err(WebError::not_found("Container"));
    }

    executer::restart_container(&state, &app.container_name).await?;

    Ok(Json(BaseResponse {
        error: false,
        message: format!("Restarted {}", app.container_name),
    }))
}

pub async fn post_app_stop(
    state: State<Arc<ServerState>>,
    Path(app_id): Path<Uuid>,
) -> WebResult<Json<BaseResponse<String>>> {
    let app = EApp::find_by_id(app_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("App"))?;

    if executer::container_running(&state, &app.container_name)
        .await?
        .is_none()
    {
        return Err(WebError::not_found("Container"));
    }

    executer::stop_container(&state, &app.container_name).await?;

    Ok(Json(BaseResponse {
        error: false,
        message: format!("Stopped {}", app.container_name),
    }))
}
