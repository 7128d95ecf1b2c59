/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::extract::{Path, Query, State};
use axum::Json;
use drydock_core::logsink::list_logs;
use drydock_core::types::*;
use sea_orm::EntityTrait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{WebError, WebResult};
use crate::requests::LogQuery;

pub async fn get_build(
    state: State<Arc<ServerState>>,
    Path(build_id): Path<Uuid>,
) -> WebResult<Json<BaseResponse<MBuild>>> {
    let build = EBuild::find_by_id(build_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Build"))?;

    Ok(Json(BaseResponse {
        error: false,
        message: build,
    }))
}

/// Log lines for a build, ordered by sequence. `?after=N` returns only lines
/// newer than N; clients poll with the last sequence they have seen.
pub async fn get_build_logs(
    state: State<Arc<ServerState>>,
    Path(build_id): Path<Uuid>,
    Query(query): Query<LogQuery>,
) -> WebResult<Json<BaseResponse<Vec<MBuildLog>>>> {
    EBuild::find_by_id(build_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| WebError::not_found("Build"))?;

    let logs = list_logs(&state.db, build_id, query.after).await?;

    Ok(Json(BaseResponse {
        error: false,
        message: logs,
    }))
}
