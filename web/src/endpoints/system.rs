/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::http::StatusCode;
use axum::Json;
use drydock_core::types::BaseResponse;

pub async fn get_health() -> Json<BaseResponse<String>> {
    Json(BaseResponse {
        error: false,
        message: "ok".to_string(),
    })
}

pub async fn handle_404() -> (StatusCode, Json<BaseResponse<String>>) {
    (
        StatusCode::NOT_FOUND,
        Json(BaseResponse {
            error: true,
            message: "Not found".to_string(),
        }),
    )
}
