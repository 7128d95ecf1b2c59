/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use builder::dispatch;
use drydock_core::types::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::WebResult;

/// Unscoped receiver: the delivery is routed by repository URL and branch,
/// possibly to several apps.
pub async fn post_webhooks(
    state: State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> WebResult<Json<BaseResponse<Vec<Uuid>>>> {
    let event = event_header(&headers);
    let signature = signature_header(&headers);

    let outcome =
        dispatch::dispatch_webhook(&state, None, event.as_deref(), signature.as_deref(), &body)
            .await?;

    Ok(Json(BaseResponse {
        error: false,
        message: outcome.builds,
    }))
}

/// Scoped receiver: the app is fixed by the URL, no repository matching.
pub async fn post_webhook_app(
    state: State<Arc<ServerState>>,
    Path(app_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> WebResult<Json<BaseResponse<Vec<Uuid>>>> {
    let event = event_header(&headers);
    let signature = signature_header(&headers);

    let outcome = dispatch::dispatch_webhook(
        &state,
        Some(app_id),
        event.as_deref(),
        signature.as_deref(),
        &body,
    )
    .await?;

    Ok(Json(BaseResponse {
        error: false,
        message: outcome.builds,
    }))
}

fn event_header(headers: &HeaderMap) -> Option<String> {
    ["x-github-event", "x-gitea-event", "x-forgejo-event"]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// The signature header, normalized to the `sha256=<hex>` form. Gitea and
/// Forgejo send the bare hex digest.
fn signature_header(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get("x-hub-signature-256")
        .and_then(|value| value.to_str().ok())
    {
        return Some(value.to_string());
    }

    ["x-gitea-signature", "x-forgejo-signature"]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .map(|hex| format!("sha256={}", hex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_signature_header_normalization() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-hub-signature-256",
            HeaderValue::from_static("sha256=abcd"),
        );
        assert_eq!(signature_header(&headers).as_deref(), Some("sha256=abcd"));

        let mut headers = HeaderMap::new();
        headers.insert("x-gitea-signature", HeaderValue::from_static("abcd"));
        assert_eq!(signature_header(&headers).as_deref(), Some("sha256=abcd"));

        assert!(signature_header(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_event_header_sources() {
        let mut headers = HeaderMap::new();
        headers.insert("x-github-event", HeaderValue::from_static("push"));
        assert_eq!(event_header(&headers).as_deref(), Some("push"));

        let mut headers = HeaderMap::new();
        headers.insert("x-forgejo-event", HeaderValue::from_static("push"));
        assert_eq!(event_header(&headers).as_deref(), Some("push"));
    }
}
