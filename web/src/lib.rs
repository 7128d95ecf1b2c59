/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod endpoints;
pub mod error;
pub mod requests;

use axum::routing::{get, post};
use axum::Router;
use drydock_core::types::ServerState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use endpoints::{apps, builds, system, webhooks};

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/webhooks", post(webhooks::post_webhooks))
        .route("/api/webhook/{app}", post(webhooks::post_webhook_app))
        .route("/api/app", get(apps::get_apps).post(apps::post_apps))
        .route("/api/app/{app}", get(apps::get_app))
        .route("/api/app/{app}/builds", get(apps::get_app_builds))
        .route("/api/app/{app}/build", post(apps::post_app_build))
        .route("/api/app/{app}/status", get(apps::get_app_status))
        .route("/api/app/{app}/restart", post(apps::post_app_restart))
        .route("/api/app/{app}/stop", post(apps::post_app_stop))
        .route("/api/build/{build}", get(builds::get_build))
        .route("/api/build/{build}/logs", get(builds::get_build_logs))
        .route("/api/health", get(system::get_health))
        .fallback(system::handle_404)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve_web(state: Arc<ServerState>) -> std::io::Result<()> {
    let server_url = format!("{}:{}", state.cli.ip, state.cli.port);
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    info!("Listening on {}", server_url);

    let listener = tokio::net::TcpListener::bind(&server_url).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
