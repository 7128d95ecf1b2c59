/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use entity::app::BuildStrategyKind;
use serde::{Deserialize, Serialize};

fn default_branch() -> String {
    "main".to_string()
}

fn default_true() -> bool {
    true
}

/// App creation body. Most fields default: an app needs only a name and a
/// repository to be buildable.
#[derive(Debug, Deserialize)]
pub struct MakeAppRequest {
    pub name: String,
    pub repository: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub strategy: Option<BuildStrategyKind>,
    #[serde(default)]
    pub dockerfile: Option<String>,
    #[serde(default)]
    pub compose_file: Option<String>,
    #[serde(default)]
    pub build_context: Option<String>,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub environment: Option<serde_json::Value>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_true")]
    pub auto_deploy: bool,
    #[serde(default)]
    pub subdomain: Option<String>,
    #[serde(default)]
    pub container_port: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppStatusResponse {
    /// `None` when no container with the app's name exists.
    pub running: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    /// Only return lines with a sequence number greater than this.
    pub after: Option<i64>,
}
