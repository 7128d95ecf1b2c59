/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::{DateTime, NaiveDateTime};
use std::ops::RangeInclusive;
use std::sync::LazyLock;

pub const PORT_RANGE: RangeInclusive<usize> = 1..=65535;

pub static NULL_TIME: LazyLock<NaiveDateTime> =
    LazyLock::new(|| DateTime::from_timestamp(0, 0).unwrap().naive_utc());

/// Compose file names probed in order when the configured name is absent.
pub const COMPOSE_FILE_NAMES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Paths excluded from the image build context when the repository ships no
/// .dockerignore of its own.
pub const BUILD_CONTEXT_EXCLUDES: [&str; 3] = [".git", ".gitignore", ".github"];

pub const LABEL_APP_ID: &str = "io.drydock.app";
pub const LABEL_APP_NAME: &str = "io.drydock.app-name";
pub const LABEL_BUILD_ID: &str = "io.drydock.build";

pub const COMPOSE_OVERLAY_FILE: &str = ".drydock-overlay.yml";
pub const DETACH_HELPER_IMAGE: &str = "docker:27-cli";
pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Subdirectory of the base path holding one checkout per app.
pub const CHECKOUTS_DIR: &str = "checkouts";
