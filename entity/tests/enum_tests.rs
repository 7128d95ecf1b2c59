/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for entity enums

use entity::app::BuildStrategyKind;
use entity::build::{BuildStatus, BuildTrigger};
use entity::build_log::{LogLevel, LogOrigin};
use sea_orm::ActiveEnum;

#[test]
fn test_build_status_db_values_are_stable() {
    // persisted values; changing them breaks existing databases
    assert_eq!(BuildStatus::Pending.into_value(), 0);
    assert_eq!(BuildStatus::Cloning.into_value(), 1);
    assert_eq!(BuildStatus::Building.into_value(), 2);
    assert_eq!(BuildStatus::Deploying.into_value(), 3);
    assert_eq!(BuildStatus::Success.into_value(), 4);
    assert_eq!(BuildStatus::Failed.into_value(), 5);
    assert_eq!(BuildStatus::Cancelled.into_value(), 6);
}

#[test]
fn test_build_strategy_kind_db_values_are_stable() {
    assert_eq!(BuildStrategyKind::Autodetect.into_value(), 0);
    assert_eq!(BuildStrategyKind::Dockerfile.into_value(), 1);
    assert_eq!(BuildStrategyKind::Compose.into_value(), 2);
    assert_eq!(BuildStrategyKind::Buildpacks.into_value(), 3);
}

#[test]
fn test_trigger_and_log_enum_db_values_are_stable() {
    assert_eq!(BuildTrigger::Webhook.into_value(), 0);
    assert_eq!(BuildTrigger::Manual.into_value(), 1);
    assert_eq!(BuildTrigger::Rollback.into_value(), 2);

    assert_eq!(LogLevel::Info.into_value(), 0);
    assert_eq!(LogLevel::Error.into_value(), 1);

    assert_eq!(LogOrigin::Git.into_value(), 0);
    assert_eq!(LogOrigin::Build.into_value(), 1);
    assert_eq!(LogOrigin::Deploy.into_value(), 2);
    assert_eq!(LogOrigin::System.into_value(), 3);
}

#[test]
fn test_strategy_kind_serde_names() {
    let kind: BuildStrategyKind = serde_json::from_str("\"compose\"").unwrap();
    assert_eq!(kind, BuildStrategyKind::Compose);
    assert_eq!(
        serde_json::to_string(&BuildStrategyKind::Buildpacks).unwrap(),
        "\"buildpacks\""
    );
}

#[test]
fn test_terminal_statuses() {
    for status in [
        BuildStatus::Success,
        BuildStatus::Failed,
        BuildStatus::Cancelled,
    ] {
        assert!(status.is_terminal());
    }

    for status in [
        BuildStatus::Pending,
        BuildStatus::Cloning,
        BuildStatus::Building,
        BuildStatus::Deploying,
    ] {
        assert!(!status.is_terminal());
    }
}
