/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod apps;
pub mod builds;
pub mod system;
pub mod webhooks;
