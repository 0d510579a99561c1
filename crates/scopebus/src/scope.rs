// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scope to topic translation.
//!
//! Scopes are hierarchical paths (`/sensors/laser/front`); the bus addresses
//! flat dotted topics (`sensors.laser.front`).

/// Separator used by scopes.
pub const SCOPE_SEPARATOR: char = '/';

/// Separator used by bus topics.
pub const TOPIC_SEPARATOR: &str = ".";

/// Translate a scope path into a bus topic.
///
/// Strips a single leading separator and replaces every remaining one with a
/// dot. No validation is performed; any string maps to some topic.
pub fn translate(scope: &str) -> String {
    let trimmed = scope.strip_prefix(SCOPE_SEPARATOR).unwrap_or(scope);
    trimmed.replace(SCOPE_SEPARATOR, TOPIC_SEPARATOR)
}
