// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service version and agent version comparison.

/// Version reported to agents and compared against node versions for
/// outdated-node detection.
pub const SERVICE_VERSION: &str = "2.19.0";

/// Agents at this version predate graceful reset and are retired directly.
pub const LEGACY_AGENT_VERSION: &str = "1.0.0";

/// Minimum agent version that understands the `stop_if_free` command.
pub const STOP_IF_FREE_MIN_VERSION: &str = "2.16.1";

fn parse(version: &str) -> Vec<u64> {
    version.split('.').map(|part| part.parse().unwrap_or(0)).collect()
}

/// Dotted-numeric comparison: true when `version >= minimum`.
/// Non-numeric segments compare as zero.
pub fn is_minimum_version(version: &str, minimum: &str) -> bool {
    parse(version) >= parse(minimum)
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;
