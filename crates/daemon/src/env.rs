// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use of_core::NodeDisposalStrategy;
use std::time::Duration;

pub fn instance_name() -> String {
    std::env::var("ONEFUZZ_INSTANCE_NAME").unwrap_or_else(|_| "onefuzz".to_string())
}

pub fn resource_group() -> Option<String> {
    std::env::var("ONEFUZZ_RESOURCE_GROUP").ok().filter(|s| !s.is_empty())
}

pub fn data_storage() -> Option<String> {
    std::env::var("ONEFUZZ_DATA_STORAGE").ok().filter(|s| !s.is_empty())
}

pub fn func_storage() -> Option<String> {
    std::env::var("ONEFUZZ_FUNC_STORAGE").ok().filter(|s| !s.is_empty())
}

pub fn keyvault() -> Option<String> {
    std::env::var("ONEFUZZ_KEYVAULT").ok().filter(|s| !s.is_empty())
}

/// `scale_in` unless explicitly switched to `aggressive_delete`.
pub fn node_disposal_strategy() -> NodeDisposalStrategy {
    match std::env::var("ONEFUZZ_NODE_DISPOSAL_STRATEGY").as_deref() {
        Ok("aggressive_delete") => NodeDisposalStrategy::AggressiveDelete,
        _ => NodeDisposalStrategy::ScaleIn,
    }
}

/// Test override for the per-scaleset size cap.
pub fn scaleset_max_size() -> Option<u64> {
    std::env::var("ONEFUZZ_SCALESET_MAX_SIZE").ok().and_then(|s| s.parse().ok())
}

/// Reconciler tick interval (default 15s, `ONEFUZZ_TICK_MS` to override).
pub fn tick_interval() -> Duration {
    std::env::var("ONEFUZZ_TICK_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(15))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
