// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small shared value types: names, regions, OS and architecture enums.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Name of a worker pool. Unique across the instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolName(SmolStr);

impl PoolName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(SmolStr::new(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PoolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PoolName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PoolName {
    fn from(s: String) -> Self {
        Self(SmolStr::new(s))
    }
}

/// Cloud region identifier (e.g. `eastus`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(SmolStr);

impl Region {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(SmolStr::new(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Region {
    fn from(s: String) -> Self {
        Self(SmolStr::new(s))
    }
}

/// Blob container name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Container(SmolStr);

impl Container {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(SmolStr::new(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Container {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Operating system of a pool, image, or node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Os {
    Linux,
    Windows,
}

crate::simple_display! {
    Os {
        Linux => "linux",
        Windows => "windows",
    }
}

/// CPU architecture of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    X86_64,
}

crate::simple_display! {
    Architecture {
        X86_64 => "x86_64",
    }
}

/// How cleanup disposes of nodes that are done: release back to the
/// scaleset via reimage, or delete the instance outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeDisposalStrategy {
    ScaleIn,
    AggressiveDelete,
}

impl Default for NodeDisposalStrategy {
    fn default() -> Self {
        Self::ScaleIn
    }
}

crate::simple_display! {
    NodeDisposalStrategy {
        ScaleIn => "scale_in",
        AggressiveDelete => "aggressive_delete",
    }
}
