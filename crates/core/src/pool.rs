// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool model and autoscale policy.

use crate::ids::PoolId;
use crate::primitives::{Architecture, Os, PoolName, Region};
use crate::records::{RowMeta, StoreSchema};
use crate::workset::WorkSetSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Init,
    Running,
    Shutdown,
    Halt,
}

impl PoolState {
    /// States that indicate the reconciler has work to do.
    pub fn needs_work() -> &'static [PoolState] {
        &[PoolState::Init, PoolState::Shutdown, PoolState::Halt]
    }

    /// States in which the pool hands out work.
    pub fn available(self) -> bool {
        matches!(self, PoolState::Running)
    }
}

crate::simple_display! {
    PoolState {
        Init => "init",
        Running => "running",
        Shutdown => "shutdown",
        Halt => "halt",
    }
}

/// Autoscale policy for a managed pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoscaleConfig {
    pub image: String,
    pub vm_sku: String,
    /// Largest scaleset the autoscaler will create for this pool.
    pub scaleset_size: u64,
    #[serde(default)]
    pub min_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(default)]
    pub spot_instances: bool,
    #[serde(default)]
    pub ephemeral_os_disks: bool,
}

/// A named group of worker VMs sharing OS, arch, and an autoscale policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub name: PoolName,
    pub pool_id: PoolId,
    pub os: Os,
    pub arch: Architecture,
    pub managed: bool,
    pub state: PoolState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscale: Option<AutoscaleConfig>,
    /// Peeked view of the pool queue; computed for API responses, never written.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub work_queue: Vec<WorkSetSummary>,
    #[serde(skip)]
    pub meta: RowMeta,
}

impl Pool {
    pub fn new(
        name: PoolName,
        os: Os,
        arch: Architecture,
        managed: bool,
        autoscale: Option<AutoscaleConfig>,
    ) -> Self {
        Self {
            name,
            pool_id: PoolId::new(),
            os,
            arch,
            managed,
            state: PoolState::Init,
            autoscale,
            work_queue: Vec::new(),
            meta: RowMeta::default(),
        }
    }

    /// Name of this pool's work queue.
    pub fn queue_name(&self) -> String {
        format!("pool-{}", self.pool_id.simple())
    }
}

crate::entity! {
    Pool => "Pool", StoreSchema::keyed("name", "pool_id").exclude(&["work_queue"])
}

crate::builder! {
    pub struct PoolBuilder => Pool {
        set {
            name: PoolName = PoolName::new("pool"),
            pool_id: PoolId = PoolId::new(),
            os: Os = Os::Linux,
            arch: Architecture = Architecture::X86_64,
            managed: bool = true,
            state: PoolState = PoolState::Init,
            autoscale: Option<AutoscaleConfig> = None,
            work_queue: Vec<WorkSetSummary> = Vec::new(),
        }
        computed {
            meta: RowMeta = RowMeta::default(),
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
