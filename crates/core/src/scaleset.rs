// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scaleset model and state machine.

use crate::fault::Fault;
use crate::ids::{MachineId, ScalesetId};
use crate::node::NodeState;
use crate::primitives::{PoolName, Region};
use crate::records::{RowMeta, StoreSchema};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard cap the cloud places on a single scaleset, by image family.
pub const CUSTOM_IMAGE_MAX_SIZE: u64 = 600;
pub const MARKETPLACE_IMAGE_MAX_SIZE: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalesetState {
    Init,
    Setup,
    Resize,
    Running,
    Shutdown,
    Halt,
    CreationFailed,
}

impl ScalesetState {
    /// States in which the scaleset can be grown or otherwise updated.
    pub fn can_update(self) -> bool {
        matches!(self, ScalesetState::Running | ScalesetState::Resize)
    }

    /// States that indicate the reconciler has work to do.
    pub fn needs_work() -> &'static [ScalesetState] {
        &[
            ScalesetState::Init,
            ScalesetState::Setup,
            ScalesetState::Resize,
            ScalesetState::Shutdown,
            ScalesetState::Halt,
        ]
    }

    /// States in which the scaleset can host work.
    pub fn available(self) -> bool {
        !matches!(
            self,
            ScalesetState::Shutdown | ScalesetState::Halt | ScalesetState::CreationFailed
        )
    }

    /// States whose size counts toward the autoscaler's view of the pool.
    pub fn include_autoscale_count(self) -> bool {
        matches!(self, ScalesetState::Running | ScalesetState::Resize)
    }
}

crate::simple_display! {
    ScalesetState {
        Init => "init",
        Setup => "setup",
        Resize => "resize",
        Running => "running",
        Shutdown => "shutdown",
        Halt => "halt",
        CreationFailed => "creation_failed",
    }
}

/// Opaque credentials baked into the scaleset VMs. Generated at create,
/// written once, never re-read by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    pub password: String,
    pub public_key: String,
    pub private_key: String,
}

impl Authentication {
    /// Fresh opaque credential material.
    pub fn generate() -> Self {
        Self {
            password: Uuid::new_v4().to_string(),
            public_key: Uuid::new_v4().to_string(),
            private_key: Uuid::new_v4().to_string(),
        }
    }
}

/// Per-node view joined from cloud truth, computed for API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalesetNodeState {
    pub machine_id: MachineId,
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<NodeState>,
}

/// A cloud-managed VM scale set backing a pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaleset {
    pub pool_name: PoolName,
    pub scaleset_id: ScalesetId,
    pub state: ScalesetState,
    pub vm_sku: String,
    pub image: String,
    pub region: Region,
    /// Desired instance count. Cloud-observed size is read each tick.
    pub size: u64,
    #[serde(default)]
    pub spot_instances: bool,
    #[serde(default)]
    pub ephemeral_os_disks: bool,
    #[serde(default)]
    pub needs_config_update: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Authentication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Fault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_object_id: Option<Uuid>,
    #[serde(default)]
    pub tags: IndexMap<String, String>,
    /// Joined from cloud truth for API responses; never written.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<ScalesetNodeState>,
    #[serde(skip)]
    pub meta: RowMeta,
}

impl Scaleset {
    /// Largest size permitted for a scaleset on the given image.
    /// Custom images (absolute resource paths) cap lower than marketplace SKUs.
    pub fn max_size_for_image(image: &str) -> u64 {
        if image.starts_with('/') {
            CUSTOM_IMAGE_MAX_SIZE
        } else {
            MARKETPLACE_IMAGE_MAX_SIZE
        }
    }

    pub fn max_size(&self) -> u64 {
        Self::max_size_for_image(&self.image)
    }
}

crate::entity! {
    Scaleset => "Scaleset", StoreSchema::keyed("pool_name", "scaleset_id").exclude(&["nodes"])
}

crate::builder! {
    pub struct ScalesetBuilder => Scaleset {
        into {
            vm_sku: String = "Standard_D2s_v3",
            image: String = "Canonical:UbuntuServer:18.04-LTS:latest",
        }
        set {
            pool_name: PoolName = PoolName::new("pool"),
            scaleset_id: ScalesetId = ScalesetId::new(),
            state: ScalesetState = ScalesetState::Init,
            region: Region = Region::new("eastus"),
            size: u64 = 1,
            spot_instances: bool = false,
            ephemeral_os_disks: bool = false,
            needs_config_update: bool = false,
            auth: Option<Authentication> = Some(Authentication::generate()),
            error: Option<Fault> = None,
            client_id: Option<Uuid> = None,
            client_object_id: Option<Uuid> = None,
            tags: IndexMap<String, String> = IndexMap::new(),
            nodes: Vec<ScalesetNodeState> = Vec::new(),
        }
        computed {
            meta: RowMeta = RowMeta::default(),
        }
    }
}

#[cfg(test)]
#[path = "scaleset_tests.rs"]
mod tests;
