// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The narrow cloud contract the orchestrator consumes.
//!
//! Long-running operations (VMSS create/resize/delete) are fire-and-forget:
//! the reconciler issues the request and observes the result on a later
//! tick through `get_vmss`/`get_vmss_size`/`list_instance_ids`.

use async_trait::async_trait;
use of_core::scaleset::Authentication;
use of_core::{Container, MachineId, Os, Region, ScalesetId};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CloudError {
    /// The resource is locked by an in-flight update. Swallowed with a
    /// debug log and retried next tick.
    #[error("update already in progress")]
    UnableToUpdate,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("cloud operation failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Creating,
    Succeeded,
    Failed,
}

/// Observed state of a VM scale set.
#[derive(Debug, Clone)]
pub struct VmssInfo {
    pub provisioning_state: ProvisioningState,
    /// Principal of the single user-assigned identity, once assigned.
    pub principal_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct VmssParams {
    pub scaleset_id: ScalesetId,
    pub region: Region,
    pub vm_sku: String,
    pub image: String,
    pub size: u64,
    pub network_id: String,
    pub spot_instances: bool,
    pub ephemeral_os_disks: bool,
    pub auth: Authentication,
    pub extensions: Vec<serde_json::Value>,
    pub tags: BTreeMap<String, String>,
}

/// Observed state of a single VM.
#[derive(Debug, Clone)]
pub struct VmInfo {
    pub provisioning_state: ProvisioningState,
}

#[derive(Debug, Clone)]
pub struct VmParams {
    pub name: String,
    pub region: Region,
    pub sku: String,
    pub image: String,
    pub auth: Authentication,
}

#[derive(Debug, Clone)]
pub struct IpPair {
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
}

/// Permissions encoded into a container SAS URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerSas {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub list: bool,
    pub create: bool,
}

#[async_trait]
pub trait CloudProvider: Send + Sync {
    // Scale sets

    async fn get_vmss(&self, scaleset_id: ScalesetId) -> Option<VmssInfo>;

    /// Cloud-observed instance count. `None` when the scaleset is missing.
    async fn get_vmss_size(&self, scaleset_id: ScalesetId) -> Option<u64>;

    async fn create_vmss(&self, params: VmssParams) -> Result<(), CloudError>;

    async fn resize_vmss(&self, scaleset_id: ScalesetId, size: u64) -> Result<(), CloudError>;

    /// Ground truth of instances: machine id → cloud instance id.
    async fn list_instance_ids(&self, scaleset_id: ScalesetId) -> BTreeMap<MachineId, String>;

    async fn reimage_vmss_nodes(
        &self,
        scaleset_id: ScalesetId,
        machine_ids: &BTreeSet<MachineId>,
    ) -> Result<(), CloudError>;

    async fn delete_vmss_nodes(
        &self,
        scaleset_id: ScalesetId,
        machine_ids: &BTreeSet<MachineId>,
    ) -> Result<(), CloudError>;

    /// Returns true once the scaleset is fully gone.
    async fn delete_vmss(&self, scaleset_id: ScalesetId) -> Result<bool, CloudError>;

    async fn update_extensions(
        &self,
        scaleset_id: ScalesetId,
        extensions: Vec<serde_json::Value>,
    ) -> Result<(), CloudError>;

    /// Private IP of a scaleset instance, for proxy forwards.
    async fn get_instance_ip(
        &self,
        scaleset_id: ScalesetId,
        machine_id: MachineId,
    ) -> Option<String>;

    // Images

    async fn get_os(&self, region: &Region, image: &str) -> Result<Os, CloudError>;

    // Networking

    async fn get_network_id(&self, region: &Region) -> Option<String>;

    async fn create_network(&self, region: &Region) -> Result<(), CloudError>;

    // Single VMs (proxies)

    async fn get_vm(&self, name: &str) -> Option<VmInfo>;

    async fn create_vm(&self, params: VmParams) -> Result<(), CloudError>;

    /// Returns true once the VM is fully gone.
    async fn delete_vm(&self, name: &str) -> Result<bool, CloudError>;

    async fn get_vm_ips(&self, name: &str) -> Option<IpPair>;

    /// Returns true once the extensions have finished provisioning.
    async fn add_vm_extensions(
        &self,
        name: &str,
        extensions: Vec<serde_json::Value>,
    ) -> Result<bool, CloudError>;

    // Blob containers

    async fn container_exists(&self, container: &Container) -> bool;

    async fn blob_exists(&self, container: &Container, path: &str) -> bool;

    async fn save_blob(
        &self,
        container: &Container,
        path: &str,
        content: String,
    ) -> Result<(), CloudError>;

    fn container_sas_url(&self, container: &Container, sas: ContainerSas) -> String;

    fn file_sas_url(&self, container: &Container, path: &str) -> String;
}
