// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controllable in-memory cloud for tests and standalone mode.

use crate::cloud::{
    CloudError, CloudProvider, ContainerSas, IpPair, ProvisioningState, VmInfo, VmParams, VmssInfo,
    VmssParams,
};
use async_trait::async_trait;
use of_core::{Container, MachineId, Os, Region, ScalesetId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct FakeVmss {
    size: u64,
    provisioning: ProvisioningState,
    principal_id: Option<Uuid>,
    instances: BTreeMap<MachineId, String>,
    next_instance: u64,
}

impl FakeVmss {
    fn add_instances(&mut self, count: u64) {
        for _ in 0..count {
            self.next_instance += 1;
            self.instances.insert(MachineId::new(), self.next_instance.to_string());
        }
    }
}

#[derive(Debug, Clone)]
struct FakeVm {
    provisioning: ProvisioningState,
    ips: IpPair,
    extensions_done: bool,
}

#[derive(Default)]
struct State {
    vmss: BTreeMap<ScalesetId, FakeVmss>,
    locked: BTreeSet<ScalesetId>,
    networks: BTreeSet<Region>,
    vms: BTreeMap<String, FakeVm>,
    containers: BTreeSet<String>,
    blobs: BTreeMap<(String, String), String>,
    image_os: BTreeMap<String, Os>,
    reimage_calls: Vec<(ScalesetId, Vec<MachineId>)>,
    delete_node_calls: Vec<(ScalesetId, Vec<MachineId>)>,
}

/// In-memory [`CloudProvider`]. Scaleset creates and resizes materialize
/// instances immediately; provisioning completion is driven by the test
/// through [`FakeCloud::finish_provisioning`].
#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<State>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a scaleset's provisioning as complete and assign its identity.
    pub fn finish_provisioning(&self, scaleset_id: ScalesetId) {
        let mut state = self.state.lock();
        if let Some(vmss) = state.vmss.get_mut(&scaleset_id) {
            vmss.provisioning = ProvisioningState::Succeeded;
            vmss.principal_id.get_or_insert_with(Uuid::new_v4);
        }
    }

    /// Lock a scaleset so updates fail with [`CloudError::UnableToUpdate`].
    pub fn set_update_lock(&self, scaleset_id: ScalesetId, locked: bool) {
        let mut state = self.state.lock();
        if locked {
            state.locked.insert(scaleset_id);
        } else {
            state.locked.remove(&scaleset_id);
        }
    }

    /// Force the cloud-observed size without touching instances, to model
    /// drift between desired and actual.
    pub fn set_vmss_size(&self, scaleset_id: ScalesetId, size: u64) {
        let mut state = self.state.lock();
        if let Some(vmss) = state.vmss.get_mut(&scaleset_id) {
            vmss.size = size;
        }
    }

    /// Remove a scaleset out from under the service.
    pub fn drop_vmss(&self, scaleset_id: ScalesetId) {
        self.state.lock().vmss.remove(&scaleset_id);
    }

    /// Register an instance with a caller-chosen machine id, materializing
    /// the scaleset if the test never drove VMSS creation.
    pub fn add_instance(&self, scaleset_id: ScalesetId, machine_id: MachineId) {
        let mut state = self.state.lock();
        let vmss = state.vmss.entry(scaleset_id).or_insert_with(|| FakeVmss {
            size: 0,
            provisioning: ProvisioningState::Succeeded,
            principal_id: Some(Uuid::new_v4()),
            instances: BTreeMap::new(),
            next_instance: 0,
        });
        vmss.next_instance += 1;
        let instance = vmss.next_instance.to_string();
        vmss.instances.insert(machine_id, instance);
        vmss.size = vmss.instances.len() as u64;
    }

    pub fn machine_ids(&self, scaleset_id: ScalesetId) -> Vec<MachineId> {
        self.state
            .lock()
            .vmss
            .get(&scaleset_id)
            .map(|vmss| vmss.instances.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn set_image_os(&self, image: &str, os: Os) {
        self.state.lock().image_os.insert(image.to_string(), os);
    }

    pub fn add_container(&self, container: &Container) {
        self.state.lock().containers.insert(container.to_string());
    }

    pub fn put_blob(&self, container: &Container, path: &str, content: &str) {
        self.state
            .lock()
            .blobs
            .insert((container.to_string(), path.to_string()), content.to_string());
    }

    pub fn blob(&self, container: &Container, path: &str) -> Option<String> {
        self.state.lock().blobs.get(&(container.to_string(), path.to_string())).cloned()
    }

    /// Mark a proxy VM's provisioning complete and give it addresses.
    pub fn finish_vm(&self, name: &str, public_ip: &str, private_ip: &str) {
        let mut state = self.state.lock();
        if let Some(vm) = state.vms.get_mut(name) {
            vm.provisioning = ProvisioningState::Succeeded;
            vm.ips = IpPair {
                public_ip: Some(public_ip.to_string()),
                private_ip: Some(private_ip.to_string()),
            };
            vm.extensions_done = true;
        }
    }

    pub fn reimage_calls(&self) -> Vec<(ScalesetId, Vec<MachineId>)> {
        self.state.lock().reimage_calls.clone()
    }

    pub fn delete_node_calls(&self) -> Vec<(ScalesetId, Vec<MachineId>)> {
        self.state.lock().delete_node_calls.clone()
    }
}

#[async_trait]
impl CloudProvider for FakeCloud {
    async fn get_vmss(&self, scaleset_id: ScalesetId) -> Option<VmssInfo> {
        self.state.lock().vmss.get(&scaleset_id).map(|vmss| VmssInfo {
            provisioning_state: vmss.provisioning,
            principal_id: vmss.principal_id,
        })
    }

    async fn get_vmss_size(&self, scaleset_id: ScalesetId) -> Option<u64> {
        self.state.lock().vmss.get(&scaleset_id).map(|vmss| vmss.size)
    }

    async fn create_vmss(&self, params: VmssParams) -> Result<(), CloudError> {
        let mut state = self.state.lock();
        let mut vmss = FakeVmss {
            size: params.size,
            provisioning: ProvisioningState::Creating,
            principal_id: None,
            instances: BTreeMap::new(),
            next_instance: 0,
        };
        vmss.add_instances(params.size);
        state.vmss.insert(params.scaleset_id, vmss);
        Ok(())
    }

    async fn resize_vmss(&self, scaleset_id: ScalesetId, size: u64) -> Result<(), CloudError> {
        let mut state = self.state.lock();
        if state.locked.contains(&scaleset_id) {
            return Err(CloudError::UnableToUpdate);
        }
        let vmss = state
            .vmss
            .get_mut(&scaleset_id)
            .ok_or_else(|| CloudError::NotFound(scaleset_id.to_string()))?;
        let current = vmss.instances.len() as u64;
        if size > current {
            vmss.add_instances(size - current);
        } else {
            let keep: Vec<MachineId> =
                vmss.instances.keys().copied().take(size as usize).collect();
            vmss.instances.retain(|id, _| keep.contains(id));
        }
        vmss.size = size;
        Ok(())
    }

    async fn list_instance_ids(&self, scaleset_id: ScalesetId) -> BTreeMap<MachineId, String> {
        self.state
            .lock()
            .vmss
            .get(&scaleset_id)
            .map(|vmss| vmss.instances.clone())
            .unwrap_or_default()
    }

    async fn reimage_vmss_nodes(
        &self,
        scaleset_id: ScalesetId,
        machine_ids: &BTreeSet<MachineId>,
    ) -> Result<(), CloudError> {
        let mut state = self.state.lock();
        if state.locked.contains(&scaleset_id) {
            return Err(CloudError::UnableToUpdate);
        }
        state.reimage_calls.push((scaleset_id, machine_ids.iter().copied().collect()));
        Ok(())
    }

    async fn delete_vmss_nodes(
        &self,
        scaleset_id: ScalesetId,
        machine_ids: &BTreeSet<MachineId>,
    ) -> Result<(), CloudError> {
        let mut state = self.state.lock();
        if state.locked.contains(&scaleset_id) {
            return Err(CloudError::UnableToUpdate);
        }
        state.delete_node_calls.push((scaleset_id, machine_ids.iter().copied().collect()));
        if let Some(vmss) = state.vmss.get_mut(&scaleset_id) {
            vmss.instances.retain(|id, _| !machine_ids.contains(id));
            vmss.size = vmss.instances.len() as u64;
        }
        Ok(())
    }

    async fn delete_vmss(&self, scaleset_id: ScalesetId) -> Result<bool, CloudError> {
        let mut state = self.state.lock();
        if state.locked.contains(&scaleset_id) {
            return Err(CloudError::UnableToUpdate);
        }
        state.vmss.remove(&scaleset_id);
        Ok(true)
    }

    async fn update_extensions(
        &self,
        scaleset_id: ScalesetId,
        _extensions: Vec<serde_json::Value>,
    ) -> Result<(), CloudError> {
        let state = self.state.lock();
        if state.locked.contains(&scaleset_id) {
            return Err(CloudError::UnableToUpdate);
        }
        Ok(())
    }

    async fn get_instance_ip(
        &self,
        scaleset_id: ScalesetId,
        machine_id: MachineId,
    ) -> Option<String> {
        let state = self.state.lock();
        let vmss = state.vmss.get(&scaleset_id)?;
        vmss.instances.get(&machine_id).map(|instance| format!("10.0.0.{instance}"))
    }

    async fn get_os(&self, _region: &Region, image: &str) -> Result<Os, CloudError> {
        Ok(self.state.lock().image_os.get(image).copied().unwrap_or(Os::Linux))
    }

    async fn get_network_id(&self, region: &Region) -> Option<String> {
        let state = self.state.lock();
        state.networks.contains(region).then(|| format!("network-{region}"))
    }

    async fn create_network(&self, region: &Region) -> Result<(), CloudError> {
        self.state.lock().networks.insert(region.clone());
        Ok(())
    }

    async fn get_vm(&self, name: &str) -> Option<VmInfo> {
        self.state
            .lock()
            .vms
            .get(name)
            .map(|vm| VmInfo { provisioning_state: vm.provisioning })
    }

    async fn create_vm(&self, params: VmParams) -> Result<(), CloudError> {
        self.state.lock().vms.insert(
            params.name,
            FakeVm {
                provisioning: ProvisioningState::Creating,
                ips: IpPair { public_ip: None, private_ip: None },
                extensions_done: false,
            },
        );
        Ok(())
    }

    async fn delete_vm(&self, name: &str) -> Result<bool, CloudError> {
        self.state.lock().vms.remove(name);
        Ok(true)
    }

    async fn get_vm_ips(&self, name: &str) -> Option<IpPair> {
        self.state.lock().vms.get(name).map(|vm| vm.ips.clone())
    }

    async fn add_vm_extensions(
        &self,
        name: &str,
        _extensions: Vec<serde_json::Value>,
    ) -> Result<bool, CloudError> {
        Ok(self.state.lock().vms.get(name).is_some_and(|vm| vm.extensions_done))
    }

    async fn container_exists(&self, container: &Container) -> bool {
        self.state.lock().containers.contains(container.as_str())
    }

    async fn blob_exists(&self, container: &Container, path: &str) -> bool {
        self.state
            .lock()
            .blobs
            .contains_key(&(container.to_string(), path.to_string()))
    }

    async fn save_blob(
        &self,
        container: &Container,
        path: &str,
        content: String,
    ) -> Result<(), CloudError> {
        self.state
            .lock()
            .blobs
            .insert((container.to_string(), path.to_string()), content);
        Ok(())
    }

    fn container_sas_url(&self, container: &Container, sas: ContainerSas) -> String {
        let mut perms = String::new();
        if sas.read {
            perms.push('r');
        }
        if sas.write {
            perms.push('w');
        }
        if sas.delete {
            perms.push('d');
        }
        if sas.list {
            perms.push('l');
        }
        if sas.create {
            perms.push('c');
        }
        format!("https://storage.invalid/container/{container}?sp={perms}")
    }

    fn file_sas_url(&self, container: &Container, path: &str) -> String {
        format!("https://storage.invalid/container/{container}/{path}?sp=r")
    }
}
