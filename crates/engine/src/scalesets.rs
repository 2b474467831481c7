// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scaleset reconciler: desired size vs cloud truth, node cleanup, and
//! the create/resize/shutdown/halt state machine.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::nodes::NODE_EXPIRATION_TIME;
use of_adapters::{CloudError, ProvisioningState, VmssParams};
use of_core::node::{Node, NodeState};
use of_core::pool::PoolState;
use of_core::scaleset::{Authentication, Scaleset, ScalesetState};
use of_core::{
    Clock, Event, Fault, FaultCode, NodeDisposalStrategy, PoolName, Region, ScalesetId,
};
use of_storage::{Query, ShrinkQueue};
use std::collections::BTreeSet;

impl<K: Clock> Engine<K> {
    pub async fn get_scaleset(
        &self,
        scaleset_id: ScalesetId,
    ) -> Result<Option<Scaleset>, EngineError> {
        let mut scalesets: Vec<Scaleset> =
            self.store.search(Query::new().eq("scaleset_id", scaleset_id)).await?;
        if scalesets.len() != 1 {
            return Ok(None);
        }
        Ok(scalesets.pop())
    }

    pub async fn scalesets_by_pool(
        &self,
        pool_name: &PoolName,
    ) -> Result<Vec<Scaleset>, EngineError> {
        Ok(self.store.search(Query::new().eq("pool_name", pool_name)).await?)
    }

    pub async fn all_scalesets(&self) -> Result<Vec<Scaleset>, EngineError> {
        Ok(self.store.search(Query::new()).await?)
    }

    /// Effective size cap, honoring the test override.
    pub(crate) fn scaleset_max_size(&self, image: &str) -> u64 {
        let base = Scaleset::max_size_for_image(image);
        match self.config.scaleset_max_size {
            Some(cap) => base.min(cap),
            None => base,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_scaleset(
        &self,
        pool_name: PoolName,
        vm_sku: &str,
        image: &str,
        region: Region,
        size: u64,
        spot_instances: bool,
        ephemeral_os_disks: bool,
        tags: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Scaleset, EngineError> {
        let mut scaleset = Scaleset {
            pool_name,
            scaleset_id: ScalesetId::new(),
            state: ScalesetState::Init,
            vm_sku: vm_sku.to_string(),
            image: image.to_string(),
            region,
            size: size.min(self.scaleset_max_size(image)),
            spot_instances,
            ephemeral_os_disks,
            needs_config_update: false,
            auth: Some(Authentication::generate()),
            error: None,
            client_id: None,
            client_object_id: None,
            tags: tags.into_iter().collect(),
            nodes: Vec::new(),
            meta: of_core::RowMeta::default(),
        };
        self.store.insert(&mut scaleset).await?;
        self.send_event(Event::ScalesetCreated {
            scaleset_id: scaleset.scaleset_id,
            pool_name: scaleset.pool_name.clone(),
            vm_sku: scaleset.vm_sku.clone(),
            image: scaleset.image.clone(),
            region: scaleset.region.clone(),
            size: scaleset.size,
        })
        .await;
        Ok(scaleset)
    }

    /// Scalesets never leave `halt`; all other transitions are saved as-is.
    pub(crate) async fn scaleset_set_state(
        &self,
        scaleset: &mut Scaleset,
        state: ScalesetState,
    ) -> Result<(), EngineError> {
        if scaleset.state == state || scaleset.state == ScalesetState::Halt {
            return Ok(());
        }
        scaleset.state = state;
        self.store.save(scaleset).await?;
        Ok(())
    }

    /// Record a permanent creation error. First error wins.
    pub async fn scaleset_set_failed(
        &self,
        scaleset: &mut Scaleset,
        error: Fault,
    ) -> Result<(), EngineError> {
        if scaleset.error.is_some() {
            return Ok(());
        }
        scaleset.error = Some(error.clone());
        self.scaleset_set_state(scaleset, ScalesetState::CreationFailed).await?;
        self.send_event(Event::ScalesetFailed {
            scaleset_id: scaleset.scaleset_id,
            pool_name: scaleset.pool_name.clone(),
            error,
        })
        .await;
        Ok(())
    }

    pub async fn scaleset_set_shutdown(
        &self,
        scaleset: &mut Scaleset,
        now: bool,
    ) -> Result<(), EngineError> {
        let state = if now { ScalesetState::Halt } else { ScalesetState::Shutdown };
        self.scaleset_set_state(scaleset, state).await
    }

    /// Clamp and adopt a new desired size, entering `resize`.
    pub async fn scaleset_set_size(
        &self,
        scaleset: &mut Scaleset,
        size: u64,
    ) -> Result<(), EngineError> {
        let size = size.min(self.scaleset_max_size(&scaleset.image));
        if scaleset.size != size {
            scaleset.size = size;
            self.scaleset_set_state(scaleset, ScalesetState::Resize).await?;
        }
        Ok(())
    }

    async fn scaleset_init(&self, scaleset: &mut Scaleset) -> Result<(), EngineError> {
        tracing::info!(scaleset_id = %scaleset.scaleset_id, "scaleset init");

        ShrinkQueue::new(scaleset.scaleset_id, &self.queues).create().await;

        // A pool can be deleted while a scaleset is being added to it.
        let Some(pool) = self.get_pool_by_name(&scaleset.pool_name).await? else {
            let fault = Fault::new(FaultCode::UnableToFind, "unable to find pool");
            self.scaleset_set_failed(scaleset, fault).await?;
            return Ok(());
        };

        if pool.state == PoolState::Init {
            tracing::info!(
                pool = %scaleset.pool_name,
                scaleset_id = %scaleset.scaleset_id,
                "waiting for pool"
            );
            return Ok(());
        }

        if pool.state == PoolState::Running {
            let image_os = match self.cloud.get_os(&scaleset.region, &scaleset.image).await {
                Ok(os) => os,
                Err(error) => {
                    let fault = Fault::new(FaultCode::InvalidImage, error.to_string());
                    self.scaleset_set_failed(scaleset, fault).await?;
                    return Ok(());
                }
            };
            if image_os != pool.os {
                let fault = Fault::new(
                    FaultCode::InvalidRequest,
                    format!("invalid os (got: {image_os} needed: {})", pool.os),
                );
                self.scaleset_set_failed(scaleset, fault).await?;
                return Ok(());
            }
        }

        self.scaleset_set_state(scaleset, ScalesetState::Setup).await
    }

    async fn scaleset_setup(&self, scaleset: &mut Scaleset) -> Result<(), EngineError> {
        tracing::info!(scaleset_id = %scaleset.scaleset_id, "scaleset setup");

        let network_id = match self.cloud.get_network_id(&scaleset.region).await {
            Some(network_id) => network_id,
            None => {
                tracing::info!(
                    region = %scaleset.region,
                    scaleset_id = %scaleset.scaleset_id,
                    "creating network"
                );
                if let Err(error) = self.cloud.create_network(&scaleset.region).await {
                    let fault = Fault::new(FaultCode::UnableToCreateNetwork, error.to_string());
                    self.scaleset_set_failed(scaleset, fault).await?;
                }
                // Wait for the network on a later tick.
                return Ok(());
            }
        };

        let Some(auth) = scaleset.auth.clone() else {
            let fault = Fault::new(FaultCode::UnableToCreate, "missing required auth");
            self.scaleset_set_failed(scaleset, fault).await?;
            return Ok(());
        };

        match self.cloud.get_vmss(scaleset.scaleset_id).await {
            None => {
                tracing::info!(scaleset_id = %scaleset.scaleset_id, "creating scaleset");
                let instance_config = self.instance_config().await?;
                let params = VmssParams {
                    scaleset_id: scaleset.scaleset_id,
                    region: scaleset.region.clone(),
                    vm_sku: scaleset.vm_sku.clone(),
                    image: scaleset.image.clone(),
                    size: scaleset.size,
                    network_id,
                    spot_instances: scaleset.spot_instances,
                    ephemeral_os_disks: scaleset.ephemeral_os_disks,
                    auth,
                    extensions: instance_config.extensions.clone(),
                    tags: scaleset
                        .tags
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .chain(
                            instance_config
                                .vmss_tags
                                .iter()
                                .map(|(k, v)| (k.clone(), v.clone())),
                        )
                        .collect(),
                };
                if let Err(error) = self.cloud.create_vmss(params).await {
                    let fault = Fault::new(FaultCode::UnableToCreate, error.to_string());
                    self.scaleset_set_failed(scaleset, fault).await?;
                }
            }
            Some(vmss) if vmss.provisioning_state == ProvisioningState::Creating => {
                tracing::info!(
                    scaleset_id = %scaleset.scaleset_id,
                    "waiting on scaleset creation"
                );
                self.scaleset_try_set_identity(scaleset, vmss.principal_id).await?;
            }
            Some(vmss) => {
                tracing::info!(scaleset_id = %scaleset.scaleset_id, "scaleset running");
                if scaleset.client_object_id.is_none() && vmss.principal_id.is_none() {
                    let fault = Fault::new(
                        FaultCode::VmCreateFailed,
                        "the scaleset is expected to have exactly 1 user assigned identity",
                    );
                    self.scaleset_set_failed(scaleset, fault).await?;
                    return Ok(());
                }
                self.scaleset_try_set_identity(scaleset, vmss.principal_id).await?;
                self.scaleset_set_state(scaleset, ScalesetState::Running).await?;
            }
        }
        Ok(())
    }

    async fn scaleset_try_set_identity(
        &self,
        scaleset: &mut Scaleset,
        principal_id: Option<uuid::Uuid>,
    ) -> Result<(), EngineError> {
        if scaleset.client_object_id.is_some() {
            return Ok(());
        }
        if let Some(principal_id) = principal_id {
            scaleset.client_object_id = Some(principal_id);
            self.store.save(scaleset).await?;
        }
        Ok(())
    }

    async fn resize_equal(&self, scaleset: &mut Scaleset) -> Result<(), EngineError> {
        // The only place the scaleset returns to `running`, so its view of
        // the size always agrees with the cloud when it does.
        let node_count =
            self.search_nodes(None, Some(scaleset.scaleset_id), None).await?.len() as u64;
        if node_count == scaleset.size {
            tracing::info!(scaleset_id = %scaleset.scaleset_id, "resize finished");
            self.scaleset_set_state(scaleset, ScalesetState::Running).await?;
        } else {
            tracing::info!(
                scaleset_id = %scaleset.scaleset_id,
                checked_in = node_count,
                size = scaleset.size,
                "resize finished, waiting for nodes to check in"
            );
        }
        Ok(())
    }

    async fn resize_grow(&self, scaleset: &Scaleset) -> Result<(), EngineError> {
        match self.cloud.resize_vmss(scaleset.scaleset_id, scaleset.size).await {
            Ok(()) => Ok(()),
            Err(CloudError::UnableToUpdate) => {
                tracing::info!(
                    scaleset_id = %scaleset.scaleset_id,
                    "scaleset is mid-operation already"
                );
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn resize_shrink(
        &self,
        scaleset: &mut Scaleset,
        to_remove: u64,
    ) -> Result<(), EngineError> {
        tracing::info!(
            scaleset_id = %scaleset.scaleset_id,
            to_remove,
            "shrinking scaleset"
        );
        ShrinkQueue::new(scaleset.scaleset_id, &self.queues).set_size(to_remove as usize).await;

        for node in self.search_nodes(None, Some(scaleset.scaleset_id), None).await? {
            self.node_send_stop_if_free(&node).await?;
        }
        Ok(())
    }

    async fn scaleset_resize(&self, scaleset: &mut Scaleset) -> Result<(), EngineError> {
        tracing::info!(
            scaleset_id = %scaleset.scaleset_id,
            size = scaleset.size,
            "scaleset resize"
        );

        // Reset the node delete queue; resize decides shrinkage afresh.
        ShrinkQueue::new(scaleset.scaleset_id, &self.queues).clear().await;

        scaleset.size = scaleset.size.min(self.scaleset_max_size(&scaleset.image));

        // The cloud's knowledge of the size is ground truth.
        let Some(actual) = self.cloud.get_vmss_size(scaleset.scaleset_id).await else {
            tracing::info!(scaleset_id = %scaleset.scaleset_id, "scaleset is unavailable");
            // A missing scaleset was deleted out from under the service;
            // clean up through the deletion path.
            self.scaleset_set_shutdown(scaleset, true).await?;
            return Ok(());
        };

        if actual == scaleset.size {
            self.resize_equal(scaleset).await
        } else if scaleset.size > actual {
            self.resize_grow(scaleset).await
        } else {
            self.resize_shrink(scaleset, actual - scaleset.size).await
        }
    }

    /// Adopt cloud-observed size drift (manual changes, spot evictions).
    pub async fn sync_scaleset_size(&self, scaleset: &mut Scaleset) -> Result<(), EngineError> {
        if scaleset.state != ScalesetState::Running {
            return Ok(());
        }

        let Some(size) = self.cloud.get_vmss_size(scaleset.scaleset_id).await else {
            tracing::info!(scaleset_id = %scaleset.scaleset_id, "scaleset is unavailable");
            self.scaleset_set_shutdown(scaleset, true).await?;
            return Ok(());
        };

        if size != scaleset.size {
            tracing::info!(
                scaleset_id = %scaleset.scaleset_id,
                expected = scaleset.size,
                actual = size,
                "unexpected scaleset size, adopting"
            );
            scaleset.size = size;
            self.store.save(scaleset).await?;
        }
        Ok(())
    }

    async fn scaleset_shutdown(&self, scaleset: &mut Scaleset) -> Result<(), EngineError> {
        let Some(size) = self.cloud.get_vmss_size(scaleset.scaleset_id).await else {
            tracing::info!(
                scaleset_id = %scaleset.scaleset_id,
                "scaleset shutdown: scaleset already deleted"
            );
            return self.scaleset_halt(scaleset).await;
        };

        tracing::info!(scaleset_id = %scaleset.scaleset_id, size, "scaleset shutdown");
        for mut node in self.search_nodes(None, Some(scaleset.scaleset_id), None).await? {
            self.node_set_shutdown(&mut node).await?;
        }
        if size == 0 {
            self.scaleset_halt(scaleset).await?;
        }
        Ok(())
    }

    pub(crate) async fn scaleset_halt(&self, scaleset: &mut Scaleset) -> Result<(), EngineError> {
        ShrinkQueue::new(scaleset.scaleset_id, &self.queues).delete().await;

        for node in self.search_nodes(None, Some(scaleset.scaleset_id), None).await? {
            tracing::info!(
                scaleset_id = %scaleset.scaleset_id,
                machine_id = %node.machine_id,
                "deleting node"
            );
            self.node_delete(&node).await?;
        }

        tracing::info!(scaleset_id = %scaleset.scaleset_id, "scaleset delete starting");
        match self.cloud.delete_vmss(scaleset.scaleset_id).await {
            Ok(true) => {
                tracing::info!(scaleset_id = %scaleset.scaleset_id, "scaleset deleted");
                self.store.delete(scaleset).await?;
                self.send_event(Event::ScalesetDeleted {
                    scaleset_id: scaleset.scaleset_id,
                    pool_name: scaleset.pool_name.clone(),
                })
                .await;
            }
            Ok(false) => {
                self.store.save(scaleset).await?;
            }
            Err(CloudError::UnableToUpdate) => {
                tracing::debug!(
                    scaleset_id = %scaleset.scaleset_id,
                    "scaleset delete blocked by in-flight update"
                );
                self.store.save(scaleset).await?;
            }
            Err(error) => return Err(error.into()),
        }
        Ok(())
    }

    /// Reconcile node rows against cloud truth and dispose of nodes that
    /// are done. Returns whether the scaleset was modified in the cloud.
    pub async fn cleanup_nodes(&self, scaleset: &mut Scaleset) -> Result<bool, EngineError> {
        tracing::info!(scaleset_id = %scaleset.scaleset_id, "cleaning up nodes");

        if scaleset.state == ScalesetState::Halt {
            tracing::info!(scaleset_id = %scaleset.scaleset_id, "halting scaleset");
            self.scaleset_halt(scaleset).await?;
            return Ok(true);
        }

        let Some(pool) = self.get_pool_by_name(&scaleset.pool_name).await? else {
            tracing::error!(
                scaleset_id = %scaleset.scaleset_id,
                "unable to find pool during cleanup"
            );
            let fault = Fault::new(FaultCode::UnableToFind, "unable to find pool");
            self.scaleset_set_failed(scaleset, fault).await?;
            return Ok(true);
        };

        self.reimage_long_lived_nodes(scaleset.scaleset_id).await?;

        let mut to_reimage: Vec<Node> = Vec::new();
        let mut to_delete: Vec<Node> = Vec::new();

        // Ground truth of existing instances.
        let azure_nodes = self.cloud.list_instance_ids(scaleset.scaleset_id).await;
        let nodes = self.search_nodes(None, Some(scaleset.scaleset_id), None).await?;

        // Rows whose instance vanished from the cloud.
        for node in &nodes {
            if !azure_nodes.contains_key(&node.machine_id) {
                tracing::info!(
                    scaleset_id = %scaleset.scaleset_id,
                    machine_id = %node.machine_id,
                    "no longer in scaleset"
                );
                self.node_delete(node).await?;
            }
        }

        // Instances the cloud knows about that never checked in (broken OS
        // setup and the like). Creating the row starts the dead-node clock
        // that will eventually reimage them.
        for machine_id in azure_nodes.keys() {
            if nodes.iter().any(|node| node.machine_id == *machine_id) {
                continue;
            }
            tracing::info!(
                scaleset_id = %scaleset.scaleset_id,
                %machine_id,
                "adding missing azure node"
            );
            // `if_absent` keeps a concurrent check-in from being clobbered.
            self.create_node(
                pool.name.clone(),
                *machine_id,
                Some(scaleset.scaleset_id),
                &self.config.version,
                true,
            )
            .await?;
        }

        let existing: Vec<&Node> =
            nodes.iter().filter(|node| azure_nodes.contains_key(&node.machine_id)).collect();

        for node in existing {
            if !node.state.ready_for_reset() {
                continue;
            }
            let mut node = node.clone();
            if node.delete_requested {
                to_delete.push(node);
            } else if ShrinkQueue::new(scaleset.scaleset_id, &self.queues).should_shrink().await
            {
                self.node_set_halt(&mut node).await?;
                to_delete.push(node);
            } else if ShrinkQueue::new(pool.pool_id, &self.queues).should_shrink().await {
                self.node_set_halt(&mut node).await?;
                to_delete.push(node);
            } else {
                to_reimage.push(node);
            }
        }

        let dead_nodes =
            self.get_dead_nodes(scaleset.scaleset_id, NODE_EXPIRATION_TIME).await?;
        if !dead_nodes.is_empty() {
            tracing::info!(
                scaleset_id = %scaleset.scaleset_id,
                count = dead_nodes.len(),
                "reimaging uninitialized nodes or nodes with expired heartbeats"
            );
            for mut node in dead_nodes {
                let detail = match node.heartbeat {
                    Some(heartbeat) => {
                        format!("node reimaged due to expired heartbeat; last heartbeat:{heartbeat}")
                    }
                    None => "node reimaged due to never receiving a heartbeat".to_string(),
                };
                let fault = Fault::with_errors(
                    FaultCode::TaskFailed,
                    vec![
                        detail,
                        format!(
                            "scaleset_id:{} machine_id:{}",
                            scaleset.scaleset_id, node.machine_id
                        ),
                    ],
                );
                self.mark_tasks_stopped_early(&node, Some(fault)).await?;
                self.node_to_reimage(&mut node, true).await?;
                if !to_reimage.iter().any(|queued| queued.machine_id == node.machine_id) {
                    to_reimage.push(node);
                }
            }
        }

        // Perform operations until they fail due to the scaleset getting
        // locked by an in-flight update.
        let strategy = self.config.disposal_strategy;
        let modified = !to_reimage.is_empty() || !to_delete.is_empty();
        let result = async {
            self.reimage_nodes(scaleset, to_reimage, strategy).await?;
            self.delete_nodes(scaleset, to_delete, strategy).await
        }
        .await;
        if let Err(EngineError::Cloud(CloudError::UnableToUpdate)) = result {
            tracing::info!(
                scaleset_id = %scaleset.scaleset_id,
                "scaleset update already in progress"
            );
        } else {
            result?;
        }

        Ok(modified)
    }

    pub(crate) async fn delete_nodes(
        &self,
        scaleset: &mut Scaleset,
        nodes: Vec<Node>,
        _strategy: NodeDisposalStrategy,
    ) -> Result<(), EngineError> {
        if nodes.is_empty() {
            tracing::info!(scaleset_id = %scaleset.scaleset_id, "no nodes to delete");
            return Ok(());
        }

        let mut nodes = nodes;
        for node in nodes.iter_mut() {
            self.node_set_halt(node).await?;
        }

        if scaleset.state == ScalesetState::Halt {
            tracing::info!(
                scaleset_id = %scaleset.scaleset_id,
                "scaleset halting, ignoring node deletion"
            );
            return Ok(());
        }

        let mut machine_ids = BTreeSet::new();
        for node in &nodes {
            if node.debug_keep_node {
                tracing::warn!(
                    scaleset_id = %scaleset.scaleset_id,
                    machine_id = %node.machine_id,
                    "not deleting manually overridden node"
                );
            } else {
                machine_ids.insert(node.machine_id);
            }
        }
        if machine_ids.is_empty() {
            return Ok(());
        }

        tracing::info!(
            scaleset_id = %scaleset.scaleset_id,
            count = machine_ids.len(),
            "deleting nodes"
        );
        self.cloud.delete_vmss_nodes(scaleset.scaleset_id, &machine_ids).await?;
        for node in &nodes {
            if machine_ids.contains(&node.machine_id) {
                self.node_delete(node).await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn reimage_nodes(
        &self,
        scaleset: &mut Scaleset,
        nodes: Vec<Node>,
        strategy: NodeDisposalStrategy,
    ) -> Result<(), EngineError> {
        if nodes.is_empty() {
            tracing::info!(scaleset_id = %scaleset.scaleset_id, "no nodes to reimage");
            return Ok(());
        }

        if scaleset.state == ScalesetState::Shutdown {
            tracing::info!(
                scaleset_id = %scaleset.scaleset_id,
                "scaleset shutting down, deleting rather than reimaging nodes"
            );
            self.delete_nodes(scaleset, nodes, strategy).await?;
            return Ok(());
        }

        if scaleset.state == ScalesetState::Halt {
            tracing::info!(
                scaleset_id = %scaleset.scaleset_id,
                "scaleset halting, ignoring node reimage"
            );
            return Ok(());
        }

        let mut machine_ids = BTreeSet::new();
        for node in &nodes {
            if node.state != NodeState::Done {
                continue;
            }
            if node.debug_keep_node {
                tracing::warn!(
                    scaleset_id = %scaleset.scaleset_id,
                    machine_id = %node.machine_id,
                    "not reimaging manually overridden node"
                );
            } else {
                machine_ids.insert(node.machine_id);
            }
        }

        if machine_ids.is_empty() {
            tracing::info!(scaleset_id = %scaleset.scaleset_id, "no nodes to reimage");
            return Ok(());
        }

        match strategy {
            NodeDisposalStrategy::AggressiveDelete => {
                let selected = nodes
                    .into_iter()
                    .filter(|node| machine_ids.contains(&node.machine_id))
                    .collect();
                self.delete_nodes(scaleset, selected, strategy).await?;
            }
            NodeDisposalStrategy::ScaleIn => {
                self.cloud.reimage_vmss_nodes(scaleset.scaleset_id, &machine_ids).await?;
                for node in &nodes {
                    if machine_ids.contains(&node.machine_id) {
                        self.node_delete(node).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Refresh VM extensions when flagged (the daily tick sets the flag).
    pub async fn scaleset_update_configs(
        &self,
        scaleset: &mut Scaleset,
    ) -> Result<(), EngineError> {
        if scaleset.state == ScalesetState::Halt {
            tracing::info!(
                scaleset_id = %scaleset.scaleset_id,
                "not updating configs, scaleset is set to be deleted"
            );
            return Ok(());
        }
        if !scaleset.needs_config_update {
            return Ok(());
        }

        tracing::info!(scaleset_id = %scaleset.scaleset_id, "updating scaleset configs");
        let instance_config = self.instance_config().await?;
        match self
            .cloud
            .update_extensions(scaleset.scaleset_id, instance_config.extensions.clone())
            .await
        {
            Ok(()) => {
                scaleset.needs_config_update = false;
                self.store.save(scaleset).await?;
            }
            Err(CloudError::UnableToUpdate) => {
                tracing::info!(
                    scaleset_id = %scaleset.scaleset_id,
                    "unable to update configs, update already in progress"
                );
            }
            Err(error) => return Err(error.into()),
        }
        Ok(())
    }

    /// One state-machine step.
    pub async fn scaleset_process_state_update(
        &self,
        scaleset: &mut Scaleset,
    ) -> Result<(), EngineError> {
        match scaleset.state {
            ScalesetState::Init => self.scaleset_init(scaleset).await,
            ScalesetState::Setup => self.scaleset_setup(scaleset).await,
            ScalesetState::Resize => self.scaleset_resize(scaleset).await,
            ScalesetState::Shutdown => self.scaleset_shutdown(scaleset).await,
            ScalesetState::Halt => self.scaleset_halt(scaleset).await,
            ScalesetState::Running | ScalesetState::CreationFailed => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "scalesets_tests.rs"]
mod tests;
