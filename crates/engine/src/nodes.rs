// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node lifecycle: commands, reset routing, and cleanup sweeps.

use crate::engine::Engine;
use crate::error::EngineError;
use chrono::Duration;
use of_core::node::{Node, NodeCommand, NodeMessage, NodeState, NodeTask};
use of_core::version::{LEGACY_AGENT_VERSION, STOP_IF_FREE_MIN_VERSION};
use of_core::{
    is_minimum_version, Clock, Event, Fault, FaultCode, MachineId, PoolName, ScalesetId, TaskId,
};
use of_storage::{Query, ShrinkQueue};

/// Nodes silent for longer than this are treated as dead and reimaged.
pub const NODE_EXPIRATION_TIME: Duration = Duration::hours(1);

/// Nodes older than this are opportunistically reimaged to pick up OS
/// patches without interrupting running work.
pub const NODE_REIMAGE_TIME: Duration = Duration::days(7);

/// Cap on outdated-node updates per tick to bound tick latency.
const MARK_OUTDATED_BATCH: usize = 500;

impl<K: Clock> Engine<K> {
    pub async fn get_node(&self, machine_id: MachineId) -> Result<Option<Node>, EngineError> {
        let mut nodes: Vec<Node> =
            self.store.search(Query::new().eq("machine_id", machine_id)).await?;
        if nodes.len() != 1 {
            return Ok(None);
        }
        Ok(nodes.pop())
    }

    pub async fn search_nodes(
        &self,
        pool_name: Option<&PoolName>,
        scaleset_id: Option<ScalesetId>,
        states: Option<&[NodeState]>,
    ) -> Result<Vec<Node>, EngineError> {
        let mut query = Query::new();
        if let Some(pool_name) = pool_name {
            query = query.eq("pool_name", pool_name);
        }
        if let Some(scaleset_id) = scaleset_id {
            query = query.eq("scaleset_id", scaleset_id);
        }
        if let Some(states) = states {
            query = query.any("state", states);
        }
        Ok(self.store.search(query).await?)
    }

    /// Insert a node row, emitting `node_created` on success. With
    /// `if_absent`, an existing row is left untouched (used when syncing
    /// cloud truth, so a checked-in node is not overwritten).
    pub async fn create_node(
        &self,
        pool_name: PoolName,
        machine_id: MachineId,
        scaleset_id: Option<ScalesetId>,
        version: &str,
        if_absent: bool,
    ) -> Result<Node, EngineError> {
        let mut node = Node::new(pool_name, machine_id, scaleset_id, version);
        let result = if if_absent {
            match self.store.insert(&mut node).await {
                Err(of_storage::StoreError::AlreadyExists) => return Ok(node),
                other => other,
            }
        } else {
            self.store.upsert(&mut node).await
        };
        result?;
        self.send_event(Event::NodeCreated {
            machine_id: node.machine_id,
            pool_name: node.pool_name.clone(),
            scaleset_id: node.scaleset_id,
        })
        .await;
        Ok(node)
    }

    pub(crate) async fn node_set_state(
        &self,
        node: &mut Node,
        state: NodeState,
    ) -> Result<(), EngineError> {
        if node.state != state {
            node.state = state;
            self.send_event(Event::NodeStateUpdated {
                machine_id: node.machine_id,
                pool_name: node.pool_name.clone(),
                state,
                scaleset_id: node.scaleset_id,
            })
            .await;
        }
        self.store.save(node).await?;
        Ok(())
    }

    pub(crate) async fn node_send_message(
        &self,
        machine_id: MachineId,
        command: NodeCommand,
    ) -> Result<(), EngineError> {
        let mut message = NodeMessage::new(machine_id, self.next_message_stamp(), command);
        self.store.upsert(&mut message).await?;
        Ok(())
    }

    pub async fn node_messages(
        &self,
        machine_id: MachineId,
        limit: Option<usize>,
    ) -> Result<Vec<NodeMessage>, EngineError> {
        let mut query = Query::new().eq("machine_id", machine_id);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        Ok(self.store.search(query).await?)
    }

    pub async fn clear_node_messages(&self, machine_id: MachineId) -> Result<(), EngineError> {
        tracing::info!(%machine_id, "clearing messages for node");
        for message in self.node_messages(machine_id, None).await? {
            self.store.delete(&message).await?;
        }
        Ok(())
    }

    /// Mark the node for reimage at the next safe point. With `done`, the
    /// node is also moved out of circulation immediately.
    pub async fn node_to_reimage(&self, node: &mut Node, done: bool) -> Result<(), EngineError> {
        if done && !node.state.ready_for_reset() {
            node.state = NodeState::Done;
        }

        if !node.reimage_requested && !node.delete_requested {
            tracing::info!(machine_id = %node.machine_id, "setting reimage_requested");
            node.reimage_requested = true;
        }

        // A node marked for reimage must not pick up new work either.
        self.node_send_stop_if_free(node).await?;

        self.store.save(node).await?;
        Ok(())
    }

    pub(crate) async fn node_send_stop_if_free(&self, node: &Node) -> Result<(), EngineError> {
        if is_minimum_version(&node.version, STOP_IF_FREE_MIN_VERSION) {
            self.node_send_message(node.machine_id, NodeCommand::StopIfFree {}).await?;
        }
        Ok(())
    }

    pub async fn node_stop(&self, node: &mut Node, done: bool) -> Result<(), EngineError> {
        self.node_to_reimage(node, done).await?;
        self.node_send_message(node.machine_id, NodeCommand::Stop {}).await?;
        Ok(())
    }

    /// Stop giving the node work but let it finish what it has.
    pub async fn node_set_shutdown(&self, node: &mut Node) -> Result<(), EngineError> {
        tracing::info!(machine_id = %node.machine_id, "setting delete_requested");
        node.delete_requested = true;
        self.store.save(node).await?;
        self.node_send_stop_if_free(node).await?;
        Ok(())
    }

    /// Tell the node to stop everything.
    pub async fn node_set_halt(&self, node: &mut Node) -> Result<(), EngineError> {
        tracing::info!(machine_id = %node.machine_id, "setting halt");
        node.delete_requested = true;
        self.node_stop(node, true).await?;
        self.node_set_state(node, NodeState::Halt).await?;
        Ok(())
    }

    pub async fn node_add_ssh_public_key(
        &self,
        node: &Node,
        public_key: &str,
    ) -> Result<(), EngineError> {
        if node.scaleset_id.is_none() {
            return Err(Fault::new(
                FaultCode::InvalidRequest,
                "only able to add ssh keys to scaleset nodes",
            )
            .into());
        }
        let mut public_key = public_key.to_string();
        if !public_key.ends_with('\n') {
            public_key.push('\n');
        }
        self.node_send_message(node.machine_id, NodeCommand::AddSshKey { public_key }).await?;
        Ok(())
    }

    pub async fn node_tasks(&self, machine_id: MachineId) -> Result<Vec<NodeTask>, EngineError> {
        Ok(self.store.search(Query::new().eq("machine_id", machine_id)).await?)
    }

    pub async fn nodes_by_task(&self, task_id: TaskId) -> Result<Vec<Node>, EngineError> {
        let entries: Vec<NodeTask> =
            self.store.search(Query::new().eq("task_id", task_id)).await?;
        let mut nodes = Vec::new();
        for entry in entries {
            if let Some(node) = self.get_node(entry.machine_id).await? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    pub async fn clear_node_tasks(&self, machine_id: MachineId) -> Result<(), EngineError> {
        tracing::info!(%machine_id, "clearing tasks for node");
        for entry in self.node_tasks(machine_id).await? {
            self.store.delete(&entry).await?;
        }
        Ok(())
    }

    /// Fail any tasks still assigned to this node. Used when a node is
    /// reimaged, deleted, or re-registers after an unclean stop.
    pub async fn mark_tasks_stopped_early(
        &self,
        node: &Node,
        error: Option<Fault>,
    ) -> Result<(), EngineError> {
        let error = error.unwrap_or_else(|| {
            Fault::new(
                FaultCode::TaskFailed,
                format!(
                    "node reimaged during task execution. machine_id:{}",
                    node.machine_id
                ),
            )
        });

        for entry in self.node_tasks(node.machine_id).await? {
            if let Some(mut task) = self.get_task(entry.task_id).await? {
                self.task_mark_failed(&mut task, error.clone()).await?;
            }
            if !node.debug_keep_node {
                self.store.delete(&entry).await?;
            }
        }
        Ok(())
    }

    /// Delete the node row and everything hanging off it.
    pub async fn node_delete(&self, node: &Node) -> Result<(), EngineError> {
        self.mark_tasks_stopped_early(node, None).await?;
        self.clear_node_tasks(node.machine_id).await?;
        self.clear_node_messages(node.machine_id).await?;
        self.store.delete(node).await?;
        self.send_event(Event::NodeDeleted {
            machine_id: node.machine_id,
            pool_name: node.pool_name.clone(),
            scaleset_id: node.scaleset_id,
        })
        .await;
        Ok(())
    }

    /// Send `stop_task` to every node currently running the task, and stop
    /// nodes that have nothing else to do.
    pub async fn stop_task_on_nodes(&self, task_id: TaskId) -> Result<(), EngineError> {
        for mut node in self.nodes_by_task(task_id).await? {
            self.node_send_message(node.machine_id, NodeCommand::StopTask { task_id }).await?;
            if !self.node_stop_if_complete(&mut node).await? {
                tracing::info!(
                    %task_id,
                    machine_id = %node.machine_id,
                    "stopped task on node, not reimaging due to other tasks"
                );
            }
        }
        Ok(())
    }

    /// Stop the node if every assigned task is already shutting down.
    /// Returns whether the node was stopped.
    pub async fn node_stop_if_complete(&self, node: &mut Node) -> Result<bool, EngineError> {
        for entry in self.node_tasks(node.machine_id).await? {
            match self.get_task(entry.task_id).await? {
                // Ignore unknown tasks when deciding whether to stop.
                None => continue,
                Some(task) => {
                    if !task.state.shutting_down() {
                        return Ok(false);
                    }
                }
            }
        }

        tracing::info!(
            machine_id = %node.machine_id,
            "stopping busy node with all tasks complete"
        );
        self.node_stop(node, true).await?;
        Ok(true)
    }

    /// Whether a scaleset shrink token authorizes this node to halt.
    pub(crate) async fn node_could_shrink_scaleset(&self, node: &Node) -> bool {
        match node.scaleset_id {
            Some(scaleset_id) => {
                ShrinkQueue::new(scaleset_id, &self.queues).should_shrink().await
            }
            None => false,
        }
    }

    pub(crate) fn node_is_outdated(&self, node: &Node) -> bool {
        node.version != self.config.version
    }

    pub(crate) fn node_is_too_old(&self, node: &Node) -> bool {
        node.scaleset_id.is_some()
            && node
                .meta
                .timestamp
                .is_some_and(|created| created < self.now() - NODE_REIMAGE_TIME)
    }

    /// Gate for work assignment. Nodes that will never take work again are
    /// stopped as a side effect.
    pub async fn node_can_process_new_work(&self, node: &mut Node) -> Result<bool, EngineError> {
        if self.node_is_outdated(node) {
            tracing::info!(
                machine_id = %node.machine_id,
                node_version = %node.version,
                service_version = %self.config.version,
                "can_process_new_work: agent and service versions differ, stopping node"
            );
            self.node_stop(node, true).await?;
            return Ok(false);
        }

        if self.node_is_too_old(node) {
            tracing::info!(machine_id = %node.machine_id, "can_process_new_work: node is too old");
            self.node_stop(node, true).await?;
            return Ok(false);
        }

        if !node.state.can_process_new_work() {
            return Ok(false);
        }

        if node.delete_requested || node.reimage_requested {
            self.node_stop(node, true).await?;
            return Ok(false);
        }

        if self.node_could_shrink_scaleset(node).await {
            tracing::info!(machine_id = %node.machine_id, "node scheduled to shrink");
            self.node_set_halt(node).await?;
            return Ok(false);
        }

        if let Some(scaleset_id) = node.scaleset_id {
            match self.get_scaleset(scaleset_id).await? {
                Some(scaleset) if scaleset.state.available() => {}
                _ => return Ok(false),
            }
        }

        match self.get_pool_by_name(&node.pool_name).await? {
            Some(pool) if pool.state.available() => {}
            _ => return Ok(false),
        }

        Ok(true)
    }

    /// Mark nodes not running the current service version for reimage.
    pub async fn mark_outdated_nodes(&self) -> Result<(), EngineError> {
        let outdated: Vec<Node> = self
            .store
            .search(
                Query::new()
                    .ne("version", &self.config.version)
                    .eq("reimage_requested", false)
                    .eq("delete_requested", false)
                    .limit(MARK_OUTDATED_BATCH),
            )
            .await?;
        for mut node in outdated {
            tracing::info!(
                machine_id = %node.machine_id,
                node_version = %node.version,
                service_version = %self.config.version,
                "node is outdated"
            );
            if node.version == LEGACY_AGENT_VERSION {
                self.node_to_reimage(&mut node, true).await?;
            } else {
                self.node_to_reimage(&mut node, false).await?;
            }
        }
        Ok(())
    }

    /// Busy nodes whose tasks all finished can race concurrent
    /// `stop_task` calls; this sweep catches them.
    pub async fn cleanup_busy_nodes_without_work(&self) -> Result<(), EngineError> {
        for mut node in self.search_nodes(None, None, Some(&[NodeState::Busy])).await? {
            self.node_stop_if_complete(&mut node).await?;
        }
        Ok(())
    }

    /// Nodes with an expired heartbeat, or no heartbeat and an old row.
    pub async fn get_dead_nodes(
        &self,
        scaleset_id: ScalesetId,
        expiration: Duration,
    ) -> Result<Vec<Node>, EngineError> {
        let cutoff = self.now() - expiration;
        let nodes = self.search_nodes(None, Some(scaleset_id), None).await?;
        Ok(nodes
            .into_iter()
            .filter(|node| match node.heartbeat {
                Some(heartbeat) => heartbeat < cutoff,
                None => node.meta.timestamp.is_some_and(|created| created < cutoff),
            })
            .collect())
    }

    /// Mark excessively long lived nodes for reimage, keeping scalesets on
    /// `latest` image SKUs reasonably patched without disrupting running
    /// tasks.
    pub async fn reimage_long_lived_nodes(
        &self,
        scaleset_id: ScalesetId,
    ) -> Result<(), EngineError> {
        let cutoff = self.now() - NODE_REIMAGE_TIME;
        let nodes: Vec<Node> = self
            .store
            .search(
                Query::new()
                    .eq("scaleset_id", scaleset_id)
                    .eq("reimage_requested", false)
                    .eq("delete_requested", false)
                    .before(of_storage::ROW_TIMESTAMP_FIELD, cutoff),
            )
            .await?;
        for mut node in nodes {
            if node.debug_keep_node {
                tracing::info!(
                    %scaleset_id,
                    machine_id = %node.machine_id,
                    "removing debug_keep_node for expired node"
                );
                node.debug_keep_node = false;
            }
            self.node_to_reimage(&mut node, false).await?;
        }
        Ok(())
    }

    pub async fn node_heartbeat(&self, machine_id: MachineId) -> Result<(), EngineError> {
        if let Some(mut node) = self.get_node(machine_id).await? {
            node.heartbeat = Some(self.now());
            self.store.save(&mut node).await?;
        }
        Ok(())
    }

    /// Reset states are handled by scaleset cleanup rather than a per-node
    /// handler; the exhaustive match keeps the state machine visibly
    /// covered.
    pub async fn node_process_state_update(&self, node: &mut Node) -> Result<(), EngineError> {
        match node.state {
            NodeState::Init
            | NodeState::Free
            | NodeState::SettingUp
            | NodeState::Rebooting
            | NodeState::Ready
            | NodeState::Busy => {}
            NodeState::Done | NodeState::Shutdown | NodeState::Halt => {
                // Reimage/delete is batched in cleanup_nodes.
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "nodes_tests.rs"]
mod tests;
