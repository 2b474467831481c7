// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer entrypoints.
//!
//! Each tick catches failures at the entity boundary: one entity's error
//! (including optimistic-concurrency conflicts) is logged and the entity
//! is left for the next tick, never aborting the sweep.

use crate::engine::Engine;
use crate::error::EngineError;
use of_core::job::JobState;
use of_core::node::NodeState;
use of_core::pool::PoolState;
use of_core::proxy::VmState;
use of_core::task::TaskState;
use of_core::{Clock, MachineId, TaskId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cap on state-machine steps per entity per tick. The reconcilers are
/// expected to reach a fixed point in one step; this is a safety valve
/// against ping-ponging handlers.
pub const MAX_STATE_UPDATES: usize = 5;

pub const NODE_HEARTBEAT_QUEUE: &str = "node-heartbeat";

/// Blob-created notifications from the data storage account.
pub const FILE_CHANGES_QUEUE: &str = "file-changes";

/// Status updates posted by proxy VMs.
pub const PROXY_UPDATE_QUEUE: &str = "proxy";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeHeartbeatEntry {
    pub node_id: MachineId,
}

/// The storage-event subset the file-changes handler consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChangeEvent {
    pub topic: String,
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub data: FileChangeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChangeData {
    pub url: String,
}

pub const BLOB_CREATED_EVENT: &str = "Microsoft.Storage.BlobCreated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHeartbeatEntry {
    pub task_id: TaskId,
    pub machine_id: MachineId,
}

fn log_entity_error(kind: &str, id: &dyn std::fmt::Display, error: &EngineError) {
    if error.is_conflict() {
        tracing::debug!(kind, %id, "entity advanced by another worker, retrying next tick");
    } else {
        tracing::error!(kind, %id, %error, "entity update failed, retrying next tick");
    }
}

macro_rules! advance {
    ($self:expr, $kind:literal, $entity:expr, $id:expr, $handler:ident) => {{
        for _ in 0..MAX_STATE_UPDATES {
            let before = $entity.state;
            tracing::info!(kind = $kind, id = %$id, state = %before, "processing state update");
            if let Err(error) = $self.$handler(&mut $entity).await {
                log_entity_error($kind, &$id, &error);
                break;
            }
            if $entity.state == before {
                break;
            }
        }
    }};
}

impl<K: Clock> Engine<K> {
    /// Job/task expiry, job and task state machines, and the scheduler.
    pub async fn tasks_tick(&self) {
        match self.search_expired_tasks().await {
            Ok(expired) => {
                for mut task in expired {
                    tracing::info!(
                        job_id = %task.job_id,
                        task_id = %task.task_id,
                        "stopping expired task"
                    );
                    if let Err(error) = self.task_mark_stopping(&mut task).await {
                        log_entity_error("task", &task.task_id, &error);
                    }
                }
            }
            Err(error) => tracing::error!(%error, "expired task search failed"),
        }

        match self.search_expired_jobs().await {
            Ok(expired) => {
                for mut job in expired {
                    tracing::info!(job_id = %job.job_id, "stopping expired job");
                    if let Err(error) = self.job_stopping(&mut job).await {
                        log_entity_error("job", &job.job_id, &error);
                    }
                }
            }
            Err(error) => tracing::error!(%error, "expired job search failed"),
        }

        match self.search_jobs(JobState::needs_work()).await {
            Ok(jobs) => {
                for mut job in jobs {
                    let job_id = job.job_id;
                    advance!(self, "job", job, job_id, job_process_state_update);
                }
            }
            Err(error) => tracing::error!(%error, "job search failed"),
        }

        match self.search_tasks(None, Some(TaskState::needs_work())).await {
            Ok(tasks) => {
                for mut task in tasks {
                    let task_id = task.task_id;
                    advance!(self, "task", task, task_id, task_process_state_update);
                }
            }
            Err(error) => tracing::error!(%error, "task search failed"),
        }

        if let Err(error) = self.schedule_tasks().await {
            tracing::error!(%error, "scheduling pass failed");
        }
    }

    /// Pools, autoscaling, node sweeps, and scaleset reconciliation.
    pub async fn workers_tick(&self) {
        // Pools first, so scalesets affected by pool shutdown/resize are
        // handled this tick rather than the next.
        match self.all_pools().await {
            Ok(pools) => {
                for mut pool in pools {
                    if PoolState::needs_work().contains(&pool.state) {
                        tracing::info!(pool_id = %pool.pool_id, name = %pool.name, "update pool");
                        let pool_id = pool.pool_id;
                        advance!(self, "pool", pool, pool_id, pool_process_state_update);
                    } else if pool.state.available() && pool.autoscale.is_some() {
                        if let Err(error) = self.autoscale_pool(&pool).await {
                            log_entity_error("pool", &pool.pool_id, &error);
                        }
                    }
                }
            }
            Err(error) => tracing::error!(%error, "pool search failed"),
        }

        if let Err(error) = self.mark_outdated_nodes().await {
            tracing::error!(%error, "outdated node sweep failed");
        }
        if let Err(error) = self.cleanup_busy_nodes_without_work().await {
            tracing::error!(%error, "busy node sweep failed");
        }

        // Nodes and scalesets in a consistent order, so pools scaling down
        // keep removing from the same scalesets and reach empty ones.
        match self.search_nodes(None, None, Some(NodeState::needs_work())).await {
            Ok(mut nodes) => {
                nodes.sort_by_key(|node| node.machine_id);
                for mut node in nodes {
                    let machine_id = node.machine_id;
                    advance!(self, "node", node, machine_id, node_process_state_update);
                }
            }
            Err(error) => tracing::error!(%error, "node search failed"),
        }

        match self.all_scalesets().await {
            Ok(mut scalesets) => {
                scalesets.sort_by_key(|scaleset| scaleset.scaleset_id);
                for mut scaleset in scalesets {
                    if let Err(error) = self.process_scaleset(&mut scaleset).await {
                        log_entity_error("scaleset", &scaleset.scaleset_id, &EngineError::from(error));
                    }
                }
            }
            Err(error) => tracing::error!(%error, "scaleset search failed"),
        }
    }

    async fn process_scaleset(
        &self,
        scaleset: &mut of_core::Scaleset,
    ) -> Result<(), EngineError> {
        tracing::debug!(scaleset_id = %scaleset.scaleset_id, "checking scaleset for updates");

        self.scaleset_update_configs(scaleset).await?;

        // If cleanup touched the scaleset in the cloud, let it settle
        // before doing anything else this tick.
        if self.cleanup_nodes(scaleset).await? {
            tracing::debug!(scaleset_id = %scaleset.scaleset_id, "scaleset needed cleanup");
            return Ok(());
        }

        self.sync_scaleset_size(scaleset).await?;

        for _ in 0..MAX_STATE_UPDATES {
            let before = scaleset.state;
            self.scaleset_process_state_update(scaleset).await?;
            if scaleset.state == before {
                break;
            }
        }
        Ok(())
    }

    /// Proxy health, state machines, and region coverage.
    pub async fn proxy_tick(&self) {
        let proxies = match self.all_proxies().await {
            Ok(proxies) => proxies,
            Err(error) => {
                tracing::error!(%error, "proxy search failed");
                return;
            }
        };

        for mut proxy in proxies.clone() {
            let result = self.process_proxy(&mut proxy).await;
            if let Err(error) = result {
                log_entity_error("proxy", &proxy.proxy_id, &error);
            }
        }

        // Make sure there is a usable proxy for every active region.
        let scalesets = match self.all_scalesets().await {
            Ok(scalesets) => scalesets,
            Err(error) => {
                tracing::error!(%error, "scaleset search failed");
                return;
            }
        };
        let mut regions: Vec<_> = scalesets.into_iter().map(|scaleset| scaleset.region).collect();
        regions.sort();
        regions.dedup();
        for region in regions {
            let all_outdated = proxies
                .iter()
                .filter(|proxy| proxy.region == region)
                .all(|proxy| proxy.outdated);
            if all_outdated {
                tracing::info!(%region, "creating proxy for region");
                if let Err(error) = self.get_or_create_proxy(&region).await {
                    tracing::error!(%region, %error, "proxy create failed");
                }
            }
        }
    }

    async fn process_proxy(&self, proxy: &mut of_core::Proxy) -> Result<(), EngineError> {
        if proxy.state.available() {
            // Outdated is checked here but set at the end of the loop, so
            // a proxy handed out mid-tick isn't stopped under the caller.
            if proxy.outdated && !self.proxy_is_used(proxy).await? {
                self.proxy_set_state(proxy, VmState::Stopping).await?;
            } else if !self.proxy_is_alive(proxy) {
                tracing::error!(region = %proxy.region, "proxy alive check failed, stopping");
                self.proxy_set_state(proxy, VmState::Stopping).await?;
            } else {
                self.save_proxy_config(proxy).await?;
            }
        }

        if VmState::needs_work().contains(&proxy.state) {
            tracing::info!(region = %proxy.region, state = %proxy.state, "proxy update state");
            for _ in 0..MAX_STATE_UPDATES {
                let before = proxy.state;
                self.proxy_process_state_update(proxy).await?;
                if proxy.state == before || proxy.state == VmState::Stopped {
                    break;
                }
            }
        }

        if proxy.state != VmState::Stopped && self.proxy_is_outdated(proxy) && !proxy.outdated {
            proxy.outdated = true;
            self.store.save(proxy).await?;
        }
        Ok(())
    }

    /// Daily maintenance: proxy rotation, scaleset config refresh, and
    /// webhook log retention.
    pub async fn daily_tick(&self) {
        match self.all_proxies().await {
            Ok(proxies) => {
                for mut proxy in proxies {
                    if self.proxy_is_outdated(&proxy) && !proxy.outdated {
                        tracing::info!(region = %proxy.region, "marking proxy as outdated");
                        proxy.outdated = true;
                        if let Err(error) = self.store.save(&mut proxy).await {
                            log_entity_error("proxy", &proxy.proxy_id, &EngineError::from(error));
                            continue;
                        }
                    }
                    if proxy.outdated {
                        match self.proxy_is_used(&proxy).await {
                            Ok(false) => {
                                if let Err(error) =
                                    self.proxy_set_state(&mut proxy, VmState::Stopping).await
                                {
                                    log_entity_error("proxy", &proxy.proxy_id, &error);
                                }
                            }
                            Ok(true) => {}
                            Err(error) => log_entity_error("proxy", &proxy.proxy_id, &error),
                        }
                    }
                }
            }
            Err(error) => tracing::error!(%error, "proxy search failed"),
        }

        match self.all_scalesets().await {
            Ok(scalesets) => {
                for mut scaleset in scalesets {
                    tracing::info!(scaleset_id = %scaleset.scaleset_id, "flagging scaleset configs");
                    scaleset.needs_config_update = true;
                    if let Err(error) = self.store.save(&mut scaleset).await {
                        log_entity_error("scaleset", &scaleset.scaleset_id, &EngineError::from(error));
                    }
                }
            }
            Err(error) => tracing::error!(%error, "scaleset search failed"),
        }

        if let Err(error) = self.expire_webhook_logs().await {
            tracing::error!(%error, "webhook log expiry failed");
        }
    }

    /// Drain node and task heartbeats from their queues.
    pub async fn heartbeats_tick(&self) {
        let node_beats: Vec<of_storage::Received<NodeHeartbeatEntry>> = self
            .queues
            .receive(NODE_HEARTBEAT_QUEUE, of_storage::PEEK_MAX, Duration::from_secs(60))
            .await;
        for message in node_beats {
            if let Err(error) =
                self.queues.delete_message(NODE_HEARTBEAT_QUEUE, &message.message_id).await
            {
                tracing::error!(%error, "failed to delete node heartbeat message");
            }
            let Some(entry) = message.value else { continue };
            if let Err(error) = self.node_heartbeat(entry.node_id).await {
                log_entity_error("node", &entry.node_id, &error);
            }
        }

        let task_queue = crate::tasks::config::TASK_HEARTBEAT_QUEUE;
        let task_beats: Vec<of_storage::Received<TaskHeartbeatEntry>> =
            self.queues.receive(task_queue, of_storage::PEEK_MAX, Duration::from_secs(60)).await;
        for message in task_beats {
            if let Err(error) = self.queues.delete_message(task_queue, &message.message_id).await {
                tracing::error!(%error, "failed to delete task heartbeat message");
            }
            let Some(entry) = message.value else { continue };
            if let Err(error) = self.task_heartbeat(entry.task_id).await {
                log_entity_error("task", &entry.task_id, &error);
            }
        }
    }

    pub async fn task_heartbeat(&self, task_id: TaskId) -> Result<(), EngineError> {
        if let Some(mut task) = self.get_task(task_id).await? {
            task.heartbeat = Some(self.now());
            self.store.save(&mut task).await?;
        }
        Ok(())
    }

    /// Translate blob-created notifications into `file_added` events.
    /// Only blobs landing in the instance's data storage are interesting.
    pub async fn file_changes_tick(&self, data_storage_topic: &str) {
        let received: Vec<of_storage::Received<FileChangeEvent>> = self
            .queues
            .receive(FILE_CHANGES_QUEUE, of_storage::PEEK_MAX, Duration::from_secs(60))
            .await;
        for message in received {
            if let Err(error) =
                self.queues.delete_message(FILE_CHANGES_QUEUE, &message.message_id).await
            {
                tracing::error!(%error, "failed to delete file change message");
            }
            let Some(event) = message.value else { continue };
            if event.topic != data_storage_topic || event.event_type != BLOB_CREATED_EVENT {
                continue;
            }

            // Blob URLs are /account/container/path...
            let mut parts = event.data.url.splitn(5, '/').skip(3);
            let Some(container) = parts.next().filter(|part| !part.is_empty()) else {
                tracing::warn!(url = %event.data.url, "malformed blob url");
                continue;
            };
            let Some(path) = parts.next() else {
                tracing::warn!(url = %event.data.url, "blob url without path");
                continue;
            };
            tracing::info!(container, path, "file added");
            self.send_event(of_core::Event::FileAdded {
                container: of_core::Container::new(container),
                filename: path.to_string(),
            })
            .await;
        }
    }

    /// Merge status updates posted by proxy VMs.
    pub async fn proxy_updates_tick(&self) {
        let received: Vec<of_storage::Received<of_core::ProxyHeartbeat>> = self
            .queues
            .receive(PROXY_UPDATE_QUEUE, of_storage::PEEK_MAX, Duration::from_secs(60))
            .await;
        for message in received {
            if let Err(error) =
                self.queues.delete_message(PROXY_UPDATE_QUEUE, &message.message_id).await
            {
                tracing::error!(%error, "failed to delete proxy update message");
            }
            let Some(heartbeat) = message.value else { continue };
            let proxy: Result<Option<of_core::Proxy>, _> = self
                .store
                .get(&heartbeat.region, Some(&heartbeat.proxy_id.to_string()))
                .await;
            match proxy {
                Ok(Some(mut proxy)) => {
                    proxy.heartbeat = Some(heartbeat);
                    if let Err(error) = self.store.save(&mut proxy).await {
                        log_entity_error("proxy", &proxy.proxy_id, &error.into());
                    }
                }
                Ok(None) => {
                    tracing::warn!(
                        region = %heartbeat.region,
                        proxy_id = %heartbeat.proxy_id,
                        "received heartbeat for missing proxy"
                    );
                }
                Err(error) => {
                    log_entity_error("proxy", &heartbeat.proxy_id, &error.into());
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "ticks_tests.rs"]
mod tests;
