// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-facing operations: registration, state updates, worker events,
//! and command polling.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::task_event::TaskEvent;
use of_core::node::{Node, NodeState, NodeTask, NodeTaskState};
use of_core::task::{TaskDebugFlag, TaskState};
use of_core::{Clock, Fault, FaultCode, MachineId, Pool};
use of_storage::QueueSas;
use of_wire::{
    AgentRegistration, AgentRegistrationPost, NodeCommandEnvelope, NodeEvent, NodeEventEnvelope,
    NodeStateUpdate, PendingNodeCommand, WorkerEvent,
};

/// Worker stdout/stderr tails are truncated to this many bytes before
/// being persisted on the task error.
pub const MAX_OUTPUT_SIZE: usize = 4096;

fn tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    // Respect char boundaries when the cut lands mid-codepoint.
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

impl<K: Clock> Engine<K> {
    fn registration_response(&self, pool: &Pool) -> AgentRegistration {
        AgentRegistration {
            events_url: format!("{}/api/agents/events", self.config.base_url),
            commands_url: format!("{}/api/agents/commands", self.config.base_url),
            work_queue: self.queues.sas_url(&pool.queue_name(), QueueSas::consume()),
        }
    }

    /// Create or refresh a node registration. Idempotent: re-registering
    /// resets the node to `init` and fails any tasks left behind by a
    /// prior boot.
    pub async fn register_node(
        &self,
        request: AgentRegistrationPost,
    ) -> Result<AgentRegistration, EngineError> {
        tracing::info!(machine_id = %request.machine_id, pool = %request.pool_name, "registration request");

        let Some(pool) = self.get_pool_by_name(&request.pool_name).await? else {
            return Err(Fault::new(
                FaultCode::InvalidRequest,
                format!("unable to find pool '{}'", request.pool_name),
            )
            .into());
        };

        let mut node = match self.get_node(request.machine_id).await? {
            Some(mut node) => {
                if node.version != request.version {
                    self.clear_node_messages(node.machine_id).await?;
                }
                node.version = request.version;
                node.reimage_requested = false;
                node.state = NodeState::Init;
                node
            }
            None => Node::new(
                request.pool_name,
                request.machine_id,
                request.scaleset_id,
                request.version,
            ),
        };
        self.store.upsert(&mut node).await?;

        // Clear out any tasks that were running during an earlier boot.
        self.mark_tasks_stopped_early(&node, None).await?;

        Ok(self.registration_response(&pool))
    }

    /// Re-fetch an existing registration.
    pub async fn get_registration(
        &self,
        machine_id: MachineId,
    ) -> Result<AgentRegistration, EngineError> {
        let Some(node) = self.get_node(machine_id).await? else {
            return Err(Fault::new(
                FaultCode::UnableToFind,
                format!("unable to find a registration associated with machine_id '{machine_id}'"),
            )
            .into());
        };
        let Some(pool) = self.get_pool_by_name(&node.pool_name).await? else {
            return Err(Fault::new(
                FaultCode::UnableToFind,
                "unable to find a pool associated with the provided machine_id",
            )
            .into());
        };
        Ok(self.registration_response(&pool))
    }

    /// Dispatch one agent event envelope.
    pub async fn on_node_event(&self, envelope: NodeEventEnvelope) -> Result<(), EngineError> {
        match envelope.event {
            NodeEvent::StateUpdate(update) => {
                self.on_state_update(envelope.machine_id, update).await
            }
            NodeEvent::WorkerEvent(event) => {
                self.on_worker_event(envelope.machine_id, event).await
            }
        }
    }

    pub async fn on_state_update(
        &self,
        machine_id: MachineId,
        update: NodeStateUpdate,
    ) -> Result<(), EngineError> {
        let Some(mut node) = self.get_node(machine_id).await? else {
            return Err(Fault::new(FaultCode::InvalidNode, "unable to find node").into());
        };
        let state = update.state;

        if state == NodeState::Free {
            if node.reimage_requested || node.delete_requested {
                tracing::info!(%machine_id, "stopping free node with reset flags");
                self.node_stop(&mut node, false).await?;
                return Ok(());
            }

            if self.node_could_shrink_scaleset(&node).await {
                tracing::info!(%machine_id, "stopping free node to resize scaleset");
                self.node_set_halt(&mut node).await?;
                return Ok(());
            }
        }

        if state == NodeState::Init {
            if node.delete_requested {
                tracing::info!(%machine_id, "stopping node (init and delete_requested)");
                self.node_stop(&mut node, false).await?;
                return Ok(());
            }

            // Nodes only send `init` once per boot. Seeing it with
            // reimage_requested set means the reimage completed.
            node.reimage_requested = false;
            self.node_set_state(&mut node, state).await?;
            return Ok(());
        }

        tracing::info!(%machine_id, from = %node.state, to = %state, "node state update");
        self.node_set_state(&mut node, state).await?;

        match state {
            NodeState::Free => {
                tracing::info!(%machine_id, "node now available for work");
            }
            NodeState::SettingUp => {
                let tasks = update.data.and_then(|data| data.tasks).unwrap_or_default();
                if tasks.is_empty() {
                    return Err(Fault::new(
                        FaultCode::InvalidRequest,
                        format!("setup without tasks. machine_id: {machine_id}"),
                    )
                    .into());
                }

                for task_id in tasks {
                    let Some(mut task) = self.get_task(task_id).await? else {
                        return Err(
                            Fault::new(FaultCode::InvalidTask, "unable to find task").into()
                        );
                    };
                    tracing::info!(
                        %machine_id,
                        job_id = %task.job_id,
                        %task_id,
                        "node starting task"
                    );

                    // The task may already be `running` when another node
                    // is concurrently executing it (`count` > 1); leave
                    // the max progress in place.
                    if !matches!(task.state, TaskState::Running | TaskState::SettingUp) {
                        self.task_set_state(&mut task, TaskState::SettingUp).await?;
                    }

                    let mut entry =
                        NodeTask::new(machine_id, task_id, NodeTaskState::SettingUp);
                    self.store.upsert(&mut entry).await?;
                }
            }
            NodeState::Done => {
                let error = update.data.filter(|data| data.error.is_some()).map(|data| {
                    let detail = serde_json::to_string(&data).unwrap_or_default();
                    tracing::error!(%machine_id, detail, "node 'done' with error");
                    Fault::new(FaultCode::TaskFailed, detail)
                });

                // Tasks still running on the node are stopped early.
                self.mark_tasks_stopped_early(&node, error).await?;
                self.node_to_reimage(&mut node, true).await?;
            }
            _ => {}
        }

        Ok(())
    }

    pub async fn on_worker_event(
        &self,
        machine_id: MachineId,
        event: WorkerEvent,
    ) -> Result<(), EngineError> {
        match event {
            WorkerEvent::Running { task_id } => {
                self.on_worker_running(machine_id, task_id).await
            }
            WorkerEvent::Done { .. } => self.on_worker_done(machine_id, event).await,
        }
    }

    async fn on_worker_running(
        &self,
        machine_id: MachineId,
        task_id: of_core::TaskId,
    ) -> Result<(), EngineError> {
        let Some(mut task) = self.get_task(task_id).await? else {
            return Err(Fault::new(FaultCode::InvalidTask, "unable to find task").into());
        };
        let Some(mut node) = self.get_node(machine_id).await? else {
            return Err(Fault::new(FaultCode::InvalidNode, "unable to find node").into());
        };

        if !node.state.ready_for_reset() {
            self.node_set_state(&mut node, NodeState::Busy).await?;
        }

        let mut entry = NodeTask::new(machine_id, task_id, NodeTaskState::Running);
        self.store.upsert(&mut entry).await?;

        if task.state.shutting_down() {
            tracing::info!(
                %machine_id,
                job_id = %task.job_id,
                %task_id,
                state = %task.state,
                "ignoring task start from node"
            );
            return Ok(());
        }

        tracing::info!(%machine_id, job_id = %task.job_id, %task_id, "task started on node");
        self.task_set_state(&mut task, TaskState::Running).await?;
        self.task_on_start(&mut task).await?;

        let mut audit =
            TaskEvent::new(task_id, machine_id, WorkerEvent::Running { task_id });
        self.store.save(&mut audit).await?;
        Ok(())
    }

    async fn on_worker_done(
        &self,
        machine_id: MachineId,
        event: WorkerEvent,
    ) -> Result<(), EngineError> {
        let WorkerEvent::Done { task_id, exit_status, stdout, stderr } = event else {
            return Ok(());
        };
        let Some(mut task) = self.get_task(task_id).await? else {
            return Err(Fault::new(FaultCode::InvalidTask, "unable to find task").into());
        };
        let Some(mut node) = self.get_node(machine_id).await? else {
            return Err(Fault::new(FaultCode::InvalidNode, "unable to find node").into());
        };

        let stdout = tail(&stdout, MAX_OUTPUT_SIZE);
        let stderr = tail(&stderr, MAX_OUTPUT_SIZE);

        if exit_status.success {
            tracing::info!(
                job_id = %task.job_id,
                %task_id,
                status = %exit_status,
                "task done"
            );
            self.task_mark_stopping(&mut task).await?;
            if task.has_debug_flag(TaskDebugFlag::KeepNodeOnCompletion) {
                node.debug_keep_node = true;
                self.store.save(&mut node).await?;
            }
        } else {
            self.task_mark_failed(
                &mut task,
                Fault::with_errors(
                    FaultCode::TaskFailed,
                    vec![
                        format!("task failed. exit_status:{exit_status}"),
                        stdout.clone(),
                        stderr.clone(),
                    ],
                ),
            )
            .await?;

            if task.has_debug_flag(TaskDebugFlag::KeepNodeOnFailure)
                || task.has_debug_flag(TaskDebugFlag::KeepNodeOnCompletion)
            {
                node.debug_keep_node = true;
                self.store.save(&mut node).await?;
            }
        }

        if !node.debug_keep_node {
            let entry: Option<NodeTask> =
                self.store.get(machine_id, Some(&task_id.to_string())).await?;
            if let Some(entry) = entry {
                self.store.delete(&entry).await?;
            }
        }

        let mut audit = TaskEvent::new(
            task_id,
            machine_id,
            WorkerEvent::Done { task_id, exit_status, stdout, stderr },
        );
        self.store.save(&mut audit).await?;
        Ok(())
    }

    /// Oldest pending command for the node, if any.
    pub async fn get_node_command(
        &self,
        machine_id: MachineId,
    ) -> Result<PendingNodeCommand, EngineError> {
        let messages = self.node_messages(machine_id, Some(1)).await?;
        let envelope = messages.into_iter().next().map(|message| NodeCommandEnvelope {
            message_id: message.message_id,
            command: message.message,
        });
        Ok(PendingNodeCommand { envelope })
    }

    /// Ack a delivered command by id.
    pub async fn delete_node_command(
        &self,
        machine_id: MachineId,
        message_id: &str,
    ) -> Result<(), EngineError> {
        let message: Option<of_core::NodeMessage> =
            self.store.get(machine_id, Some(message_id)).await?;
        if let Some(message) = message {
            self.store.delete(&message).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "agent_events_tests.rs"]
mod tests;
