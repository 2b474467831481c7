// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node model, per-node task assignments, and the agent command queue.

use crate::ids::{MachineId, ScalesetId, TaskId};
use crate::primitives::PoolName;
use crate::records::{RowMeta, StoreSchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Init,
    Free,
    SettingUp,
    Rebooting,
    Ready,
    Busy,
    Done,
    Shutdown,
    Halt,
}

impl NodeState {
    /// States that indicate the reconciler has work to do.
    pub fn needs_work() -> &'static [NodeState] {
        &[NodeState::Done, NodeState::Shutdown, NodeState::Halt]
    }

    /// Once a node reaches one of these, agent state updates are ignored
    /// and no new work is ever assigned.
    pub fn ready_for_reset(self) -> bool {
        matches!(self, NodeState::Done | NodeState::Shutdown | NodeState::Halt)
    }

    pub fn can_process_new_work(self) -> bool {
        matches!(self, NodeState::Free)
    }

    /// States that count as occupied for autoscaling purposes.
    pub fn in_use(self) -> bool {
        matches!(
            self,
            NodeState::SettingUp | NodeState::Rebooting | NodeState::Ready | NodeState::Busy
        )
    }
}

crate::simple_display! {
    NodeState {
        Init => "init",
        Free => "free",
        SettingUp => "setting_up",
        Rebooting => "rebooting",
        Ready => "ready",
        Busy => "busy",
        Done => "done",
        Shutdown => "shutdown",
        Halt => "halt",
    }
}

/// A single worker VM; runs an agent that pulls WorkSets from the pool queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub pool_name: PoolName,
    pub machine_id: MachineId,
    pub state: NodeState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaleset_id: Option<ScalesetId>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat: Option<DateTime<Utc>>,
    /// Once set, never rescinded; the node is reimaged at the next safe point.
    #[serde(default)]
    pub reimage_requested: bool,
    /// Forbids new work immediately, even before the agent next polls.
    #[serde(default)]
    pub delete_requested: bool,
    /// Operator hold: cleanup never reimages or deletes this node.
    #[serde(default)]
    pub debug_keep_node: bool,
    #[serde(skip)]
    pub meta: RowMeta,
}

impl Node {
    pub fn new(
        pool_name: PoolName,
        machine_id: MachineId,
        scaleset_id: Option<ScalesetId>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            pool_name,
            machine_id,
            state: NodeState::Init,
            scaleset_id,
            version: version.into(),
            heartbeat: None,
            reimage_requested: false,
            delete_requested: false,
            debug_keep_node: false,
            meta: RowMeta::default(),
        }
    }
}

crate::entity! {
    Node => "Node", StoreSchema::keyed("pool_name", "machine_id")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTaskState {
    Init,
    SettingUp,
    Running,
}

crate::simple_display! {
    NodeTaskState {
        Init => "init",
        SettingUp => "setting_up",
        Running => "running",
    }
}

/// Many-to-many assignment row linking a node to a task it is executing.
/// Deleted when the task finishes or the node is reimaged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTask {
    pub machine_id: MachineId,
    pub task_id: TaskId,
    pub state: NodeTaskState,
    #[serde(skip)]
    pub meta: RowMeta,
}

impl NodeTask {
    pub fn new(machine_id: MachineId, task_id: TaskId, state: NodeTaskState) -> Self {
        Self { machine_id, task_id, state, meta: RowMeta::default() }
    }
}

crate::entity! {
    NodeTask => "NodeTasks", StoreSchema::keyed("machine_id", "task_id")
}

/// Command pushed to a node's agent.
///
/// Externally tagged: exactly one arm must be present on the wire; serde
/// rejects payloads with zero or multiple arms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCommand {
    Stop {},
    StopTask { task_id: TaskId },
    AddSshKey { public_key: String },
    StopIfFree {},
}

/// Per-node FIFO of commands the agent polls.
///
/// `message_id` is epoch milliseconds zero-padded to 20 digits, so row-key
/// order is delivery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMessage {
    pub machine_id: MachineId,
    pub message_id: String,
    pub message: NodeCommand,
    #[serde(skip)]
    pub meta: RowMeta,
}

impl NodeMessage {
    pub fn new(machine_id: MachineId, epoch_ms: u64, message: NodeCommand) -> Self {
        Self {
            machine_id,
            message_id: format!("{epoch_ms:020}"),
            message,
            meta: RowMeta::default(),
        }
    }
}

crate::entity! {
    NodeMessage => "NodeMessage", StoreSchema::keyed("machine_id", "message_id")
}

crate::builder! {
    pub struct NodeBuilder => Node {
        into {
            version: String = "2.19.0",
        }
        set {
            pool_name: PoolName = PoolName::new("pool"),
            machine_id: MachineId = MachineId::new(),
            state: NodeState = NodeState::Init,
            scaleset_id: Option<ScalesetId> = None,
            heartbeat: Option<DateTime<Utc>> = None,
            reimage_requested: bool = false,
            delete_requested: bool = false,
            debug_keep_node: bool = false,
        }
        computed {
            meta: RowMeta = RowMeta::default(),
        }
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
