// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent event bodies: state updates and worker lifecycle events.

use of_core::{MachineId, NodeState, TaskId};
use serde::{Deserialize, Serialize};

/// Optional payload accompanying a state update. Which fields are
/// meaningful depends on the reported state: `tasks` with `setting_up`,
/// `error` with `done`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdateData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_output: Option<String>,
}

impl StateUpdateData {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_none() && self.error.is_none() && self.script_output.is_none()
    }
}

/// `state_update` arm: the agent reports its node-level state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStateUpdate {
    pub state: NodeState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StateUpdateData>,
}

/// Exit status of a finished worker process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    pub success: bool,
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "code={code}"),
            (None, Some(signal)) => write!(f, "signal={signal}"),
            (None, None) => write!(f, "success={}", self.success),
        }
    }
}

/// `worker_event` arm: per-task lifecycle reported by the agent.
/// Exactly one arm must be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerEvent {
    Running {
        task_id: TaskId,
    },
    Done {
        task_id: TaskId,
        exit_status: ExitStatus,
        stdout: String,
        stderr: String,
    },
}

impl WorkerEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            WorkerEvent::Running { task_id } | WorkerEvent::Done { task_id, .. } => *task_id,
        }
    }
}

/// The event union posted to `/agents/events`. Exactly one arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeEvent {
    StateUpdate(NodeStateUpdate),
    WorkerEvent(WorkerEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEventEnvelope {
    pub machine_id: MachineId,
    pub event: NodeEvent,
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
