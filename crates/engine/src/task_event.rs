// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task audit log of worker events.

use of_core::records::{RowMeta, StoreSchema};
use of_core::{EventId, MachineId, TaskId};
use of_wire::WorkerEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub task_id: TaskId,
    pub event_id: EventId,
    pub machine_id: MachineId,
    pub event_data: WorkerEvent,
    #[serde(skip)]
    pub meta: RowMeta,
}

impl TaskEvent {
    pub fn new(task_id: TaskId, machine_id: MachineId, event_data: WorkerEvent) -> Self {
        Self {
            task_id,
            event_id: EventId::new(),
            machine_id,
            event_data,
            meta: RowMeta::default(),
        }
    }
}

of_core::entity! {
    TaskEvent => "TaskEvent", StoreSchema::keyed("task_id", "event_id")
}
