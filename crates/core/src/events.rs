// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed events published on every state transition and create/delete.
//!
//! [`Event`] is adjacently tagged so an [`EventMessage`] flattens to the
//! published envelope `{event_id, event_type, event, instance_id,
//! instance_name}` without any hand-rolled serialization.

use crate::fault::Fault;
use crate::ids::{EventId, JobId, MachineId, ProxyId, ScalesetId, TaskId};
use crate::job::JobConfig;
use crate::node::NodeState;
use crate::pool::AutoscaleConfig;
use crate::primitives::{Architecture, Container, Os, PoolName, Region};
use crate::task::{TaskConfig, TaskState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    JobCreated,
    JobStopped,
    TaskCreated,
    TaskStateUpdated,
    TaskStopped,
    TaskFailed,
    NodeCreated,
    NodeDeleted,
    NodeStateUpdated,
    PoolCreated,
    PoolDeleted,
    ScalesetCreated,
    ScalesetFailed,
    ScalesetDeleted,
    ProxyCreated,
    ProxyDeleted,
    ProxyFailed,
    CrashReported,
    RegressionReported,
    FileAdded,
    Ping,
}

crate::simple_display! {
    EventType {
        JobCreated => "job_created",
        JobStopped => "job_stopped",
        TaskCreated => "task_created",
        TaskStateUpdated => "task_state_updated",
        TaskStopped => "task_stopped",
        TaskFailed => "task_failed",
        NodeCreated => "node_created",
        NodeDeleted => "node_deleted",
        NodeStateUpdated => "node_state_updated",
        PoolCreated => "pool_created",
        PoolDeleted => "pool_deleted",
        ScalesetCreated => "scaleset_created",
        ScalesetFailed => "scaleset_failed",
        ScalesetDeleted => "scaleset_deleted",
        ProxyCreated => "proxy_created",
        ProxyDeleted => "proxy_deleted",
        ProxyFailed => "proxy_failed",
        CrashReported => "crash_reported",
        RegressionReported => "regression_reported",
        FileAdded => "file_added",
        Ping => "ping",
    }
}

/// Reference to a blob in a storage account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobRef {
    pub account: String,
    pub container: Container,
    pub name: String,
}

/// A parsed crash report, as produced by report-generating tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_url: Option<String>,
    pub input_blob: BlobRef,
    pub executable: String,
    pub crash_type: String,
    pub crash_site: String,
    pub call_stack: Vec<String>,
    pub call_stack_sha256: String,
    pub input_sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asan_log: Option<String>,
    pub task_id: TaskId,
    pub job_id: JobId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "event", rename_all = "snake_case")]
pub enum Event {
    JobCreated {
        job_id: JobId,
        config: JobConfig,
    },
    JobStopped {
        job_id: JobId,
        config: JobConfig,
    },
    TaskCreated {
        job_id: JobId,
        task_id: TaskId,
        config: TaskConfig,
    },
    TaskStateUpdated {
        job_id: JobId,
        task_id: TaskId,
        state: TaskState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_time: Option<DateTime<Utc>>,
    },
    TaskStopped {
        job_id: JobId,
        task_id: TaskId,
    },
    TaskFailed {
        job_id: JobId,
        task_id: TaskId,
        error: Fault,
    },
    NodeCreated {
        machine_id: MachineId,
        pool_name: PoolName,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scaleset_id: Option<ScalesetId>,
    },
    NodeDeleted {
        machine_id: MachineId,
        pool_name: PoolName,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scaleset_id: Option<ScalesetId>,
    },
    NodeStateUpdated {
        machine_id: MachineId,
        pool_name: PoolName,
        state: NodeState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scaleset_id: Option<ScalesetId>,
    },
    PoolCreated {
        pool_name: PoolName,
        os: Os,
        arch: Architecture,
        managed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        autoscale: Option<AutoscaleConfig>,
    },
    PoolDeleted {
        pool_name: PoolName,
    },
    ScalesetCreated {
        scaleset_id: ScalesetId,
        pool_name: PoolName,
        vm_sku: String,
        image: String,
        region: Region,
        size: u64,
    },
    ScalesetFailed {
        scaleset_id: ScalesetId,
        pool_name: PoolName,
        error: Fault,
    },
    ScalesetDeleted {
        scaleset_id: ScalesetId,
        pool_name: PoolName,
    },
    ProxyCreated {
        region: Region,
        proxy_id: ProxyId,
    },
    ProxyDeleted {
        region: Region,
        proxy_id: ProxyId,
    },
    ProxyFailed {
        region: Region,
        proxy_id: ProxyId,
        error: Fault,
    },
    CrashReported {
        report: Report,
        container: Container,
        filename: String,
    },
    RegressionReported {
        report: Report,
        container: Container,
        filename: String,
    },
    FileAdded {
        container: Container,
        filename: String,
    },
    Ping {
        ping_id: EventId,
    },
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::JobCreated { .. } => EventType::JobCreated,
            Event::JobStopped { .. } => EventType::JobStopped,
            Event::TaskCreated { .. } => EventType::TaskCreated,
            Event::TaskStateUpdated { .. } => EventType::TaskStateUpdated,
            Event::TaskStopped { .. } => EventType::TaskStopped,
            Event::TaskFailed { .. } => EventType::TaskFailed,
            Event::NodeCreated { .. } => EventType::NodeCreated,
            Event::NodeDeleted { .. } => EventType::NodeDeleted,
            Event::NodeStateUpdated { .. } => EventType::NodeStateUpdated,
            Event::PoolCreated { .. } => EventType::PoolCreated,
            Event::PoolDeleted { .. } => EventType::PoolDeleted,
            Event::ScalesetCreated { .. } => EventType::ScalesetCreated,
            Event::ScalesetFailed { .. } => EventType::ScalesetFailed,
            Event::ScalesetDeleted { .. } => EventType::ScalesetDeleted,
            Event::ProxyCreated { .. } => EventType::ProxyCreated,
            Event::ProxyDeleted { .. } => EventType::ProxyDeleted,
            Event::ProxyFailed { .. } => EventType::ProxyFailed,
            Event::CrashReported { .. } => EventType::CrashReported,
            Event::RegressionReported { .. } => EventType::RegressionReported,
            Event::FileAdded { .. } => EventType::FileAdded,
            Event::Ping { .. } => EventType::Ping,
        }
    }
}

/// Envelope published to the push channel and delivered to webhooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub event_id: EventId,
    #[serde(flatten)]
    pub event: Event,
    pub instance_id: Uuid,
    pub instance_name: String,
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
