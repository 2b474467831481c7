// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! of-core: entity models, state machines, and events for the OneFuzz
//! control plane.

pub mod macros;

pub mod clock;
pub mod config;
pub mod events;
pub mod fault;
pub mod ids;
pub mod job;
pub mod node;
pub mod pool;
pub mod primitives;
pub mod proxy;
pub mod records;
pub mod scaleset;
pub mod task;
pub mod version;
pub mod webhook;
pub mod workset;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::InstanceConfig;
pub use events::{Event, EventMessage, EventType};
pub use fault::{Fault, FaultCode};
pub use ids::{EventId, JobId, MachineId, PoolId, ProxyId, ScalesetId, TaskId, WebhookId};
pub use job::{Job, JobConfig, JobState};
pub use node::{Node, NodeCommand, NodeMessage, NodeState, NodeTask, NodeTaskState};
pub use pool::{AutoscaleConfig, Pool, PoolState};
pub use primitives::{Architecture, Container, NodeDisposalStrategy, Os, PoolName, Region};
pub use proxy::{Forward, Proxy, ProxyConfig, ProxyForward, ProxyHeartbeat, VmState};
pub use records::{Entity, RowMeta, StoreSchema};
pub use scaleset::{Authentication, Scaleset, ScalesetNodeState, ScalesetState};
pub use task::{
    ContainerType, StatsFormat, Task, TaskConfig, TaskContainer, TaskDebugFlag, TaskDetails,
    TaskPool, TaskState, TaskType, TaskVm,
};
pub use version::{is_minimum_version, SERVICE_VERSION};
pub use webhook::{
    Webhook, WebhookMessage, WebhookMessageLog, WebhookMessageQueued, WebhookMessageState,
};
pub use workset::{ContainerGroup, SyncedDir, TaskUnitConfig, WorkSet, WorkUnit};
