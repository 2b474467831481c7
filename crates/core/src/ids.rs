// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed UUID identifiers for every entity kind.

crate::define_uuid_id! {
    /// Unique identifier for a job.
    pub struct JobId;
}

crate::define_uuid_id! {
    /// Unique identifier for a task within a job.
    pub struct TaskId;
}

crate::define_uuid_id! {
    /// Unique identifier for a pool.
    pub struct PoolId;
}

crate::define_uuid_id! {
    /// Unique identifier for a VM scaleset.
    pub struct ScalesetId;
}

crate::define_uuid_id! {
    /// Unique identifier for a worker VM. Matches the cloud instance's machine id.
    pub struct MachineId;
}

crate::define_uuid_id! {
    /// Unique identifier for an SSH-relay proxy VM.
    pub struct ProxyId;
}

crate::define_uuid_id! {
    /// Unique identifier for a registered webhook.
    pub struct WebhookId;
}

crate::define_uuid_id! {
    /// Unique identifier for a published event.
    pub struct EventId;
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
