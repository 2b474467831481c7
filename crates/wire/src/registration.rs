// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registration request and response bodies.

use of_core::{MachineId, PoolName, ScalesetId};
use serde::{Deserialize, Serialize};

/// `GET /agents/registration`: re-fetch an existing registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistrationGet {
    pub machine_id: MachineId,
}

/// `POST /agents/registration`: create or refresh a registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistrationPost {
    pub machine_id: MachineId,
    pub pool_name: PoolName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaleset_id: Option<ScalesetId>,
    pub version: String,
}

/// Registration response: where to send events, poll commands, and pull work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub events_url: String,
    pub commands_url: String,
    /// SAS-scoped URL for the pool work queue.
    pub work_queue: String,
}

#[cfg(test)]
#[path = "registration_tests.rs"]
mod tests;
