// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent command polling bodies.

use of_core::{MachineId, NodeCommand};
use serde::{Deserialize, Serialize};

/// `GET /agents/commands` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCommandGet {
    pub machine_id: MachineId,
}

/// `DELETE /agents/commands`: ack a delivered command by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCommandDelete {
    pub machine_id: MachineId,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCommandEnvelope {
    pub message_id: String,
    pub command: NodeCommand,
}

/// Response to a command poll; `envelope` is absent when the queue is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingNodeCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<NodeCommandEnvelope>,
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
