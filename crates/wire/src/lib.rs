// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! of-wire: agent-facing protocol DTOs.
//!
//! Every union is a tagged enum: payloads that set zero or multiple arms
//! are rejected at deserialization.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod events;
mod registration;

pub use commands::{NodeCommandDelete, NodeCommandEnvelope, NodeCommandGet, PendingNodeCommand};
pub use events::{
    ExitStatus, NodeEvent, NodeEventEnvelope, NodeStateUpdate, StateUpdateData, WorkerEvent,
};
pub use registration::{AgentRegistration, AgentRegistrationGet, AgentRegistrationPost};

use serde::{Deserialize, Serialize};

/// Minimal boolean response body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoolResult {
    pub result: bool,
}
