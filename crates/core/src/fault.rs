// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted error record.
//!
//! A [`Fault`] is data, not a Rust error: it is stored on entities
//! (`Task.error`, `Scaleset.error`, `Proxy.error`), carried inside events,
//! and returned to API callers, who map the code to an HTTP status.
//! Operational failures inside the service use `thiserror` enums instead.

use serde::{Deserialize, Serialize};

/// Taxonomy of user- and operator-visible failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultCode {
    InvalidRequest,
    InvalidPermission,
    Unauthorized,
    InvalidJob,
    InvalidTask,
    InvalidContainer,
    InvalidNode,
    InvalidImage,
    UnableToFind,
    UnableToCreate,
    UnableToUpdate,
    UnableToCreateNetwork,
    UnableToResize,
    UnableToPortForward,
    VmCreateFailed,
    ProxyFailed,
    TaskFailed,
    NotificationFailure,
}

/// An error record with a code and one or more detail strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub code: FaultCode,
    pub errors: Vec<String>,
}

impl Fault {
    pub fn new(code: FaultCode, detail: impl Into<String>) -> Self {
        Self { code, errors: vec![detail.into()] }
    }

    pub fn with_errors(code: FaultCode, errors: Vec<String>) -> Self {
        Self { code, errors }
    }

    /// True for the `Invalid*`/`Unauthorized` family, which maps to 4xx.
    pub fn is_request_fault(&self) -> bool {
        matches!(
            self.code,
            FaultCode::InvalidRequest
                | FaultCode::InvalidPermission
                | FaultCode::Unauthorized
                | FaultCode::InvalidJob
                | FaultCode::InvalidTask
                | FaultCode::InvalidContainer
                | FaultCode::InvalidNode
                | FaultCode::InvalidImage
        )
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.errors.join("; "))
    }
}

impl std::error::Error for Fault {}

#[cfg(test)]
#[path = "fault_tests.rs"]
mod tests;
