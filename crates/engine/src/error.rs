// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type.

use of_core::Fault;
use thiserror::Error;

/// Errors from engine operations.
///
/// [`EngineError::Fault`] carries a domain error destined for the caller
/// (the REST collaborator maps its code to an HTTP status); the other
/// variants are operational failures. Reconcilers catch either at the
/// entity boundary and leave the entity for the next tick.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Fault(#[from] Fault),
    #[error("store error: {0}")]
    Store(#[from] of_storage::StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] of_storage::QueueError),
    #[error("cloud error: {0}")]
    Cloud(#[from] of_adapters::CloudError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    /// True when the entity was advanced by another worker; the caller
    /// re-reads and retries next tick.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Store(of_storage::StoreError::Conflict))
    }
}
