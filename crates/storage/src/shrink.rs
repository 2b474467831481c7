// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shrink queues: one token per node authorized to self-halt.
//!
//! A distinct queue exists per shrink domain (scaleset or pool). Each
//! successful [`ShrinkQueue::should_shrink`] consumes exactly one token,
//! so downsizing is ordered and bounded without locks.

use crate::queue::Queues;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShrinkEntry {
    pub shrink_id: Uuid,
}

pub struct ShrinkQueue<'a> {
    base_id: Uuid,
    queues: &'a Queues,
}

impl<'a> ShrinkQueue<'a> {
    pub fn new(base_id: impl Into<Uuid>, queues: &'a Queues) -> Self {
        Self { base_id: base_id.into(), queues }
    }

    pub fn queue_name(&self) -> String {
        format!("to-shrink-{}", self.base_id.simple())
    }

    pub async fn create(&self) {
        if let Err(error) = self.queues.create(&self.queue_name()).await {
            tracing::error!(queue = self.queue_name(), %error, "failed to create shrink queue");
        }
    }

    pub async fn delete(&self) {
        if let Err(error) = self.queues.delete(&self.queue_name()).await {
            tracing::error!(queue = self.queue_name(), %error, "failed to delete shrink queue");
        }
    }

    pub async fn clear(&self) {
        if let Err(error) = self.queues.clear(&self.queue_name()).await {
            tracing::error!(queue = self.queue_name(), %error, "failed to clear shrink queue");
        }
    }

    pub async fn add_entry(&self) {
        self.queues
            .send_object(&self.queue_name(), &ShrinkEntry { shrink_id: Uuid::new_v4() })
            .await;
    }

    /// Reset the token count to exactly `size`.
    pub async fn set_size(&self, size: usize) {
        self.clear().await;
        for _ in 0..size {
            self.add_entry().await;
        }
    }

    /// Consume one shrink token. True authorizes exactly one node to halt.
    pub async fn should_shrink(&self) -> bool {
        self.queues.receive_and_delete_one(&self.queue_name()).await
    }
}

#[cfg(test)]
#[path = "shrink_tests.rs"]
mod tests;
