// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory queue backend with visibility timeouts.

use crate::queue::{QueueBackend, QueueError, QueueMessage, QueueSas};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use of_core::Clock;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct StoredMessage {
    id: String,
    body: String,
    visible_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct MemQueue {
    messages: Vec<StoredMessage>,
}

impl MemQueue {
    fn prune(&mut self, now: DateTime<Utc>) {
        self.messages.retain(|m| m.expires_at.is_none_or(|expiry| expiry > now));
    }
}

pub struct MemoryQueues {
    now: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    queues: Mutex<BTreeMap<String, MemQueue>>,
}

impl MemoryQueues {
    pub fn new(clock: impl Clock) -> Self {
        Self {
            now: Arc::new(move || clock.now_utc()),
            queues: Mutex::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl QueueBackend for MemoryQueues {
    async fn create(&self, name: &str) -> Result<(), QueueError> {
        self.queues.lock().entry(name.to_string()).or_default();
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), QueueError> {
        self.queues.lock().remove(name);
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<(), QueueError> {
        if let Some(queue) = self.queues.lock().get_mut(name) {
            queue.messages.clear();
        }
        Ok(())
    }

    async fn send(
        &self,
        name: &str,
        body: String,
        visibility: Option<Duration>,
        ttl: Option<Duration>,
    ) -> Result<bool, QueueError> {
        let now = (self.now)();
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(name) else {
            return Ok(false);
        };
        let visible_at = now
            + visibility
                .and_then(|v| chrono::Duration::from_std(v).ok())
                .unwrap_or_else(chrono::Duration::zero);
        let expires_at =
            ttl.and_then(|t| chrono::Duration::from_std(t).ok()).map(|t| now + t);
        queue.messages.push(StoredMessage {
            id: Uuid::new_v4().simple().to_string(),
            body,
            visible_at,
            expires_at,
        });
        Ok(true)
    }

    async fn peek(&self, name: &str, max: usize) -> Result<Vec<String>, QueueError> {
        let now = (self.now)();
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(name) else {
            return Ok(Vec::new());
        };
        queue.prune(now);
        Ok(queue
            .messages
            .iter()
            .filter(|m| m.visible_at <= now)
            .take(max)
            .map(|m| m.body.clone())
            .collect())
    }

    async fn receive(
        &self,
        name: &str,
        max: usize,
        visibility: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let now = (self.now)();
        let invisible_until =
            now + chrono::Duration::from_std(visibility).unwrap_or_else(|_| chrono::Duration::zero());
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(name) else {
            return Ok(Vec::new());
        };
        queue.prune(now);
        let mut received = Vec::new();
        for message in queue.messages.iter_mut() {
            if received.len() >= max {
                break;
            }
            if message.visible_at <= now {
                message.visible_at = invisible_until;
                received.push(QueueMessage {
                    message_id: message.id.clone(),
                    body: message.body.clone(),
                });
            }
        }
        Ok(received)
    }

    async fn delete_message(&self, name: &str, message_id: &str) -> Result<(), QueueError> {
        if let Some(queue) = self.queues.lock().get_mut(name) {
            queue.messages.retain(|m| m.id != message_id);
        }
        Ok(())
    }

    async fn make_visible(&self, name: &str, message_id: &str) -> Result<(), QueueError> {
        let now = (self.now)();
        if let Some(queue) = self.queues.lock().get_mut(name) {
            if let Some(message) = queue.messages.iter_mut().find(|m| m.id == message_id) {
                message.visible_at = now;
            }
        }
        Ok(())
    }

    async fn remove_first(&self, name: &str) -> Result<bool, QueueError> {
        let now = (self.now)();
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(name) else {
            return Ok(false);
        };
        queue.prune(now);
        let index = queue.messages.iter().position(|m| m.visible_at <= now);
        match index {
            Some(index) => {
                queue.messages.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn sas_url(&self, name: &str, sas: QueueSas) -> String {
        let mut perms = String::new();
        if sas.add {
            perms.push('a');
        }
        if sas.read {
            perms.push('r');
        }
        if sas.update {
            perms.push('u');
        }
        if sas.process {
            perms.push('p');
        }
        format!("https://storage.invalid/queue/{name}?sp={perms}")
    }
}

#[cfg(test)]
#[path = "memory_queue_tests.rs"]
mod tests;
