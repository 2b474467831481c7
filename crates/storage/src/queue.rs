// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named FIFO queues with visibility timeouts.
//!
//! Message bodies are base64-encoded JSON so the transport stays opaque.
//! Producers never fail on a missing queue beyond logging; receivers
//! return nothing.

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Largest non-destructive peek the backend supports.
pub const PEEK_MAX: usize = 32;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// A received message: invisible to other receivers until deleted,
/// re-surfaced, or its visibility timeout lapses.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
}

/// Permissions encoded into a queue SAS URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueSas {
    pub add: bool,
    pub read: bool,
    pub update: bool,
    pub process: bool,
}

impl QueueSas {
    pub const fn add() -> Self {
        Self { add: true, read: false, update: false, process: false }
    }

    pub const fn consume() -> Self {
        Self { add: false, read: true, update: true, process: true }
    }
}

#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Create a queue. Creating an existing queue is a no-op.
    async fn create(&self, name: &str) -> Result<(), QueueError>;

    /// Delete a queue and its messages. Deleting a missing queue is a no-op.
    async fn delete(&self, name: &str) -> Result<(), QueueError>;

    /// Remove all messages. Clearing a missing queue is a no-op.
    async fn clear(&self, name: &str) -> Result<(), QueueError>;

    /// Enqueue a message. Returns false when the queue does not exist.
    async fn send(
        &self,
        name: &str,
        body: String,
        visibility: Option<Duration>,
        ttl: Option<Duration>,
    ) -> Result<bool, QueueError>;

    /// Non-destructive read of the first visible messages (≤ [`PEEK_MAX`]).
    async fn peek(&self, name: &str, max: usize) -> Result<Vec<String>, QueueError>;

    /// Destructive-read candidates: returned messages become invisible for
    /// `visibility`.
    async fn receive(
        &self,
        name: &str,
        max: usize,
        visibility: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Delete a received message by id.
    async fn delete_message(&self, name: &str, message_id: &str) -> Result<(), QueueError>;

    /// Make a received message visible again immediately.
    async fn make_visible(&self, name: &str, message_id: &str) -> Result<(), QueueError>;

    /// Remove the first visible message, if any. Returns false on empty or
    /// missing queue.
    async fn remove_first(&self, name: &str) -> Result<bool, QueueError>;

    /// Scoped access URL for agents. In-memory backends synthesize one.
    fn sas_url(&self, name: &str, sas: QueueSas) -> String;
}

fn encode<T: Serialize>(value: &T) -> Result<String, QueueError> {
    let json = serde_json::to_vec(value)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, QueueError> {
    let json = base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|e| QueueError::InvalidPayload(e.to_string()))?;
    Ok(serde_json::from_slice(&json)?)
}

/// A received message with its decoded payload. `value` is `None` when the
/// body failed to decode; the raw handle still allows deletion.
pub struct Received<T> {
    pub message_id: String,
    pub value: Option<T>,
}

/// Typed queue service: base64-JSON codec over a [`QueueBackend`].
#[derive(Clone)]
pub struct Queues {
    backend: Arc<dyn QueueBackend>,
}

impl Queues {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self { backend }
    }

    pub async fn create(&self, name: &str) -> Result<(), QueueError> {
        self.backend.create(name).await
    }

    pub async fn delete(&self, name: &str) -> Result<(), QueueError> {
        self.backend.delete(name).await
    }

    pub async fn clear(&self, name: &str) -> Result<(), QueueError> {
        self.backend.clear(name).await
    }

    /// Enqueue a model. Missing queues and encode failures are logged,
    /// not raised; returns whether the message was accepted.
    pub async fn send_object<T: Serialize>(&self, name: &str, value: &T) -> bool {
        self.send_object_with(name, value, None, None).await
    }

    pub async fn send_object_with<T: Serialize>(
        &self,
        name: &str,
        value: &T,
        visibility: Option<Duration>,
        ttl: Option<Duration>,
    ) -> bool {
        let body = match encode(value) {
            Ok(body) => body,
            Err(error) => {
                tracing::error!(queue = name, %error, "failed to encode queue message");
                return false;
            }
        };
        match self.backend.send(name, body, visibility, ttl).await {
            Ok(sent) => {
                if !sent {
                    tracing::info!(queue = name, "queue missing, message dropped");
                }
                sent
            }
            Err(error) => {
                tracing::error!(queue = name, %error, "failed to send queue message");
                false
            }
        }
    }

    /// Non-destructive decode of the first visible messages. Undecodable
    /// bodies are logged and skipped.
    pub async fn peek_object<T: DeserializeOwned>(&self, name: &str, max: usize) -> Vec<T> {
        let bodies = match self.backend.peek(name, max.min(PEEK_MAX)).await {
            Ok(bodies) => bodies,
            Err(error) => {
                tracing::info!(queue = name, %error, "peek failed");
                return Vec::new();
            }
        };
        bodies
            .iter()
            .filter_map(|body| match decode(body) {
                Ok(value) => Some(value),
                Err(error) => {
                    tracing::warn!(queue = name, %error, "failed to decode peeked message");
                    None
                }
            })
            .collect()
    }

    /// Receive up to `max` messages, each invisible for `visibility`.
    pub async fn receive<T: DeserializeOwned>(
        &self,
        name: &str,
        max: usize,
        visibility: Duration,
    ) -> Vec<Received<T>> {
        let messages = match self.backend.receive(name, max, visibility).await {
            Ok(messages) => messages,
            Err(error) => {
                tracing::info!(queue = name, %error, "receive failed");
                return Vec::new();
            }
        };
        messages
            .into_iter()
            .map(|message| {
                let value = match decode(&message.body) {
                    Ok(value) => Some(value),
                    Err(error) => {
                        tracing::warn!(queue = name, %error, "failed to decode received message");
                        None
                    }
                };
                Received { message_id: message.message_id, value }
            })
            .collect()
    }

    pub async fn delete_message(&self, name: &str, message_id: &str) -> Result<(), QueueError> {
        self.backend.delete_message(name, message_id).await
    }

    pub async fn make_visible(&self, name: &str, message_id: &str) -> Result<(), QueueError> {
        self.backend.make_visible(name, message_id).await
    }

    /// Remove the first visible message. Returns false on empty or missing
    /// queue.
    pub async fn receive_and_delete_one(&self, name: &str) -> bool {
        match self.backend.remove_first(name).await {
            Ok(removed) => removed,
            Err(error) => {
                tracing::info!(queue = name, %error, "remove_first failed");
                false
            }
        }
    }

    pub fn sas_url(&self, name: &str, sas: QueueSas) -> String {
        self.backend.sas_url(name, sas)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
