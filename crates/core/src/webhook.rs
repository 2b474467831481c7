// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook registration and per-delivery log.

use crate::events::{Event, EventType};
use crate::ids::{EventId, WebhookId};
use crate::records::{RowMeta, StoreSchema};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookMessageState {
    Queued,
    Retrying,
    Succeeded,
    Failed,
}

crate::simple_display! {
    WebhookMessageState {
        Queued => "queued",
        Retrying => "retrying",
        Succeeded => "succeeded",
        Failed => "failed",
    }
}

/// A registered webhook endpoint and the event types it subscribes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub webhook_id: WebhookId,
    pub name: String,
    pub url: String,
    pub event_types: Vec<EventType>,
    /// When set, deliveries carry an HMAC-SHA512 digest of the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
    #[serde(skip)]
    pub meta: RowMeta,
}

crate::entity! {
    Webhook => "Webhook", StoreSchema::partition_only("webhook_id")
}

/// One row per (webhook, event): the delivery state machine.
///
/// Retries increment `try_count` on this row; a new row is never created
/// for a retry. Rows older than seven days are deleted by the daily tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookMessageLog {
    pub webhook_id: WebhookId,
    pub event_id: EventId,
    #[serde(flatten)]
    pub event: Event,
    pub state: WebhookMessageState,
    pub try_count: u64,
    #[serde(skip)]
    pub meta: RowMeta,
}

impl WebhookMessageLog {
    pub fn new(webhook_id: WebhookId, event_id: EventId, event: Event) -> Self {
        Self {
            webhook_id,
            event_id,
            event,
            state: WebhookMessageState::Queued,
            try_count: 0,
            meta: RowMeta::default(),
        }
    }
}

crate::entity! {
    WebhookMessageLog => "WebhookMessageLog", StoreSchema::keyed("webhook_id", "event_id")
}

/// Body POSTed to the webhook URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookMessage {
    pub webhook_id: WebhookId,
    pub event_id: EventId,
    #[serde(flatten)]
    pub event: Event,
    pub instance_id: Uuid,
    pub instance_name: String,
}

/// Queue payload pairing a webhook with a pending event delivery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WebhookMessageQueued {
    pub webhook_id: WebhookId,
    pub event_id: EventId,
}

crate::builder! {
    pub struct WebhookBuilder => Webhook {
        into {
            name: String = "webhook",
            url: String = "https://example.invalid/hook",
        }
        set {
            webhook_id: WebhookId = WebhookId::new(),
            event_types: Vec<EventType> = vec![EventType::TaskStopped],
            secret_token: Option<String> = None,
        }
        computed {
            meta: RowMeta = RowMeta::default(),
        }
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
