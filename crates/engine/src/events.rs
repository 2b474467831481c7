// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus: every state transition and create/delete lands here.

use crate::engine::Engine;
use of_core::webhook::{Webhook, WebhookMessageLog, WebhookMessageQueued};
use of_core::{Clock, Event, EventId, EventMessage};

/// Opaque push channel consumed by the signalr collaborator.
pub const SIGNALR_EVENTS_QUEUE: &str = "signalr-events";

impl<K: Clock> Engine<K> {
    /// Publish an event: push channel, webhook fan-out, and the log line.
    ///
    /// Fan-out failures are logged and never propagate; an event consumer
    /// problem must not abort the state transition that emitted it.
    pub async fn send_event(&self, event: Event) {
        let message = EventMessage {
            event_id: EventId::new(),
            event,
            instance_id: self.config.instance_id,
            instance_name: self.config.instance_name.clone(),
        };

        tracing::info!(
            event_type = %message.event.event_type(),
            event_id = %message.event_id,
            "sending event"
        );

        self.queues.send_object(SIGNALR_EVENTS_QUEUE, &message).await;

        if let Err(error) = self.webhook_fanout(&message).await {
            tracing::error!(%error, event_id = %message.event_id, "webhook fanout failed");
        }
    }

    async fn webhook_fanout(
        &self,
        message: &EventMessage,
    ) -> Result<(), crate::error::EngineError> {
        let event_type = message.event.event_type();
        for webhook in self.list_webhooks_cached().await? {
            if !webhook.event_types.contains(&event_type) {
                continue;
            }

            let mut log = WebhookMessageLog::new(
                webhook.webhook_id,
                message.event_id,
                message.event.clone(),
            );
            self.store.save(&mut log).await?;
            self.queue_webhook_log(&log).await;
        }
        Ok(())
    }

    /// Registered webhooks, cached briefly: fan-out runs on every state
    /// transition and the listing rarely changes.
    pub(crate) async fn list_webhooks_cached(
        &self,
    ) -> Result<Vec<Webhook>, crate::error::EngineError> {
        let now = self.clock.now();
        if let Some(webhooks) = self.webhook_cache.get(&(), now) {
            return Ok(webhooks);
        }
        let webhooks: Vec<Webhook> = self.store.search(of_storage::Query::new()).await?;
        self.webhook_cache.put((), webhooks.clone(), now);
        Ok(webhooks)
    }

    /// Enqueue a delivery for a queued/retrying log row.
    pub(crate) async fn queue_webhook_log(&self, log: &WebhookMessageLog) {
        use of_core::webhook::WebhookMessageState;

        let visibility = match log.state {
            WebhookMessageState::Queued => None,
            WebhookMessageState::Retrying => Some(crate::webhooks::RETRY_VISIBILITY),
            WebhookMessageState::Succeeded | WebhookMessageState::Failed => {
                tracing::error!(
                    webhook_id = %log.webhook_id,
                    event_id = %log.event_id,
                    state = %log.state,
                    "invalid webhook log state, not queuing"
                );
                return;
            }
        };

        let queued =
            WebhookMessageQueued { webhook_id: log.webhook_id, event_id: log.event_id };
        self.queues
            .send_object_with(crate::webhooks::WEBHOOKS_QUEUE, &queued, visibility, None)
            .await;
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
