// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook delivery worker with bounded retry.

use crate::engine::Engine;
use crate::error::EngineError;
use hmac::{Hmac, Mac};
use of_core::webhook::{
    Webhook, WebhookMessage, WebhookMessageLog, WebhookMessageQueued, WebhookMessageState,
};
use of_core::{Clock, WebhookId};
use of_storage::Query;
use sha2::Sha512;
use std::time::Duration;

pub const WEBHOOKS_QUEUE: &str = "webhooks";

/// Delivery attempts before a log row is marked failed.
pub const MAX_TRIES: u64 = 5;

/// Back-off applied when re-enqueueing a failed delivery.
pub const RETRY_VISIBILITY: Duration = Duration::from_secs(30);

/// Delivery log rows older than this are removed by the daily tick.
pub const LOG_RETENTION: chrono::Duration = chrono::Duration::days(7);

/// Hex-encoded HMAC-SHA512 of the body under the webhook's secret token.
pub fn hmac_sha512_digest(secret_token: &str, body: &str) -> String {
    let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(secret_token.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts keys of any length"));
    mac.update(body.as_bytes());
    let digest = mac.finalize().into_bytes();
    digest.iter().fold(String::with_capacity(digest.len() * 2), |mut out, byte| {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
        out
    })
}

impl<K: Clock> Engine<K> {
    pub async fn get_webhook(&self, webhook_id: WebhookId) -> Result<Option<Webhook>, EngineError> {
        Ok(self.store.get(webhook_id, None).await?)
    }

    /// Drain pending deliveries from the webhooks queue.
    pub async fn webhook_queue_tick(&self) {
        let received: Vec<of_storage::Received<WebhookMessageQueued>> =
            self.queues.receive(WEBHOOKS_QUEUE, 32, Duration::from_secs(300)).await;

        for message in received {
            if let Err(error) = self.queues.delete_message(WEBHOOKS_QUEUE, &message.message_id).await
            {
                tracing::error!(%error, "failed to delete webhook queue message");
            }
            let Some(queued) = message.value else {
                continue;
            };
            if let Err(error) = self.process_webhook_message(queued).await {
                tracing::error!(
                    webhook_id = %queued.webhook_id,
                    event_id = %queued.event_id,
                    %error,
                    "webhook delivery processing failed"
                );
            }
        }
    }

    pub async fn process_webhook_message(
        &self,
        queued: WebhookMessageQueued,
    ) -> Result<(), EngineError> {
        let log: Option<WebhookMessageLog> = self
            .store
            .get(queued.webhook_id, Some(&queued.event_id.to_string()))
            .await?;
        let Some(mut log) = log else {
            tracing::error!(
                webhook_id = %queued.webhook_id,
                event_id = %queued.event_id,
                "webhook message log missing"
            );
            return Ok(());
        };

        if matches!(log.state, WebhookMessageState::Succeeded | WebhookMessageState::Failed) {
            tracing::info!(
                webhook_id = %log.webhook_id,
                event_id = %log.event_id,
                "webhook message already handled"
            );
            return Ok(());
        }

        log.try_count += 1;

        if self.send_webhook_log(&log).await? {
            log.state = WebhookMessageState::Succeeded;
            self.store.save(&mut log).await?;
            tracing::info!(
                webhook_id = %log.webhook_id,
                event_id = %log.event_id,
                "sent webhook event"
            );
            return Ok(());
        }

        if log.try_count < MAX_TRIES {
            log.state = WebhookMessageState::Retrying;
            self.store.save(&mut log).await?;
            self.queue_webhook_log(&log).await;
            tracing::warn!(
                webhook_id = %log.webhook_id,
                event_id = %log.event_id,
                try_count = log.try_count,
                "webhook delivery failed, re-queued"
            );
        } else {
            log.state = WebhookMessageState::Failed;
            self.store.save(&mut log).await?;
            tracing::warn!(
                webhook_id = %log.webhook_id,
                event_id = %log.event_id,
                try_count = log.try_count,
                "webhook delivery failed permanently"
            );
        }
        Ok(())
    }

    async fn send_webhook_log(&self, log: &WebhookMessageLog) -> Result<bool, EngineError> {
        let Some(webhook) = self.get_webhook(log.webhook_id).await? else {
            tracing::error!(
                webhook_id = %log.webhook_id,
                event_id = %log.event_id,
                "webhook no longer exists"
            );
            return Ok(false);
        };

        let message = WebhookMessage {
            webhook_id: log.webhook_id,
            event_id: log.event_id,
            event: log.event.clone(),
            instance_id: self.config.instance_id,
            instance_name: self.config.instance_name.clone(),
        };
        let body = serde_json::to_string(&message)?;
        let digest = webhook
            .secret_token
            .as_deref()
            .map(|token| hmac_sha512_digest(token, &body));

        Ok(self.webhook_sender.deliver(&webhook.url, &body, digest.as_deref()).await)
    }

    /// Delete delivery logs older than the retention window.
    pub async fn expire_webhook_logs(&self) -> Result<(), EngineError> {
        let cutoff = self.now() - LOG_RETENTION;
        let expired: Vec<WebhookMessageLog> = self
            .store
            .search(Query::new().before(of_storage::ROW_TIMESTAMP_FIELD, cutoff))
            .await?;
        for log in expired {
            tracing::info!(
                webhook_id = %log.webhook_id,
                event_id = %log.event_id,
                "removing expired webhook message log"
            );
            self.store.delete(&log).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "webhooks_tests.rs"]
mod tests;
