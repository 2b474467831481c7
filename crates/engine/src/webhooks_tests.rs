// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit tests for webhook delivery and retry

use super::*;
use crate::test_helpers::test_engine;
use of_core::webhook::WebhookMessageLog;
use of_core::{Event, EventId, EventType, JobId, TaskId};
use of_storage::Query;

async fn delivery_setup(
    ctx: &crate::test_helpers::TestContext,
    secret_token: Option<&str>,
) -> (Webhook, WebhookMessageQueued) {
    ctx.engine.queues().create(WEBHOOKS_QUEUE).await.unwrap();
    let mut webhook = Webhook::builder()
        .event_types(vec![EventType::TaskStopped])
        .secret_token(secret_token.map(str::to_string))
        .build();
    ctx.engine.store().save(&mut webhook).await.unwrap();

    let event = Event::TaskStopped { job_id: JobId::new(), task_id: TaskId::new() };
    let mut log = WebhookMessageLog::new(webhook.webhook_id, EventId::new(), event);
    ctx.engine.store().save(&mut log).await.unwrap();
    let queued = WebhookMessageQueued { webhook_id: log.webhook_id, event_id: log.event_id };
    (webhook, queued)
}

async fn load_log(
    ctx: &crate::test_helpers::TestContext,
    queued: &WebhookMessageQueued,
) -> WebhookMessageLog {
    ctx.engine
        .store()
        .get(queued.webhook_id, Some(&queued.event_id.to_string()))
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn successful_delivery_marks_succeeded() {
    let ctx = test_engine();
    let (webhook, queued) = delivery_setup(&ctx, None).await;

    ctx.engine.process_webhook_message(queued).await.unwrap();

    let log = load_log(&ctx, &queued).await;
    assert_eq!(log.state, WebhookMessageState::Succeeded);
    assert_eq!(log.try_count, 1);

    let deliveries = ctx.sender.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].url, webhook.url);
    assert!(deliveries[0].digest.is_none());

    let body: of_core::WebhookMessage =
        serde_json::from_str(&deliveries[0].body).unwrap();
    assert_eq!(body.webhook_id, webhook.webhook_id);
    assert_eq!(body.event.event_type(), EventType::TaskStopped);
}

#[tokio::test]
async fn failures_increment_try_count_on_the_same_row() {
    let ctx = test_engine();
    let (_, queued) = delivery_setup(&ctx, None).await;
    ctx.sender.script([false, false, false, false, true]);

    // Four failures then a success; one row throughout.
    for expected_try in 1..=4u64 {
        ctx.engine.process_webhook_message(queued).await.unwrap();
        let log = load_log(&ctx, &queued).await;
        assert_eq!(log.try_count, expected_try);
        assert_eq!(log.state, WebhookMessageState::Retrying);
    }

    ctx.engine.process_webhook_message(queued).await.unwrap();
    let log = load_log(&ctx, &queued).await;
    assert_eq!(log.state, WebhookMessageState::Succeeded);
    assert_eq!(log.try_count, 5);

    let logs: Vec<WebhookMessageLog> =
        ctx.engine.store().search(Query::new()).await.unwrap();
    assert_eq!(logs.len(), 1);
}

#[tokio::test]
async fn five_failures_mark_failed() {
    let ctx = test_engine();
    let (_, queued) = delivery_setup(&ctx, None).await;
    ctx.sender.script([false; 5]);

    for _ in 0..5 {
        ctx.engine.process_webhook_message(queued).await.unwrap();
    }

    let log = load_log(&ctx, &queued).await;
    assert_eq!(log.state, WebhookMessageState::Failed);
    assert_eq!(log.try_count, MAX_TRIES);

    // Terminal: further processing does not resend.
    ctx.engine.process_webhook_message(queued).await.unwrap();
    assert_eq!(ctx.sender.deliveries().len(), 5);
}

#[tokio::test]
async fn retry_is_requeued_with_backoff() {
    let ctx = test_engine();
    let (_, queued) = delivery_setup(&ctx, None).await;
    ctx.sender.script([false]);

    ctx.engine.process_webhook_message(queued).await.unwrap();

    // Requeued, but invisible until the backoff lapses.
    let hidden: Vec<WebhookMessageQueued> =
        ctx.engine.queues().peek_object(WEBHOOKS_QUEUE, 32).await;
    assert!(hidden.is_empty());

    ctx.clock.advance(RETRY_VISIBILITY + std::time::Duration::from_secs(1));
    let visible: Vec<WebhookMessageQueued> =
        ctx.engine.queues().peek_object(WEBHOOKS_QUEUE, 32).await;
    assert_eq!(visible.len(), 1);
}

#[tokio::test]
async fn secret_token_adds_hmac_digest() {
    let ctx = test_engine();
    let (_, queued) = delivery_setup(&ctx, Some("hunter2")).await;

    ctx.engine.process_webhook_message(queued).await.unwrap();

    let deliveries = ctx.sender.deliveries();
    let digest = deliveries[0].digest.as_deref().unwrap();
    assert_eq!(digest, hmac_sha512_digest("hunter2", &deliveries[0].body));
    // SHA-512 output: 128 hex chars.
    assert_eq!(digest.len(), 128);
}

#[tokio::test]
async fn missing_webhook_is_a_failed_attempt() {
    let ctx = test_engine();
    let (webhook, queued) = delivery_setup(&ctx, None).await;
    ctx.engine.store().delete(&webhook).await.unwrap();

    ctx.engine.process_webhook_message(queued).await.unwrap();

    let log = load_log(&ctx, &queued).await;
    assert_eq!(log.state, WebhookMessageState::Retrying);
    assert!(ctx.sender.deliveries().is_empty());
}

#[tokio::test]
async fn missing_log_row_is_ignored() {
    let ctx = test_engine();
    ctx.engine.queues().create(WEBHOOKS_QUEUE).await.unwrap();
    let queued = WebhookMessageQueued {
        webhook_id: of_core::WebhookId::new(),
        event_id: EventId::new(),
    };
    ctx.engine.process_webhook_message(queued).await.unwrap();
}

#[tokio::test]
async fn queue_tick_drains_and_processes() {
    let ctx = test_engine();
    let (_, queued) = delivery_setup(&ctx, None).await;
    ctx.engine.queues().send_object(WEBHOOKS_QUEUE, &queued).await;

    ctx.engine.webhook_queue_tick().await;

    let log = load_log(&ctx, &queued).await;
    assert_eq!(log.state, WebhookMessageState::Succeeded);

    let remaining: Vec<WebhookMessageQueued> =
        ctx.engine.queues().peek_object(WEBHOOKS_QUEUE, 32).await;
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn old_logs_are_expired() {
    let ctx = test_engine();
    let (_, queued) = delivery_setup(&ctx, None).await;
    ctx.engine.process_webhook_message(queued).await.unwrap();

    ctx.clock.advance(std::time::Duration::from_secs(8 * 24 * 3600));
    ctx.engine.expire_webhook_logs().await.unwrap();

    let logs: Vec<WebhookMessageLog> =
        ctx.engine.store().search(Query::new()).await.unwrap();
    assert!(logs.is_empty());
}

#[test]
fn digest_is_deterministic_and_keyed() {
    let a = hmac_sha512_digest("key", "body");
    let b = hmac_sha512_digest("key", "body");
    let c = hmac_sha512_digest("other", "body");
    assert_eq!(a, b);
    assert_ne!(a, c);
}
