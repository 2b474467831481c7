// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook delivery: retry on a single log row until success or failure.

use crate::common::harness;
use of_core::webhook::WebhookMessageState;
use of_core::{Event, EventType, JobId, TaskId, Webhook, WebhookMessageLog};
use of_engine::WEBHOOKS_QUEUE;
use of_storage::Query;

#[tokio::test]
async fn four_failures_then_success_on_one_row() {
    let h = harness();
    h.engine.queues().create(WEBHOOKS_QUEUE).await.unwrap();
    let mut webhook =
        Webhook::builder().event_types(vec![EventType::TaskStopped]).build();
    h.engine.store().save(&mut webhook).await.unwrap();

    // The endpoint returns 500 four times, then 200.
    h.sender.script([false, false, false, false, true]);

    h.engine
        .send_event(Event::TaskStopped { job_id: JobId::new(), task_id: TaskId::new() })
        .await;

    // Drain the queue and the retry backoffs until the ladder completes.
    for _ in 0..5 {
        h.engine.webhook_queue_tick().await;
        h.clock.advance(of_engine::RETRY_VISIBILITY + std::time::Duration::from_secs(1));
    }

    let logs: Vec<WebhookMessageLog> = h.engine.store().search(Query::new()).await.unwrap();
    // One row throughout: never a second row for the same delivery.
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].state, WebhookMessageState::Succeeded);
    assert_eq!(logs[0].try_count, 5);
    assert_eq!(h.sender.deliveries().len(), 5);
}

#[tokio::test]
async fn delivery_is_eventually_terminal() {
    let h = harness();
    h.engine.queues().create(WEBHOOKS_QUEUE).await.unwrap();
    let mut webhook =
        Webhook::builder().event_types(vec![EventType::TaskStopped]).build();
    h.engine.store().save(&mut webhook).await.unwrap();

    // The endpoint never recovers.
    h.sender.script([false; 8]);

    h.engine
        .send_event(Event::TaskStopped { job_id: JobId::new(), task_id: TaskId::new() })
        .await;

    for _ in 0..8 {
        h.engine.webhook_queue_tick().await;
        h.clock.advance(of_engine::RETRY_VISIBILITY + std::time::Duration::from_secs(1));
    }

    let logs: Vec<WebhookMessageLog> = h.engine.store().search(Query::new()).await.unwrap();
    assert_eq!(logs[0].state, WebhookMessageState::Failed);
    assert_eq!(logs[0].try_count, of_engine::MAX_TRIES);
    // No deliveries after the terminal state.
    assert_eq!(h.sender.deliveries().len(), of_engine::MAX_TRIES as usize);
}

#[tokio::test]
async fn unsubscribed_events_are_not_delivered() {
    let h = harness();
    h.engine.queues().create(WEBHOOKS_QUEUE).await.unwrap();
    let mut webhook =
        Webhook::builder().event_types(vec![EventType::ProxyCreated]).build();
    h.engine.store().save(&mut webhook).await.unwrap();

    h.engine
        .send_event(Event::TaskStopped { job_id: JobId::new(), task_id: TaskId::new() })
        .await;
    h.engine.webhook_queue_tick().await;

    let logs: Vec<WebhookMessageLog> = h.engine.store().search(Query::new()).await.unwrap();
    assert!(logs.is_empty());
    assert!(h.sender.deliveries().is_empty());
}
