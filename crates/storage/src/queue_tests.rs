// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit tests for the typed queue service

use super::*;
use crate::memory_queue::MemoryQueues;
use of_core::FakeClock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Payload {
    id: u64,
    name: String,
}

fn queues() -> Queues {
    Queues::new(std::sync::Arc::new(MemoryQueues::new(FakeClock::new())))
}

#[tokio::test]
async fn send_to_missing_queue_returns_false() {
    let queues = queues();
    assert!(!queues.send_object("missing", &Payload { id: 1, name: "a".into() }).await);
}

#[tokio::test]
async fn send_peek_round_trips_base64_json() {
    let queues = queues();
    queues.create("work").await.unwrap();
    let payload = Payload { id: 7, name: "unit".into() };
    assert!(queues.send_object("work", &payload).await);

    let peeked: Vec<Payload> = queues.peek_object("work", 32).await;
    assert_eq!(peeked, vec![payload.clone()]);

    // Peek is non-destructive.
    let again: Vec<Payload> = queues.peek_object("work", 32).await;
    assert_eq!(again, vec![payload]);
}

#[tokio::test]
async fn receive_and_delete_one_consumes_in_order() {
    let queues = queues();
    queues.create("work").await.unwrap();
    for id in 0..3u64 {
        queues.send_object("work", &Payload { id, name: "x".into() }).await;
    }

    assert!(queues.receive_and_delete_one("work").await);
    let remaining: Vec<Payload> = queues.peek_object("work", 32).await;
    assert_eq!(remaining.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn receive_and_delete_one_on_missing_queue_is_false() {
    let queues = queues();
    assert!(!queues.receive_and_delete_one("missing").await);
}

#[tokio::test]
async fn undecodable_messages_are_skipped_on_peek() {
    let clock = FakeClock::new();
    let backend = std::sync::Arc::new(MemoryQueues::new(clock));
    let queues = Queues::new(backend.clone());
    queues.create("work").await.unwrap();
    backend.send("work", "not-base64!!".into(), None, None).await.unwrap();
    queues.send_object("work", &Payload { id: 1, name: "ok".into() }).await;

    let peeked: Vec<Payload> = queues.peek_object("work", 32).await;
    assert_eq!(peeked.len(), 1);
    assert_eq!(peeked[0].id, 1);
}

#[tokio::test]
async fn clear_empties_the_queue() {
    let queues = queues();
    queues.create("work").await.unwrap();
    queues.send_object("work", &Payload { id: 1, name: "x".into() }).await;
    queues.clear("work").await.unwrap();
    let peeked: Vec<Payload> = queues.peek_object("work", 32).await;
    assert!(peeked.is_empty());
}

#[test]
fn sas_url_reflects_permissions() {
    let queues = queues();
    let url = queues.sas_url("pool-abc", QueueSas::consume());
    assert!(url.contains("pool-abc"));
    assert!(url.ends_with("sp=rup"));

    let add_only = queues.sas_url("task-heartbeat", QueueSas::add());
    assert!(add_only.ends_with("sp=a"));
}
