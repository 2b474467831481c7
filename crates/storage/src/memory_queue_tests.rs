// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit tests for queue visibility and TTL behavior

use super::*;
use of_core::FakeClock;
use std::time::Duration as StdDuration;

fn setup() -> (FakeClock, MemoryQueues) {
    let clock = FakeClock::new();
    let queues = MemoryQueues::new(clock.clone());
    (clock, queues)
}

#[tokio::test]
async fn received_messages_become_invisible_until_timeout() {
    let (clock, queues) = setup();
    queues.create("q").await.unwrap();
    queues.send("q", "m1".into(), None, None).await.unwrap();

    let received = queues.receive("q", 10, StdDuration::from_secs(30)).await.unwrap();
    assert_eq!(received.len(), 1);

    // Invisible while the timeout holds.
    assert!(queues.receive("q", 10, StdDuration::from_secs(30)).await.unwrap().is_empty());
    assert!(queues.peek("q", 10).await.unwrap().is_empty());

    // Visible again after the timeout lapses.
    clock.advance(StdDuration::from_secs(31));
    let again = queues.receive("q", 10, StdDuration::from_secs(30)).await.unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].body, "m1");
}

#[tokio::test]
async fn delete_message_removes_received_message() {
    let (_, queues) = setup();
    queues.create("q").await.unwrap();
    queues.send("q", "m1".into(), None, None).await.unwrap();

    let received = queues.receive("q", 10, StdDuration::from_secs(30)).await.unwrap();
    queues.delete_message("q", &received[0].message_id).await.unwrap();

    assert!(!queues.remove_first("q").await.unwrap());
}

#[tokio::test]
async fn make_visible_resurfaces_message_immediately() {
    let (_, queues) = setup();
    queues.create("q").await.unwrap();
    queues.send("q", "m1".into(), None, None).await.unwrap();

    let received = queues.receive("q", 10, StdDuration::from_secs(300)).await.unwrap();
    queues.make_visible("q", &received[0].message_id).await.unwrap();

    assert_eq!(queues.peek("q", 10).await.unwrap(), vec!["m1".to_string()]);
}

#[tokio::test]
async fn send_with_visibility_delays_first_delivery() {
    let (clock, queues) = setup();
    queues.create("q").await.unwrap();
    queues.send("q", "m1".into(), Some(StdDuration::from_secs(30)), None).await.unwrap();

    assert!(queues.peek("q", 10).await.unwrap().is_empty());
    clock.advance(StdDuration::from_secs(31));
    assert_eq!(queues.peek("q", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn expired_messages_are_pruned() {
    let (clock, queues) = setup();
    queues.create("q").await.unwrap();
    queues.send("q", "m1".into(), None, Some(StdDuration::from_secs(60))).await.unwrap();

    clock.advance(StdDuration::from_secs(61));
    assert!(queues.peek("q", 10).await.unwrap().is_empty());
    assert!(!queues.remove_first("q").await.unwrap());
}

#[tokio::test]
async fn delete_queue_drops_messages() {
    let (_, queues) = setup();
    queues.create("q").await.unwrap();
    queues.send("q", "m1".into(), None, None).await.unwrap();
    queues.delete("q").await.unwrap();

    // Queue is gone: sends are refused rather than silently recreated.
    assert!(!queues.send("q", "m2".into(), None, None).await.unwrap());
}
