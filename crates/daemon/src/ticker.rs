// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tick loops driving the reconcilers.

use of_core::Clock;
use of_engine::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// The webhook queue drains faster than the reconcilers tick.
const WEBHOOK_TICK: Duration = Duration::from_secs(5);

/// Heartbeats merge on their own short cadence.
const HEARTBEAT_TICK: Duration = Duration::from_secs(10);

const DAILY_TICK: Duration = Duration::from_secs(24 * 3600);

fn spawn_loop<K, F, Fut>(engine: Arc<Engine<K>>, period: Duration, name: &'static str, tick: F)
where
    K: Clock,
    F: Fn(Arc<Engine<K>>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            tracing::debug!(tick = name, "tick");
            tick(engine.clone()).await;
        }
    });
}

/// Run all tick loops until the process is stopped.
pub async fn run<K: Clock>(
    engine: Arc<Engine<K>>,
    tick_interval: Duration,
    data_storage_topic: Option<String>,
) {
    spawn_loop(engine.clone(), tick_interval, "tasks", |engine| async move {
        engine.tasks_tick().await;
    });
    spawn_loop(engine.clone(), tick_interval, "workers", |engine| async move {
        engine.workers_tick().await;
    });
    spawn_loop(engine.clone(), tick_interval, "proxy", |engine| async move {
        engine.proxy_tick().await;
    });
    spawn_loop(engine.clone(), WEBHOOK_TICK, "webhooks", |engine| async move {
        engine.webhook_queue_tick().await;
    });
    spawn_loop(engine.clone(), HEARTBEAT_TICK, "heartbeats", |engine| async move {
        engine.heartbeats_tick().await;
    });
    spawn_loop(engine.clone(), HEARTBEAT_TICK, "proxy-updates", |engine| async move {
        engine.proxy_updates_tick().await;
    });
    if let Some(topic) = data_storage_topic {
        let topic = Arc::new(topic);
        spawn_loop(engine.clone(), HEARTBEAT_TICK, "file-changes", move |engine| {
            let topic = topic.clone();
            async move {
                engine.file_changes_tick(&topic).await;
            }
        });
    }
    spawn_loop(engine.clone(), DAILY_TICK, "daily", |engine| async move {
        engine.daily_tick().await;
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(error) => tracing::error!(%error, "signal handler failed"),
    }
}
