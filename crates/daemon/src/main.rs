// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ofd`: standalone orchestrator daemon.
//!
//! Runs every reconciler on fixed tick intervals against in-memory
//! backends: the single-process mode used for local development and the
//! integration suite. Production deployments host the same engine behind
//! the HTTP/queue-trigger collaborators instead.

mod env;
mod ticker;

use of_adapters::{FakeCloud, HttpWebhookSender};
use of_core::SystemClock;
use of_engine::{Engine, ServiceConfig};
use of_storage::{MemoryQueues, MemoryTables, Queues, Store};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .init();
    guard
}

#[tokio::main]
async fn main() {
    let _guard = init_tracing();

    let instance_name = env::instance_name();
    let mut config = ServiceConfig::new(&instance_name);
    config.disposal_strategy = env::node_disposal_strategy();
    config.scaleset_max_size = env::scaleset_max_size();

    tracing::info!(
        instance = %instance_name,
        version = %config.version,
        disposal = %config.disposal_strategy,
        "starting ofd"
    );
    if let Some(group) = env::resource_group() {
        tracing::info!(resource_group = %group, "resource group configured");
    }
    if let Some(account) = env::func_storage() {
        tracing::info!(func_storage = %account, "function storage configured");
    }
    if let Some(vault) = env::keyvault() {
        tracing::info!(keyvault = %vault, "keyvault configured");
    }

    let clock = SystemClock;
    let store = Store::new(Arc::new(MemoryTables::new(clock.clone())));
    let queues = Queues::new(Arc::new(MemoryQueues::new(clock.clone())));
    let engine = Arc::new(Engine::new(
        store,
        queues,
        Arc::new(FakeCloud::new()),
        Arc::new(HttpWebhookSender::new()),
        clock,
        config,
    ));

    ticker::run(engine, env::tick_interval(), env::data_storage()).await;
}
