// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine: collaborators plus per-kind handlers.
//!
//! Handler modules each add an `impl<K: Clock> Engine<K>` block; all
//! shared state lives in the store and queues, so the engine itself is
//! cheap to clone across tick loops.

use crate::cache::TtlCache;
use crate::error::EngineError;
use of_adapters::{CloudProvider, WebhookSender};
use of_core::webhook::Webhook;
use of_core::{Clock, InstanceConfig, NodeDisposalStrategy};
use of_storage::{Queues, Store};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long the webhook listing may be served from cache.
const WEBHOOK_CACHE_TTL: Duration = Duration::from_secs(30);

/// Service-level settings resolved at startup (environment-derived).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub instance_id: uuid::Uuid,
    pub instance_name: String,
    /// Base address agents are pointed at for events/commands.
    pub base_url: String,
    pub version: String,
    /// Region scalesets land in when the pool's policy names none.
    pub base_region: of_core::Region,
    pub disposal_strategy: NodeDisposalStrategy,
    /// Test override for the per-scaleset size cap.
    pub scaleset_max_size: Option<u64>,
}

impl ServiceConfig {
    pub fn new(instance_name: impl Into<String>) -> Self {
        let instance_name = instance_name.into();
        Self {
            instance_id: uuid::Uuid::new_v4(),
            base_url: format!("https://{instance_name}.azurewebsites.net"),
            instance_name,
            version: of_core::SERVICE_VERSION.to_string(),
            base_region: of_core::Region::new("eastus"),
            disposal_strategy: NodeDisposalStrategy::ScaleIn,
            scaleset_max_size: None,
        }
    }
}

pub struct Engine<K: Clock> {
    pub(crate) store: Store,
    pub(crate) queues: Queues,
    pub(crate) cloud: Arc<dyn CloudProvider>,
    pub(crate) webhook_sender: Arc<dyn WebhookSender>,
    pub(crate) clock: K,
    pub(crate) config: ServiceConfig,
    pub(crate) webhook_cache: TtlCache<(), Vec<Webhook>>,
    message_stamp: AtomicU64,
}

impl<K: Clock> Engine<K> {
    pub fn new(
        store: Store,
        queues: Queues,
        cloud: Arc<dyn CloudProvider>,
        webhook_sender: Arc<dyn WebhookSender>,
        clock: K,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            queues,
            cloud,
            webhook_sender,
            clock,
            config,
            webhook_cache: TtlCache::new(WEBHOOK_CACHE_TTL, 1),
            message_stamp: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn queues(&self) -> &Queues {
        &self.queues
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now_utc()
    }

    /// Strictly increasing epoch-millisecond stamp for node message ids,
    /// so commands sent within the same millisecond keep their order.
    pub(crate) fn next_message_stamp(&self) -> u64 {
        let now_ms = self.now().timestamp_millis().max(0) as u64;
        let prev = self
            .message_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(last.max(now_ms.saturating_sub(1)) + 1)
            })
            .unwrap_or(now_ms);
        prev.max(now_ms.saturating_sub(1)) + 1
    }

    /// Fetch the instance-scope configuration, creating defaults on first use.
    pub async fn instance_config(&self) -> Result<InstanceConfig, EngineError> {
        let name = self.config.instance_name.clone();
        if let Some(config) = self.store.get::<InstanceConfig>(&name, None).await? {
            return Ok(config);
        }
        let mut config = InstanceConfig::new(&name);
        match self.store.insert(&mut config).await {
            Ok(()) => Ok(config),
            Err(of_storage::StoreError::AlreadyExists) => Ok(self
                .store
                .get::<InstanceConfig>(&name, None)
                .await?
                .unwrap_or(config)),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
