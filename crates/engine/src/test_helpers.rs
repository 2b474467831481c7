// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test fixtures: an engine wired to in-memory backends and fakes.

use crate::engine::{Engine, ServiceConfig};
use of_adapters::{FakeCloud, FakeWebhookSender};
use of_core::pool::AutoscaleConfig;
use of_core::{Architecture, FakeClock, Os, Pool, PoolName, PoolState};
use of_storage::{MemoryQueues, MemoryTables, Queues, Store};
use std::sync::Arc;

pub struct TestContext {
    pub engine: Engine<FakeClock>,
    pub clock: FakeClock,
    pub cloud: FakeCloud,
    pub sender: FakeWebhookSender,
}

pub fn test_engine() -> TestContext {
    let clock = FakeClock::new();
    let cloud = FakeCloud::new();
    let sender = FakeWebhookSender::new();
    let store = Store::new(Arc::new(MemoryTables::new(clock.clone())));
    let queues = Queues::new(Arc::new(MemoryQueues::new(clock.clone())));
    let engine = Engine::new(
        store,
        queues,
        Arc::new(cloud.clone()),
        Arc::new(sender.clone()),
        clock.clone(),
        ServiceConfig::new("onefuzz-test"),
    );
    TestContext { engine, clock, cloud, sender }
}

impl TestContext {
    /// A running pool with its work queue created.
    pub async fn running_pool(&self, name: &str) -> Pool {
        self.running_pool_with_autoscale(name, None).await
    }

    pub async fn running_pool_with_autoscale(
        &self,
        name: &str,
        autoscale: Option<AutoscaleConfig>,
    ) -> Pool {
        let mut pool = self
            .engine
            .create_pool(PoolName::new(name), Os::Linux, Architecture::X86_64, true, autoscale)
            .await
            .unwrap();
        self.engine.pool_process_state_update(&mut pool).await.unwrap();
        assert_eq!(pool.state, PoolState::Running);
        pool
    }
}

/// Minimal autoscale policy for pool tests.
pub fn autoscale_config(min: u64, max: u64, scaleset_size: u64) -> AutoscaleConfig {
    AutoscaleConfig {
        image: "Canonical:UbuntuServer:18.04-LTS:latest".into(),
        vm_sku: "Standard_D2s_v3".into(),
        scaleset_size,
        min_size: min,
        max_size: Some(max),
        region: Some(of_core::Region::new("eastus")),
        spot_instances: false,
        ephemeral_os_disks: false,
    }
}
