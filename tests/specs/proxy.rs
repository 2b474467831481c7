// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy lifetime and port-forward allocation.

use crate::common::{harness, IMAGE, VM_SKU};
use of_core::proxy::PROXY_PORT_RANGE;
use of_core::{Region, VmState};

async fn provision(h: &crate::common::Harness, region: &Region) -> of_core::Proxy {
    let mut proxy = h.engine.get_or_create_proxy(region).await.unwrap();
    h.engine.proxy_process_state_update(&mut proxy).await.unwrap();
    h.engine.proxy_process_state_update(&mut proxy).await.unwrap();
    h.cloud.finish_vm(&proxy.vm_name(), "20.1.2.3", "10.0.0.9");
    h.engine.proxy_process_state_update(&mut proxy).await.unwrap();
    assert_eq!(proxy.state, VmState::Running);
    proxy
}

#[tokio::test]
async fn proxy_past_lifespan_is_replaced_with_fresh_uuid() {
    let h = harness();
    let region = Region::new("eastus");
    let original = provision(&h, &region).await;

    // Cross the seven-day lifespan; the daily tick marks it outdated.
    h.clock.advance(std::time::Duration::from_secs(7 * 24 * 3600 + 1));
    h.engine.daily_tick().await;

    let proxies = h.engine.all_proxies().await.unwrap();
    assert!(proxies.iter().all(|proxy| proxy.outdated));

    // Unused and outdated: the proxy tick walks it to stopped and the
    // row disappears.
    h.engine.proxy_tick().await;
    h.engine.proxy_tick().await;
    let remaining = h.engine.all_proxies().await.unwrap();
    assert!(remaining.iter().all(|proxy| proxy.proxy_id != original.proxy_id));

    // On-demand creation hands out a fresh proxy.
    let replacement = h.engine.get_or_create_proxy(&region).await.unwrap();
    assert_ne!(replacement.proxy_id, original.proxy_id);
}

#[tokio::test]
async fn forward_ports_are_unique_and_lowest_free() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let region = Region::new("eastus");
    let scaleset = h
        .engine
        .create_scaleset(pool.name.clone(), VM_SKU, IMAGE, region.clone(), 0, false, false, [])
        .await
        .unwrap();

    let machine_a = of_core::MachineId::new();
    let machine_b = of_core::MachineId::new();
    h.cloud.add_instance(scaleset.scaleset_id, machine_a);
    h.cloud.add_instance(scaleset.scaleset_id, machine_b);

    let first = h
        .engine
        .update_or_create_forward(region.clone(), scaleset.scaleset_id, machine_a, 22, 1)
        .await
        .unwrap();
    let second = h
        .engine
        .update_or_create_forward(region.clone(), scaleset.scaleset_id, machine_b, 22, 1)
        .await
        .unwrap();

    assert_eq!(first.port, PROXY_PORT_RANGE.start);
    assert_eq!(second.port, PROXY_PORT_RANGE.start + 1);
    assert_ne!(first.machine_id, second.machine_id);

    // Freeing the first port makes it the next allocation again.
    h.engine
        .remove_forwards(scaleset.scaleset_id, Some(machine_a), None)
        .await
        .unwrap();
    let third = h
        .engine
        .update_or_create_forward(region, scaleset.scaleset_id, machine_a, 2222, 1)
        .await
        .unwrap();
    assert_eq!(third.port, PROXY_PORT_RANGE.start);
}

#[tokio::test]
async fn stopping_task_drops_its_forwards() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let job = h.job().await;
    let task = h.libfuzzer_task(&job, &pool, 1).await;

    let region = Region::new("eastus");
    let scaleset = h
        .engine
        .create_scaleset(pool.name.clone(), VM_SKU, IMAGE, region.clone(), 0, false, false, [])
        .await
        .unwrap();
    let machine_id = of_core::MachineId::new();
    h.cloud.add_instance(scaleset.scaleset_id, machine_id);
    h.register(&pool, machine_id, Some(scaleset.scaleset_id)).await;
    let mut entry =
        of_core::NodeTask::new(machine_id, task.task_id, of_core::NodeTaskState::Running);
    h.engine.store().save(&mut entry).await.unwrap();

    h.engine
        .update_or_create_forward(region.clone(), scaleset.scaleset_id, machine_id, 22, 1)
        .await
        .unwrap();

    let mut task = h.engine.get_task(task.task_id).await.unwrap().unwrap();
    h.engine.task_mark_stopping(&mut task).await.unwrap();
    h.engine.task_process_state_update(&mut task).await.unwrap();

    let forwards = h
        .engine
        .search_forwards(Some(&region), None, None, None, None)
        .await
        .unwrap();
    assert!(forwards.is_empty());
}
