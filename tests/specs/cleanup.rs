// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node cleanup against cloud truth: dead nodes, reimage batches, holds.

use crate::common::{harness, IMAGE, VM_SKU};
use of_core::{Clock, FaultCode, NodeState, NodeTaskState, Region, TaskState};

#[tokio::test]
async fn dead_node_is_reimaged_and_its_tasks_failed() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let mut scaleset = h
        .engine
        .create_scaleset(
            pool.name.clone(),
            VM_SKU,
            IMAGE,
            Region::new("eastus"),
            1,
            false,
            false,
            [],
        )
        .await
        .unwrap();
    let machine_id = of_core::MachineId::new();
    h.cloud.add_instance(scaleset.scaleset_id, machine_id);
    h.register(&pool, machine_id, Some(scaleset.scaleset_id)).await;

    // Node heartbeats once, picks up a task, then goes silent.
    h.engine.node_heartbeat(machine_id).await.unwrap();
    let job = h.job().await;
    let task = h.libfuzzer_task(&job, &pool, 1).await;
    let mut running = h.engine.get_task(task.task_id).await.unwrap().unwrap();
    h.engine.task_set_state(&mut running, TaskState::Running).await.unwrap();
    let mut entry = of_core::NodeTask::new(machine_id, task.task_id, NodeTaskState::Running);
    h.engine.store().save(&mut entry).await.unwrap();

    h.clock.advance(std::time::Duration::from_secs(61 * 60));
    h.engine.cleanup_nodes(&mut scaleset).await.unwrap();

    let node = h.engine.get_node(machine_id).await.unwrap();
    // Reimaged via the batch call; the row is recreated on next boot.
    let calls = h.cloud.reimage_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.contains(&machine_id));
    assert!(node.is_none() || node.unwrap().reimage_requested);

    let task = h.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Stopping);
    assert_eq!(task.error.unwrap().code, FaultCode::TaskFailed);
}

#[tokio::test]
async fn debug_keep_node_is_never_disposed() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let mut scaleset = h
        .engine
        .create_scaleset(
            pool.name.clone(),
            VM_SKU,
            IMAGE,
            Region::new("eastus"),
            1,
            false,
            false,
            [],
        )
        .await
        .unwrap();
    let machine_id = of_core::MachineId::new();
    h.cloud.add_instance(scaleset.scaleset_id, machine_id);
    h.register(&pool, machine_id, Some(scaleset.scaleset_id)).await;

    let mut node = h.engine.get_node(machine_id).await.unwrap().unwrap();
    node.state = NodeState::Done;
    node.debug_keep_node = true;
    node.heartbeat = Some(h.clock.now_utc());
    h.engine.store().save(&mut node).await.unwrap();

    h.engine.cleanup_nodes(&mut scaleset).await.unwrap();

    assert!(h.cloud.reimage_calls().is_empty());
    assert!(h.cloud.delete_node_calls().is_empty());
    assert!(h.engine.get_node(machine_id).await.unwrap().is_some());
}

#[tokio::test]
async fn node_rows_follow_cloud_truth() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let mut scaleset = h
        .engine
        .create_scaleset(
            pool.name.clone(),
            VM_SKU,
            IMAGE,
            Region::new("eastus"),
            2,
            false,
            false,
            [],
        )
        .await
        .unwrap();

    // One instance the store does not know about, one row the cloud
    // does not know about.
    let unknown = of_core::MachineId::new();
    h.cloud.add_instance(scaleset.scaleset_id, unknown);
    let vanished = of_core::MachineId::new();
    h.engine
        .create_node(
            pool.name.clone(),
            vanished,
            Some(scaleset.scaleset_id),
            of_core::SERVICE_VERSION,
            false,
        )
        .await
        .unwrap();

    h.engine.cleanup_nodes(&mut scaleset).await.unwrap();

    assert!(h.engine.get_node(unknown).await.unwrap().is_some());
    assert!(h.engine.get_node(vanished).await.unwrap().is_none());
}
