// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-entity invariants and idempotence properties.

use crate::common::{autoscale, harness, IMAGE, VM_SKU};
use of_core::{
    Clock, Event, EventMessage, EventType, NodeState, PoolState, Region, TaskState, WorkSet,
};
use of_wire::AgentRegistrationPost;

#[tokio::test]
async fn reset_nodes_never_accept_new_work() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;

    for state in [NodeState::Done, NodeState::Shutdown, NodeState::Halt] {
        let machine_id = of_core::MachineId::new();
        h.register(&pool, machine_id, None).await;
        let mut node = h.engine.get_node(machine_id).await.unwrap().unwrap();
        node.state = state;
        h.engine.store().save(&mut node).await.unwrap();

        assert!(
            !h.engine.node_can_process_new_work(&mut node).await.unwrap(),
            "node in {state} accepted work"
        );
    }
}

#[tokio::test]
async fn scaleset_size_never_exceeds_image_cap() {
    let h = harness();
    let pool = h.pool("fuzz-pool", Some(autoscale(0, 5000, 5000))).await;

    let scaleset = h
        .engine
        .create_scaleset(
            pool.name.clone(),
            VM_SKU,
            IMAGE,
            Region::new("eastus"),
            5000,
            false,
            false,
            [],
        )
        .await
        .unwrap();
    assert!(scaleset.size <= of_core::Scaleset::max_size_for_image(IMAGE));

    let mut scaleset = scaleset;
    h.engine.scaleset_set_size(&mut scaleset, 9999).await.unwrap();
    assert!(scaleset.size <= 1000);
}

#[tokio::test]
async fn draining_pools_refuse_worksets() {
    let h = harness();
    let workset = WorkSet {
        reboot: false,
        script: false,
        setup_url: String::new(),
        work_units: Vec::new(),
    };

    for now in [false, true] {
        let name = if now { "halt-pool" } else { "drain-pool" };
        let mut pool = h.pool(name, None).await;
        h.engine.pool_set_shutdown(&mut pool, now).await.unwrap();
        assert!(
            matches!(pool.state, PoolState::Shutdown | PoolState::Halt),
            "expected draining state"
        );
        assert!(!h.engine.pool_schedule_workset(&pool, &workset).await);
    }
}

#[tokio::test]
async fn register_twice_is_register_once() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let machine_id = of_core::MachineId::new();

    let request = AgentRegistrationPost {
        machine_id,
        pool_name: pool.name.clone(),
        scaleset_id: None,
        version: of_core::SERVICE_VERSION.into(),
    };
    let first = h.engine.register_node(request.clone()).await.unwrap();
    let second = h.engine.register_node(request).await.unwrap();
    assert_eq!(first, second);

    let nodes = h.engine.search_nodes(Some(&pool.name), None, None).await.unwrap();
    assert_eq!(nodes.len(), 1);
}

#[tokio::test]
async fn mark_stopping_twice_is_mark_stopping_once() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let job = h.job().await;
    let task = h.libfuzzer_task(&job, &pool, 1).await;

    let mut task = h.engine.get_task(task.task_id).await.unwrap().unwrap();
    h.engine.task_mark_stopping(&mut task).await.unwrap();
    let after_first = task.state;
    h.engine.task_mark_stopping(&mut task).await.unwrap();
    assert_eq!(task.state, after_first);
    assert_eq!(task.state, TaskState::Stopping);
}

#[tokio::test]
async fn event_envelope_round_trips_for_published_events() {
    let h = harness();
    h.engine.queues().create(of_engine::SIGNALR_EVENTS_QUEUE).await.unwrap();
    let pool = h.pool("fuzz-pool", None).await;
    let job = h.job().await;
    h.libfuzzer_task(&job, &pool, 1).await;

    let published: Vec<EventMessage> = h
        .engine
        .queues()
        .peek_object(of_engine::SIGNALR_EVENTS_QUEUE, 32)
        .await;
    assert!(!published.is_empty());
    let types: Vec<EventType> =
        published.iter().map(|message| message.event.event_type()).collect();
    assert!(types.contains(&EventType::PoolCreated));
    assert!(types.contains(&EventType::JobCreated));
    assert!(types.contains(&EventType::TaskCreated));

    for message in published {
        let json = serde_json::to_string(&message).unwrap();
        let back: EventMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
    }
}

#[tokio::test]
async fn task_assignments_exist_while_running() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let job = h.job().await;
    let task = h.libfuzzer_task(&job, &pool, 1).await;

    let machine_id = of_core::MachineId::new();
    h.register(&pool, machine_id, None).await;
    h.engine
        .on_worker_event(machine_id, of_wire::WorkerEvent::Running { task_id: task.task_id })
        .await
        .unwrap();

    let task = h.engine.get_task(task.task_id).await.unwrap().unwrap();
    if matches!(task.state, TaskState::SettingUp | TaskState::Running) {
        let nodes = h.engine.nodes_by_task(task.task_id).await.unwrap();
        assert!(!nodes.is_empty());
    }
}

#[tokio::test]
async fn live_proxies_are_within_lifespan_or_flagged() {
    let h = harness();
    let region = Region::new("eastus");
    let proxy = h.engine.get_or_create_proxy(&region).await.unwrap();

    // Fresh proxy: inside the lifespan, not flagged.
    assert!(!proxy.outdated);
    assert!(h.clock.now_utc() - proxy.created_timestamp <= chrono::Duration::days(7));

    // Once past the lifespan, any tick flags it.
    h.clock.advance(std::time::Duration::from_secs(8 * 24 * 3600));
    h.engine.proxy_tick().await;
    let proxies = h.engine.all_proxies().await.unwrap();
    for proxy in proxies {
        assert!(
            proxy.outdated
                || h.clock.now_utc() - proxy.created_timestamp <= chrono::Duration::days(7)
        );
    }
}

#[tokio::test]
async fn resize_to_zero_reaches_shutdown_then_halt() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let mut scaleset = h
        .engine
        .create_scaleset(
            pool.name.clone(),
            VM_SKU,
            IMAGE,
            Region::new("eastus"),
            0,
            false,
            false,
            [],
        )
        .await
        .unwrap();
    scaleset.state = of_core::ScalesetState::Shutdown;
    h.engine.store().save(&mut scaleset).await.unwrap();

    // No VMSS behind it: shutdown falls through to halt and the row goes.
    h.engine.scaleset_process_state_update(&mut scaleset).await.unwrap();
    assert!(h.engine.get_scaleset(scaleset.scaleset_id).await.unwrap().is_none());
}
