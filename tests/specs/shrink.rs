// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful shrink: tokens authorize exactly N nodes to self-halt.

use crate::common::harness;
use of_core::{MachineId, NodeState};
use of_storage::ShrinkQueue;
use of_wire::NodeStateUpdate;

#[tokio::test]
async fn two_tokens_halt_exactly_two_of_three_free_nodes() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let scaleset_id = of_core::ScalesetId::new();

    let machines: Vec<MachineId> = (0..3).map(|_| MachineId::new()).collect();
    for machine_id in &machines {
        h.cloud.add_instance(scaleset_id, *machine_id);
        h.register(&pool, *machine_id, Some(scaleset_id)).await;
    }

    let shrink = ShrinkQueue::new(scaleset_id, h.engine.queues());
    shrink.create().await;
    shrink.set_size(2).await;

    for machine_id in &machines {
        h.engine
            .on_state_update(
                *machine_id,
                NodeStateUpdate { state: NodeState::Free, data: None },
            )
            .await
            .unwrap();
    }

    let mut halted = 0;
    let mut free = 0;
    for machine_id in &machines {
        match h.engine.get_node(*machine_id).await.unwrap().unwrap().state {
            NodeState::Halt => halted += 1,
            NodeState::Free => free += 1,
            other => panic!("unexpected node state {other}"),
        }
    }
    assert_eq!(halted, 2);
    assert_eq!(free, 1);
}

#[tokio::test]
async fn consumed_tokens_are_not_reusable() {
    let h = harness();
    let shrink = ShrinkQueue::new(of_core::ScalesetId::new(), h.engine.queues());
    shrink.create().await;
    shrink.set_size(3).await;

    // k calls consume at most k authorizations.
    let mut granted = 0;
    for _ in 0..5 {
        if shrink.should_shrink().await {
            granted += 1;
        }
    }
    assert_eq!(granted, 3);

    // set_size resets rather than accumulates.
    shrink.set_size(1).await;
    assert!(shrink.should_shrink().await);
    assert!(!shrink.should_shrink().await);
}
