// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule-and-run flow: pool → job → task → workset → agent events.

use crate::common::{autoscale, harness};
use of_core::{NodeState, NodeTaskState, TaskState, WorkSet};
use of_wire::{NodeStateUpdate, StateUpdateData, WorkerEvent};

#[tokio::test]
async fn schedule_and_run_one_libfuzzer_task() {
    let h = harness();
    let pool = h.pool("fuzz-pool", Some(autoscale(0, 2, 2))).await;
    let job = h.job().await;
    let task = h.libfuzzer_task(&job, &pool, 1).await;
    assert_eq!(task.state, TaskState::Waiting);

    // Scheduler binds the task onto the pool queue.
    h.engine.schedule_tasks().await.unwrap();
    let task = h.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Scheduled);

    let worksets: Vec<WorkSet> = h.engine.pool_peek_work_queue(&pool).await;
    assert_eq!(worksets.len(), 1);
    assert_eq!(worksets[0].work_units.len(), 1);
    assert_eq!(worksets[0].work_units[0].task_id, task.task_id);

    // The autoscaler observes the queued workset and provisions capacity.
    h.engine.workers_tick().await;
    let scalesets = h.engine.scalesets_by_pool(&pool.name).await.unwrap();
    assert_eq!(scalesets.len(), 1);
    assert!(scalesets[0].size >= 1);
    assert!(scalesets[0].size <= 2);

    // An agent boots on one of the scaleset's machines and works the task.
    let machine_id = of_core::MachineId::new();
    h.cloud.add_instance(scalesets[0].scaleset_id, machine_id);
    h.register(&pool, machine_id, Some(scalesets[0].scaleset_id)).await;

    h.engine
        .on_state_update(machine_id, NodeStateUpdate { state: NodeState::Free, data: None })
        .await
        .unwrap();
    h.engine
        .on_state_update(
            machine_id,
            NodeStateUpdate {
                state: NodeState::SettingUp,
                data: Some(StateUpdateData {
                    tasks: Some(vec![task.task_id]),
                    error: None,
                    script_output: None,
                }),
            },
        )
        .await
        .unwrap();
    h.engine
        .on_worker_event(machine_id, WorkerEvent::Running { task_id: task.task_id })
        .await
        .unwrap();

    let task = h.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Running);

    let entries = h.engine.node_tasks(machine_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].task_id, task.task_id);
    assert_eq!(entries[0].state, NodeTaskState::Running);

    let node = h.engine.get_node(machine_id).await.unwrap().unwrap();
    assert_eq!(node.state, NodeState::Busy);
}

#[tokio::test]
async fn count_n_enqueues_n_worksets() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let job = h.job().await;
    let task = h.libfuzzer_task(&job, &pool, 3).await;

    h.engine.schedule_tasks().await.unwrap();

    let worksets: Vec<WorkSet> = h.engine.pool_peek_work_queue(&pool).await;
    assert_eq!(worksets.len(), 3);
    assert!(worksets.iter().all(|w| w.work_units[0].task_id == task.task_id));
}

#[tokio::test]
async fn prereq_task_gates_scheduling_until_running() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let job = h.job().await;

    let fuzz = h.libfuzzer_task(&job, &pool, 1).await;
    let mut report = h.libfuzzer_task(&job, &pool, 1).await;
    report.config.prereq_tasks = Some(vec![fuzz.task_id]);
    h.engine.store().save(&mut report).await.unwrap();

    h.engine.schedule_tasks().await.unwrap();
    let report_state = h.engine.get_task(report.task_id).await.unwrap().unwrap().state;
    assert_eq!(report_state, TaskState::Waiting);

    // Prereq starts running; the dependent becomes eligible.
    let mut fuzz = h.engine.get_task(fuzz.task_id).await.unwrap().unwrap();
    h.engine.task_set_state(&mut fuzz, TaskState::Running).await.unwrap();

    h.engine.schedule_tasks().await.unwrap();
    let report_state = h.engine.get_task(report.task_id).await.unwrap().unwrap().state;
    assert_eq!(report_state, TaskState::Scheduled);
}
