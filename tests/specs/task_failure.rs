// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task failure path: worker exit → fault recorded → stopped → event.

use crate::common::harness;
use of_core::{EventType, FaultCode, NodeTaskState, TaskState};
use of_wire::{ExitStatus, WorkerEvent};

#[tokio::test]
async fn failed_worker_exit_stops_task_with_fault() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let job = h.job().await;
    let task = h.libfuzzer_task(&job, &pool, 1).await;

    let machine_id = of_core::MachineId::new();
    h.register(&pool, machine_id, None).await;
    let mut running = h.engine.get_task(task.task_id).await.unwrap().unwrap();
    h.engine.task_set_state(&mut running, TaskState::Running).await.unwrap();
    let mut entry = of_core::NodeTask::new(machine_id, task.task_id, NodeTaskState::Running);
    h.engine.store().save(&mut entry).await.unwrap();

    // Subscribe a webhook so the failure event is observable.
    let mut webhook = of_core::Webhook::builder()
        .event_types(vec![EventType::TaskFailed, EventType::TaskStopped])
        .build();
    h.engine.store().save(&mut webhook).await.unwrap();
    h.engine.queues().create(of_engine::WEBHOOKS_QUEUE).await.unwrap();

    h.engine
        .on_worker_event(
            machine_id,
            WorkerEvent::Done {
                task_id: task.task_id,
                exit_status: ExitStatus { code: Some(1), signal: None, success: false },
                stdout: "fuzzing stats".into(),
                stderr: "panic: crash".into(),
            },
        )
        .await
        .unwrap();

    let task = h.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Stopping);
    let error = task.error.clone().unwrap();
    assert_eq!(error.code, FaultCode::TaskFailed);
    assert_eq!(error.errors[0], "task failed. exit_status:code=1");
    assert_eq!(error.errors[1], "fuzzing stats");
    assert_eq!(error.errors[2], "panic: crash");

    // task_failed was fanned out.
    let logs: Vec<of_core::WebhookMessageLog> =
        h.engine.store().search(of_storage::Query::new()).await.unwrap();
    assert!(logs.iter().any(|log| log.event.event_type() == EventType::TaskFailed));

    // Next tick the task reaches stopped and task_stopped is emitted.
    h.engine.tasks_tick().await;
    let task = h.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Stopped);

    let logs: Vec<of_core::WebhookMessageLog> =
        h.engine.store().search(of_storage::Query::new()).await.unwrap();
    assert!(logs.iter().any(|log| log.event.event_type() == EventType::TaskStopped));
}

#[tokio::test]
async fn successful_exit_stops_without_fault() {
    let h = harness();
    let pool = h.pool("fuzz-pool", None).await;
    let job = h.job().await;
    let task = h.libfuzzer_task(&job, &pool, 1).await;

    let machine_id = of_core::MachineId::new();
    h.register(&pool, machine_id, None).await;

    h.engine
        .on_worker_event(
            machine_id,
            WorkerEvent::Done {
                task_id: task.task_id,
                exit_status: ExitStatus { code: Some(0), signal: None, success: true },
                stdout: String::new(),
                stderr: String::new(),
            },
        )
        .await
        .unwrap();

    let task = h.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Stopping);
    assert!(task.error.is_none());
}
