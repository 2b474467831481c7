// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit tests for agent-facing operations

use super::*;
use crate::test_helpers::test_engine;
use of_core::node::NodeCommand;
use of_core::task::TaskType;
use of_core::{FaultCode, ScalesetId, TaskId};
use of_wire::{ExitStatus, StateUpdateData};

fn registration(pool: &Pool, machine_id: MachineId) -> AgentRegistrationPost {
    AgentRegistrationPost {
        machine_id,
        pool_name: pool.name.clone(),
        scaleset_id: Some(ScalesetId::new()),
        version: of_core::SERVICE_VERSION.into(),
    }
}

async fn saved_task(
    ctx: &crate::test_helpers::TestContext,
    state: TaskState,
) -> of_core::Task {
    let mut task = of_core::Task::builder().state(state).build();
    ctx.engine.store().save(&mut task).await.unwrap();
    task
}

#[tokio::test]
async fn register_is_idempotent() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();

    let first = ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();
    let second = ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();
    assert_eq!(first, second);

    let node = ctx.engine.get_node(machine_id).await.unwrap().unwrap();
    assert_eq!(node.state, NodeState::Init);
    assert!(!node.reimage_requested);
}

#[tokio::test]
async fn registration_get_returns_existing_registration() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();

    let err = ctx.engine.get_registration(machine_id).await.unwrap_err();
    assert!(matches!(err, EngineError::Fault(fault) if fault.code == FaultCode::UnableToFind));

    let posted = ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();
    let fetched = ctx.engine.get_registration(machine_id).await.unwrap();
    assert_eq!(fetched, posted);
}

#[tokio::test]
async fn register_unknown_pool_is_invalid_request() {
    let ctx = test_engine();
    let pool = Pool::builder().build();
    let err = ctx
        .engine
        .register_node(registration(&pool, MachineId::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Fault(fault) if fault.code == FaultCode::InvalidRequest));
}

#[tokio::test]
async fn register_version_change_clears_pending_commands() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();

    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();
    ctx.engine.node_send_message(machine_id, NodeCommand::Stop {}).await.unwrap();

    let mut request = registration(&pool, machine_id);
    request.version = "2.20.0".into();
    ctx.engine.register_node(request).await.unwrap();

    assert!(ctx.engine.node_messages(machine_id, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn register_fails_tasks_left_from_prior_boot() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let task = saved_task(&ctx, TaskState::Running).await;
    let mut entry =
        NodeTask::new(machine_id, task.task_id, of_core::NodeTaskState::Running);
    ctx.engine.store().save(&mut entry).await.unwrap();

    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let task = ctx.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Stopping);
    assert_eq!(task.error.unwrap().code, FaultCode::TaskFailed);
}

#[tokio::test]
async fn free_with_reset_flags_stops_node() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let mut node = ctx.engine.get_node(machine_id).await.unwrap().unwrap();
    node.reimage_requested = true;
    ctx.engine.store().save(&mut node).await.unwrap();

    ctx.engine
        .on_state_update(machine_id, NodeStateUpdate { state: NodeState::Free, data: None })
        .await
        .unwrap();

    let messages = ctx.engine.node_messages(machine_id, None).await.unwrap();
    assert!(messages.iter().any(|m| m.message == NodeCommand::Stop {}));
}

#[tokio::test]
async fn free_with_shrink_token_halts_node() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    let scaleset_id = ScalesetId::new();

    let mut request = registration(&pool, machine_id);
    request.scaleset_id = Some(scaleset_id);
    ctx.engine.register_node(request).await.unwrap();

    let shrink = of_storage::ShrinkQueue::new(scaleset_id, ctx.engine.queues());
    shrink.create().await;
    shrink.set_size(1).await;

    ctx.engine
        .on_state_update(machine_id, NodeStateUpdate { state: NodeState::Free, data: None })
        .await
        .unwrap();

    let node = ctx.engine.get_node(machine_id).await.unwrap().unwrap();
    assert_eq!(node.state, NodeState::Halt);
    // Token consumed: a second free node would stay free.
    assert!(!shrink.should_shrink().await);
}

#[tokio::test]
async fn init_clears_reimage_requested() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let mut node = ctx.engine.get_node(machine_id).await.unwrap().unwrap();
    node.reimage_requested = true;
    node.state = NodeState::Busy;
    ctx.engine.store().save(&mut node).await.unwrap();

    ctx.engine
        .on_state_update(machine_id, NodeStateUpdate { state: NodeState::Init, data: None })
        .await
        .unwrap();

    let node = ctx.engine.get_node(machine_id).await.unwrap().unwrap();
    assert!(!node.reimage_requested);
    assert_eq!(node.state, NodeState::Init);
}

#[tokio::test]
async fn setting_up_assigns_tasks() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let task = saved_task(&ctx, TaskState::Scheduled).await;

    ctx.engine
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

    let task = ctx.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::SettingUp);

    let entries = ctx.engine.node_tasks(machine_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].state, of_core::NodeTaskState::SettingUp);
}

#[tokio::test]
async fn setting_up_preserves_running_task_state() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    // Another node already has the task running (count > 1).
    let task = saved_task(&ctx, TaskState::Running).await;

    ctx.engine
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

    let task = ctx.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Running);
}

#[tokio::test]
async fn setting_up_without_tasks_is_invalid() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let err = ctx
        .engine
        .on_state_update(
            machine_id,
            NodeStateUpdate { state: NodeState::SettingUp, data: None },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Fault(fault) if fault.code == FaultCode::InvalidRequest));
}

#[tokio::test]
async fn done_with_error_fails_tasks_and_reimages() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let task = saved_task(&ctx, TaskState::Running).await;
    let mut entry =
        NodeTask::new(machine_id, task.task_id, of_core::NodeTaskState::Running);
    ctx.engine.store().save(&mut entry).await.unwrap();

    ctx.engine
        .on_state_update(
            machine_id,
            NodeStateUpdate {
                state: NodeState::Done,
                data: Some(StateUpdateData {
                    tasks: None,
                    error: Some("setup script failed".into()),
                    script_output: None,
                }),
            },
        )
        .await
        .unwrap();

    let task = ctx.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Stopping);
    assert_eq!(task.error.unwrap().code, FaultCode::TaskFailed);

    let node = ctx.engine.get_node(machine_id).await.unwrap().unwrap();
    assert!(node.reimage_requested);
}

#[tokio::test]
async fn worker_running_moves_task_and_node() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let task = saved_task(&ctx, TaskState::SettingUp).await;

    ctx.engine
        .on_worker_event(machine_id, WorkerEvent::Running { task_id: task.task_id })
        .await
        .unwrap();

    let task = ctx.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Running);
    assert!(task.end_time.is_some());

    let node = ctx.engine.get_node(machine_id).await.unwrap().unwrap();
    assert_eq!(node.state, NodeState::Busy);

    let entries = ctx.engine.node_tasks(machine_id).await.unwrap();
    assert_eq!(entries[0].state, of_core::NodeTaskState::Running);
}

#[tokio::test]
async fn worker_running_on_stopping_task_is_ignored() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let task = saved_task(&ctx, TaskState::Stopping).await;

    ctx.engine
        .on_worker_event(machine_id, WorkerEvent::Running { task_id: task.task_id })
        .await
        .unwrap();

    let task = ctx.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Stopping);
}

#[tokio::test]
async fn worker_done_failure_records_fault_with_tails() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let task = saved_task(&ctx, TaskState::Running).await;
    let mut entry =
        NodeTask::new(machine_id, task.task_id, of_core::NodeTaskState::Running);
    ctx.engine.store().save(&mut entry).await.unwrap();

    let long_output = "x".repeat(MAX_OUTPUT_SIZE + 100);
    ctx.engine
        .on_worker_event(
            machine_id,
            WorkerEvent::Done {
                task_id: task.task_id,
                exit_status: ExitStatus { code: Some(1), signal: None, success: false },
                stdout: long_output.clone(),
                stderr: "stack trace".into(),
            },
        )
        .await
        .unwrap();

    let task = ctx.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Stopping);
    let error = task.error.unwrap();
    assert_eq!(error.code, FaultCode::TaskFailed);
    assert_eq!(error.errors[0], "task failed. exit_status:code=1");
    assert_eq!(error.errors[1].len(), MAX_OUTPUT_SIZE);
    assert_eq!(error.errors[2], "stack trace");

    // Assignment is removed on completion.
    assert!(ctx.engine.node_tasks(machine_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn worker_done_success_stops_task() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let task = saved_task(&ctx, TaskState::Running).await;

    ctx.engine
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

    let task = ctx.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Stopping);
    assert!(task.error.is_none());
}

#[tokio::test]
async fn debug_keep_node_preserves_node_and_assignment() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let mut task = of_core::Task::builder().state(TaskState::Running).build();
    task.config.debug = Some(vec![of_core::TaskDebugFlag::KeepNodeOnFailure]);
    ctx.engine.store().save(&mut task).await.unwrap();
    let mut entry =
        NodeTask::new(machine_id, task.task_id, of_core::NodeTaskState::Running);
    ctx.engine.store().save(&mut entry).await.unwrap();

    ctx.engine
        .on_worker_event(
            machine_id,
            WorkerEvent::Done {
                task_id: task.task_id,
                exit_status: ExitStatus { code: Some(1), signal: None, success: false },
                stdout: String::new(),
                stderr: String::new(),
            },
        )
        .await
        .unwrap();

    let node = ctx.engine.get_node(machine_id).await.unwrap().unwrap();
    assert!(node.debug_keep_node);
    assert_eq!(ctx.engine.node_tasks(machine_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn command_poll_and_ack() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let machine_id = MachineId::new();
    ctx.engine.register_node(registration(&pool, machine_id)).await.unwrap();

    let empty = ctx.engine.get_node_command(machine_id).await.unwrap();
    assert!(empty.envelope.is_none());

    ctx.engine
        .node_send_message(machine_id, NodeCommand::StopTask { task_id: TaskId::new() })
        .await
        .unwrap();

    let pending = ctx.engine.get_node_command(machine_id).await.unwrap();
    let envelope = pending.envelope.unwrap();
    ctx.engine.delete_node_command(machine_id, &envelope.message_id).await.unwrap();

    let drained = ctx.engine.get_node_command(machine_id).await.unwrap();
    assert!(drained.envelope.is_none());
}

#[tokio::test]
async fn unknown_node_is_invalid_node_fault() {
    let ctx = test_engine();
    let err = ctx
        .engine
        .on_state_update(
            MachineId::new(),
            NodeStateUpdate { state: NodeState::Free, data: None },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Fault(fault) if fault.code == FaultCode::InvalidNode));
}

#[tokio::test]
async fn unsupported_task_types_are_not_schedulable() {
    let ctx = test_engine();
    let pool = ctx.running_pool("pool").await;
    let mut config = of_core::Task::builder().build().config;
    config.task.task_type = TaskType::Coverage;
    config.pool = Some(of_core::TaskPool { count: 1, pool_name: pool.name.clone() });

    let job = ctx
        .engine
        .create_job(of_core::JobConfig {
            project: "p".into(),
            name: "n".into(),
            build: "b".into(),
            duration: 24,
        })
        .await
        .unwrap();

    let err = ctx.engine.create_task(config, job.job_id).await.unwrap_err();
    assert!(matches!(err, EngineError::Fault(fault) if fault.code == FaultCode::InvalidRequest));
}
