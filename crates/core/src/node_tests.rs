// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit tests for the node model and command queue

use super::*;
use yare::parameterized;

#[parameterized(
    done = { NodeState::Done },
    shutdown = { NodeState::Shutdown },
    halt = { NodeState::Halt },
)]
fn reset_states_never_accept_work(state: NodeState) {
    assert!(state.ready_for_reset());
    assert!(!state.can_process_new_work());
}

#[parameterized(
    init = { NodeState::Init, false },
    free = { NodeState::Free, false },
    setting_up = { NodeState::SettingUp, true },
    rebooting = { NodeState::Rebooting, true },
    ready = { NodeState::Ready, true },
    busy = { NodeState::Busy, true },
    done = { NodeState::Done, false },
)]
fn in_use_states(state: NodeState, expected: bool) {
    assert_eq!(state.in_use(), expected);
}

#[test]
fn only_free_can_process_new_work() {
    assert!(NodeState::Free.can_process_new_work());
    assert!(!NodeState::Init.can_process_new_work());
    assert!(!NodeState::Busy.can_process_new_work());
}

#[test]
fn message_ids_sort_in_send_order() {
    let machine_id = MachineId::new();
    let early = NodeMessage::new(machine_id, 999, NodeCommand::Stop {});
    let late = NodeMessage::new(machine_id, 1_000_000_000_000, NodeCommand::StopIfFree {});
    assert!(early.message_id < late.message_id);
    assert_eq!(early.message_id.len(), late.message_id.len());
}

#[test]
fn node_command_wire_shape() {
    let stop = serde_json::to_value(NodeCommand::Stop {}).unwrap();
    assert_eq!(stop, serde_json::json!({"stop": {}}));

    let task_id = TaskId::new();
    let stop_task = serde_json::to_value(NodeCommand::StopTask { task_id }).unwrap();
    assert_eq!(stop_task["stop_task"]["task_id"], serde_json::json!(task_id));
}

#[test]
fn node_command_rejects_multiple_arms() {
    let multi = r#"{"stop": {}, "stop_if_free": {}}"#;
    assert!(serde_json::from_str::<NodeCommand>(multi).is_err());
}

#[test]
fn node_command_rejects_empty_object() {
    assert!(serde_json::from_str::<NodeCommand>("{}").is_err());
}
