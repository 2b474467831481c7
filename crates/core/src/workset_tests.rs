// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit tests for WorkSet payloads and rendered task configs

use super::*;

fn sample_workset(units: usize) -> WorkSet {
    WorkSet {
        reboot: false,
        script: true,
        setup_url: "https://example/container?sas".into(),
        work_units: (0..units)
            .map(|_| WorkUnit {
                job_id: JobId::new(),
                task_id: TaskId::new(),
                task_type: TaskType::LibfuzzerFuzz,
                config: "{}".into(),
            })
            .collect(),
    }
}

#[test]
fn empty_workset_is_synthetic() {
    assert!(sample_workset(0).is_synthetic());
    assert!(!sample_workset(1).is_synthetic());
}

#[test]
fn workset_round_trips() {
    let workset = sample_workset(2);
    let json = serde_json::to_string(&workset).unwrap();
    let back: WorkSet = serde_json::from_str(&json).unwrap();
    assert_eq!(back, workset);
}

#[test]
fn unit_config_omits_unset_slots() {
    let config = TaskUnitConfig::new(
        JobId::new(),
        TaskId::new(),
        TaskType::LibfuzzerFuzz,
        uuid::Uuid::new_v4(),
        "https://example/task-heartbeat?sas".into(),
    );
    let json = serde_json::to_value(&config).unwrap();
    let object = json.as_object().unwrap();
    assert_eq!(
        object.keys().collect::<Vec<_>>(),
        vec!["job_id", "task_id", "task_type", "instance_id", "heartbeat_queue"],
    );
}

#[test]
fn container_group_serializes_single_as_object_and_many_as_array() {
    let single = ContainerGroup::Single(SyncedDir {
        path: "task_crashes_0".into(),
        url: "https://example/crashes?sas".into(),
    });
    assert!(serde_json::to_value(&single).unwrap().is_object());

    let many = ContainerGroup::Many(vec![SyncedDir {
        path: "task_readonly_inputs_0".into(),
        url: "https://example/inputs?sas".into(),
    }]);
    assert!(serde_json::to_value(&many).unwrap().is_array());
}

#[test]
fn container_group_round_trips_both_shapes() {
    for group in [
        ContainerGroup::Single(SyncedDir { path: "p".into(), url: "u".into() }),
        ContainerGroup::Many(vec![SyncedDir { path: "p".into(), url: "u".into() }]),
    ] {
        let json = serde_json::to_string(&group).unwrap();
        let back: ContainerGroup = serde_json::from_str(&json).unwrap();
        assert_eq!(back, group);
    }
}

#[test]
fn set_container_group_routes_to_named_slot() {
    let mut config = TaskUnitConfig::new(
        JobId::new(),
        TaskId::new(),
        TaskType::LibfuzzerFuzz,
        uuid::Uuid::new_v4(),
        "q".into(),
    );
    config.set_container_group(
        crate::task::ContainerType::Crashes,
        ContainerGroup::Single(SyncedDir { path: "task_crashes_0".into(), url: "u".into() }),
    );
    assert!(config.crashes.is_some());
    assert!(config.inputs.is_none());
}
