// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WorkSet and the rendered per-task agent configuration.

use crate::ids::{JobId, TaskId};
use crate::task::{StatsFormat, TaskType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One task instance's worth of work inside a WorkSet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub task_type: TaskType,
    /// Fully rendered [`TaskUnitConfig`], carried as a JSON string so the
    /// transport stays opaque to the agent envelope.
    pub config: String,
}

/// The message an agent pops from the pool queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSet {
    pub reboot: bool,
    /// True when the setup container carries an OS-appropriate setup script.
    pub script: bool,
    pub setup_url: String,
    pub work_units: Vec<WorkUnit>,
}

impl WorkSet {
    /// Synthetic WorkSets carry no work; the autoscaler enqueues them to
    /// nudge idle agents to poll, and cleans them up the next tick.
    pub fn is_synthetic(&self) -> bool {
        self.work_units.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnitSummary {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub task_type: TaskType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSetSummary {
    pub work_units: Vec<WorkUnitSummary>,
}

/// A container SAS handed to the agent, with the local sync path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedDir {
    pub path: String,
    pub url: String,
}

/// One or many synced containers for a container slot, depending on the
/// task definition's count rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContainerGroup {
    Single(SyncedDir),
    Many(Vec<SyncedDir>),
}

/// The agent-side task configuration rendered by the scheduler.
///
/// Every optional field is present exactly when the task type's definition
/// declares the matching feature or container slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUnitConfig {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub instance_id: Uuid,
    pub heartbeat_queue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_telemetry_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microsoft_telemetry_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_queue: Option<String>,

    // Container slots, named after the container type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ContainerGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<ContainerGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crashes: Option<ContainerGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<ContainerGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_repro: Option<ContainerGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly_inputs: Option<ContainerGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reports: Option<ContainerGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ContainerGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_inputs: Option<ContainerGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_reports: Option<ContainerGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regression_reports: Option<ContainerGroup>,

    // Feature-gated fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_exe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_env: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_workers: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_options_merge: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_asan_log: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_debugger: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_retry_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_fuzzer_help: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_crash_on_failure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_output: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_exe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_env: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_input_marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_exe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_env: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_exe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_env: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_files: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_format: Option<StatsFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensemble_sync_delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_existing_outputs: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimized_stack_depth: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_filter: Option<String>,
}

impl TaskUnitConfig {
    pub fn new(
        job_id: JobId,
        task_id: TaskId,
        task_type: TaskType,
        instance_id: Uuid,
        heartbeat_queue: String,
    ) -> Self {
        Self {
            job_id,
            task_id,
            task_type,
            instance_id,
            heartbeat_queue,
            instance_telemetry_key: None,
            microsoft_telemetry_key: None,
            input_queue: None,
            analysis: None,
            coverage: None,
            crashes: None,
            inputs: None,
            no_repro: None,
            readonly_inputs: None,
            reports: None,
            tools: None,
            unique_inputs: None,
            unique_reports: None,
            regression_reports: None,
            target_exe: None,
            target_env: None,
            target_options: None,
            target_workers: None,
            target_options_merge: None,
            target_timeout: None,
            check_asan_log: None,
            check_debugger: None,
            check_retry_count: None,
            check_fuzzer_help: None,
            expect_crash_on_failure: None,
            rename_output: None,
            supervisor_exe: None,
            supervisor_env: None,
            supervisor_options: None,
            supervisor_input_marker: None,
            generator_exe: None,
            generator_env: None,
            generator_options: None,
            analyzer_exe: None,
            analyzer_env: None,
            analyzer_options: None,
            wait_for_files: None,
            stats_file: None,
            stats_format: None,
            ensemble_sync_delay: None,
            preserve_existing_outputs: None,
            report_list: None,
            minimized_stack_depth: None,
            coverage_filter: None,
        }
    }

    /// Set a container slot by type name. Unknown slots are a programming
    /// error in the definitions table, caught by the scheduler's tests.
    pub fn set_container_group(
        &mut self,
        container_type: crate::task::ContainerType,
        group: ContainerGroup,
    ) {
        use crate::task::ContainerType::*;
        match container_type {
            Analysis => self.analysis = Some(group),
            Coverage => self.coverage = Some(group),
            Crashes => self.crashes = Some(group),
            Inputs => self.inputs = Some(group),
            NoRepro => self.no_repro = Some(group),
            ReadonlyInputs => self.readonly_inputs = Some(group),
            Reports => self.reports = Some(group),
            Tools => self.tools = Some(group),
            UniqueInputs => self.unique_inputs = Some(group),
            UniqueReports => self.unique_reports = Some(group),
            RegressionReports => self.regression_reports = Some(group),
            // setup is delivered via the WorkSet setup_url, not as a slot
            Setup => {}
        }
    }
}

#[cfg(test)]
#[path = "workset_tests.rs"]
mod tests;
