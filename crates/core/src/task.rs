// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task model, configuration, and state machine.

use crate::fault::Fault;
use crate::ids::{JobId, TaskId};
use crate::primitives::{Container, PoolName, Region};
use crate::records::{RowMeta, StoreSchema};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Init,
    Waiting,
    Scheduled,
    SettingUp,
    Running,
    Stopping,
    Stopped,
}

impl TaskState {
    /// States past the point where prerequisite tasks are considered satisfied.
    pub fn has_started(self) -> bool {
        matches!(self, TaskState::Running | TaskState::Stopping | TaskState::Stopped)
    }

    /// States that indicate the reconciler has work to do.
    pub fn needs_work() -> &'static [TaskState] {
        &[TaskState::Init, TaskState::Stopping]
    }

    /// States that indicate the task isn't stopping.
    pub fn available() -> &'static [TaskState] {
        &[
            TaskState::Init,
            TaskState::Waiting,
            TaskState::Scheduled,
            TaskState::SettingUp,
            TaskState::Running,
        ]
    }

    pub fn shutting_down(self) -> bool {
        matches!(self, TaskState::Stopping | TaskState::Stopped)
    }

    /// States in which a node may hold an assignment for the task.
    pub fn assignable(self) -> bool {
        matches!(self, TaskState::Scheduled | TaskState::SettingUp | TaskState::Running)
    }
}

crate::simple_display! {
    TaskState {
        Init => "init",
        Waiting => "waiting",
        Scheduled => "scheduled",
        SettingUp => "setting_up",
        Running => "running",
        Stopping => "stopping",
        Stopped => "stopped",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Coverage,
    LibfuzzerFuzz,
    LibfuzzerCoverage,
    LibfuzzerCrashReport,
    LibfuzzerMerge,
    LibfuzzerRegression,
    GenericAnalysis,
    GenericSupervisor,
    GenericMerge,
    GenericGenerator,
    GenericCrashReport,
    GenericRegression,
}

crate::simple_display! {
    TaskType {
        Coverage => "coverage",
        LibfuzzerFuzz => "libfuzzer_fuzz",
        LibfuzzerCoverage => "libfuzzer_coverage",
        LibfuzzerCrashReport => "libfuzzer_crash_report",
        LibfuzzerMerge => "libfuzzer_merge",
        LibfuzzerRegression => "libfuzzer_regression",
        GenericAnalysis => "generic_analysis",
        GenericSupervisor => "generic_supervisor",
        GenericMerge => "generic_merge",
        GenericGenerator => "generic_generator",
        GenericCrashReport => "generic_crash_report",
        GenericRegression => "generic_regression",
    }
}

/// Role a container plays for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    Analysis,
    Coverage,
    Crashes,
    Inputs,
    NoRepro,
    ReadonlyInputs,
    Reports,
    Setup,
    Tools,
    UniqueInputs,
    UniqueReports,
    RegressionReports,
}

impl ContainerType {
    /// Field name used when rendering the container group into a
    /// [`TaskUnitConfig`].
    pub fn as_field(self) -> &'static str {
        match self {
            ContainerType::Analysis => "analysis",
            ContainerType::Coverage => "coverage",
            ContainerType::Crashes => "crashes",
            ContainerType::Inputs => "inputs",
            ContainerType::NoRepro => "no_repro",
            ContainerType::ReadonlyInputs => "readonly_inputs",
            ContainerType::Reports => "reports",
            ContainerType::Setup => "setup",
            ContainerType::Tools => "tools",
            ContainerType::UniqueInputs => "unique_inputs",
            ContainerType::UniqueReports => "unique_reports",
            ContainerType::RegressionReports => "regression_reports",
        }
    }
}

crate::simple_display! {
    ContainerType {
        Analysis => "analysis",
        Coverage => "coverage",
        Crashes => "crashes",
        Inputs => "inputs",
        NoRepro => "no_repro",
        ReadonlyInputs => "readonly_inputs",
        Reports => "reports",
        Setup => "setup",
        Tools => "tools",
        UniqueInputs => "unique_inputs",
        UniqueReports => "unique_reports",
        RegressionReports => "regression_reports",
    }
}

/// Agent-side debug switches carried on the task config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDebugFlag {
    KeepNodeOnFailure,
    KeepNodeOnCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsFormat {
    #[serde(rename = "AFL")]
    Afl,
}

/// Per-type task parameters. Which of the optional fields are honored is
/// governed by the task type's feature list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetails {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Lifetime of the task, in hours. Bounded to `[1, 168]` at create.
    pub duration: u64,
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
    pub wait_for_files: Option<ContainerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_format: Option<StatsFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reboot_after_setup: Option<bool>,
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

impl TaskDetails {
    /// Minimal details for a task type, used by tests and builders.
    pub fn for_type(task_type: TaskType) -> Self {
        Self {
            task_type,
            duration: 1,
            target_exe: Some("fuzz.exe".into()),
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
            reboot_after_setup: None,
            ensemble_sync_delay: None,
            preserve_existing_outputs: None,
            report_list: None,
            minimized_stack_depth: None,
            coverage_filter: None,
        }
    }
}

/// Run the task on a managed pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPool {
    pub count: u64,
    pub pool_name: PoolName,
}

/// Run the task on dedicated VMs instead of a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskVm {
    pub region: Region,
    pub sku: String,
    pub image: String,
    #[serde(default = "default_vm_count")]
    pub count: u64,
    #[serde(default)]
    pub spot_instances: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reboot_after_setup: Option<bool>,
}

fn default_vm_count() -> u64 {
    1
}

/// A container binding: which container fills which role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContainer {
    #[serde(rename = "type")]
    pub container_type: ContainerType,
    pub name: Container,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prereq_tasks: Option<Vec<TaskId>>,
    pub task: TaskDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm: Option<TaskVm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<TaskPool>,
    pub containers: Vec<TaskContainer>,
    #[serde(default)]
    pub tags: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<Vec<TaskDebugFlag>>,
}

/// One fuzzing activity within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub state: TaskState,
    pub os: crate::primitives::Os,
    pub config: TaskConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Fault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Merged from the task-heartbeat queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub meta: RowMeta,
}

impl Task {
    pub fn new(config: TaskConfig, os: crate::primitives::Os) -> Self {
        Self {
            job_id: config.job_id,
            task_id: TaskId::new(),
            state: TaskState::Init,
            os,
            config,
            error: None,
            end_time: None,
            heartbeat: None,
            meta: RowMeta::default(),
        }
    }

    /// Instance count requested for this task (pool count or vm count).
    pub fn instance_count(&self) -> u64 {
        if let Some(pool) = &self.config.pool {
            pool.count
        } else if let Some(vm) = &self.config.vm {
            vm.count
        } else {
            1
        }
    }

    pub fn has_debug_flag(&self, flag: TaskDebugFlag) -> bool {
        self.config.debug.as_deref().is_some_and(|flags| flags.contains(&flag))
    }
}

crate::entity! {
    Task => "Task", StoreSchema::keyed("job_id", "task_id")
}

crate::builder! {
    pub struct TaskBuilder => Task {
        set {
            job_id: JobId = JobId::new(),
            task_id: TaskId = TaskId::new(),
            state: TaskState = TaskState::Init,
            os: crate::primitives::Os = crate::primitives::Os::Linux,
            config: TaskConfig = TaskConfig {
                job_id: JobId::new(),
                prereq_tasks: None,
                task: TaskDetails::for_type(TaskType::LibfuzzerFuzz),
                vm: None,
                pool: Some(TaskPool { count: 1, pool_name: PoolName::new("pool") }),
                containers: Vec::new(),
                tags: IndexMap::new(),
                debug: None,
            },
            error: Option<Fault> = None,
            end_time: Option<DateTime<Utc>> = None,
            heartbeat: Option<DateTime<Utc>> = None,
        }
        computed {
            meta: RowMeta = RowMeta::default(),
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
