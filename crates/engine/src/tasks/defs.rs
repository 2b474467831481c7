// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-type task definitions: features, container rules, and vm counts.
//!
//! All tasks are required to have a `setup` container.

use of_core::task::{ContainerType, TaskType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFeature {
    TargetExe,
    TargetExeOptional,
    TargetEnv,
    TargetOptions,
    TargetOptionsMerge,
    TargetWorkers,
    TargetTimeout,
    CheckAsanLog,
    CheckDebugger,
    CheckRetryCount,
    CheckFuzzerHelp,
    ExpectCrashOnFailure,
    RenameOutput,
    SupervisorExe,
    SupervisorEnv,
    SupervisorOptions,
    SupervisorInputMarker,
    GeneratorExe,
    GeneratorEnv,
    GeneratorOptions,
    AnalyzerExe,
    AnalyzerEnv,
    AnalyzerOptions,
    WaitForFiles,
    StatsFile,
    EnsembleSyncDelay,
    PreserveExistingOutputs,
    ReportList,
    MinimizedStackDepth,
    CoverageFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Equal,
    AtLeast,
    AtMost,
}

impl Compare {
    pub fn check(self, expected: u64, actual: u64) -> bool {
        match self {
            Compare::Equal => expected == actual,
            Compare::AtLeast => expected <= actual,
            Compare::AtMost => expected >= actual,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerPermissions {
    pub read: bool,
    pub write: bool,
    pub list: bool,
    pub delete: bool,
    pub create: bool,
}

const READ_LIST: ContainerPermissions =
    ContainerPermissions { read: true, list: true, write: false, delete: false, create: false };
const CREATE_ONLY: ContainerPermissions =
    ContainerPermissions { create: true, read: false, list: false, write: false, delete: false };
const WRITE_CREATE: ContainerPermissions =
    ContainerPermissions { write: true, create: true, read: false, list: false, delete: false };
const READ_WRITE_LIST_CREATE: ContainerPermissions =
    ContainerPermissions { read: true, write: true, list: true, create: true, delete: false };
const CREATE_LIST: ContainerPermissions =
    ContainerPermissions { create: true, list: true, read: false, write: false, delete: false };
const CREATE_READ_LIST: ContainerPermissions =
    ContainerPermissions { create: true, read: true, list: true, write: false, delete: false };

#[derive(Debug, Clone, Copy)]
pub struct ContainerRule {
    pub container_type: ContainerType,
    pub compare: Compare,
    pub value: u64,
    pub permissions: ContainerPermissions,
}

const fn rule(
    container_type: ContainerType,
    compare: Compare,
    value: u64,
    permissions: ContainerPermissions,
) -> ContainerRule {
    ContainerRule { container_type, compare, value, permissions }
}

#[derive(Debug, Clone, Copy)]
pub struct VmRule {
    pub compare: Compare,
    pub value: u64,
}

const GENERIC_ANALYSIS_CONTAINERS: &[ContainerRule] = &[
    rule(ContainerType::Setup, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Analysis, Compare::Equal, 1, READ_WRITE_LIST_CREATE),
    rule(ContainerType::Crashes, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Tools, Compare::Equal, 1, READ_LIST),
];
const LIBFUZZER_FUZZ_CONTAINERS: &[ContainerRule] = &[
    rule(ContainerType::Setup, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Crashes, Compare::Equal, 1, WRITE_CREATE),
    rule(ContainerType::Inputs, Compare::Equal, 1, READ_WRITE_LIST_CREATE),
    rule(ContainerType::ReadonlyInputs, Compare::AtLeast, 0, READ_LIST),
];
const LIBFUZZER_CRASH_REPORT_CONTAINERS: &[ContainerRule] = &[
    rule(ContainerType::Setup, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Crashes, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Reports, Compare::AtMost, 1, CREATE_ONLY),
    rule(ContainerType::UniqueReports, Compare::AtMost, 1, CREATE_ONLY),
    rule(ContainerType::NoRepro, Compare::AtMost, 1, CREATE_ONLY),
];
const LIBFUZZER_COVERAGE_CONTAINERS: &[ContainerRule] = &[
    rule(ContainerType::Setup, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::ReadonlyInputs, Compare::AtLeast, 1, READ_LIST),
    rule(ContainerType::Coverage, Compare::Equal, 1, READ_WRITE_LIST_CREATE),
];
const LIBFUZZER_MERGE_CONTAINERS: &[ContainerRule] = &[
    rule(ContainerType::Setup, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::UniqueInputs, Compare::Equal, 1, READ_WRITE_LIST_CREATE),
    rule(ContainerType::Inputs, Compare::Equal, 1, CREATE_LIST),
];
const GENERIC_SUPERVISOR_CONTAINERS: &[ContainerRule] = &[
    rule(ContainerType::Setup, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Tools, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Crashes, Compare::Equal, 1, CREATE_ONLY),
    rule(ContainerType::Inputs, Compare::Equal, 1, CREATE_READ_LIST),
];
const GENERIC_MERGE_CONTAINERS: &[ContainerRule] = &[
    rule(ContainerType::Setup, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Tools, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::ReadonlyInputs, Compare::AtLeast, 1, READ_LIST),
    rule(ContainerType::Inputs, Compare::Equal, 1, CREATE_LIST),
];
const GENERIC_GENERATOR_CONTAINERS: &[ContainerRule] = &[
    rule(ContainerType::Setup, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Tools, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Crashes, Compare::Equal, 1, CREATE_ONLY),
    rule(ContainerType::ReadonlyInputs, Compare::AtLeast, 1, READ_LIST),
];
const GENERIC_CRASH_REPORT_CONTAINERS: &[ContainerRule] = &[
    rule(ContainerType::Setup, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Crashes, Compare::Equal, 1, READ_LIST),
    rule(ContainerType::Reports, Compare::AtMost, 1, CREATE_ONLY),
    rule(ContainerType::UniqueReports, Compare::AtMost, 1, CREATE_ONLY),
    rule(ContainerType::NoRepro, Compare::AtMost, 1, CREATE_ONLY),
];

#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub features: &'static [TaskFeature],
    pub vm: VmRule,
    pub containers: &'static [ContainerRule],
    pub monitor_queue: Option<ContainerType>,
}

/// Definition for a task type; `None` for types this service does not
/// schedule.
pub fn get_definition(task_type: TaskType) -> Option<TaskDefinition> {
    use ContainerType::*;
    use TaskFeature::*;

    let definition = match task_type {
        TaskType::GenericAnalysis => TaskDefinition {
            features: &[TargetExe, TargetOptions, AnalyzerExe, AnalyzerEnv, AnalyzerOptions],
            vm: VmRule { compare: Compare::AtLeast, value: 1 },
            containers: GENERIC_ANALYSIS_CONTAINERS,
            monitor_queue: Some(Crashes),
        },
        TaskType::LibfuzzerFuzz => TaskDefinition {
            features: &[TargetExe, TargetEnv, TargetOptions, TargetWorkers, EnsembleSyncDelay],
            vm: VmRule { compare: Compare::AtLeast, value: 1 },
            containers: LIBFUZZER_FUZZ_CONTAINERS,
            monitor_queue: None,
        },
        TaskType::LibfuzzerCrashReport => TaskDefinition {
            features: &[TargetExe, TargetEnv, TargetOptions, TargetTimeout, CheckRetryCount],
            vm: VmRule { compare: Compare::AtLeast, value: 1 },
            containers: LIBFUZZER_CRASH_REPORT_CONTAINERS,
            monitor_queue: Some(Crashes),
        },
        TaskType::LibfuzzerCoverage => TaskDefinition {
            features: &[TargetExe, TargetEnv, TargetOptions],
            vm: VmRule { compare: Compare::Equal, value: 1 },
            containers: LIBFUZZER_COVERAGE_CONTAINERS,
            monitor_queue: Some(ReadonlyInputs),
        },
        TaskType::LibfuzzerMerge => TaskDefinition {
            features: &[TargetExe, TargetEnv, TargetOptions],
            vm: VmRule { compare: Compare::Equal, value: 1 },
            containers: LIBFUZZER_MERGE_CONTAINERS,
            monitor_queue: Some(Inputs),
        },
        TaskType::GenericSupervisor => TaskDefinition {
            features: &[
                TargetExe,
                TargetOptions,
                SupervisorExe,
                SupervisorEnv,
                SupervisorOptions,
                SupervisorInputMarker,
                WaitForFiles,
                StatsFile,
                EnsembleSyncDelay,
            ],
            vm: VmRule { compare: Compare::AtLeast, value: 1 },
            containers: GENERIC_SUPERVISOR_CONTAINERS,
            monitor_queue: None,
        },
        TaskType::GenericMerge => TaskDefinition {
            features: &[
                TargetExe,
                TargetOptions,
                SupervisorExe,
                SupervisorEnv,
                SupervisorOptions,
                SupervisorInputMarker,
                StatsFile,
            ],
            vm: VmRule { compare: Compare::AtLeast, value: 1 },
            containers: GENERIC_MERGE_CONTAINERS,
            monitor_queue: None,
        },
        TaskType::GenericGenerator => TaskDefinition {
            features: &[
                GeneratorExe,
                GeneratorEnv,
                GeneratorOptions,
                TargetExe,
                TargetEnv,
                TargetOptions,
                RenameOutput,
                TargetTimeout,
                CheckAsanLog,
                CheckDebugger,
                CheckRetryCount,
                EnsembleSyncDelay,
            ],
            vm: VmRule { compare: Compare::AtLeast, value: 1 },
            containers: GENERIC_GENERATOR_CONTAINERS,
            monitor_queue: None,
        },
        TaskType::GenericCrashReport => TaskDefinition {
            features: &[
                TargetExe,
                TargetEnv,
                TargetOptions,
                TargetTimeout,
                CheckAsanLog,
                CheckDebugger,
                CheckRetryCount,
            ],
            vm: VmRule { compare: Compare::AtLeast, value: 1 },
            containers: GENERIC_CRASH_REPORT_CONTAINERS,
            monitor_queue: Some(Crashes),
        },
        TaskType::Coverage
        | TaskType::LibfuzzerRegression
        | TaskType::GenericRegression => return None,
    };
    Some(definition)
}

#[cfg(test)]
#[path = "defs_tests.rs"]
mod tests;
