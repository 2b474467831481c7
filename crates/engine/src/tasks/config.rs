// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task config validation and agent-config rendering.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::tasks::defs::{get_definition, Compare, TaskDefinition, TaskFeature};
use of_adapters::ContainerSas;
use of_core::task::{ContainerType, TaskConfig};
use of_core::workset::{ContainerGroup, SyncedDir, TaskUnitConfig};
use of_core::{Clock, Container, Fault, FaultCode, JobId, TaskId};
use of_storage::QueueSas;
use std::collections::BTreeMap;

/// Queue task agents push heartbeats to.
pub const TASK_HEARTBEAT_QUEUE: &str = "task-heartbeat";

fn config_fault(detail: impl Into<String>) -> Fault {
    Fault::new(FaultCode::InvalidRequest, detail)
}

fn checked_definition(config: &TaskConfig) -> Result<TaskDefinition, Fault> {
    get_definition(config.task.task_type)
        .ok_or_else(|| config_fault(format!("unsupported task type: {}", config.task.task_type)))
}

/// Name of the per-task input queue.
pub fn task_input_queue(task_id: TaskId) -> String {
    task_id.to_string()
}

impl<K: Clock> Engine<K> {
    async fn check_containers(
        &self,
        definition: &TaskDefinition,
        config: &TaskConfig,
    ) -> Result<(), EngineError> {
        let mut by_type: BTreeMap<ContainerType, Vec<&Container>> = BTreeMap::new();
        let mut checked: Vec<&Container> = Vec::new();
        for container in &config.containers {
            if !checked.contains(&&container.name) {
                if !self.cloud.container_exists(&container.name).await {
                    return Err(
                        config_fault(format!("missing container: {}", container.name)).into()
                    );
                }
                checked.push(&container.name);
            }
            by_type.entry(container.container_type).or_default().push(&container.name);
        }

        for rule in definition.containers {
            let actual = by_type.get(&rule.container_type).map_or(0, |c| c.len() as u64);
            if !rule.compare.check(rule.value, actual) {
                return Err(config_fault(format!(
                    "container type {}: expected {:?} {}, got {}",
                    rule.container_type, rule.compare, rule.value, actual
                ))
                .into());
            }
        }

        for container_type in by_type.keys() {
            if !definition.containers.iter().any(|rule| rule.container_type == *container_type) {
                return Err(config_fault(format!(
                    "unsupported container type for this task: {container_type}"
                ))
                .into());
            }
        }

        if let Some(monitor_queue) = definition.monitor_queue {
            if !definition.containers.iter().any(|rule| rule.container_type == monitor_queue) {
                return Err(config_fault(format!(
                    "unable to monitor container type as it is not used by this task: \
                     {monitor_queue}"
                ))
                .into());
            }
        }

        Ok(())
    }

    fn check_target_exe(
        definition: &TaskDefinition,
        config: &TaskConfig,
    ) -> Result<(), EngineError> {
        if config.task.target_exe.is_none() {
            if definition.features.contains(&TaskFeature::TargetExe) {
                return Err(config_fault("missing target_exe").into());
            }
            return Ok(());
        }
        Ok(())
    }

    /// Validate a task config against its type's definition. Called at
    /// create so invalid tasks never enter the store.
    pub async fn check_config(&self, config: &TaskConfig) -> Result<(), EngineError> {
        let definition = checked_definition(config)?;

        if config.vm.is_some() && config.pool.is_some() {
            return Err(
                config_fault("either the vm or pool must be specified, but not both").into()
            );
        }

        self.check_containers(&definition, config).await?;

        if definition.features.contains(&TaskFeature::SupervisorExe)
            && config.task.supervisor_exe.is_none()
        {
            return Err(config_fault("missing supervisor_exe").into());
        }

        let count = if let Some(vm) = &config.vm {
            vm.count
        } else if let Some(pool) = &config.pool {
            pool.count
        } else {
            return Err(config_fault("either the vm or pool must be specified").into());
        };
        if !definition.vm.compare.check(definition.vm.value, count) {
            return Err(config_fault(format!(
                "invalid vm count: expected {:?} {}, got {}",
                definition.vm.compare, definition.vm.value, count
            ))
            .into());
        }

        Self::check_target_exe(&definition, config)?;

        if definition.features.contains(&TaskFeature::StatsFile)
            && config.task.stats_file.is_some()
            && config.task.stats_format.is_none()
        {
            return Err(config_fault("using a stats_file requires a stats_format").into());
        }

        Ok(())
    }

    /// Container holding the task's setup payload.
    pub fn get_setup_container(config: &TaskConfig) -> Result<Container, Fault> {
        config
            .containers
            .iter()
            .find(|container| container.container_type == ContainerType::Setup)
            .map(|container| container.name.clone())
            .ok_or_else(|| {
                config_fault(format!(
                    "task missing setup container: task_type = {}",
                    config.task.task_type
                ))
            })
    }

    /// Render the agent-side config: exactly the fields declared by the
    /// task type's features and container rules.
    pub async fn build_task_config(
        &self,
        job_id: JobId,
        task_id: TaskId,
        task_config: &TaskConfig,
    ) -> Result<TaskUnitConfig, EngineError> {
        use TaskFeature::*;

        let definition = checked_definition(task_config)?;
        let details = &task_config.task;

        let mut config = TaskUnitConfig::new(
            job_id,
            task_id,
            details.task_type,
            self.config.instance_id,
            self.queues.sas_url(TASK_HEARTBEAT_QUEUE, QueueSas::add()),
        );

        if definition.monitor_queue.is_some() {
            config.input_queue =
                Some(self.queues.sas_url(&task_input_queue(task_id), QueueSas::consume()));
        }

        for rule in definition.containers {
            if rule.container_type == ContainerType::Setup {
                continue;
            }

            let mut dirs = Vec::new();
            for (i, container) in task_config.containers.iter().enumerate() {
                if container.container_type != rule.container_type {
                    continue;
                }
                dirs.push(SyncedDir {
                    path: format!("task_{}_{i}", rule.container_type.as_field()),
                    url: self.cloud.container_sas_url(
                        &container.name,
                        ContainerSas {
                            read: rule.permissions.read,
                            write: rule.permissions.write,
                            delete: rule.permissions.delete,
                            list: rule.permissions.list,
                            create: rule.permissions.create,
                        },
                    ),
                });
            }

            if dirs.is_empty() {
                continue;
            }

            let singular =
                matches!(rule.compare, Compare::Equal | Compare::AtMost) && rule.value == 1;
            let group = if singular {
                ContainerGroup::Single(dirs.remove(0))
            } else {
                ContainerGroup::Many(dirs)
            };
            config.set_container_group(rule.container_type, group);
        }

        for feature in definition.features {
            match feature {
                SupervisorExe => config.supervisor_exe = details.supervisor_exe.clone(),
                SupervisorEnv => {
                    config.supervisor_env =
                        Some(details.supervisor_env.clone().unwrap_or_default());
                }
                SupervisorOptions => {
                    config.supervisor_options =
                        Some(details.supervisor_options.clone().unwrap_or_default());
                }
                SupervisorInputMarker => {
                    config.supervisor_input_marker = details.supervisor_input_marker.clone();
                }
                TargetExe => {
                    config.target_exe =
                        details.target_exe.as_deref().map(|exe| format!("setup/{exe}"));
                }
                TargetExeOptional => {
                    if let Some(exe) = details.target_exe.as_deref() {
                        config.target_exe = Some(format!("setup/{exe}"));
                    }
                }
                TargetEnv => {
                    config.target_env = Some(details.target_env.clone().unwrap_or_default());
                }
                TargetOptions => {
                    config.target_options =
                        Some(details.target_options.clone().unwrap_or_default());
                }
                TargetOptionsMerge => {
                    config.target_options_merge =
                        Some(details.target_options_merge.unwrap_or(false));
                }
                TargetWorkers => config.target_workers = details.target_workers,
                TargetTimeout => config.target_timeout = details.target_timeout,
                CheckAsanLog => config.check_asan_log = details.check_asan_log,
                CheckDebugger => config.check_debugger = details.check_debugger,
                CheckRetryCount => {
                    config.check_retry_count = Some(details.check_retry_count.unwrap_or(0));
                }
                CheckFuzzerHelp => {
                    config.check_fuzzer_help = Some(details.check_fuzzer_help.unwrap_or(true));
                }
                ExpectCrashOnFailure => {
                    config.expect_crash_on_failure =
                        Some(details.expect_crash_on_failure.unwrap_or(true));
                }
                RenameOutput => config.rename_output = Some(details.rename_output.unwrap_or(false)),
                GeneratorExe => config.generator_exe = details.generator_exe.clone(),
                GeneratorEnv => {
                    config.generator_env =
                        Some(details.generator_env.clone().unwrap_or_default());
                }
                GeneratorOptions => {
                    config.generator_options =
                        Some(details.generator_options.clone().unwrap_or_default());
                }
                AnalyzerExe => config.analyzer_exe = details.analyzer_exe.clone(),
                AnalyzerEnv => {
                    config.analyzer_env = Some(details.analyzer_env.clone().unwrap_or_default());
                }
                AnalyzerOptions => {
                    config.analyzer_options =
                        Some(details.analyzer_options.clone().unwrap_or_default());
                }
                WaitForFiles => {
                    config.wait_for_files =
                        details.wait_for_files.map(|container| container.to_string());
                }
                StatsFile => {
                    config.stats_file = details.stats_file.clone();
                    config.stats_format = details.stats_format;
                }
                EnsembleSyncDelay => config.ensemble_sync_delay = details.ensemble_sync_delay,
                PreserveExistingOutputs => {
                    config.preserve_existing_outputs = details.preserve_existing_outputs;
                }
                ReportList => config.report_list = details.report_list.clone(),
                MinimizedStackDepth => {
                    config.minimized_stack_depth = details.minimized_stack_depth;
                }
                CoverageFilter => {
                    config.coverage_filter = details
                        .coverage_filter
                        .as_deref()
                        .map(|filter| format!("setup/{filter}"));
                }
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
