// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler: binds ready tasks to pool queues as WorkSets.

use crate::engine::Engine;
use crate::error::EngineError;
use of_adapters::ContainerSas;
use of_core::task::{Task, TaskState};
use of_core::workset::{WorkSet, WorkUnit};
use of_core::{Clock, JobId, Os};
use std::collections::BTreeMap;

/// Container holding the rendered per-task agent configs.
pub const TASK_CONFIGS_CONTAINER: &str = "task-configs";

impl<K: Clock> Engine<K> {
    /// Bind every ready `waiting` task to its pool queue.
    ///
    /// Each enqueue is independent: a partial failure leaves the remaining
    /// tasks in `waiting`, and the next run re-enqueues only those.
    pub async fn schedule_tasks(&self) -> Result<(), EngineError> {
        let mut by_job: BTreeMap<JobId, Vec<Task>> = BTreeMap::new();

        for mut task in self.search_tasks(None, Some(&[TaskState::Waiting])).await? {
            if !self.task_ready_to_schedule(&mut task).await? {
                continue;
            }
            by_job.entry(task.job_id).or_default().push(task);
        }

        // Grouped by job to allow batching work onto shared nodes later;
        // today each task gets its own singleton WorkSet.
        for tasks in by_job.into_values() {
            for task in tasks {
                if let Err(error) = self.schedule_task(task).await {
                    if error.is_conflict() {
                        continue;
                    }
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    async fn schedule_task(&self, mut task: Task) -> Result<(), EngineError> {
        tracing::info!(task_id = %task.task_id, "scheduling task");

        let agent_config =
            self.build_task_config(task.job_id, task.task_id, &task.config).await?;

        let setup_container = match Self::get_setup_container(&task.config) {
            Ok(container) => container,
            Err(fault) => {
                self.task_mark_failed(&mut task, fault).await?;
                return Ok(());
            }
        };
        let setup_url = self
            .cloud
            .container_sas_url(&setup_container, ContainerSas { read: true, list: true, ..Default::default() });

        let setup_script = match task.os {
            Os::Windows if self.cloud.blob_exists(&setup_container, "setup.ps1").await => {
                Some("setup.ps1")
            }
            Os::Linux if self.cloud.blob_exists(&setup_container, "setup.sh").await => {
                Some("setup.sh")
            }
            _ => None,
        };

        let config_json = serde_json::to_string(&agent_config)?;
        self.cloud
            .save_blob(
                &of_core::Container::new(TASK_CONFIGS_CONTAINER),
                &format!("{}/config.json", task.task_id),
                config_json.clone(),
            )
            .await?;

        let reboot = task.config.task.reboot_after_setup.unwrap_or(false)
            || task
                .config
                .vm
                .as_ref()
                .and_then(|vm| vm.reboot_after_setup)
                .unwrap_or(false);
        let count = task.instance_count();

        let work_unit = WorkUnit {
            job_id: task.job_id,
            task_id: task.task_id,
            task_type: task.config.task.task_type,
            config: config_json,
        };

        // For now, only offer singleton work sets.
        let work_set = WorkSet {
            reboot,
            script: setup_script.is_some(),
            setup_url,
            work_units: vec![work_unit],
        };

        let Some(pool) = self.task_pool(&task).await? else {
            tracing::info!(task_id = %task.task_id, "unable to find pool for task");
            return Ok(());
        };

        for _ in 0..count {
            self.pool_schedule_workset(&pool, &work_set).await;
        }
        self.task_set_state(&mut task, TaskState::Scheduled).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
