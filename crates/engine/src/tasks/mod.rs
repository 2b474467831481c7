// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task lifecycle: create, state machine, expiry.

pub mod config;
pub mod defs;

use crate::engine::Engine;
use crate::error::EngineError;
use chrono::Duration;
use of_core::job::{MAX_DURATION_HOURS, MIN_DURATION_HOURS};
use of_core::task::{Task, TaskConfig, TaskState};
use of_core::{Clock, Event, Fault, FaultCode, JobId, Pool, TaskId};
use of_storage::Query;

impl<K: Clock> Engine<K> {
    pub async fn get_task(&self, task_id: TaskId) -> Result<Option<Task>, EngineError> {
        let mut tasks: Vec<Task> = self.store.search(Query::new().eq("task_id", task_id)).await?;
        if tasks.len() != 1 {
            return Ok(None);
        }
        Ok(tasks.pop())
    }

    pub async fn search_tasks(
        &self,
        job_id: Option<JobId>,
        states: Option<&[TaskState]>,
    ) -> Result<Vec<Task>, EngineError> {
        let mut query = Query::new();
        if let Some(job_id) = job_id {
            query = query.eq("job_id", job_id);
        }
        if let Some(states) = states {
            query = query.any("state", states);
        }
        Ok(self.store.search(query).await?)
    }

    /// Create a task under a job. The OS comes from the pool (or the VM
    /// image for unmanaged tasks); the config is validated up front.
    pub async fn create_task(
        &self,
        mut config: TaskConfig,
        job_id: JobId,
    ) -> Result<Task, EngineError> {
        let Some(job) = self.get_job(job_id).await? else {
            return Err(Fault::new(FaultCode::InvalidJob, "unable to find job").into());
        };
        if job.state.shutting_down() {
            return Err(
                Fault::new(FaultCode::InvalidJob, "tasks can not be added to a stopping job")
                    .into(),
            );
        }

        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&config.task.duration) {
            return Err(Fault::new(FaultCode::InvalidRequest, "invalid duration").into());
        }

        self.check_config(&config).await?;

        let os = if let Some(vm) = &config.vm {
            self.cloud
                .get_os(&vm.region, &vm.image)
                .await
                .map_err(|error| Fault::new(FaultCode::InvalidImage, error.to_string()))?
        } else if let Some(pool) = &config.pool {
            let Some(pool) = self.get_pool_by_name(&pool.pool_name).await? else {
                return Err(Fault::new(FaultCode::UnableToFind, "unable to find pool").into());
            };
            pool.os
        } else {
            return Err(
                Fault::new(FaultCode::InvalidRequest, "task must have vm or pool").into()
            );
        };

        config.job_id = job_id;
        let mut task = Task::new(config, os);
        self.store.insert(&mut task).await?;
        self.send_event(Event::TaskCreated {
            job_id,
            task_id: task.task_id,
            config: task.config.clone(),
        })
        .await;
        Ok(task)
    }

    pub async fn task_set_state(
        &self,
        task: &mut Task,
        state: TaskState,
    ) -> Result<(), EngineError> {
        if task.state == state {
            return Ok(());
        }
        task.state = state;
        self.store.save(task).await?;
        self.send_event(Event::TaskStateUpdated {
            job_id: task.job_id,
            task_id: task.task_id,
            state,
            end_time: task.end_time,
        })
        .await;
        Ok(())
    }

    /// True once every prerequisite task has started. A failed or vanished
    /// prerequisite fails this task instead.
    pub async fn task_ready_to_schedule(&self, task: &mut Task) -> Result<bool, EngineError> {
        let Some(prereqs) = task.config.prereq_tasks.clone() else {
            return Ok(true);
        };
        for prereq_id in prereqs {
            let Some(prereq) = self.get_task(prereq_id).await? else {
                self.task_mark_failed(
                    task,
                    Fault::new(FaultCode::InvalidTask, format!("prereq task missing: {prereq_id}")),
                )
                .await?;
                return Ok(false);
            };
            if let Some(error) = prereq.error {
                self.task_mark_failed(task, error).await?;
                return Ok(false);
            }
            if !prereq.state.has_started() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Move the task toward stopped; a no-op once shutdown has begun.
    pub async fn task_mark_stopping(&self, task: &mut Task) -> Result<(), EngineError> {
        if task.state.shutting_down() {
            tracing::debug!(
                job_id = %task.job_id,
                task_id = %task.task_id,
                "ignoring post-task stop calls"
            );
            return Ok(());
        }
        task.state = TaskState::Stopping;
        self.store.save(task).await?;
        Ok(())
    }

    /// Record a permanent error; a no-op once shutdown has begun.
    pub async fn task_mark_failed(&self, task: &mut Task, error: Fault) -> Result<(), EngineError> {
        if task.state.shutting_down() {
            tracing::debug!(
                job_id = %task.job_id,
                task_id = %task.task_id,
                "ignoring post-task stop failures"
            );
            return Ok(());
        }
        task.error = Some(error.clone());
        task.state = TaskState::Stopping;
        self.store.save(task).await?;
        self.send_event(Event::TaskFailed {
            job_id: task.job_id,
            task_id: task.task_id,
            error,
        })
        .await;
        Ok(())
    }

    /// Set the execution deadline once the task actually starts, and
    /// cascade to the owning job. Effectively idempotent.
    pub async fn task_on_start(&self, task: &mut Task) -> Result<(), EngineError> {
        if task.end_time.is_some() {
            return Ok(());
        }
        task.end_time = Some(self.now() + Duration::hours(task.config.task.duration as i64));
        self.store.save(task).await?;

        if let Some(mut job) = self.get_job(task.job_id).await? {
            self.job_on_start(&mut job).await?;
        }
        Ok(())
    }

    /// Pool this task schedules onto: its named pool, or any pool backing
    /// a scaleset that matches the requested VM shape.
    pub async fn task_pool(&self, task: &Task) -> Result<Option<Pool>, EngineError> {
        if let Some(pool) = &task.config.pool {
            let found = self.get_pool_by_name(&pool.pool_name).await?;
            if found.is_none() {
                tracing::info!(task_id = %task.task_id, pool = %pool.pool_name, "unable to schedule task to pool");
            }
            return Ok(found);
        }

        if let Some(vm) = &task.config.vm {
            let scalesets = self.all_scalesets().await?;
            for scaleset in scalesets {
                if scaleset.vm_sku == vm.sku && scaleset.image == vm.image {
                    if let Some(pool) = self.get_pool_by_name(&scaleset.pool_name).await? {
                        return Ok(Some(pool));
                    }
                }
            }
        }

        tracing::warn!(task_id = %task.task_id, "unable to find a pool that matches the task");
        Ok(None)
    }

    /// Tasks whose deadline has passed and are not already stopping.
    pub async fn search_expired_tasks(&self) -> Result<Vec<Task>, EngineError> {
        Ok(self
            .store
            .search(
                Query::new()
                    .any("state", TaskState::available())
                    .before("end_time", self.now()),
            )
            .await?)
    }

    async fn task_init(&self, task: &mut Task) -> Result<(), EngineError> {
        self.queues.create(&config::task_input_queue(task.task_id)).await?;
        task.state = TaskState::Waiting;
        self.store.save(task).await?;
        Ok(())
    }

    async fn task_stopping(&self, task: &mut Task) -> Result<(), EngineError> {
        tracing::info!(job_id = %task.job_id, task_id = %task.task_id, "stopping task");
        self.remove_forwards_for_task(task.task_id).await?;
        self.queues.delete(&config::task_input_queue(task.task_id)).await?;
        self.stop_task_on_nodes(task.task_id).await?;
        task.state = TaskState::Stopped;
        if task.end_time.is_none() {
            task.end_time = Some(self.now());
        }
        self.store.save(task).await?;
        self.send_event(Event::TaskStopped { job_id: task.job_id, task_id: task.task_id })
            .await;
        Ok(())
    }

    /// One state-machine step. `waiting`/`scheduled`/`setting_up`/`running`
    /// advance via the scheduler and agent events, not the tick.
    pub async fn task_process_state_update(&self, task: &mut Task) -> Result<(), EngineError> {
        match task.state {
            TaskState::Init => self.task_init(task).await,
            TaskState::Stopping => self.task_stopping(task).await,
            TaskState::Waiting
            | TaskState::Scheduled
            | TaskState::SettingUp
            | TaskState::Running
            | TaskState::Stopped => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
