// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle: aggregate of task states plus a duration bound.

use crate::engine::Engine;
use crate::error::EngineError;
use chrono::Duration;
use of_core::job::{Job, JobConfig, JobState};
use of_core::task::TaskState;
use of_core::{Clock, Event, Fault, FaultCode, JobId};
use of_storage::Query;

impl<K: Clock> Engine<K> {
    pub async fn get_job(&self, job_id: JobId) -> Result<Option<Job>, EngineError> {
        Ok(self.store.get(job_id, None).await?)
    }

    pub async fn search_jobs(&self, states: &[JobState]) -> Result<Vec<Job>, EngineError> {
        Ok(self.store.search(Query::new().any("state", states)).await?)
    }

    pub async fn create_job(&self, config: JobConfig) -> Result<Job, EngineError> {
        if !config.valid_duration() {
            return Err(Fault::new(FaultCode::InvalidRequest, "invalid duration").into());
        }
        let mut job = Job::new(config);
        self.store.insert(&mut job).await?;
        self.send_event(Event::JobCreated { job_id: job.job_id, config: job.config.clone() })
            .await;
        Ok(job)
    }

    /// Set the job deadline the first time one of its tasks starts.
    /// Effectively idempotent.
    pub async fn job_on_start(&self, job: &mut Job) -> Result<(), EngineError> {
        if job.end_time.is_some() {
            return Ok(());
        }
        job.end_time = Some(self.now() + Duration::hours(job.config.duration as i64));
        self.store.save(job).await?;
        Ok(())
    }

    /// Jobs whose deadline has passed and are not already stopping.
    pub async fn search_expired_jobs(&self) -> Result<Vec<Job>, EngineError> {
        Ok(self
            .store
            .search(
                Query::new().any("state", JobState::available()).before("end_time", self.now()),
            )
            .await?)
    }

    async fn job_init(&self, job: &mut Job) -> Result<(), EngineError> {
        tracing::info!(job_id = %job.job_id, "init job");
        job.state = JobState::Enabled;
        self.store.save(job).await?;
        Ok(())
    }

    /// Propagate stop to every task; the job lands in `stopped` once all
    /// tasks have.
    pub async fn job_stopping(&self, job: &mut Job) -> Result<(), EngineError> {
        job.state = JobState::Stopping;
        tracing::info!(job_id = %job.job_id, "stopping job");

        let tasks = self.search_tasks(Some(job.job_id), None).await?;
        let not_stopped: Vec<_> =
            tasks.into_iter().filter(|task| task.state != TaskState::Stopped).collect();

        if not_stopped.is_empty() {
            job.state = JobState::Stopped;
            self.store.save(job).await?;
            self.send_event(Event::JobStopped {
                job_id: job.job_id,
                config: job.config.clone(),
            })
            .await;
        } else {
            for mut task in not_stopped {
                self.task_mark_stopping(&mut task).await?;
            }
            self.store.save(job).await?;
        }
        Ok(())
    }

    /// One state-machine step.
    pub async fn job_process_state_update(&self, job: &mut Job) -> Result<(), EngineError> {
        match job.state {
            JobState::Init => self.job_init(job).await,
            JobState::Stopping => self.job_stopping(job).await,
            JobState::Enabled | JobState::Stopped => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
