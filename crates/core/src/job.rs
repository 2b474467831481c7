// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job model and state machine.

use crate::ids::JobId;
use crate::records::{RowMeta, StoreSchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shortest and longest permitted job/task duration, in hours.
pub const MIN_DURATION_HOURS: u64 = 1;
pub const MAX_DURATION_HOURS: u64 = 168;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Init,
    Enabled,
    Stopping,
    Stopped,
}

impl JobState {
    /// States in which tasks may still be added to the job.
    pub fn available() -> &'static [JobState] {
        &[JobState::Init, JobState::Enabled]
    }

    /// States that indicate the reconciler has work to do.
    pub fn needs_work() -> &'static [JobState] {
        &[JobState::Init, JobState::Stopping]
    }

    pub fn shutting_down(self) -> bool {
        matches!(self, JobState::Stopping | JobState::Stopped)
    }
}

crate::simple_display! {
    JobState {
        Init => "init",
        Enabled => "enabled",
        Stopping => "stopping",
        Stopped => "stopped",
    }
}

/// User-supplied job metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub project: String,
    pub name: String,
    pub build: String,
    /// Lifetime of the job, in hours. Bounded to `[1, 168]` at create.
    pub duration: u64,
}

impl JobConfig {
    pub fn valid_duration(&self) -> bool {
        (MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&self.duration)
    }
}

/// A user-submitted container for related tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub state: JobState,
    pub config: JobConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set on the first transition out of `init`; expiry sweeps compare
    /// against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub meta: RowMeta,
}

impl Job {
    pub fn new(config: JobConfig) -> Self {
        Self {
            job_id: JobId::new(),
            state: JobState::Init,
            config,
            error: None,
            end_time: None,
            meta: RowMeta::default(),
        }
    }
}

crate::entity! {
    Job => "Job", StoreSchema::partition_only("job_id")
}

crate::builder! {
    pub struct JobBuilder => Job {
        set {
            job_id: JobId = JobId::new(),
            state: JobState = JobState::Init,
            config: JobConfig = JobConfig {
                project: "project".into(),
                name: "name".into(),
                build: "build-1".into(),
                duration: 24,
            },
            error: Option<String> = None,
            end_time: Option<DateTime<Utc>> = None,
        }
        computed {
            meta: RowMeta = RowMeta::default(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
