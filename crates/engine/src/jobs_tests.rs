// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit tests for job lifecycle

use super::*;
use crate::test_helpers::test_engine;
use of_core::{FaultCode, Task};

fn config(duration: u64) -> JobConfig {
    JobConfig { project: "p".into(), name: "n".into(), build: "b".into(), duration }
}

#[tokio::test]
async fn create_validates_duration() {
    let ctx = test_engine();
    let err = ctx.engine.create_job(config(0)).await.unwrap_err();
    assert!(matches!(err, EngineError::Fault(fault) if fault.code == FaultCode::InvalidRequest));

    let job = ctx.engine.create_job(config(168)).await.unwrap();
    assert_eq!(job.state, JobState::Init);
}

#[tokio::test]
async fn init_enables_job() {
    let ctx = test_engine();
    let mut job = ctx.engine.create_job(config(24)).await.unwrap();
    ctx.engine.job_process_state_update(&mut job).await.unwrap();
    assert_eq!(job.state, JobState::Enabled);
    // Deadline is set when the first task starts, not at enable.
    assert!(job.end_time.is_none());
}

#[tokio::test]
async fn stopping_with_no_tasks_stops_immediately() {
    let ctx = test_engine();
    let mut job = ctx.engine.create_job(config(24)).await.unwrap();
    ctx.engine.job_stopping(&mut job).await.unwrap();
    assert_eq!(job.state, JobState::Stopped);
}

#[tokio::test]
async fn stopping_cascades_to_tasks_then_stops() {
    let ctx = test_engine();
    let mut job = ctx.engine.create_job(config(24)).await.unwrap();

    let mut task = Task::builder()
        .job_id(job.job_id)
        .state(of_core::TaskState::Running)
        .build();
    ctx.engine.store().save(&mut task).await.unwrap();

    ctx.engine.job_stopping(&mut job).await.unwrap();
    assert_eq!(job.state, JobState::Stopping);

    let task = ctx.engine.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.state, of_core::TaskState::Stopping);

    // Once the task lands in stopped, the job follows.
    let mut task = ctx.engine.get_task(task.task_id).await.unwrap().unwrap();
    ctx.engine.task_process_state_update(&mut task).await.unwrap();
    assert_eq!(task.state, of_core::TaskState::Stopped);

    ctx.engine.job_stopping(&mut job).await.unwrap();
    assert_eq!(job.state, JobState::Stopped);
}

#[tokio::test]
async fn stopping_a_stopped_job_is_a_no_op() {
    let ctx = test_engine();
    let mut job = ctx.engine.create_job(config(24)).await.unwrap();
    ctx.engine.job_stopping(&mut job).await.unwrap();
    assert_eq!(job.state, JobState::Stopped);
    ctx.engine.job_stopping(&mut job).await.unwrap();
    assert_eq!(job.state, JobState::Stopped);
}

#[tokio::test]
async fn on_start_is_idempotent() {
    let ctx = test_engine();
    let mut job = ctx.engine.create_job(config(24)).await.unwrap();

    ctx.engine.job_on_start(&mut job).await.unwrap();
    let first = job.end_time.unwrap();
    assert_eq!(first, ctx.clock.now_utc() + chrono::Duration::hours(24));

    ctx.clock.advance(std::time::Duration::from_secs(600));
    ctx.engine.job_on_start(&mut job).await.unwrap();
    assert_eq!(job.end_time.unwrap(), first);
}

#[tokio::test]
async fn expired_job_search_honors_end_time() {
    let ctx = test_engine();
    let mut expired = ctx.engine.create_job(config(1)).await.unwrap();
    ctx.engine.job_on_start(&mut expired).await.unwrap();

    let mut live = ctx.engine.create_job(config(24)).await.unwrap();
    ctx.engine.job_on_start(&mut live).await.unwrap();

    ctx.clock.advance(std::time::Duration::from_secs(2 * 3600));

    let found = ctx.engine.search_expired_jobs().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].job_id, expired.job_id);
}
