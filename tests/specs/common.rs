// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: an engine wired to in-memory backends and fakes.

use of_adapters::{FakeCloud, FakeWebhookSender};
use of_core::pool::AutoscaleConfig;
use of_core::task::{ContainerType, TaskContainer, TaskDetails, TaskPool, TaskType};
use of_core::{
    Architecture, Container, FakeClock, Job, JobConfig, MachineId, Os, Pool, PoolName,
    PoolState, Region, Task, TaskConfig,
};
use of_engine::{Engine, ServiceConfig};
use of_storage::{MemoryQueues, MemoryTables, Queues, Store};
use of_wire::AgentRegistrationPost;
use std::sync::Arc;

pub const IMAGE: &str = "Canonical:UbuntuServer:18.04-LTS:latest";
pub const VM_SKU: &str = "Standard_D2s_v3";

pub struct Harness {
    pub engine: Engine<FakeClock>,
    pub clock: FakeClock,
    pub cloud: FakeCloud,
    pub sender: FakeWebhookSender,
}

pub fn harness() -> Harness {
    let clock = FakeClock::new();
    let cloud = FakeCloud::new();
    let sender = FakeWebhookSender::new();
    let store = Store::new(Arc::new(MemoryTables::new(clock.clone())));
    let queues = Queues::new(Arc::new(MemoryQueues::new(clock.clone())));
    let engine = Engine::new(
        store,
        queues,
        Arc::new(cloud.clone()),
        Arc::new(sender.clone()),
        clock.clone(),
        ServiceConfig::new("onefuzz-specs"),
    );
    Harness { engine, clock, cloud, sender }
}

pub fn autoscale(min: u64, max: u64, scaleset_size: u64) -> AutoscaleConfig {
    AutoscaleConfig {
        image: IMAGE.into(),
        vm_sku: VM_SKU.into(),
        scaleset_size,
        min_size: min,
        max_size: Some(max),
        region: Some(Region::new("eastus")),
        spot_instances: false,
        ephemeral_os_disks: false,
    }
}

impl Harness {
    /// A running managed pool.
    pub async fn pool(&self, name: &str, autoscale: Option<AutoscaleConfig>) -> Pool {
        let mut pool = self
            .engine
            .create_pool(PoolName::new(name), Os::Linux, Architecture::X86_64, true, autoscale)
            .await
            .unwrap();
        self.engine.pool_process_state_update(&mut pool).await.unwrap();
        assert_eq!(pool.state, PoolState::Running);
        pool
    }

    pub async fn job(&self) -> Job {
        let mut job = self
            .engine
            .create_job(JobConfig {
                project: "demo".into(),
                name: "fuzzing".into(),
                build: "build-1".into(),
                duration: 24,
            })
            .await
            .unwrap();
        self.engine.job_process_state_update(&mut job).await.unwrap();
        job
    }

    /// A libfuzzer task in `waiting`, ready for the scheduler.
    pub async fn libfuzzer_task(&self, job: &Job, pool: &Pool, count: u64) -> Task {
        let mut details = TaskDetails::for_type(TaskType::LibfuzzerFuzz);
        details.duration = 1;
        let containers = vec![
            TaskContainer {
                container_type: ContainerType::Setup,
                name: Container::new("setup-1"),
            },
            TaskContainer {
                container_type: ContainerType::Crashes,
                name: Container::new("crashes-1"),
            },
            TaskContainer {
                container_type: ContainerType::Inputs,
                name: Container::new("inputs-1"),
            },
        ];
        for container in &containers {
            self.cloud.add_container(&container.name);
        }
        let config = TaskConfig {
            job_id: job.job_id,
            prereq_tasks: None,
            task: details,
            vm: None,
            pool: Some(TaskPool { count, pool_name: pool.name.clone() }),
            containers,
            tags: Default::default(),
            debug: None,
        };

        let mut task = self.engine.create_task(config, job.job_id).await.unwrap();
        self.engine.task_process_state_update(&mut task).await.unwrap();
        task
    }

    /// Register an agent for a machine in the pool.
    pub async fn register(
        &self,
        pool: &Pool,
        machine_id: MachineId,
        scaleset_id: Option<of_core::ScalesetId>,
    ) {
        self.engine
            .register_node(AgentRegistrationPost {
                machine_id,
                pool_name: pool.name.clone(),
                scaleset_id,
                version: of_core::SERVICE_VERSION.into(),
            })
            .await
            .unwrap();
    }
}
