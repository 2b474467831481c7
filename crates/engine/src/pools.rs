// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool lifecycle and the pool work queue.

use crate::engine::Engine;
use crate::error::EngineError;
use of_core::pool::{AutoscaleConfig, Pool, PoolState};
use of_core::scaleset::ScalesetState;
use of_core::workset::WorkSet;
use of_core::{Architecture, Clock, Event, Os, PoolId, PoolName};
use of_storage::{Query, ShrinkQueue};

/// How many queued WorkSets a single peek can observe.
pub const WORK_QUEUE_PEEK: usize = 30;

impl<K: Clock> Engine<K> {
    pub async fn get_pool_by_name(&self, name: &PoolName) -> Result<Option<Pool>, EngineError> {
        let mut pools: Vec<Pool> = self.store.search(Query::new().eq("name", name)).await?;
        if pools.len() != 1 {
            return Ok(None);
        }
        Ok(pools.pop())
    }

    pub async fn get_pool_by_id(&self, pool_id: PoolId) -> Result<Option<Pool>, EngineError> {
        let mut pools: Vec<Pool> =
            self.store.search(Query::new().eq("pool_id", pool_id)).await?;
        if pools.len() != 1 {
            return Ok(None);
        }
        Ok(pools.pop())
    }

    pub async fn all_pools(&self) -> Result<Vec<Pool>, EngineError> {
        Ok(self.store.search(Query::new()).await?)
    }

    pub async fn create_pool(
        &self,
        name: PoolName,
        os: Os,
        arch: Architecture,
        managed: bool,
        autoscale: Option<AutoscaleConfig>,
    ) -> Result<Pool, EngineError> {
        if self.get_pool_by_name(&name).await?.is_some() {
            return Err(of_core::Fault::new(
                of_core::FaultCode::InvalidRequest,
                format!("pool '{name}' already exists"),
            )
            .into());
        }
        let mut pool = Pool::new(name, os, arch, managed, autoscale);
        self.store.insert(&mut pool).await?;
        self.send_event(Event::PoolCreated {
            pool_name: pool.name.clone(),
            os,
            arch,
            managed,
            autoscale: pool.autoscale.clone(),
        })
        .await;
        Ok(pool)
    }

    /// Enqueue a WorkSet on the pool queue. Refused once the pool is
    /// draining or halted.
    pub async fn pool_schedule_workset(&self, pool: &Pool, work_set: &WorkSet) -> bool {
        if matches!(pool.state, PoolState::Shutdown | PoolState::Halt) {
            return false;
        }
        self.queues.send_object(&pool.queue_name(), work_set).await
    }

    /// Non-destructive view of the first queued WorkSets.
    pub async fn pool_peek_work_queue(&self, pool: &Pool) -> Vec<WorkSet> {
        self.queues.peek_object(&pool.queue_name(), WORK_QUEUE_PEEK).await
    }

    /// Request a pool stop: drain (`shutdown`) or immediate (`halt`).
    pub async fn pool_set_shutdown(&self, pool: &mut Pool, now: bool) -> Result<(), EngineError> {
        if matches!(pool.state, PoolState::Shutdown | PoolState::Halt) {
            return Ok(());
        }
        pool.state = if now { PoolState::Halt } else { PoolState::Shutdown };
        self.store.save(pool).await?;
        Ok(())
    }

    async fn pool_init(&self, pool: &mut Pool) -> Result<(), EngineError> {
        self.queues.create(&pool.queue_name()).await?;
        ShrinkQueue::new(pool.pool_id, &self.queues).create().await;
        pool.state = PoolState::Running;
        self.store.save(pool).await?;
        Ok(())
    }

    async fn pool_delete(&self, pool: &Pool) -> Result<(), EngineError> {
        self.store.delete(pool).await?;
        self.send_event(Event::PoolDeleted { pool_name: pool.name.clone() }).await;
        Ok(())
    }

    /// Drain: let nodes finish current work, then delete.
    async fn pool_shutdown(&self, pool: &mut Pool) -> Result<(), EngineError> {
        let scalesets = self.scalesets_by_pool(&pool.name).await?;
        let nodes = self.search_nodes(Some(&pool.name), None, None).await?;

        if scalesets.is_empty() && nodes.is_empty() {
            tracing::info!(pool = %pool.name, "pool stopped, deleting");
            pool.state = PoolState::Halt;
            self.pool_delete(pool).await?;
            return Ok(());
        }

        for mut scaleset in scalesets {
            self.scaleset_set_shutdown(&mut scaleset, false).await?;
        }
        for mut node in nodes {
            self.node_set_shutdown(&mut node).await?;
        }
        self.store.save(pool).await?;
        Ok(())
    }

    /// Halt the pool immediately.
    async fn pool_halt(&self, pool: &mut Pool) -> Result<(), EngineError> {
        let scalesets = self.scalesets_by_pool(&pool.name).await?;
        let nodes = self.search_nodes(Some(&pool.name), None, None).await?;

        if scalesets.is_empty() && nodes.is_empty() {
            self.queues.delete(&pool.queue_name()).await?;
            ShrinkQueue::new(pool.pool_id, &self.queues).delete().await;
            tracing::info!(pool = %pool.name, "pool stopped, deleting");
            pool.state = PoolState::Halt;
            self.pool_delete(pool).await?;
            return Ok(());
        }

        for mut scaleset in scalesets {
            self.scaleset_set_state(&mut scaleset, ScalesetState::Halt).await?;
        }
        for mut node in nodes {
            self.node_set_halt(&mut node).await?;
        }
        self.store.save(pool).await?;
        Ok(())
    }

    /// One state-machine step.
    pub async fn pool_process_state_update(&self, pool: &mut Pool) -> Result<(), EngineError> {
        match pool.state {
            PoolState::Init => self.pool_init(pool).await,
            PoolState::Shutdown => self.pool_shutdown(pool).await,
            PoolState::Halt => self.pool_halt(pool).await,
            PoolState::Running => Ok(()),
        }
    }

    /// Nodes of this pool currently occupied with work.
    pub(crate) async fn pool_in_use_nodes(&self, pool: &Pool) -> Result<usize, EngineError> {
        let nodes = self.search_nodes(Some(&pool.name), None, None).await?;
        Ok(nodes.iter().filter(|node| node.state.in_use()).count())
    }
}

#[cfg(test)]
#[path = "pools_tests.rs"]
mod tests;
