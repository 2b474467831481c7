// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Autoscaler: size each pool to its demand, grow scalesets, and request
//! graceful shrinkage.

use crate::engine::Engine;
use crate::error::EngineError;
use of_core::pool::Pool;
use of_core::scaleset::Scaleset;
use of_core::workset::WorkSet;
use of_core::{Clock, Container};
use of_adapters::ContainerSas;
use of_storage::ShrinkQueue;
use std::time::Duration;

/// Setup container used by synthetic WorkSets.
const TOOLS_CONTAINER: &str = "tools";

impl<K: Clock> Engine<K> {
    async fn set_shrink_queues(
        &self,
        pool: &Pool,
        scalesets: &[Scaleset],
        size: usize,
    ) -> Result<(), EngineError> {
        for scaleset in scalesets {
            ShrinkQueue::new(scaleset.scaleset_id, &self.queues).clear().await;
        }
        ShrinkQueue::new(pool.pool_id, &self.queues).set_size(size).await;
        Ok(())
    }

    async fn scale_up(
        &self,
        pool: &Pool,
        scalesets: &[Scaleset],
        to_add: u64,
    ) -> Result<(), EngineError> {
        tracing::info!(pool = %pool.name, to_add, "autoscale: scale up");

        let Some(config) = &pool.autoscale else {
            tracing::error!(pool = %pool.name, "scaling up a non-autoscaling pool");
            return Ok(());
        };

        self.set_shrink_queues(pool, scalesets, 0).await?;

        let mut remaining = to_add;
        let mut ordered: Vec<Scaleset> = scalesets.to_vec();
        ordered.sort_by_key(|scaleset| scaleset.scaleset_id);

        for mut scaleset in ordered {
            if remaining == 0 {
                break;
            }
            if !scaleset.state.can_update() {
                continue;
            }
            let max_size = self.scaleset_max_size(&scaleset.image);
            if scaleset.size < max_size {
                let add_here = remaining.min(max_size - scaleset.size);
                tracing::info!(
                    pool = %pool.name,
                    scaleset_id = %scaleset.scaleset_id,
                    existing_size = scaleset.size,
                    adding = add_here,
                    "autoscale: adding to scaleset"
                );
                let target = scaleset.size + add_here;
                if let Err(error) = self.scaleset_set_size(&mut scaleset, target).await {
                    if error.is_conflict() {
                        continue;
                    }
                    return Err(error);
                }
                remaining -= add_here;
            }
        }

        let region = config.region.clone().unwrap_or_else(|| self.config.base_region.clone());
        let base_size = self.scaleset_max_size(&config.image);

        while remaining > 0 {
            let scaleset_size = base_size.min(config.scaleset_size).min(remaining);
            tracing::info!(
                pool = %pool.name,
                size = scaleset_size,
                "autoscale: adding scaleset"
            );
            let scaleset = self
                .create_scaleset(
                    pool.name.clone(),
                    &config.vm_sku,
                    &config.image,
                    region.clone(),
                    scaleset_size,
                    config.spot_instances,
                    config.ephemeral_os_disks,
                    [("pool".to_string(), pool.name.to_string())],
                )
                .await?;
            tracing::info!(
                pool = %pool.name,
                scaleset_id = %scaleset.scaleset_id,
                "autoscale: added scaleset"
            );
            remaining -= scaleset_size;
        }
        Ok(())
    }

    async fn scale_down(
        &self,
        pool: &Pool,
        scalesets: &[Scaleset],
        to_remove: u64,
    ) -> Result<(), EngineError> {
        tracing::info!(pool = %pool.name, to_remove, "autoscale: scaling down");

        self.set_shrink_queues(pool, scalesets, to_remove as usize).await?;

        // Synthetic WorkSets nudge idle agents to poll, so they observe
        // the shrink tokens quickly. Cleared again next tick.
        if to_remove > 0 {
            let setup_url = self.cloud.container_sas_url(
                &Container::new(TOOLS_CONTAINER),
                ContainerSas { read: true, list: true, ..Default::default() },
            );
            let work_set =
                WorkSet { reboot: false, script: false, setup_url, work_units: Vec::new() };
            for _ in 0..to_remove {
                self.pool_schedule_workset(pool, &work_set).await;
            }
        }
        Ok(())
    }

    /// Remove synthetic WorkSets, resurfacing real ones untouched.
    pub async fn clear_synthetic_worksets(&self, pool: &Pool) -> Result<(), EngineError> {
        let mut deleted = 0;
        let mut ignored = 0;

        let received: Vec<of_storage::Received<WorkSet>> = self
            .queues
            .receive(&pool.queue_name(), of_storage::PEEK_MAX, Duration::from_secs(30))
            .await;

        for message in received {
            match message.value {
                Some(work_set) if work_set.is_synthetic() => {
                    self.queues.delete_message(&pool.queue_name(), &message.message_id).await?;
                    deleted += 1;
                }
                Some(_) => {
                    self.queues.make_visible(&pool.queue_name(), &message.message_id).await?;
                    ignored += 1;
                }
                None => {
                    tracing::warn!(pool = %pool.name, "decode workset failed");
                }
            }
        }

        tracing::info!(pool = %pool.name, ignored, deleted, "cleanup synthetic worksets");
        Ok(())
    }

    /// Halt scalesets that are empty and idle.
    async fn shutdown_empty_scalesets(
        &self,
        pool: &Pool,
        scalesets: &[Scaleset],
    ) -> Result<(), EngineError> {
        for scaleset in scalesets {
            let nodes = self.search_nodes(None, Some(scaleset.scaleset_id), None).await?;
            let needs_work =
                of_core::scaleset::ScalesetState::needs_work().contains(&scaleset.state);
            if nodes.is_empty() && scaleset.size == 0 && !needs_work {
                tracing::info!(
                    pool = %pool.name,
                    scaleset_id = %scaleset.scaleset_id,
                    "autoscale: halting empty scaleset"
                );
                let mut scaleset = scaleset.clone();
                self.scaleset_halt(&mut scaleset).await?;
            }
        }
        Ok(())
    }

    /// Demand estimate: queued WorkSets with work, plus occupied nodes.
    async fn needed_nodes(&self, pool: &Pool) -> Result<(usize, usize), EngineError> {
        // Peek only returns the first messages; demand beyond that is
        // picked up on later ticks as the queue drains.
        let worksets = self.pool_peek_work_queue(pool).await;
        let scheduled = worksets.iter().filter(|work_set| !work_set.is_synthetic()).count();
        let in_use = self.pool_in_use_nodes(pool).await?;
        Ok((scheduled, in_use))
    }

    /// One autoscale pass for a pool.
    pub async fn autoscale_pool(&self, pool: &Pool) -> Result<(), EngineError> {
        let Some(config) = &pool.autoscale else {
            return Ok(());
        };

        let (scheduled_worksets, in_use_nodes) = self.needed_nodes(pool).await?;
        let estimate = (scheduled_worksets + in_use_nodes) as u64;

        let mut new_size = estimate.max(config.min_size);
        if let Some(max_size) = config.max_size {
            new_size = new_size.min(max_size);
        }

        let scalesets = self.scalesets_by_pool(&pool.name).await?;
        let blocked: Vec<_> = scalesets
            .iter()
            .filter(|scaleset| !scaleset.state.include_autoscale_count())
            .map(|scaleset| scaleset.scaleset_id)
            .collect();
        if !blocked.is_empty() {
            tracing::info!(
                pool = %pool.name,
                blocked = ?blocked,
                "autoscale: unable to autoscale pool due to modifying scalesets"
            );
            return Ok(());
        }
        let current_size: u64 = scalesets.iter().map(|scaleset| scaleset.size).sum();

        tracing::info!(
            pool = %pool.name,
            current_size,
            new_size,
            in_use_nodes,
            scheduled_worksets,
            "autoscale: status"
        );

        if new_size > current_size {
            self.clear_synthetic_worksets(pool).await?;
            self.scale_up(pool, &scalesets, new_size - current_size).await?;
        } else if current_size > new_size {
            self.clear_synthetic_worksets(pool).await?;
            self.scale_down(pool, &scalesets, current_size - new_size).await?;
            self.shutdown_empty_scalesets(pool, &scalesets).await?;
        } else {
            self.shutdown_empty_scalesets(pool, &scalesets).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "autoscale_tests.rs"]
mod tests;
