// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Port-forward allocation. `(region, port)` is the identity, so insert
//! races on a port resolve by moving to the next free one.

use crate::engine::Engine;
use crate::error::EngineError;
use chrono::Duration;
use of_core::proxy::{ProxyForward, PROXY_PORT_RANGE};
use of_core::{Clock, Fault, FaultCode, MachineId, ProxyId, Region, ScalesetId, TaskId};
use of_storage::{Query, StoreError};

impl<K: Clock> Engine<K> {
    pub async fn search_forwards(
        &self,
        region: Option<&Region>,
        scaleset_id: Option<ScalesetId>,
        machine_id: Option<MachineId>,
        proxy_id: Option<ProxyId>,
        dst_port: Option<u16>,
    ) -> Result<Vec<ProxyForward>, EngineError> {
        let mut query = Query::new();
        if let Some(region) = region {
            query = query.eq("region", region);
        }
        if let Some(scaleset_id) = scaleset_id {
            query = query.eq("scaleset_id", scaleset_id);
        }
        if let Some(machine_id) = machine_id {
            query = query.eq("machine_id", machine_id);
        }
        if let Some(proxy_id) = proxy_id {
            query = query.eq("proxy_id", proxy_id);
        }
        if let Some(dst_port) = dst_port {
            query = query.eq("dst_port", dst_port);
        }
        Ok(self.store.search(query).await?)
    }

    /// Extend an existing forward or allocate the lowest free port in
    /// the proxy range.
    pub async fn update_or_create_forward(
        &self,
        region: Region,
        scaleset_id: ScalesetId,
        machine_id: MachineId,
        dst_port: u16,
        duration_hours: u64,
    ) -> Result<ProxyForward, EngineError> {
        let Some(private_ip) = self.cloud.get_instance_ip(scaleset_id, machine_id).await else {
            return Err(Fault::new(
                FaultCode::UnableToPortForward,
                "no private ip for node",
            )
            .into());
        };

        let endtime = self.now() + Duration::hours(duration_hours as i64);

        let existing = self
            .search_forwards(
                Some(&region),
                Some(scaleset_id),
                Some(machine_id),
                None,
                Some(dst_port),
            )
            .await?;
        if let Some(mut entry) = existing.into_iter().next() {
            entry.endtime = endtime;
            self.store.save(&mut entry).await?;
            return Ok(entry);
        }

        let taken: Vec<ProxyForward> = self.search_forwards(Some(&region), None, None, None, None).await?;
        let used: std::collections::BTreeSet<u16> =
            taken.iter().map(|entry| entry.port).collect();

        for port in PROXY_PORT_RANGE {
            if used.contains(&port) {
                continue;
            }

            let mut entry = ProxyForward {
                region: region.clone(),
                port,
                scaleset_id,
                machine_id,
                proxy_id: None,
                dst_ip: private_ip.clone(),
                dst_port,
                endtime,
                meta: of_core::RowMeta::default(),
            };
            match self.store.insert(&mut entry).await {
                Ok(()) => return Ok(entry),
                Err(StoreError::AlreadyExists) => {
                    tracing::info!(%region, port, "port is already used");
                    continue;
                }
                Err(error) => return Err(error.into()),
            }
        }

        Err(Fault::new(FaultCode::UnableToPortForward, "all forward ports used").into())
    }

    /// Drop forwards for a scaleset (optionally narrowed); returns the
    /// regions whose proxy configs need refreshing.
    pub async fn remove_forwards(
        &self,
        scaleset_id: ScalesetId,
        machine_id: Option<MachineId>,
        dst_port: Option<u16>,
    ) -> Result<Vec<Region>, EngineError> {
        let entries =
            self.search_forwards(None, Some(scaleset_id), machine_id, None, dst_port).await?;
        let mut regions = Vec::new();
        for entry in entries {
            if !regions.contains(&entry.region) {
                regions.push(entry.region.clone());
            }
            self.store.delete(&entry).await?;
        }
        Ok(regions)
    }

    /// Drop forwards pointing at nodes assigned to a task (used when the
    /// task stops).
    pub async fn remove_forwards_for_task(&self, task_id: TaskId) -> Result<(), EngineError> {
        for node in self.nodes_by_task(task_id).await? {
            if let Some(scaleset_id) = node.scaleset_id {
                self.remove_forwards(scaleset_id, Some(node.machine_id), None).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "proxy_forward_tests.rs"]
mod tests;
