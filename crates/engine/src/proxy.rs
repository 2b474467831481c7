// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy reconciler: one live SSH-relay VM per region, on demand,
//! heartbeat-checked and time-limited.

use crate::engine::Engine;
use crate::error::EngineError;
use chrono::Duration;
use of_adapters::{ProvisioningState, VmParams};
use of_core::proxy::{Forward, Proxy, ProxyConfig, VmState};
use of_core::{Clock, Container, Event, Fault, FaultCode, Region};
use of_storage::{Query, QueueSas};

pub const PROXY_IMAGE: &str = "Canonical:UbuntuServer:18.04-LTS:latest";

/// Proxies are replaced after this long regardless of health.
pub const PROXY_LIFESPAN: Duration = Duration::days(7);

/// A proxy with no heartbeat inside this window is considered dead.
const PROXY_ALIVE_WINDOW: Duration = Duration::minutes(10);

/// Container holding the per-proxy config blobs.
const PROXY_CONFIGS_CONTAINER: &str = "proxy-configs";

/// Queue proxies push status updates to.
const PROXY_QUEUE: &str = "proxy";

impl<K: Clock> Engine<K> {
    pub async fn all_proxies(&self) -> Result<Vec<Proxy>, EngineError> {
        Ok(self.store.search(Query::new()).await?)
    }

    /// First usable proxy in the region, or a fresh one in `init`.
    pub async fn get_or_create_proxy(&self, region: &Region) -> Result<Proxy, EngineError> {
        let candidates: Vec<Proxy> = self
            .store
            .search(Query::new().eq("region", region).eq("outdated", false))
            .await?;
        for mut proxy in candidates {
            if self.proxy_is_outdated(&proxy) {
                proxy.outdated = true;
                self.store.save(&mut proxy).await?;
                continue;
            }
            if !proxy.state.available() {
                continue;
            }
            return Ok(proxy);
        }

        tracing::info!(%region, "creating proxy");
        let mut proxy = Proxy::new(region.clone(), &self.config.version, self.now());
        self.store.insert(&mut proxy).await?;
        self.send_event(Event::ProxyCreated { region: region.clone(), proxy_id: proxy.proxy_id })
            .await;
        Ok(proxy)
    }

    pub fn proxy_is_outdated(&self, proxy: &Proxy) -> bool {
        if !proxy.state.available() {
            return true;
        }
        if proxy.version != self.config.version {
            tracing::info!(
                proxy_version = %proxy.version,
                service_version = %self.config.version,
                state = %proxy.state,
                "proxy version mismatch"
            );
            return true;
        }
        if proxy.created_timestamp < self.now() - PROXY_LIFESPAN {
            tracing::info!(
                created = %proxy.created_timestamp,
                state = %proxy.state,
                "proxy older than 7 days"
            );
            return true;
        }
        false
    }

    pub fn proxy_is_alive(&self, proxy: &Proxy) -> bool {
        let cutoff = self.now() - PROXY_ALIVE_WINDOW;
        if let Some(heartbeat) = &proxy.heartbeat {
            if heartbeat.timestamp < cutoff {
                tracing::error!(
                    region = %proxy.region,
                    last = %heartbeat.timestamp,
                    "proxy heartbeat is more than 10 minutes old"
                );
                return false;
            }
            return true;
        }
        if proxy.meta.timestamp.is_some_and(|created| created < cutoff) {
            tracing::error!(region = %proxy.region, "no proxy heartbeat in the last 10 minutes");
            return false;
        }
        true
    }

    pub async fn proxy_is_used(&self, proxy: &Proxy) -> Result<bool, EngineError> {
        let forwards = self.proxy_get_forwards(proxy).await?;
        if forwards.is_empty() {
            tracing::info!(region = %proxy.region, "no forwards");
            return Ok(false);
        }
        Ok(true)
    }

    /// Live forwards for this proxy's region; expired rows are dropped.
    pub async fn proxy_get_forwards(&self, proxy: &Proxy) -> Result<Vec<Forward>, EngineError> {
        let now = self.now();
        let mut forwards = Vec::new();
        let entries = self
            .search_forwards(Some(&proxy.region), None, None, None, None)
            .await?;
        for entry in entries {
            if entry.endtime < now {
                self.store.delete(&entry).await?;
            } else if let Some(private_ip) = &proxy.private_ip {
                forwards.push(entry.to_forward(private_ip));
            }
        }
        Ok(forwards)
    }

    /// Write the config blob the proxy VM pulls.
    pub async fn save_proxy_config(&self, proxy: &Proxy) -> Result<(), EngineError> {
        let container = Container::new(PROXY_CONFIGS_CONTAINER);
        let path = format!("{}/{}/config.json", proxy.region, proxy.proxy_id);
        let config = ProxyConfig {
            url: self.cloud.file_sas_url(&container, &path),
            notification: self.queues.sas_url(PROXY_QUEUE, QueueSas::add()),
            region: proxy.region.clone(),
            proxy_id: proxy.proxy_id,
            forwards: self.proxy_get_forwards(proxy).await?,
            instance_id: self.config.instance_id,
            instance_telemetry_key: None,
            microsoft_telemetry_key: None,
        };
        self.cloud.save_blob(&container, &path, serde_json::to_string(&config)?).await?;
        Ok(())
    }

    pub async fn proxy_set_failed(
        &self,
        proxy: &mut Proxy,
        error: Fault,
    ) -> Result<(), EngineError> {
        if proxy.error.is_some() {
            return Ok(());
        }
        tracing::error!(region = %proxy.region, %error, "proxy vm failed");
        self.send_event(Event::ProxyFailed {
            region: proxy.region.clone(),
            proxy_id: proxy.proxy_id,
            error: error.clone(),
        })
        .await;
        proxy.error = Some(error);
        self.proxy_set_state(proxy, VmState::Stopping).await?;
        Ok(())
    }

    pub(crate) async fn proxy_set_state(
        &self,
        proxy: &mut Proxy,
        state: VmState,
    ) -> Result<(), EngineError> {
        if proxy.state == state {
            return Ok(());
        }
        proxy.state = state;
        self.store.save(proxy).await?;
        Ok(())
    }

    async fn proxy_init(&self, proxy: &mut Proxy) -> Result<(), EngineError> {
        match self.cloud.get_vm(&proxy.vm_name()).await {
            Some(vm) if vm.provisioning_state == ProvisioningState::Failed => {
                let fault = Fault::new(FaultCode::ProxyFailed, "provisioning failed");
                self.proxy_set_failed(proxy, fault).await?;
            }
            Some(_) => {
                self.save_proxy_config(proxy).await?;
                self.proxy_set_state(proxy, VmState::ExtensionsLaunch).await?;
            }
            None => {
                let instance_config = self.instance_config().await?;
                let params = VmParams {
                    name: proxy.vm_name(),
                    region: proxy.region.clone(),
                    sku: instance_config.proxy_vm_sku.clone(),
                    image: PROXY_IMAGE.to_string(),
                    auth: proxy.auth.clone(),
                };
                if let Err(error) = self.cloud.create_vm(params).await {
                    let fault = Fault::new(FaultCode::ProxyFailed, error.to_string());
                    self.proxy_set_failed(proxy, fault).await?;
                }
            }
        }
        self.store.save(proxy).await?;
        Ok(())
    }

    async fn proxy_extensions_launch(&self, proxy: &mut Proxy) -> Result<(), EngineError> {
        let Some(vm) = self.cloud.get_vm(&proxy.vm_name()).await else {
            let fault = Fault::new(FaultCode::ProxyFailed, "azure not able to find vm");
            self.proxy_set_failed(proxy, fault).await?;
            return Ok(());
        };

        if vm.provisioning_state == ProvisioningState::Failed {
            let fault = Fault::new(FaultCode::ProxyFailed, "provisioning failed");
            self.proxy_set_failed(proxy, fault).await?;
            return Ok(());
        }

        let Some(ips) = self.cloud.get_vm_ips(&proxy.vm_name()).await else {
            self.store.save(proxy).await?;
            return Ok(());
        };
        let (Some(public_ip), Some(private_ip)) = (ips.public_ip, ips.private_ip) else {
            self.store.save(proxy).await?;
            return Ok(());
        };
        proxy.ip = Some(public_ip);
        proxy.private_ip = Some(private_ip);

        match self.cloud.add_vm_extensions(&proxy.vm_name(), Vec::new()).await {
            Ok(true) => {
                self.proxy_set_state(proxy, VmState::Running).await?;
            }
            Ok(false) => {
                self.store.save(proxy).await?;
            }
            Err(error) => {
                let fault = Fault::new(FaultCode::ProxyFailed, error.to_string());
                self.proxy_set_failed(proxy, fault).await?;
            }
        }
        Ok(())
    }

    async fn proxy_stopping(&self, proxy: &mut Proxy) -> Result<(), EngineError> {
        match self.cloud.delete_vm(&proxy.vm_name()).await? {
            false => {
                tracing::info!(region = %proxy.region, "stopping proxy");
                self.store.save(proxy).await?;
            }
            true => {
                self.proxy_stopped(proxy).await?;
            }
        }
        Ok(())
    }

    async fn proxy_stopped(&self, proxy: &mut Proxy) -> Result<(), EngineError> {
        proxy.state = VmState::Stopped;
        tracing::info!(region = %proxy.region, "removing proxy");
        self.send_event(Event::ProxyDeleted {
            region: proxy.region.clone(),
            proxy_id: proxy.proxy_id,
        })
        .await;
        self.store.delete(proxy).await?;
        Ok(())
    }

    /// One state-machine step.
    pub async fn proxy_process_state_update(&self, proxy: &mut Proxy) -> Result<(), EngineError> {
        match proxy.state {
            VmState::Init => self.proxy_init(proxy).await,
            VmState::ExtensionsLaunch => self.proxy_extensions_launch(proxy).await,
            VmState::Stopping => self.proxy_stopping(proxy).await,
            VmState::Stopped => self.proxy_stopped(proxy).await,
            VmState::Running | VmState::ExtensionsFailed | VmState::VmAllocationFailed => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
