// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy VM model and port-forward table.

use crate::fault::Fault;
use crate::ids::{MachineId, ProxyId, ScalesetId};
use crate::primitives::Region;
use crate::records::{RowMeta, StoreSchema};
use crate::scaleset::Authentication;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Port range available for SSH forwards, one port per forward.
pub const PROXY_PORT_RANGE: std::ops::Range<u16> = 28000..32000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmState {
    Init,
    ExtensionsLaunch,
    ExtensionsFailed,
    VmAllocationFailed,
    Running,
    Stopping,
    Stopped,
}

impl VmState {
    /// States that indicate the reconciler has work to do.
    pub fn needs_work() -> &'static [VmState] {
        &[VmState::Init, VmState::ExtensionsLaunch, VmState::Stopping]
    }

    /// States in which the VM is usable or on its way up.
    pub fn available(self) -> bool {
        !matches!(self, VmState::Stopping | VmState::Stopped)
    }
}

crate::simple_display! {
    VmState {
        Init => "init",
        ExtensionsLaunch => "extensions_launch",
        ExtensionsFailed => "extensions_failed",
        VmAllocationFailed => "vm_allocation_failed",
        Running => "running",
        Stopping => "stopping",
        Stopped => "stopped",
    }
}

/// Heartbeat posted by the proxy manager running on the VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyHeartbeat {
    pub region: Region,
    pub proxy_id: ProxyId,
    pub forwards: Vec<Forward>,
    pub timestamp: DateTime<Utc>,
}

/// A short-lived VM providing SSH port-forwarding into nodes. One live
/// proxy per region, on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proxy {
    pub region: Region,
    pub proxy_id: ProxyId,
    pub state: VmState,
    pub created_timestamp: DateTime<Utc>,
    pub version: String,
    pub auth: Authentication,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Private IP of the network interface; forwards bind to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Fault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat: Option<ProxyHeartbeat>,
    /// Set when version or lifespan has expired; outdated proxies are
    /// replaced on demand and stopped once unused.
    #[serde(default)]
    pub outdated: bool,
    #[serde(skip)]
    pub meta: RowMeta,
}

impl Proxy {
    pub fn new(region: Region, version: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            region,
            proxy_id: ProxyId::new(),
            state: VmState::Init,
            created_timestamp: created,
            version: version.into(),
            auth: Authentication::generate(),
            ip: None,
            private_ip: None,
            error: None,
            heartbeat: None,
            outdated: false,
            meta: RowMeta::default(),
        }
    }

    /// VM name in the cloud, derived from the proxy id.
    pub fn vm_name(&self) -> String {
        format!("proxy-{}", self.proxy_id.simple())
    }
}

crate::entity! {
    Proxy => "Proxy", StoreSchema::keyed("region", "proxy_id")
}

/// An active port forward: `(region, port)` is the identity, so the port
/// is the allocation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyForward {
    pub region: Region,
    pub port: u16,
    pub scaleset_id: ScalesetId,
    pub machine_id: MachineId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_id: Option<ProxyId>,
    pub dst_ip: String,
    pub dst_port: u16,
    pub endtime: DateTime<Utc>,
    #[serde(skip)]
    pub meta: RowMeta,
}

crate::entity! {
    ProxyForward => "ProxyForward", StoreSchema::keyed("region", "port")
}

impl ProxyForward {
    pub fn to_forward(&self, src_ip: &str) -> Forward {
        Forward {
            src_ip: src_ip.to_string(),
            src_port: self.port,
            dst_ip: self.dst_ip.clone(),
            dst_port: self.dst_port,
        }
    }
}

/// Forward entry handed to the proxy manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forward {
    pub src_ip: String,
    pub src_port: u16,
    pub dst_ip: String,
    pub dst_port: u16,
}

/// Config blob the proxy VM pulls from `proxy-configs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    pub notification: String,
    pub region: Region,
    pub proxy_id: ProxyId,
    pub forwards: Vec<Forward>,
    pub instance_id: uuid::Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_telemetry_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microsoft_telemetry_key: Option<String>,
}

crate::builder! {
    pub struct ProxyBuilder => Proxy {
        into {
            version: String = "2.19.0",
        }
        set {
            region: Region = Region::new("eastus"),
            proxy_id: ProxyId = ProxyId::new(),
            state: VmState = VmState::Init,
            created_timestamp: DateTime<Utc> = Utc::now(),
            auth: Authentication = Authentication::generate(),
            ip: Option<String> = None,
            private_ip: Option<String> = None,
            error: Option<Fault> = None,
            heartbeat: Option<ProxyHeartbeat> = None,
            outdated: bool = false,
        }
        computed {
            meta: RowMeta = RowMeta::default(),
        }
    }
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
