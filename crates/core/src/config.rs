// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance-scope configuration, stored as a single row per instance.

use crate::records::{RowMeta, StoreSchema};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PROXY_VM_SKU: &str = "Standard_B2s";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub address_space: String,
    pub subnet: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { address_space: "10.0.0.0/8".into(), subnet: "10.0.0.0/16".into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSecurityGroupConfig {
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    #[serde(default)]
    pub allowed_service_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiAccessRule {
    pub methods: Vec<String>,
    pub allowed_groups: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub principal_id: Uuid,
    pub groups: Vec<Uuid>,
}

/// Operator-editable settings accepted at instance scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub instance_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admins: Option<Vec<Uuid>>,
    #[serde(default)]
    pub allowed_aad_tenants: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_access_rules: Option<IndexMap<String, ApiAccessRule>>,
    #[serde(default)]
    pub network_config: NetworkConfig,
    #[serde(default)]
    pub proxy_nsg_config: NetworkSecurityGroupConfig,
    pub proxy_vm_sku: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_windows_vm_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_linux_vm_image: Option<String>,
    #[serde(default)]
    pub vmss_tags: IndexMap<String, String>,
    /// Opaque VM extension definitions passed through to scaleset create.
    #[serde(default)]
    pub extensions: Vec<serde_json::Value>,
    #[serde(default)]
    pub require_admin_privileges: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_membership: Option<Vec<GroupMembership>>,
    #[serde(skip)]
    pub meta: RowMeta,
}

impl InstanceConfig {
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            admins: None,
            allowed_aad_tenants: Vec::new(),
            api_access_rules: None,
            network_config: NetworkConfig::default(),
            proxy_nsg_config: NetworkSecurityGroupConfig::default(),
            proxy_vm_sku: DEFAULT_PROXY_VM_SKU.into(),
            default_windows_vm_image: None,
            default_linux_vm_image: None,
            vmss_tags: IndexMap::new(),
            extensions: Vec::new(),
            require_admin_privileges: false,
            group_membership: None,
            meta: RowMeta::default(),
        }
    }
}

crate::entity! {
    InstanceConfig => "InstanceConfig", StoreSchema::partition_only("instance_name")
}
