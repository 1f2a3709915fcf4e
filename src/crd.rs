// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster configuration and operator resource types read or written by the controller.
//!
//! These mirror the subset of the `config.openshift.io/v1` and `operator.openshift.io/v1`
//! APIs the host-etcd reconcile depends on. The objects are cluster-scoped singletons
//! named `cluster`; they are owned by other components and this crate only reads them,
//! except for the `Etcd` status conditions.
//!
//! # Example: Infrastructure
//!
//! ```yaml
//! apiVersion: config.openshift.io/v1
//! kind: Infrastructure
//! metadata:
//!   name: cluster
//! status:
//!   etcdDiscoveryDomain: example.com
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Standard Kubernetes-style condition, as carried in operator status.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `HostEndpointsDegraded`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

// ============================================================================
// config.openshift.io/v1 Network
// ============================================================================

/// A cluster network CIDR with the per-node host prefix.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkEntry {
    /// Pod network CIDR
    pub cidr: String,

    /// Size of the per-node subnet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_prefix: Option<u32>,
}

/// Desired cluster network configuration.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Network",
    doc = "Network holds cluster-wide network configuration. The canonical object is named 'cluster'."
)]
#[kube(status = "NetworkStatus")]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// Pod network CIDRs
    #[serde(default)]
    pub cluster_network: Vec<ClusterNetworkEntry>,

    /// Service network CIDRs
    #[serde(default)]
    pub service_network: Vec<String>,

    /// Network plugin in use (e.g. `OVNKubernetes`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
}

/// Observed cluster network configuration.
///
/// The first `serviceNetwork` entry decides which IP family is preferred for
/// node addresses.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    #[serde(default)]
    pub cluster_network: Vec<ClusterNetworkEntry>,

    #[serde(default)]
    pub service_network: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,

    #[serde(rename = "clusterNetworkMTU", skip_serializing_if = "Option::is_none")]
    pub cluster_network_mtu: Option<i32>,
}

// ============================================================================
// config.openshift.io/v1 Infrastructure
// ============================================================================

/// Desired infrastructure configuration. Unused by this controller beyond deserialization.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Infrastructure",
    doc = "Infrastructure holds cluster-wide information about the platform. The canonical object is named 'cluster'."
)]
#[kube(status = "InfrastructureStatus")]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    /// Reference to the cloud provider config map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_config: Option<ConfigMapFileReference>,
}

/// Reference to a key in a config map.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapFileReference {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Observed infrastructure information.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    /// Unique infrastructure identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrastructure_name: Option<String>,

    /// Underlying platform type (e.g. `AWS`, `BareMetal`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// DNS zone under which etcd members publish SRV identity records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etcd_discovery_domain: Option<String>,

    #[serde(rename = "apiServerURL", skip_serializing_if = "Option::is_none")]
    pub api_server_url: Option<String>,

    #[serde(rename = "apiServerInternalURI", skip_serializing_if = "Option::is_none")]
    pub api_server_internal_uri: Option<String>,
}

impl Infrastructure {
    /// The etcd discovery domain, if set and non-empty.
    #[must_use]
    pub fn etcd_discovery_domain(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|status| status.etcd_discovery_domain.as_deref())
            .filter(|domain| !domain.is_empty())
    }
}

// ============================================================================
// operator.openshift.io/v1 Etcd
// ============================================================================

/// Desired state of the etcd operator.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "operator.openshift.io",
    version = "v1",
    kind = "Etcd",
    plural = "etcds",
    doc = "Etcd configures the etcd operator. The canonical object is named 'cluster'."
)]
#[kube(status = "EtcdStatus")]
#[serde(rename_all = "camelCase")]
pub struct EtcdSpec {
    /// `Managed`, `Unmanaged` or `Removed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_log_level: Option<String>,
}

/// Observed state of the etcd operator. Every operator controller owns one condition type.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EtcdStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
