// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired `host-etcd` endpoints from node topology and DNS identity.
//!
//! Each member node contributes one address: its preferred internal IP, named by the
//! etcd SRV target that resolves to that IP (with the discovery domain stripped). A
//! bootstrap entry found in the published object is carried over unchanged.
//!
//! The build is all-or-nothing: any node that cannot be addressed or resolved aborts
//! it, and an empty result is an error. Nothing here writes to the cluster.

use crate::constants::{
    ETCD_BOOTSTRAP_HOSTNAME, ETCD_CLIENT_PORT, ETCD_PORT_NAME, ETCD_PORT_PROTOCOL,
    ETCD_SRV_PROTO, ETCD_SRV_SERVICE, HOST_ETCD_ENDPOINTS_NAME,
};
use crate::crd::Network;
use crate::dns::{resolve_member_hostname, strip_discovery_domain, SrvResolver};
use crate::errors::{HostEndpointsError, Result};
use crate::labels::DNS_SUFFIX_ANNOTATION;
use k8s_openapi::api::core::v1::{EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Node};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::net::IpAddr;
use tracing::debug;

/// Node address type carrying cluster-internal IPs.
const NODE_INTERNAL_IP: &str = "InternalIP";

/// IP family preferred for member addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

impl std::fmt::Display for IpFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V4 => write!(f, "tcp4"),
            Self::V6 => write!(f, "tcp6"),
        }
    }
}

/// The `host-etcd` skeleton: name, namespace and one subset with the etcd port.
#[must_use]
pub fn host_endpoints_asset(namespace: &str) -> Endpoints {
    Endpoints {
        metadata: ObjectMeta {
            name: Some(HOST_ETCD_ENDPOINTS_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        subsets: Some(vec![EndpointSubset {
            ports: Some(vec![EndpointPort {
                name: Some(ETCD_PORT_NAME.to_string()),
                port: ETCD_CLIENT_PORT,
                protocol: Some(ETCD_PORT_PROTOCOL.to_string()),
                ..EndpointPort::default()
            }]),
            ..EndpointSubset::default()
        }]),
    }
}

/// The IP family of the first service network CIDR.
///
/// # Errors
///
/// Returns a description of the problem if the network has no service network or the
/// first entry is not a CIDR.
pub fn preferred_ip_family(network: &Network) -> std::result::Result<IpFamily, String> {
    let cidr = network
        .status
        .as_ref()
        .and_then(|status| status.service_network.first())
        .ok_or_else(|| "network status does not have a service network".to_string())?;

    let prefix = cidr.split('/').next().unwrap_or(cidr);
    let ip: IpAddr = prefix
        .parse()
        .map_err(|e| format!("invalid service network {cidr:?}: {e}"))?;

    Ok(IpFamily::of(&ip))
}

/// The first `InternalIP` of `node` in the preferred family.
///
/// Returns the parsed address along with the address string exactly as the node
/// reports it.
///
/// # Errors
///
/// Returns [`HostEndpointsError::TopologyIncomplete`] if the family cannot be
/// determined or the node has no matching internal address.
pub fn preferred_internal_ip(network: &Network, node: &Node) -> Result<(IpAddr, String)> {
    let node_name = node.name_any();
    let family = preferred_ip_family(network).map_err(|reason| {
        HostEndpointsError::TopologyIncomplete {
            node: node_name.clone(),
            reason,
        }
    })?;

    let addresses = node
        .status
        .as_ref()
        .and_then(|status| status.addresses.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default();

    addresses
        .iter()
        .filter(|addr| addr.type_ == NODE_INTERNAL_IP)
        .find_map(|addr| {
            addr.address
                .parse::<IpAddr>()
                .ok()
                .filter(|ip| IpFamily::of(ip) == family)
                .map(|ip| (ip, addr.address.clone()))
        })
        .ok_or_else(|| HostEndpointsError::TopologyIncomplete {
            node: node_name,
            reason: format!("no matches found for ip family {family}"),
        })
}

/// The bootstrap member entry of the published object, if any.
///
/// Only the first subset is searched and only its first bootstrap entry is returned.
#[must_use]
pub fn bootstrap_address(existing: &Endpoints) -> Option<EndpointAddress> {
    existing
        .subsets
        .as_ref()
        .and_then(|subsets| subsets.first())
        .and_then(|subset| subset.addresses.as_ref())
        .and_then(|addresses| {
            addresses
                .iter()
                .find(|addr| addr.hostname.as_deref() == Some(ETCD_BOOTSTRAP_HOSTNAME))
        })
        .cloned()
}

/// Build the desired `host-etcd` object.
///
/// Nodes are processed in name order. Each contributes
/// `{ip, hostname, nodeName}` where `hostname` is its SRV-advertised member name without
/// the discovery domain. `bootstrap` is appended last.
///
/// # Errors
///
/// - [`HostEndpointsError::TopologyIncomplete`] if a node has no usable internal IP
/// - [`HostEndpointsError::DnsResolutionFailure`] / [`HostEndpointsError::SelfNotFound`]
///   if a node IP cannot be matched to an SRV target
/// - [`HostEndpointsError::NoReadyMembers`] if the address set is empty
pub async fn build_desired<R>(
    nodes: &[Node],
    network: &Network,
    discovery_domain: &str,
    bootstrap: Option<EndpointAddress>,
    namespace: &str,
    resolver: &R,
) -> Result<Endpoints>
where
    R: SrvResolver + ?Sized,
{
    let mut required = host_endpoints_asset(namespace);
    required.metadata.annotations = Some(BTreeMap::from([(
        DNS_SUFFIX_ANNOTATION.to_string(),
        discovery_domain.to_string(),
    )]));

    let mut sorted: Vec<&Node> = nodes.iter().collect();
    sorted.sort_by_key(|node| node.name_any());

    let mut addresses = Vec::with_capacity(sorted.len() + 1);
    for node in sorted {
        let node_name = node.name_any();
        let (ip, ip_string) = preferred_internal_ip(network, node)?;

        let dns_name = resolve_member_hostname(
            resolver,
            ETCD_SRV_SERVICE,
            ETCD_SRV_PROTO,
            discovery_domain,
            ip,
        )
        .await?;
        let hostname = strip_discovery_domain(&dns_name, discovery_domain);

        debug!(node = %node_name, ip = %ip_string, hostname = %hostname, "Resolved etcd member");
        addresses.push(EndpointAddress {
            ip: ip_string,
            hostname: Some(hostname.to_string()),
            node_name: Some(node_name),
            ..EndpointAddress::default()
        });
    }

    if let Some(bootstrap) = bootstrap {
        addresses.push(bootstrap);
    }

    if addresses.is_empty() {
        return Err(HostEndpointsError::NoReadyMembers);
    }

    if let Some(subset) = required
        .subsets
        .as_mut()
        .and_then(|subsets| subsets.first_mut())
    {
        subset.addresses = Some(addresses);
    }

    Ok(required)
}

#[cfg(test)]
#[path = "desired_tests.rs"]
mod desired_tests;
