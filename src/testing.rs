// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory implementations of the collaborator traits and object builders for tests.

use crate::constants::{
    DEFAULT_TARGET_NAMESPACE, ETCD_CLIENT_PORT, ETCD_PORT_NAME, ETCD_PORT_PROTOCOL,
    HOST_ETCD_ENDPOINTS_NAME,
};
use crate::crd::{Condition, Infrastructure, InfrastructureStatus, Network, NetworkStatus};
use crate::dns::SrvResolver;
use crate::errors::{HostEndpointsError, Result};
use crate::labels::NODE_ROLE_MASTER_LABEL;
use crate::reconcilers::status::merge_conditions;
use crate::store::{EndpointsStore, EventSink, StatusStore, TopologySource};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Node, NodeAddress, NodeStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Builders
// ============================================================================

/// A node with the master role label and the given `InternalIP` addresses.
pub fn master_node(name: &str, internal_ips: &[&str]) -> Node {
    let mut node = plain_node(name, internal_ips);
    node.metadata.labels = Some(BTreeMap::from([(
        NODE_ROLE_MASTER_LABEL.to_string(),
        String::new(),
    )]));
    node
}

/// A node without role labels.
pub fn plain_node(name: &str, internal_ips: &[&str]) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        status: Some(NodeStatus {
            addresses: Some(
                internal_ips
                    .iter()
                    .map(|ip| NodeAddress {
                        type_: "InternalIP".to_string(),
                        address: (*ip).to_string(),
                    })
                    .collect(),
            ),
            ..NodeStatus::default()
        }),
        ..Node::default()
    }
}

/// A `Network` whose status lists `service_cidr` as the only service network.
pub fn network(service_cidr: &str) -> Network {
    let mut network = Network::new("cluster", Default::default());
    network.status = Some(NetworkStatus {
        service_network: vec![service_cidr.to_string()],
        ..NetworkStatus::default()
    });
    network
}

/// An `Infrastructure` with the given etcd discovery domain.
pub fn infrastructure(domain: &str) -> Infrastructure {
    let mut infra = Infrastructure::new("cluster", Default::default());
    infra.status = Some(InfrastructureStatus {
        etcd_discovery_domain: Some(domain.to_string()),
        ..InfrastructureStatus::default()
    });
    infra
}

/// An endpoint address `{ip, hostname, nodeName}`.
pub fn address(ip: &str, hostname: &str, node_name: Option<&str>) -> EndpointAddress {
    EndpointAddress {
        ip: ip.to_string(),
        hostname: Some(hostname.to_string()),
        node_name: node_name.map(str::to_string),
        ..EndpointAddress::default()
    }
}

/// The etcd port as published on `host-etcd`.
pub fn etcd_port() -> EndpointPort {
    EndpointPort {
        name: Some(ETCD_PORT_NAME.to_string()),
        port: ETCD_CLIENT_PORT,
        protocol: Some(ETCD_PORT_PROTOCOL.to_string()),
        ..EndpointPort::default()
    }
}

/// A published `host-etcd` object with one subset holding `addresses`.
pub fn host_endpoints(addresses: Vec<EndpointAddress>) -> Endpoints {
    Endpoints {
        metadata: ObjectMeta {
            name: Some(HOST_ETCD_ENDPOINTS_NAME.to_string()),
            namespace: Some(DEFAULT_TARGET_NAMESPACE.to_string()),
            resource_version: Some("1".to_string()),
            ..ObjectMeta::default()
        },
        subsets: Some(vec![EndpointSubset {
            addresses: Some(addresses),
            ports: Some(vec![etcd_port()]),
            ..EndpointSubset::default()
        }]),
    }
}

// ============================================================================
// DNS
// ============================================================================

/// Resolver answering from fixed tables.
#[derive(Default)]
pub struct FakeResolver {
    srv: HashMap<String, Vec<String>>,
    hosts: HashMap<String, Vec<IpAddr>>,
    failing: HashSet<String>,
    pub srv_queries: AtomicUsize,
}

impl FakeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register SRV targets for the fully qualified `name`.
    #[must_use]
    pub fn with_srv(mut self, name: &str, targets: &[&str]) -> Self {
        self.srv.insert(
            name.to_string(),
            targets.iter().map(|t| (*t).to_string()).collect(),
        );
        self
    }

    /// Register forward-lookup addresses for `host`.
    #[must_use]
    pub fn with_host(mut self, host: &str, ips: &[&str]) -> Self {
        let parsed = ips.iter().filter_map(|ip| ip.parse().ok()).collect();
        self.hosts.insert(host.to_string(), parsed);
        self
    }

    /// Make any lookup of `name` fail.
    #[must_use]
    pub fn with_failure(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Etcd SRV records for `domain`, one `etcd-N.<domain>` target per IP.
    #[must_use]
    pub fn etcd_cluster(domain: &str, ips: &[&str]) -> Self {
        let targets: Vec<String> = (0..ips.len())
            .map(|i| format!("etcd-{i}.{domain}."))
            .collect();
        let target_refs: Vec<&str> = targets.iter().map(String::as_str).collect();

        let mut resolver =
            Self::new().with_srv(&format!("_etcd-server-ssl._tcp.{domain}."), &target_refs);
        for (target, ip) in targets.iter().zip(ips) {
            resolver = resolver.with_host(target, &[ip]);
        }
        resolver
    }

    fn failure(name: &str) -> HostEndpointsError {
        HostEndpointsError::DnsResolutionFailure {
            query: name.to_string(),
            reason: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl SrvResolver for FakeResolver {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<String>> {
        self.srv_queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(name) {
            return Err(Self::failure(name));
        }
        self.srv
            .get(name)
            .cloned()
            .ok_or_else(|| HostEndpointsError::DnsResolutionFailure {
                query: name.to_string(),
                reason: "no records found".to_string(),
            })
    }

    async fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>> {
        if self.failing.contains(host) {
            return Err(Self::failure(host));
        }
        self.hosts
            .get(host)
            .cloned()
            .ok_or_else(|| HostEndpointsError::DnsResolutionFailure {
                query: host.to_string(),
                reason: "could not resolve member".to_string(),
            })
    }
}

// ============================================================================
// Topology
// ============================================================================

/// Topology served from plain values. `None` configs read as missing.
#[derive(Default)]
pub struct FakeTopology {
    pub nodes: Vec<Node>,
    pub network: Option<Network>,
    pub infrastructure: Option<Infrastructure>,
}

#[async_trait]
impl TopologySource for FakeTopology {
    async fn list_member_nodes(&self, role_label: &str) -> Result<Vec<Node>> {
        Ok(self
            .nodes
            .iter()
            .filter(|node| {
                node.metadata
                    .labels
                    .as_ref()
                    .is_some_and(|labels| labels.contains_key(role_label))
            })
            .cloned()
            .collect())
    }

    async fn get_network_config(&self, name: &str) -> Result<Network> {
        self.network
            .clone()
            .ok_or_else(|| HostEndpointsError::StoreReadFailure {
                resource: format!("networks.config.openshift.io/{name}"),
                reason: "not found".to_string(),
            })
    }

    async fn get_infrastructure_config(&self, name: &str) -> Result<Infrastructure> {
        self.infrastructure
            .clone()
            .ok_or_else(|| HostEndpointsError::StoreReadFailure {
                resource: format!("infrastructures.config.openshift.io/{name}"),
                reason: "not found".to_string(),
            })
    }
}

// ============================================================================
// Endpoints
// ============================================================================

/// Single-object endpoints store with server-side `resourceVersion` checks.
#[derive(Default)]
pub struct FakeEndpointsStore {
    object: Mutex<Option<Endpoints>>,
    concurrent_write: Mutex<Option<Endpoints>>,
    pub creates: AtomicUsize,
    pub replaces: AtomicUsize,
    pub fail_writes: bool,
}

impl FakeEndpointsStore {
    #[must_use]
    pub fn with_object(endpoints: Endpoints) -> Self {
        Self {
            object: Mutex::new(Some(endpoints)),
            ..Self::default()
        }
    }

    /// Make every create and replace fail.
    #[must_use]
    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    #[must_use]
    pub fn current(&self) -> Option<Endpoints> {
        self.object.lock().unwrap().clone()
    }

    /// Let another writer store `endpoints` right after the next `get` returns.
    ///
    /// The stored `resourceVersion` moves on, so a replace based on that read conflicts.
    #[must_use]
    pub fn with_concurrent_write(self, endpoints: Endpoints) -> Self {
        *self.concurrent_write.lock().unwrap() = Some(endpoints);
        self
    }

    /// Overwrite the stored object without going through the write path.
    pub fn set(&self, endpoints: Option<Endpoints>) {
        *self.object.lock().unwrap() = endpoints;
    }

    #[must_use]
    pub fn writes(&self) -> usize {
        self.creates.load(Ordering::SeqCst) + self.replaces.load(Ordering::SeqCst)
    }

    fn injected_failure() -> HostEndpointsError {
        HostEndpointsError::StoreWriteFailure {
            resource: "endpoints/host-etcd -n openshift-etcd".to_string(),
            reason: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl EndpointsStore for FakeEndpointsStore {
    async fn get(&self, name: &str, namespace: &str) -> Result<Option<Endpoints>> {
        let read = self.current().filter(|endpoints| {
            endpoints.metadata.name.as_deref() == Some(name)
                && endpoints.metadata.namespace.as_deref() == Some(namespace)
        });

        if let Some(mut other) = self.concurrent_write.lock().unwrap().take() {
            let mut object = self.object.lock().unwrap();
            let next_version = object
                .as_ref()
                .and_then(|current| current.metadata.resource_version.as_deref())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
                + 1;
            other.metadata.resource_version = Some(next_version.to_string());
            *object = Some(other);
        }

        Ok(read)
    }

    async fn create(&self, endpoints: &Endpoints) -> Result<Endpoints> {
        if self.fail_writes {
            return Err(Self::injected_failure());
        }
        let mut object = self.object.lock().unwrap();
        let mut created = endpoints.clone();
        created.metadata.resource_version = Some("1".to_string());
        *object = Some(created.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn replace(&self, endpoints: &Endpoints) -> Result<Endpoints> {
        if self.fail_writes {
            return Err(Self::injected_failure());
        }
        let mut object = self.object.lock().unwrap();
        let current_version = object
            .as_ref()
            .and_then(|current| current.metadata.resource_version.clone());

        if current_version != endpoints.metadata.resource_version {
            return Err(HostEndpointsError::Conflict {
                resource: "endpoints/host-etcd -n openshift-etcd".to_string(),
                reason: "the object has been modified".to_string(),
            });
        }

        let next_version = current_version
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        let mut replaced = endpoints.clone();
        replaced.metadata.resource_version = Some(next_version.to_string());
        *object = Some(replaced.clone());
        self.replaces.fetch_add(1, Ordering::SeqCst);
        Ok(replaced)
    }
}

// ============================================================================
// Status and events
// ============================================================================

/// Conditions held in memory.
#[derive(Default)]
pub struct FakeStatusStore {
    conditions: Mutex<Vec<Condition>>,
    pub writes: AtomicUsize,
    pub fail_writes: bool,
}

impl FakeStatusStore {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn conditions(&self) -> Vec<Condition> {
        self.conditions.lock().unwrap().clone()
    }

    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusStore for FakeStatusStore {
    async fn get_conditions(&self) -> Result<Vec<Condition>> {
        Ok(self.conditions())
    }

    async fn update_conditions(&self, conditions: &[Condition]) -> Result<()> {
        if self.fail_writes {
            return Err(HostEndpointsError::StatusWriteFailure {
                reason: "injected failure".to_string(),
            });
        }
        let mut current = self.conditions.lock().unwrap();
        *current = merge_conditions(&current, conditions);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A recorded event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub message: String,
}

/// Event sink that keeps every event.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventSink {
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }

    fn record(&self, warning: bool, reason: &str, message: &str) {
        self.events.lock().unwrap().push(RecordedEvent {
            warning,
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn normal(&self, reason: &str, message: &str) {
        self.record(false, reason, message);
    }

    async fn warning(&self, reason: &str, message: &str) {
        self.record(true, reason, message);
    }
}
