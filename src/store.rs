// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Collaborator interfaces of the host-etcd reconcile and their Kubernetes implementations.
//!
//! The reconcile only talks to the traits in this module:
//!
//! - [`TopologySource`] - member nodes plus the `Network` and `Infrastructure` configs
//! - [`EndpointsStore`] - the published `Endpoints` object
//! - [`StatusStore`] - conditions on the `operator.openshift.io/v1 Etcd` object
//! - [`EventSink`] - Kubernetes events
//!
//! Reads are served from reflector caches; writes go straight to the API server.
//! The `TopologySource` implementation lives on [`crate::context::Stores`].

use crate::crd::{Condition, Etcd, Infrastructure, Network};
use crate::errors::{HostEndpointsError, Result};
use crate::reconcilers::retry::retry_on_conflict;
use crate::reconcilers::status::{conditions_equal, merge_conditions};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Endpoints, Node, ObjectReference};
use kube::api::{Patch, PatchParams, PostParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, warn};

/// Kubernetes caps event notes at 1KiB.
const EVENT_NOTE_MAX_LEN: usize = 1024;

/// Source of cluster topology.
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// Nodes carrying `role_label` (any value), in any order.
    async fn list_member_nodes(&self, role_label: &str) -> Result<Vec<Node>>;

    /// The cluster-scoped `Network` config named `name`.
    async fn get_network_config(&self, name: &str) -> Result<Network>;

    /// The cluster-scoped `Infrastructure` config named `name`.
    async fn get_infrastructure_config(&self, name: &str) -> Result<Infrastructure>;
}

/// Read/write access to the published `Endpoints`.
#[async_trait]
pub trait EndpointsStore: Send + Sync {
    /// Current object, or `None` if it does not exist.
    async fn get(&self, name: &str, namespace: &str) -> Result<Option<Endpoints>>;

    /// Create `endpoints`.
    async fn create(&self, endpoints: &Endpoints) -> Result<Endpoints>;

    /// Replace the whole object. The `resourceVersion` carried by `endpoints` guards the write.
    async fn replace(&self, endpoints: &Endpoints) -> Result<Endpoints>;
}

/// Conditions on the operator object.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Current conditions.
    async fn get_conditions(&self) -> Result<Vec<Condition>>;

    /// Persist `conditions`, upserting each by type. Conditions not listed are kept.
    async fn update_conditions(&self, conditions: &[Condition]) -> Result<()>;
}

/// Kubernetes event publisher.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn normal(&self, reason: &str, message: &str);
    async fn warning(&self, reason: &str, message: &str);
}

fn resource_name(name: &str, namespace: &str) -> String {
    format!("endpoints/{name} -n {namespace}")
}

// ============================================================================
// Endpoints
// ============================================================================

/// [`EndpointsStore`] reading from the reflector cache and writing through the API.
#[derive(Clone)]
pub struct KubeEndpointsStore {
    cache: Store<Endpoints>,
    api: Api<Endpoints>,
}

impl KubeEndpointsStore {
    #[must_use]
    pub fn new(client: Client, namespace: &str, cache: Store<Endpoints>) -> Self {
        Self {
            cache,
            api: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl EndpointsStore for KubeEndpointsStore {
    async fn get(&self, name: &str, namespace: &str) -> Result<Option<Endpoints>> {
        let key = ObjectRef::new(name).within(namespace);
        Ok(self.cache.get(&key).map(|endpoints| (*endpoints).clone()))
    }

    async fn create(&self, endpoints: &Endpoints) -> Result<Endpoints> {
        let resource = resource_name(
            &endpoints.name_any(),
            &endpoints.namespace().unwrap_or_default(),
        );
        self.api
            .create(&PostParams::default(), endpoints)
            .await
            .map_err(|e| HostEndpointsError::from_kube_write(&resource, &e))
    }

    async fn replace(&self, endpoints: &Endpoints) -> Result<Endpoints> {
        let name = endpoints.name_any();
        let resource = resource_name(&name, &endpoints.namespace().unwrap_or_default());
        self.api
            .replace(&name, &PostParams::default(), endpoints)
            .await
            .map_err(|e| HostEndpointsError::from_kube_write(&resource, &e))
    }
}

// ============================================================================
// Operator status
// ============================================================================

/// [`StatusStore`] for the cluster-scoped `Etcd` operator object.
#[derive(Clone)]
pub struct KubeStatusStore {
    cache: Store<Etcd>,
    api: Api<Etcd>,
    name: String,
}

impl KubeStatusStore {
    #[must_use]
    pub fn new(client: Client, name: &str, cache: Store<Etcd>) -> Self {
        Self {
            cache,
            api: Api::all(client),
            name: name.to_string(),
        }
    }

    fn resource(&self) -> String {
        format!("etcds.operator.openshift.io/{}", self.name)
    }
}

#[async_trait]
impl StatusStore for KubeStatusStore {
    async fn get_conditions(&self) -> Result<Vec<Condition>> {
        let etcd = self
            .cache
            .get(&ObjectRef::new(&self.name))
            .ok_or_else(|| HostEndpointsError::StoreReadFailure {
                resource: self.resource(),
                reason: "not found".to_string(),
            })?;

        Ok(etcd
            .status
            .as_ref()
            .map(|status| status.conditions.clone())
            .unwrap_or_default())
    }

    async fn update_conditions(&self, conditions: &[Condition]) -> Result<()> {
        let api = self.api.clone();
        let name = self.name.clone();
        let desired = conditions.to_vec();

        retry_on_conflict(
            || {
                let api = api.clone();
                let name = name.clone();
                let desired = desired.clone();
                async move {
                    // Fresh read so the patch carries the latest resourceVersion
                    let latest = api.get(&name).await?;
                    let current = latest
                        .status
                        .as_ref()
                        .map(|status| status.conditions.clone())
                        .unwrap_or_default();
                    let merged = merge_conditions(&current, &desired);

                    if conditions_equal(&current, &merged) {
                        debug!(name = %name, "Etcd status unchanged, skipping update");
                        return Ok(());
                    }

                    let patch = json!({
                        "metadata": { "resourceVersion": latest.resource_version() },
                        "status": { "conditions": merged }
                    });
                    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
                        .await?;
                    Ok(())
                }
            },
            "update etcd status conditions",
        )
        .await
        .map_err(|e| HostEndpointsError::StatusWriteFailure {
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// Events
// ============================================================================

/// [`EventSink`] publishing through the `events.k8s.io` recorder.
///
/// Events are attached to the `Etcd` operator object. Publishing failures are logged
/// and otherwise ignored.
#[derive(Clone)]
pub struct KubeEventSink {
    recorder: Recorder,
    reference: ObjectReference,
}

impl KubeEventSink {
    #[must_use]
    pub fn new(client: Client, controller: &str, operator_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        let reference = ObjectReference {
            api_version: Some(Etcd::api_version(&()).to_string()),
            kind: Some(Etcd::kind(&()).to_string()),
            name: Some(operator_name.to_string()),
            ..ObjectReference::default()
        };

        Self {
            recorder: Recorder::new(client, reporter),
            reference,
        }
    }

    async fn publish(&self, type_: EventType, reason: &str, message: &str) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(truncate_note(message)),
            action: "Reconcile".to_string(),
            secondary: None,
        };

        if let Err(e) = self.recorder.publish(&event, &self.reference).await {
            warn!(reason = reason, error = %e, "Failed to publish event");
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn normal(&self, reason: &str, message: &str) {
        self.publish(EventType::Normal, reason, message).await;
    }

    async fn warning(&self, reason: &str, message: &str) {
        self.publish(EventType::Warning, reason, message).await;
    }
}

/// Cut `message` to the event note limit on a character boundary.
#[must_use]
pub fn truncate_note(message: &str) -> String {
    if message.len() <= EVENT_NOTE_MAX_LEN {
        return message.to_string();
    }

    let mut end = EVENT_NOTE_MAX_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
