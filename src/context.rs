// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the controller with reflector stores.
//!
//! This module provides the shared reflector store pattern for the controller.
//! Workers receive an `Arc<Context>` that contains:
//! - Kubernetes client
//! - Reflector stores for every watched type
//! - Controller configuration
//!
//! The stores give in-memory reads of cluster topology, so a reconcile performs no
//! list calls against the API server.

use crate::config::Config;
use crate::constants::{CLUSTER_CONFIG_NAME, EVENT_REPORTER};
use crate::crd::{Etcd, Infrastructure, Network};
use crate::dns::SrvResolver;
use crate::errors::{HostEndpointsError, Result};
use crate::reconcilers::HostEndpointsReconciler;
use crate::store::{KubeEndpointsStore, KubeEventSink, KubeStatusStore, TopologySource};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Endpoints, Node};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::Client;
use std::sync::Arc;
use tracing::debug;

/// Shared context passed to all workers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Reflector stores for all watched types
    pub stores: Stores,

    /// Controller configuration
    pub config: Config,
}

impl Context {
    #[must_use]
    pub fn new(client: Client, stores: Stores, config: Config) -> Self {
        Self {
            client,
            stores,
            config,
        }
    }

    /// Build the reconciler over the stores and the live API.
    #[must_use]
    pub fn reconciler(&self, resolver: Arc<dyn SrvResolver>) -> HostEndpointsReconciler {
        let endpoints = KubeEndpointsStore::new(
            self.client.clone(),
            &self.config.namespace,
            self.stores.endpoints.clone(),
        );
        let status = KubeStatusStore::new(
            self.client.clone(),
            CLUSTER_CONFIG_NAME,
            self.stores.etcds.clone(),
        );
        let events = KubeEventSink::new(self.client.clone(), EVENT_REPORTER, CLUSTER_CONFIG_NAME);

        HostEndpointsReconciler::new(
            Arc::new(self.stores.clone()),
            Arc::new(endpoints),
            Arc::new(status),
            Arc::new(events),
            resolver,
            &self.config.namespace,
        )
    }
}

/// Collection of all reflector stores.
///
/// Each store is populated by a dedicated reflector task and provides
/// in-memory access to resources without API calls.
#[derive(Clone)]
pub struct Stores {
    // Cluster-scoped resources
    pub etcds: Store<Etcd>,
    pub nodes: Store<Node>,
    pub infrastructures: Store<Infrastructure>,
    pub networks: Store<Network>,

    // Target namespace
    pub endpoints: Store<Endpoints>,
}

impl Stores {
    /// Wait until every reflector has completed its initial list.
    ///
    /// # Errors
    ///
    /// Returns an error if a reflector writer was dropped before becoming ready.
    pub async fn wait_until_ready(&self) -> anyhow::Result<()> {
        self.etcds.wait_until_ready().await?;
        self.nodes.wait_until_ready().await?;
        self.infrastructures.wait_until_ready().await?;
        self.networks.wait_until_ready().await?;
        self.endpoints.wait_until_ready().await?;
        debug!("All reflector stores are ready");
        Ok(())
    }

    /// Nodes carrying `role_label`, whatever its value.
    #[must_use]
    pub fn nodes_with_label(&self, role_label: &str) -> Vec<Node> {
        self.nodes
            .state()
            .iter()
            .filter(|node| {
                node.metadata
                    .labels
                    .as_ref()
                    .is_some_and(|labels| labels.contains_key(role_label))
            })
            .map(|node| (**node).clone())
            .collect()
    }
}

fn not_found(resource: String) -> HostEndpointsError {
    HostEndpointsError::StoreReadFailure {
        resource,
        reason: "not found".to_string(),
    }
}

#[async_trait]
impl TopologySource for Stores {
    async fn list_member_nodes(&self, role_label: &str) -> Result<Vec<Node>> {
        Ok(self.nodes_with_label(role_label))
    }

    async fn get_network_config(&self, name: &str) -> Result<Network> {
        self.networks
            .get(&ObjectRef::new(name))
            .map(|network| (*network).clone())
            .ok_or_else(|| not_found(format!("networks.config.openshift.io/{name}")))
    }

    async fn get_infrastructure_config(&self, name: &str) -> Result<Infrastructure> {
        self.infrastructures
            .get(&ObjectRef::new(name))
            .map(|infrastructure| (*infrastructure).clone())
            .ok_or_else(|| not_found(format!("infrastructures.config.openshift.io/{name}")))
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
