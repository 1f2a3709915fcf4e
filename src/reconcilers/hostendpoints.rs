// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `host-etcd` endpoints reconciliation.
//!
//! ## Reconciliation Flow
//!
//! 1. Read the published `host-etcd` object; it must already exist
//! 2. Read the etcd discovery domain from the `Infrastructure` config
//! 3. Read the `Network` config to pick the preferred IP family
//! 4. List member nodes and resolve each one's etcd member hostname over DNS
//! 5. Carry over the bootstrap entry, if published
//! 6. Replace the published object if it differs
//! 7. Report the outcome as the `HostEndpointsDegraded` condition

use crate::constants::{CLUSTER_CONFIG_NAME, HOST_ETCD_ENDPOINTS_NAME};
use crate::dns::SrvResolver;
use crate::errors::{HostEndpointsError, Result};
use crate::labels::NODE_ROLE_MASTER_LABEL;
use crate::metrics;
use crate::reconcilers::apply::{apply_endpoints, ApplyOutcome};
use crate::reconcilers::desired::{bootstrap_address, build_desired};
use crate::reconcilers::status::report_outcome;
use crate::store::{EndpointsStore, EventSink, StatusStore, TopologySource};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Reconciler for the published `host-etcd` endpoints.
///
/// Holds no state between runs; every [`HostEndpointsReconciler::sync`] recomputes
/// everything from the collaborators.
#[derive(Clone)]
pub struct HostEndpointsReconciler {
    topology: Arc<dyn TopologySource>,
    endpoints: Arc<dyn EndpointsStore>,
    status: Arc<dyn StatusStore>,
    events: Arc<dyn EventSink>,
    resolver: Arc<dyn SrvResolver>,
    namespace: String,
}

impl HostEndpointsReconciler {
    #[must_use]
    pub fn new(
        topology: Arc<dyn TopologySource>,
        endpoints: Arc<dyn EndpointsStore>,
        status: Arc<dyn StatusStore>,
        events: Arc<dyn EventSink>,
        resolver: Arc<dyn SrvResolver>,
        namespace: &str,
    ) -> Self {
        Self {
            topology,
            endpoints,
            status,
            events,
            resolver,
            namespace: namespace.to_string(),
        }
    }

    /// Namespace the published object lives in.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Run one reconcile and report it on the operator status.
    ///
    /// # Errors
    ///
    /// Returns the reconcile error, or a status write error if the reconcile succeeded
    /// but its healthy condition could not be recorded.
    pub async fn sync(&self) -> Result<()> {
        let start = Instant::now();
        let result = self.sync_host_endpoints().await;

        match &result {
            Ok(outcome) => {
                debug!(outcome = outcome.as_str(), "host-etcd reconcile finished");
                metrics::record_reconciliation_success(start.elapsed());
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "host-etcd reconcile failed");
                metrics::record_reconciliation_error(start.elapsed());
                metrics::record_error(e.kind());
            }
        }

        report_outcome(self.status.as_ref(), self.events.as_ref(), result.map(|_| ())).await
    }

    /// Compute the desired `host-etcd` object and write it if it differs.
    ///
    /// # Errors
    ///
    /// - [`HostEndpointsError::PreconditionNotFound`] if `host-etcd` does not exist
    /// - [`HostEndpointsError::ConfigMissing`] if the discovery domain is not set
    /// - any error of [`build_desired`] or [`apply_endpoints`]
    pub async fn sync_host_endpoints(&self) -> Result<ApplyOutcome> {
        // The bootstrap entry only exists in the published object, so it must be read first
        let existing = self
            .endpoints
            .get(HOST_ETCD_ENDPOINTS_NAME, &self.namespace)
            .await?
            .ok_or_else(|| HostEndpointsError::PreconditionNotFound {
                name: HOST_ETCD_ENDPOINTS_NAME.to_string(),
                namespace: self.namespace.clone(),
            })?;

        let infrastructure = self
            .topology
            .get_infrastructure_config(CLUSTER_CONFIG_NAME)
            .await?;
        let discovery_domain = infrastructure
            .etcd_discovery_domain()
            .ok_or_else(|| HostEndpointsError::ConfigMissing {
                name: CLUSTER_CONFIG_NAME.to_string(),
            })?
            .to_string();

        let network = self.topology.get_network_config(CLUSTER_CONFIG_NAME).await?;
        let nodes = self
            .topology
            .list_member_nodes(NODE_ROLE_MASTER_LABEL)
            .await?;
        debug!(
            members = nodes.len(),
            discovery_domain = %discovery_domain,
            "Computing host-etcd endpoints"
        );

        let required = build_desired(
            &nodes,
            &network,
            &discovery_domain,
            bootstrap_address(&existing),
            &self.namespace,
            self.resolver.as_ref(),
        )
        .await?;

        let published = required
            .subsets
            .as_ref()
            .and_then(|subsets| subsets.first())
            .and_then(|subset| subset.addresses.as_ref())
            .map_or(0, Vec::len);

        let outcome =
            apply_endpoints(self.endpoints.as_ref(), self.events.as_ref(), &required).await?;
        metrics::set_published_addresses(published);

        if outcome != ApplyOutcome::Unchanged {
            info!(
                outcome = outcome.as_str(),
                addresses = published,
                namespace = %self.namespace,
                "host-etcd endpoints written"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "hostendpoints_tests.rs"]
mod hostendpoints_tests;
