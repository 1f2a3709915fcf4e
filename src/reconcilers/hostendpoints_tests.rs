// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `hostendpoints.rs`

#[cfg(test)]
mod tests {
    use crate::crd::Infrastructure;
    use crate::errors::HostEndpointsError;
    use crate::reconcilers::apply::ApplyOutcome;
    use crate::reconcilers::hostendpoints::HostEndpointsReconciler;
    use crate::reconcilers::status::find_condition;
    use crate::status_reasons::{
        CONDITION_HOST_ENDPOINTS_DEGRADED, EVENT_ERROR_UPDATING_STATUS,
        REASON_ERROR_UPDATING_HOST_ENDPOINTS, REASON_HOST_ENDPOINTS_UPDATED,
    };
    use crate::testing::{
        address, host_endpoints, infrastructure, master_node, network, plain_node,
        FakeEndpointsStore, FakeResolver, FakeStatusStore, FakeTopology, RecordingEventSink,
    };
    use k8s_openapi::api::core::v1::{EndpointAddress, Endpoints, Node};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    const DOMAIN: &str = "example.com";
    const NAMESPACE: &str = "openshift-etcd";

    struct Harness {
        reconciler: HostEndpointsReconciler,
        endpoints: Arc<FakeEndpointsStore>,
        status: Arc<FakeStatusStore>,
        events: Arc<RecordingEventSink>,
    }

    fn three_nodes() -> Vec<Node> {
        vec![
            master_node("master-0", &["10.0.0.1"]),
            master_node("master-1", &["10.0.0.2"]),
            master_node("master-2", &["10.0.0.3"]),
        ]
    }

    fn three_member_dns() -> FakeResolver {
        FakeResolver::etcd_cluster(DOMAIN, &["10.0.0.1", "10.0.0.2", "10.0.0.3"])
    }

    fn harness_with(
        topology: FakeTopology,
        resolver: FakeResolver,
        endpoints: FakeEndpointsStore,
        status: FakeStatusStore,
    ) -> Harness {
        let endpoints = Arc::new(endpoints);
        let status = Arc::new(status);
        let events = Arc::new(RecordingEventSink::default());
        let reconciler = HostEndpointsReconciler::new(
            Arc::new(topology),
            endpoints.clone(),
            status.clone(),
            events.clone(),
            Arc::new(resolver),
            NAMESPACE,
        );
        Harness {
            reconciler,
            endpoints,
            status,
            events,
        }
    }

    fn harness(nodes: Vec<Node>, resolver: FakeResolver, published: Endpoints) -> Harness {
        harness_with(
            FakeTopology {
                nodes,
                network: Some(network("172.30.0.0/16")),
                infrastructure: Some(infrastructure(DOMAIN)),
            },
            resolver,
            FakeEndpointsStore::with_object(published),
            FakeStatusStore::default(),
        )
    }

    fn published_addresses(store: &FakeEndpointsStore) -> Vec<EndpointAddress> {
        store.current().unwrap().subsets.unwrap()[0]
            .addresses
            .clone()
            .unwrap_or_default()
    }

    fn degraded(status: &FakeStatusStore) -> (String, Option<String>, Option<String>) {
        let conditions = status.conditions();
        let condition = find_condition(&conditions, CONDITION_HOST_ENDPOINTS_DEGRADED)
            .expect("degraded condition should be set")
            .clone();
        (condition.status, condition.reason, condition.message)
    }

    #[tokio::test]
    async fn test_three_node_cluster_end_to_end() {
        let h = harness(three_nodes(), three_member_dns(), host_endpoints(vec![]));

        h.reconciler.sync().await.unwrap();

        assert_eq!(h.endpoints.writes(), 1, "exactly one write");
        let published = h.endpoints.current().unwrap();
        let subset = &published.subsets.as_ref().unwrap()[0];

        let hostnames: Vec<_> = subset
            .addresses
            .as_ref()
            .unwrap()
            .iter()
            .map(|a| a.hostname.clone().unwrap())
            .collect();
        assert_eq!(hostnames, vec!["etcd-0", "etcd-1", "etcd-2"]);

        let port = &subset.ports.as_ref().unwrap()[0];
        assert_eq!(port.port, 2379);
        assert_eq!(port.protocol.as_deref(), Some("TCP"));

        let (status, reason, _) = degraded(&h.status);
        assert_eq!(status, "False");
        assert_eq!(reason.as_deref(), Some(REASON_HOST_ENDPOINTS_UPDATED));
    }

    #[tokio::test]
    async fn test_second_sync_is_idempotent() {
        let h = harness(three_nodes(), three_member_dns(), host_endpoints(vec![]));

        h.reconciler.sync().await.unwrap();
        let status_writes = h.status.writes();

        let outcome = h.reconciler.sync_host_endpoints().await.unwrap();
        h.reconciler.sync().await.unwrap();

        assert_eq!(outcome, ApplyOutcome::Unchanged);
        assert_eq!(h.endpoints.writes(), 1, "no write once in sync");
        assert_eq!(h.status.writes(), status_writes, "unchanged condition is not rewritten");
    }

    #[tokio::test]
    async fn test_published_order_does_not_trigger_write() {
        let mut published = host_endpoints(vec![
            address("10.0.0.3", "etcd-2", Some("master-2")),
            address("10.0.0.1", "etcd-0", Some("master-0")),
            address("10.0.0.2", "etcd-1", Some("master-1")),
        ]);
        published.metadata.annotations = Some(
            [(
                crate::labels::DNS_SUFFIX_ANNOTATION.to_string(),
                DOMAIN.to_string(),
            )]
            .into(),
        );
        let h = harness(three_nodes(), three_member_dns(), published);

        let outcome = h.reconciler.sync_host_endpoints().await.unwrap();

        assert_eq!(outcome, ApplyOutcome::Unchanged);
        assert_eq!(h.endpoints.writes(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_entry_is_preserved() {
        let bootstrap = address("10.0.0.99", "etcd-bootstrap", None);
        let h = harness(
            three_nodes(),
            three_member_dns(),
            host_endpoints(vec![bootstrap.clone()]),
        );

        h.reconciler.sync().await.unwrap();

        let addresses = published_addresses(&h.endpoints);
        assert_eq!(addresses.len(), 4);
        assert_eq!(addresses.last(), Some(&bootstrap));
    }

    #[tokio::test]
    async fn test_bootstrap_entry_survives_topology_change() {
        let bootstrap = address("10.0.0.99", "etcd-bootstrap", None);
        let h = harness(
            three_nodes(),
            three_member_dns(),
            host_endpoints(vec![bootstrap.clone()]),
        );
        h.reconciler.sync().await.unwrap();
        assert_eq!(h.endpoints.writes(), 1);

        // Two masters leave; no node has the bootstrap IP
        let shrunk = HostEndpointsReconciler::new(
            Arc::new(FakeTopology {
                nodes: vec![master_node("master-0", &["10.0.0.1"])],
                network: Some(network("172.30.0.0/16")),
                infrastructure: Some(infrastructure(DOMAIN)),
            }),
            h.endpoints.clone(),
            h.status.clone(),
            h.events.clone(),
            Arc::new(three_member_dns()),
            NAMESPACE,
        );

        shrunk.sync().await.unwrap();
        let addresses = published_addresses(&h.endpoints);
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses.last(), Some(&bootstrap));
        assert_eq!(h.endpoints.writes(), 2, "one write for the removed members");

        let outcome = shrunk.sync_host_endpoints().await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Unchanged);
        assert_eq!(h.endpoints.writes(), 2, "no extra write once in sync");
        assert_eq!(published_addresses(&h.endpoints).last(), Some(&bootstrap));
    }

    #[tokio::test]
    async fn test_empty_membership_fails_without_write() {
        let h = harness(vec![], three_member_dns(), host_endpoints(vec![]));

        let err = h.reconciler.sync().await.unwrap_err();

        assert_eq!(err, HostEndpointsError::NoReadyMembers);
        assert_eq!(h.endpoints.writes(), 0);

        let (status, reason, message) = degraded(&h.status);
        assert_eq!(status, "True");
        assert_eq!(reason.as_deref(), Some(REASON_ERROR_UPDATING_HOST_ENDPOINTS));
        assert_eq!(message.as_deref(), Some("no etcd member nodes are ready"));
    }

    #[tokio::test]
    async fn test_non_member_nodes_are_ignored() {
        let mut nodes = three_nodes();
        nodes.push(plain_node("worker-0", &["10.0.1.1"]));
        let h = harness(nodes, three_member_dns(), host_endpoints(vec![]));

        h.reconciler.sync().await.unwrap();

        assert_eq!(published_addresses(&h.endpoints).len(), 3);
    }

    #[tokio::test]
    async fn test_missing_published_object_is_a_precondition_failure() {
        let h = harness_with(
            FakeTopology {
                nodes: three_nodes(),
                network: Some(network("172.30.0.0/16")),
                infrastructure: Some(infrastructure(DOMAIN)),
            },
            three_member_dns(),
            FakeEndpointsStore::default(),
            FakeStatusStore::default(),
        );

        let err = h.reconciler.sync().await.unwrap_err();

        assert!(matches!(err, HostEndpointsError::PreconditionNotFound { .. }));
        assert_eq!(h.endpoints.writes(), 0);
        assert_eq!(degraded(&h.status).0, "True");
    }

    #[tokio::test]
    async fn test_missing_discovery_domain() {
        let h = harness_with(
            FakeTopology {
                nodes: three_nodes(),
                network: Some(network("172.30.0.0/16")),
                infrastructure: Some(Infrastructure::new("cluster", Default::default())),
            },
            three_member_dns(),
            FakeEndpointsStore::with_object(host_endpoints(vec![])),
            FakeStatusStore::default(),
        );

        let err = h.reconciler.sync().await.unwrap_err();

        assert!(matches!(err, HostEndpointsError::ConfigMissing { .. }));
        assert!(err.to_string().contains("etcdDiscoveryDomain"));
    }

    #[tokio::test]
    async fn test_dns_failure_aborts_before_write() {
        let resolver = FakeResolver::etcd_cluster(DOMAIN, &["10.0.0.1", "10.0.0.2", "10.0.0.3"])
            .with_failure("etcd-1.example.com.");
        let h = harness(three_nodes(), resolver, host_endpoints(vec![]));

        let err = h.reconciler.sync().await.unwrap_err();

        assert!(matches!(err, HostEndpointsError::DnsResolutionFailure { .. }));
        assert_eq!(h.endpoints.writes(), 0);
    }

    #[tokio::test]
    async fn test_failed_reconcile_keeps_error_when_status_write_fails() {
        let h = harness_with(
            FakeTopology {
                nodes: vec![],
                network: Some(network("172.30.0.0/16")),
                infrastructure: Some(infrastructure(DOMAIN)),
            },
            three_member_dns(),
            FakeEndpointsStore::with_object(host_endpoints(vec![])),
            FakeStatusStore::failing(),
        );

        let err = h.reconciler.sync().await.unwrap_err();

        assert_eq!(err, HostEndpointsError::NoReadyMembers);
        assert_eq!(
            h.events.reasons(),
            vec![EVENT_ERROR_UPDATING_STATUS.to_string()]
        );
    }

    #[tokio::test]
    async fn test_successful_reconcile_returns_status_write_failure() {
        let h = harness_with(
            FakeTopology {
                nodes: three_nodes(),
                network: Some(network("172.30.0.0/16")),
                infrastructure: Some(infrastructure(DOMAIN)),
            },
            three_member_dns(),
            FakeEndpointsStore::with_object(host_endpoints(vec![])),
            FakeStatusStore::failing(),
        );

        let err = h.reconciler.sync().await.unwrap_err();

        assert!(matches!(err, HostEndpointsError::StatusWriteFailure { .. }));
        assert_eq!(h.endpoints.writes(), 1, "endpoints were still written");
        assert!(h
            .events
            .reasons()
            .contains(&EVENT_ERROR_UPDATING_STATUS.to_string()));
    }

    #[tokio::test]
    async fn test_recovery_clears_degraded_condition() {
        let h = harness(vec![], three_member_dns(), host_endpoints(vec![]));
        h.reconciler.sync().await.unwrap_err();
        assert_eq!(degraded(&h.status).0, "True");

        let recovered = harness_with(
            FakeTopology {
                nodes: three_nodes(),
                network: Some(network("172.30.0.0/16")),
                infrastructure: Some(infrastructure(DOMAIN)),
            },
            three_member_dns(),
            FakeEndpointsStore::with_object(host_endpoints(vec![])),
            FakeStatusStore::default(),
        );
        recovered.reconciler.sync().await.unwrap();

        assert_eq!(degraded(&recovered.status).0, "False");
    }

    #[tokio::test]
    async fn test_dns_is_queried_once_per_member_per_sync() {
        let resolver = Arc::new(three_member_dns());
        let endpoints = Arc::new(FakeEndpointsStore::with_object(host_endpoints(vec![])));
        let reconciler = HostEndpointsReconciler::new(
            Arc::new(FakeTopology {
                nodes: three_nodes(),
                network: Some(network("172.30.0.0/16")),
                infrastructure: Some(infrastructure(DOMAIN)),
            }),
            endpoints,
            Arc::new(FakeStatusStore::default()),
            Arc::new(RecordingEventSink::default()),
            resolver.clone(),
            NAMESPACE,
        );

        reconciler.sync().await.unwrap();
        reconciler.sync().await.unwrap();

        // No caching across reconciles
        assert_eq!(resolver.srv_queries.load(Ordering::SeqCst), 6);
    }
}
