// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use etcd_host_endpoints::constants::DEFAULT_TARGET_NAMESPACE;
use k8s_openapi::api::core::v1::{EndpointAddress, EndpointPort, EndpointSubset};
use kube::client::Client;

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Namespace holding `host-etcd`, overridable like the controller itself
pub fn target_namespace() -> String {
    std::env::var("TARGET_NAMESPACE").unwrap_or_else(|_| DEFAULT_TARGET_NAMESPACE.to_string())
}

/// Endpoint address without a node reference
pub fn address(ip: &str, hostname: &str) -> EndpointAddress {
    EndpointAddress {
        ip: ip.to_string(),
        hostname: Some(hostname.to_string()),
        ..EndpointAddress::default()
    }
}

/// Single subset carrying the etcd client port
pub fn subset(addresses: Vec<EndpointAddress>) -> EndpointSubset {
    EndpointSubset {
        addresses: Some(addresses),
        ports: Some(vec![EndpointPort {
            name: Some("etcd".to_string()),
            port: 2379,
            protocol: Some("TCP".to_string()),
            ..EndpointPort::default()
        }]),
        ..EndpointSubset::default()
    }
}
