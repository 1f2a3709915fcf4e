// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # etcd-host-endpoints - host-etcd Endpoints controller
//!
//! Keeps the `host-etcd` Endpoints object in the etcd namespace in step with the live
//! etcd membership. Consumers that cannot reach etcd through normal service discovery
//! read this object instead.
//!
//! ## Overview
//!
//! Membership is derived from node topology plus DNS identity resolution:
//!
//! - Member nodes are the nodes carrying the master role label
//! - Each node's preferred `InternalIP` is matched against the targets of the
//!   `_etcd-server-ssl._tcp.<discovery domain>` SRV records to find its member hostname
//! - The entry of the temporary bootstrap member, if published, is carried over
//!
//! The result is compared with the published object independent of ordering and only
//! written when it differs. Every reconcile outcome is reported as the
//! `HostEndpointsDegraded` condition on the `Etcd` operator object.
//!
//! ## Modules
//!
//! - [`reconcilers`] - Desired state, diff, apply and status reporting
//! - [`dns`] - SRV based member identity resolution
//! - [`store`] - Collaborator traits and their Kubernetes implementations
//! - [`context`] - Shared reflector stores
//! - [`controller`] - Watch fan-in and workers
//! - [`queue`] - Coalescing, rate-limited work queue
//! - [`crd`] - Cluster config and operator resource types
//! - [`metrics`] - Prometheus metrics and the `/metrics` server

pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod dns;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod queue;
pub mod reconcilers;
pub mod status_reasons;
pub mod store;

#[cfg(test)]
pub mod testing;
