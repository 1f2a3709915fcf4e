// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of the `host-etcd` endpoints.
//!
//! # Reconciliation Architecture
//!
//! The controller follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Node, network, infrastructure, endpoints and operator changes enqueue one key
//! 2. **Reconcile** - Build the desired endpoints from topology and DNS
//! 3. **Update** - Write the published object only when it differs
//! 4. **Status** - Report the outcome as the `HostEndpointsDegraded` condition
//!
//! # Modules
//!
//! - [`desired`] - Desired state from nodes, network config and DNS
//! - [`diff`] - Order-independent comparison and metadata merge
//! - [`apply`] - Create or replace the published object
//! - [`status`] - Degraded condition reporting
//! - [`retry`] - Backoff policies for requeues and write conflicts
//! - [`hostendpoints`] - The reconciler tying it all together

pub mod apply;
pub mod desired;
pub mod diff;
pub mod hostendpoints;
pub mod retry;
pub mod status;

pub use apply::ApplyOutcome;
pub use hostendpoints::HostEndpointsReconciler;
