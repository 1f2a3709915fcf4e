// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label and annotation keys read or written by the controller.

// ============================================================================
// Node Role Labels
// ============================================================================

/// Label carried by control-plane nodes that run an etcd member
pub const NODE_ROLE_MASTER_LABEL: &str = "node-role.kubernetes.io/master";

// ============================================================================
// Published Endpoints Annotations
// ============================================================================

/// Annotation recording the etcd discovery domain on the published `Endpoints`
pub const DNS_SUFFIX_ANNOTATION: &str = "alpha.installer.openshift.io/dns-suffix";
