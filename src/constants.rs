// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the host-etcd endpoints controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Published Endpoints Constants
// ============================================================================

/// Name of the published `Endpoints` object
pub const HOST_ETCD_ENDPOINTS_NAME: &str = "host-etcd";

/// Default namespace the etcd operands (and the published `Endpoints`) live in
pub const DEFAULT_TARGET_NAMESPACE: &str = "openshift-etcd";

/// Name of the single port carried by the published `Endpoints`
pub const ETCD_PORT_NAME: &str = "etcd";

/// etcd client port
pub const ETCD_CLIENT_PORT: i32 = 2379;

/// Protocol of the published port
pub const ETCD_PORT_PROTOCOL: &str = "TCP";

/// Hostname carried by the temporary bootstrap member entry
pub const ETCD_BOOTSTRAP_HOSTNAME: &str = "etcd-bootstrap";

// ============================================================================
// Cluster Configuration Constants
// ============================================================================

/// Name of the cluster-wide singleton config objects (`Network`, `Infrastructure`, `Etcd`)
pub const CLUSTER_CONFIG_NAME: &str = "cluster";

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// SRV service name under which etcd members advertise themselves
pub const ETCD_SRV_SERVICE: &str = "etcd-server-ssl";

/// SRV protocol label for etcd member records
pub const ETCD_SRV_PROTO: &str = "tcp";

// ============================================================================
// Work Queue Constants
// ============================================================================

/// The single key every watch event enqueues
pub const WORK_QUEUE_KEY: &str = "key";

/// Per-item backoff base delay (5 milliseconds)
pub const QUEUE_BASE_DELAY_MILLIS: u64 = 5;

/// Default per-item backoff ceiling (1000 seconds)
pub const DEFAULT_QUEUE_MAX_DELAY_SECS: u64 = 1000;

/// Per-item backoff multiplier
pub const QUEUE_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor applied to requeue delays (±10%)
pub const QUEUE_RANDOMIZATION_FACTOR: f64 = 0.1;

/// Delay before a worker loop is restarted after it exits
pub const WORKER_RESTART_PERIOD_SECS: u64 = 1;

/// Default number of reconcile workers
pub const DEFAULT_WORKERS: usize = 1;

// ============================================================================
// Event Recording Constants
// ============================================================================

/// Reporting controller name for Kubernetes events
pub const EVENT_REPORTER: &str = "host-etcd-endpoints-controller";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
