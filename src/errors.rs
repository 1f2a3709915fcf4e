// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the host-etcd endpoints reconcile.
//!
//! Every variant is recoverable by retry: reconciliation is idempotent and is
//! re-triggered both by watch events and by the work queue's backoff. The
//! [`HostEndpointsError::kind`] label is stable and used for metrics.

use thiserror::Error;

/// Errors that can abort a single reconcile attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostEndpointsError {
    /// The infrastructure config does not carry an etcd discovery domain.
    #[error("infrastructures.config.openshift.io/{name} missing .status.etcdDiscoveryDomain")]
    ConfigMissing {
        /// Name of the infrastructure config object
        name: String,
    },

    /// A member node has no internal address of the preferred IP family.
    #[error("unable to determine internal ip address for node {node}: {reason}")]
    TopologyIncomplete {
        /// Node name
        node: String,
        /// Why no address could be selected
        reason: String,
    },

    /// An SRV query or a forward lookup of an SRV target failed.
    #[error("could not resolve {query}: {reason}")]
    DnsResolutionFailure {
        /// The DNS name that was being resolved
        query: String,
        /// Resolver error text
        reason: String,
    },

    /// No SRV target resolves to the node's IP.
    #[error("could not find self: no target of {query} resolves to {ip}")]
    SelfNotFound {
        /// The SRV name that was queried
        query: String,
        /// The node IP being matched
        ip: String,
    },

    /// The computed address set is empty.
    #[error("no etcd member nodes are ready")]
    NoReadyMembers,

    /// The published object does not exist yet; it is created out-of-band during bootstrap.
    #[error("endpoints/{name} -n {namespace} does not exist")]
    PreconditionNotFound {
        /// Object name
        name: String,
        /// Object namespace
        namespace: String,
    },

    /// Reading a backing store failed.
    #[error("failed to read {resource}: {reason}")]
    StoreReadFailure {
        /// Resource description (e.g. `endpoints/host-etcd -n openshift-etcd`)
        resource: String,
        /// Underlying error text
        reason: String,
    },

    /// Creating or replacing the published object failed.
    #[error("failed to write {resource}: {reason}")]
    StoreWriteFailure {
        /// Resource description
        resource: String,
        /// Underlying error text
        reason: String,
    },

    /// The object changed between read and write (HTTP 409).
    #[error("conflict writing {resource}: {reason}")]
    Conflict {
        /// Resource description
        resource: String,
        /// Underlying error text
        reason: String,
    },

    /// Writing the degraded/healthy condition failed.
    #[error("failed to update operator status: {reason}")]
    StatusWriteFailure {
        /// Underlying error text
        reason: String,
    },
}

impl HostEndpointsError {
    /// Stable snake_case label for metrics and structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigMissing { .. } => "config_missing",
            Self::TopologyIncomplete { .. } => "topology_incomplete",
            Self::DnsResolutionFailure { .. } => "dns_resolution_failure",
            Self::SelfNotFound { .. } => "self_not_found",
            Self::NoReadyMembers => "no_ready_members",
            Self::PreconditionNotFound { .. } => "precondition_not_found",
            Self::StoreReadFailure { .. } => "store_read_failure",
            Self::StoreWriteFailure { .. } => "store_write_failure",
            Self::Conflict { .. } => "conflict",
            Self::StatusWriteFailure { .. } => "status_write_failure",
        }
    }

    /// Whether the error was raised before anything was written.
    #[must_use]
    pub fn is_build_stage(&self) -> bool {
        matches!(
            self,
            Self::ConfigMissing { .. }
                | Self::TopologyIncomplete { .. }
                | Self::DnsResolutionFailure { .. }
                | Self::SelfNotFound { .. }
                | Self::NoReadyMembers
                | Self::PreconditionNotFound { .. }
                | Self::StoreReadFailure { .. }
        )
    }

    /// Map a Kubernetes read error.
    #[must_use]
    pub fn from_kube_read(resource: &str, err: &kube::Error) -> Self {
        Self::StoreReadFailure {
            resource: resource.to_string(),
            reason: err.to_string(),
        }
    }

    /// Map a Kubernetes write error. HTTP 409 becomes [`HostEndpointsError::Conflict`].
    #[must_use]
    pub fn from_kube_write(resource: &str, err: &kube::Error) -> Self {
        if is_conflict(err) {
            Self::Conflict {
                resource: resource.to_string(),
                reason: err.to_string(),
            }
        } else {
            Self::StoreWriteFailure {
                resource: resource.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// Whether a Kubernetes error is an HTTP 404.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(api_err) if api_err.code == 404)
}

/// Whether a Kubernetes error is an HTTP 409.
#[must_use]
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(api_err) if api_err.code == 409)
}

/// Result alias for reconcile operations.
pub type Result<T, E = HostEndpointsError> = std::result::Result<T, E>;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
