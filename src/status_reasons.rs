// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition types, condition reasons and event reasons.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a condition has
//! a particular status, or why an event was emitted.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: HostEndpointsDegraded
//!       status: "True"
//!       reason: ErrorUpdatingHostEndpoints
//!       message: "no etcd member nodes are ready"
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Condition reported on the operator object for this controller.
pub const CONDITION_HOST_ENDPOINTS_DEGRADED: &str = "HostEndpointsDegraded";

/// Condition status value `True`
pub const CONDITION_STATUS_TRUE: &str = "True";

/// Condition status value `False`
pub const CONDITION_STATUS_FALSE: &str = "False";

// ============================================================================
// Condition Reasons
// ============================================================================

/// The published endpoints match the cluster membership.
pub const REASON_HOST_ENDPOINTS_UPDATED: &str = "HostEndpointsUpdated";

/// The last reconcile failed; the message carries the error text.
pub const REASON_ERROR_UPDATING_HOST_ENDPOINTS: &str = "ErrorUpdatingHostEndpoints";

// ============================================================================
// Event Reasons
// ============================================================================

/// The published endpoints were missing and have been created.
pub const EVENT_ENDPOINTS_CREATED: &str = "EndpointsCreated";

/// Creating the missing endpoints failed.
pub const EVENT_ENDPOINTS_CREATE_FAILED: &str = "EndpointsCreateFailed";

/// The published endpoints changed and have been replaced.
pub const EVENT_ENDPOINTS_UPDATED: &str = "EndpointsUpdated";

/// Replacing the published endpoints failed.
pub const EVENT_ENDPOINTS_UPDATE_FAILED: &str = "EndpointsUpdateFailed";

/// Writing the degraded/healthy condition failed.
pub const EVENT_ERROR_UPDATING_STATUS: &str = "HostEndpointsErrorUpdatingStatus";

/// Returns the condition status string for a boolean degraded flag.
#[must_use]
pub fn degraded_status(degraded: bool) -> &'static str {
    if degraded {
        CONDITION_STATUS_TRUE
    } else {
        CONDITION_STATUS_FALSE
    }
}

#[cfg(test)]
#[path = "status_reasons_tests.rs"]
mod status_reasons_tests;
