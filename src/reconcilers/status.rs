// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and the reconcile outcome reporter.
//!
//! This module provides utility functions for creating and managing Kubernetes
//! status conditions following the standard conventions.
//!
//! # Condition Format
//!
//! Kubernetes conditions follow a standard format:
//! - `type`: The aspect of the resource being reported (e.g., `HostEndpointsDegraded`)
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed
//!
//! # Example
//!
//! ```rust,no_run
//! use etcd_host_endpoints::reconcilers::status::create_condition;
//!
//! let condition = create_condition(
//!     "HostEndpointsDegraded",
//!     "False",
//!     "HostEndpointsUpdated",
//!     ""
//! );
//! ```

use crate::crd::Condition;
use crate::errors::{HostEndpointsError, Result};
use crate::status_reasons::{
    degraded_status, CONDITION_HOST_ENDPOINTS_DEGRADED, EVENT_ERROR_UPDATING_STATUS,
    REASON_ERROR_UPDATING_HOST_ENDPOINTS, REASON_HOST_ENDPOINTS_UPDATED,
};
use crate::store::{EventSink, StatusStore};
use chrono::Utc;
use tracing::{debug, error};

/// Create a new Kubernetes condition with the current timestamp.
///
/// # Arguments
///
/// * `condition_type` - The type of condition (e.g., `HostEndpointsDegraded`)
/// * `status` - The status: "True", "False", or "Unknown"
/// * `reason` - A programmatic identifier in `CamelCase`
/// * `message` - A human-readable explanation
///
/// # Example
///
/// ```rust,no_run
/// # use etcd_host_endpoints::reconcilers::status::create_condition;
/// let condition = create_condition(
///     "HostEndpointsDegraded",
///     "True",
///     "ErrorUpdatingHostEndpoints",
///     "no etcd member nodes are ready"
/// );
/// assert_eq!(condition.status, "True");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// This function modifies the conditions list in-place by either updating an existing
/// condition or adding a new one. It preserves the `lastTransitionTime` if the status
/// hasn't changed, or sets a new timestamp if it has.
///
/// **Important:** This function does NOT make any Kubernetes API calls. Persist the
/// result through a [`StatusStore`].
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        // Preserve lastTransitionTime if status hasn't changed
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Upsert every condition of `updates` into a copy of `current`, matching by type.
///
/// Conditions of `current` whose type is not in `updates` are kept in place.
#[must_use]
pub fn merge_conditions(current: &[Condition], updates: &[Condition]) -> Vec<Condition> {
    let mut merged = current.to_vec();
    for update in updates {
        match merged.iter_mut().find(|c| c.r#type == update.r#type) {
            Some(existing) => *existing = update.clone(),
            None => merged.push(update.clone()),
        }
    }
    merged
}

/// Compare two condition lists to check if they are semantically equal.
///
/// This function ignores `lastTransitionTime` differences and only compares
/// the semantic content (type, status, reason, message).
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    for new_cond in new {
        match find_condition(current, &new_cond.r#type) {
            None => return false,
            Some(curr_cond) => {
                if curr_cond.status != new_cond.status
                    || curr_cond.reason != new_cond.reason
                    || curr_cond.message != new_cond.message
                {
                    return false;
                }
            }
        }
    }

    true
}

/// Write the `HostEndpointsDegraded` condition, skipping the write if nothing changed.
///
/// # Errors
///
/// Returns [`HostEndpointsError::StatusWriteFailure`] if the conditions cannot be read
/// or written.
pub async fn set_degraded_condition(
    status: &dyn StatusStore,
    degraded: bool,
    reason: &str,
    message: &str,
) -> Result<()> {
    let current = status
        .get_conditions()
        .await
        .map_err(|e| HostEndpointsError::StatusWriteFailure {
            reason: e.to_string(),
        })?;

    let mut updated = current.clone();
    update_condition_in_memory(
        &mut updated,
        CONDITION_HOST_ENDPOINTS_DEGRADED,
        degraded_status(degraded),
        reason,
        message,
    );

    if conditions_equal(&current, &updated) {
        debug!(
            condition = CONDITION_HOST_ENDPOINTS_DEGRADED,
            degraded = degraded,
            "Condition unchanged, skipping status update"
        );
        return Ok(());
    }

    let condition = find_condition(&updated, CONDITION_HOST_ENDPOINTS_DEGRADED)
        .cloned()
        .into_iter()
        .collect::<Vec<_>>();

    status
        .update_conditions(&condition)
        .await
        .map_err(|e| match e {
            HostEndpointsError::StatusWriteFailure { .. } => e,
            other => HostEndpointsError::StatusWriteFailure {
                reason: other.to_string(),
            },
        })
}

/// Translate a reconcile result into the degraded condition.
///
/// A failed reconcile is always returned unchanged, whether or not its condition could
/// be written. A successful reconcile whose condition cannot be written is returned as
/// [`HostEndpointsError::StatusWriteFailure`] so the key is retried.
///
/// # Errors
///
/// Returns the reconcile error, or the status write error on the success path.
pub async fn report_outcome(
    status: &dyn StatusStore,
    events: &dyn EventSink,
    result: Result<()>,
) -> Result<()> {
    match result {
        Err(err) => {
            let message = err.to_string();
            if let Err(update_err) =
                set_degraded_condition(status, true, REASON_ERROR_UPDATING_HOST_ENDPOINTS, &message)
                    .await
            {
                error!(error = %update_err, "Failed to record degraded condition");
                events
                    .warning(EVENT_ERROR_UPDATING_STATUS, &update_err.to_string())
                    .await;
            }
            Err(err)
        }
        Ok(()) => {
            if let Err(update_err) =
                set_degraded_condition(status, false, REASON_HOST_ENDPOINTS_UPDATED, "").await
            {
                error!(error = %update_err, "Failed to record healthy condition");
                events
                    .warning(EVENT_ERROR_UPDATING_STATUS, &update_err.to_string())
                    .await;
                return Err(update_err);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
