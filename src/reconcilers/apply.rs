// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Conditional create-or-update of the published endpoints.
//!
//! The current object is read, diffed against the desired one, and replaced only when
//! it differs. The replace carries the `resourceVersion` that was read, so a concurrent
//! writer makes it fail with a conflict instead of being overwritten. There is no retry
//! here; the work queue retries the whole reconcile.

use crate::errors::Result;
use crate::metrics;
use crate::reconcilers::diff::{merge_patch_diff, reconcile_needed};
use crate::status_reasons::{
    EVENT_ENDPOINTS_CREATED, EVENT_ENDPOINTS_CREATE_FAILED, EVENT_ENDPOINTS_UPDATED,
    EVENT_ENDPOINTS_UPDATE_FAILED,
};
use crate::store::{EndpointsStore, EventSink};
use k8s_openapi::api::core::v1::Endpoints;
use kube::ResourceExt;
use tracing::{debug, info};

/// Result of a successful apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The object was missing and has been created.
    Created,
    /// The object differed and has been replaced.
    Updated,
    /// The object already matched; nothing was written.
    Unchanged,
}

impl ApplyOutcome {
    /// Label used for metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Make the published object match `required`.
///
/// # Errors
///
/// Returns the store error if the read, create or replace fails. A replace rejected
/// because the object changed since it was read is returned as
/// [`crate::errors::HostEndpointsError::Conflict`].
pub async fn apply_endpoints(
    store: &dyn EndpointsStore,
    events: &dyn EventSink,
    required: &Endpoints,
) -> Result<ApplyOutcome> {
    let name = required.name_any();
    let namespace = required.namespace().unwrap_or_default();

    let Some(existing) = store.get(&name, &namespace).await? else {
        return match store.create(required).await {
            Ok(_) => {
                events
                    .warning(
                        EVENT_ENDPOINTS_CREATED,
                        &format!("Created endpoints/{name} -n {namespace} because it was missing"),
                    )
                    .await;
                metrics::record_endpoints_write(ApplyOutcome::Created.as_str());
                info!(name = %name, namespace = %namespace, "Created missing endpoints");
                Ok(ApplyOutcome::Created)
            }
            Err(e) => {
                events
                    .warning(
                        EVENT_ENDPOINTS_CREATE_FAILED,
                        &format!("Failed to create endpoints/{name} -n {namespace}: {e}"),
                    )
                    .await;
                Err(e)
            }
        };
    };

    let (to_write, modified) = reconcile_needed(&existing, required);
    if !modified {
        debug!(name = %name, namespace = %namespace, "Endpoints up to date");
        return Ok(ApplyOutcome::Unchanged);
    }

    let patch = merge_patch_diff(&existing, &to_write);
    debug!(name = %name, namespace = %namespace, changes = %patch, "Endpoints changes");

    match store.replace(&to_write).await {
        Ok(updated) => {
            match serde_yaml::to_string(&updated.subsets) {
                Ok(yaml) => {
                    info!(name = %name, namespace = %namespace, "Wrote endpoints subsets:\n{yaml}");
                }
                Err(e) => debug!(error = %e, "Failed to render subsets as YAML"),
            }
            events
                .normal(
                    EVENT_ENDPOINTS_UPDATED,
                    &format!("Updated endpoints/{name} -n {namespace} because it changed: {patch}"),
                )
                .await;
            metrics::record_endpoints_write(ApplyOutcome::Updated.as_str());
            Ok(ApplyOutcome::Updated)
        }
        Err(e) => {
            events
                .warning(
                    EVENT_ENDPOINTS_UPDATE_FAILED,
                    &format!("Failed to update endpoints/{name} -n {namespace}: {e}"),
                )
                .await;
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod apply_tests;
