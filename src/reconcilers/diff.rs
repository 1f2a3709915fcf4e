// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Semantic comparison of published and desired endpoints.
//!
//! Address order carries no meaning in `Endpoints`, so subsets are compared after
//! sorting their addresses by `(ip, hostname, nodeName)`. Metadata is merged
//! additively: only labels and annotations named by the desired object are touched.

use k8s_openapi::api::core::v1::{EndpointAddress, EndpointSubset, Endpoints};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Compute the object to write.
///
/// Starts from a copy of `existing` (keeping its `resourceVersion`), merges the
/// metadata of `required` into it and takes `required`'s subsets if they differ.
/// Returns the object together with whether anything changed.
#[must_use]
pub fn reconcile_needed(existing: &Endpoints, required: &Endpoints) -> (Endpoints, bool) {
    let mut to_write = existing.clone();
    let mut modified = ensure_object_meta(&mut to_write.metadata, &required.metadata);

    let existing_subsets = existing.subsets.as_deref().unwrap_or_default();
    let required_subsets = required.subsets.as_deref().unwrap_or_default();
    if !endpoint_subsets_equal(existing_subsets, required_subsets) {
        to_write.subsets = required.subsets.clone();
        modified = true;
    }

    (to_write, modified)
}

/// Merge `required` into `existing`. Returns whether `existing` changed.
///
/// Name and namespace are copied when set. Labels and annotations are merged key by
/// key; a required key ending in `-` removes the key without the suffix.
pub fn ensure_object_meta(existing: &mut ObjectMeta, required: &ObjectMeta) -> bool {
    let mut modified = false;

    modified |= set_string_if_set(&mut existing.namespace, required.namespace.as_ref());
    modified |= set_string_if_set(&mut existing.name, required.name.as_ref());
    modified |= merge_map(&mut existing.labels, required.labels.as_ref());
    modified |= merge_map(&mut existing.annotations, required.annotations.as_ref());

    modified
}

fn set_string_if_set(existing: &mut Option<String>, required: Option<&String>) -> bool {
    match required {
        Some(value) if !value.is_empty() && existing.as_ref() != Some(value) => {
            *existing = Some(value.clone());
            true
        }
        _ => false,
    }
}

fn merge_map(
    existing: &mut Option<BTreeMap<String, String>>,
    required: Option<&BTreeMap<String, String>>,
) -> bool {
    let Some(required) = required else {
        return false;
    };

    let mut modified = false;
    for (key, value) in required {
        if let Some(removal) = key.strip_suffix('-') {
            if let Some(map) = existing.as_mut() {
                modified |= map.remove(removal).is_some();
            }
            continue;
        }

        let map = existing.get_or_insert_with(BTreeMap::new);
        if map.get(key) != Some(value) {
            map.insert(key.clone(), value.clone());
            modified = true;
        }
    }

    modified
}

/// Whether two subset lists are equal, position by position.
#[must_use]
pub fn endpoint_subsets_equal(lhs: &[EndpointSubset], rhs: &[EndpointSubset]) -> bool {
    lhs.len() == rhs.len()
        && lhs
            .iter()
            .zip(rhs)
            .all(|(l, r)| endpoint_subset_equal(l, r))
}

/// Whether two subsets are equal, ignoring address order.
///
/// Address, not-ready-address and port counts must match, and the address lists must
/// be identical once sorted by `(ip, hostname, nodeName)`.
#[must_use]
pub fn endpoint_subset_equal(lhs: &EndpointSubset, rhs: &EndpointSubset) -> bool {
    if len(&lhs.addresses) != len(&rhs.addresses)
        || len(&lhs.not_ready_addresses) != len(&rhs.not_ready_addresses)
        || len(&lhs.ports) != len(&rhs.ports)
    {
        return false;
    }

    sorted_addresses(lhs) == sorted_addresses(rhs)
}

fn len<T>(items: &Option<Vec<T>>) -> usize {
    items.as_ref().map_or(0, Vec::len)
}

fn sorted_addresses(subset: &EndpointSubset) -> Vec<EndpointAddress> {
    let mut addresses = subset.addresses.clone().unwrap_or_default();
    addresses.sort_by(compare_addresses);
    addresses
}

fn compare_addresses(a: &EndpointAddress, b: &EndpointAddress) -> Ordering {
    a.ip.cmp(&b.ip)
        .then_with(|| a.hostname.cmp(&b.hostname))
        .then_with(|| a.node_name.cmp(&b.node_name))
}

/// JSON merge patch (RFC 7386) turning `existing` into `updated`.
///
/// Used to describe an update in events and logs. Serialization failures yield an
/// empty patch.
#[must_use]
pub fn merge_patch_diff(existing: &Endpoints, updated: &Endpoints) -> Value {
    let from = serde_json::to_value(existing).unwrap_or(Value::Null);
    let to = serde_json::to_value(updated).unwrap_or(Value::Null);
    diff_values(&from, &to).unwrap_or_else(|| Value::Object(Map::new()))
}

fn diff_values(from: &Value, to: &Value) -> Option<Value> {
    match (from, to) {
        (Value::Object(from), Value::Object(to)) => {
            let mut patch = Map::new();
            for (key, to_value) in to {
                match from.get(key) {
                    Some(from_value) => {
                        if let Some(child) = diff_values(from_value, to_value) {
                            patch.insert(key.clone(), child);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), to_value.clone());
                    }
                }
            }
            for key in from.keys() {
                if !to.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        (from, to) if from == to => None,
        (_, to) => Some(to.clone()),
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
