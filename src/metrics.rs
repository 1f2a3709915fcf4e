// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the `host-etcd` endpoints controller.
//!
//! All metrics carry the namespace prefix `etcd_host_endpoints_`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Reconcile outcomes, durations and requeues
//! - **Endpoints Metrics** - Writes to the published object and its current size
//! - **Error Metrics** - Failures by error kind
//!
//! # Example
//!
//! ```rust,no_run
//! use etcd_host_endpoints::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success(std::time::Duration::from_millis(40));
//! ```

use crate::constants::METRICS_SERVER_PATH;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::net::SocketAddr;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all controller metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "etcd_host_endpoints";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by outcome
///
/// Labels:
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of host-etcd reconciliations by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of host-etcd reconciliations in seconds",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of rate limited requeues of the work item
pub static REQUEUE_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of rate limited requeues after a failed reconcile",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of items waiting in the work queue
pub static QUEUE_DEPTH: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_queue_depth"),
        "Number of work items waiting to be processed",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Endpoints Metrics
// ============================================================================

/// Total number of writes to the published endpoints object
///
/// Labels:
/// - `action`: `created` or `updated`
pub static ENDPOINTS_WRITES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_endpoints_writes_total"),
        "Total number of writes to the host-etcd endpoints by action",
    );
    let counter = CounterVec::new(opts, &["action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of addresses in the last successfully reconciled endpoints object
pub static PUBLISHED_ADDRESSES: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_published_addresses"),
        "Number of addresses published in host-etcd, bootstrap included",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of reconcile errors by kind
///
/// Labels:
/// - `error_type`: Stable error kind (e.g., `dns_resolution_failure`, `conflict`)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of reconcile errors by error kind",
    );
    let counter = CounterVec::new(opts, &["error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
pub fn record_reconciliation_success(duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&["success"]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&["success"])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
pub fn record_reconciliation_error(duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&["error"]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&["error"])
        .observe(duration.as_secs_f64());
}

/// Record a rate limited requeue of the work item
pub fn record_requeue() {
    REQUEUE_TOTAL.inc();
}

/// Record the current work queue depth
#[allow(clippy::cast_precision_loss)]
pub fn set_queue_depth(depth: usize) {
    QUEUE_DEPTH.set(depth as f64);
}

/// Record a write to the published endpoints
///
/// # Arguments
/// * `action` - `created` or `updated`
pub fn record_endpoints_write(action: &str) {
    ENDPOINTS_WRITES_TOTAL.with_label_values(&[action]).inc();
}

/// Record the number of published addresses
#[allow(clippy::cast_precision_loss)]
pub fn set_published_addresses(count: usize) {
    PUBLISHED_ADDRESSES.set(count as f64);
}

/// Record an error
///
/// # Arguments
/// * `error_type` - Stable error kind from [`crate::errors::HostEndpointsError::kind`]
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

// ============================================================================
// Metrics Server
// ============================================================================

async fn metrics_handler() -> Response {
    match gather_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Router exposing the registry on `/metrics`.
pub fn metrics_router() -> Router {
    Router::new().route(METRICS_SERVER_PATH, get(metrics_handler))
}

/// Serve `/metrics` on `addr` until `shutdown` flips to `true`.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, path = METRICS_SERVER_PATH, "Starting metrics server");

    axum::serve(listener, metrics_router())
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}
