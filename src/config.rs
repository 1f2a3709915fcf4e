// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command line and environment configuration.
//!
//! Every flag has an environment variable fallback so the controller can be configured
//! from a Deployment manifest alone.

use crate::constants::{
    DEFAULT_QUEUE_MAX_DELAY_SECS, DEFAULT_TARGET_NAMESPACE, DEFAULT_WORKERS,
    METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PORT,
};
use anyhow::{bail, Context as _, Result};
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Controller configuration.
#[derive(Clone, Debug, Parser)]
#[command(name = "etcd-host-endpoints")]
#[command(version)]
#[command(about = "Publishes the host-etcd Endpoints from node topology and etcd SRV records")]
pub struct Config {
    /// Namespace holding the published `host-etcd` Endpoints
    #[arg(long, env = "TARGET_NAMESPACE", default_value = DEFAULT_TARGET_NAMESPACE)]
    pub namespace: String,

    /// Number of reconcile workers
    #[arg(long, env = "WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Ceiling of the per-item requeue backoff, in seconds
    #[arg(long, env = "MAX_BACKOFF_SECS", default_value_t = DEFAULT_QUEUE_MAX_DELAY_SECS)]
    pub max_backoff_secs: u64,

    /// Port of the Prometheus metrics server
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,

    /// Bind address of the Prometheus metrics server
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    pub metrics_bind_address: String,

    /// Log output format
    #[arg(long, env = "RUST_LOG_FORMAT", value_enum, ignore_case = true, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    /// Per-item backoff ceiling.
    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    /// Socket address of the metrics server.
    ///
    /// # Errors
    ///
    /// Returns an error if `metrics_bind_address` is not an IP address.
    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .metrics_bind_address
            .parse()
            .with_context(|| format!("invalid metrics bind address {}", self.metrics_bind_address))?;
        Ok(SocketAddr::new(ip, self.metrics_port))
    }

    /// Reject configurations the controller cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty namespace, zero workers or a zero backoff ceiling.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            bail!("namespace must not be empty");
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.max_backoff_secs == 0 {
            bail!("max-backoff-secs must be at least 1");
        }
        self.metrics_addr()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
