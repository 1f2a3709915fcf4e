// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use etcd_host_endpoints::{
    config::{Config, LogFormat},
    constants::TOKIO_WORKER_THREADS,
    controller,
    dns::HickoryResolver,
    metrics,
};
use kube::Client;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("etcd-host-endpoints")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

/// Initialize logging.
///
/// Format: timestamp file:line LEVEL message. Respects `RUST_LOG`, defaulting to `info`.
fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: Config) -> Result<()> {
    init_tracing(config.log_format);

    info!(
        namespace = %config.namespace,
        workers = config.workers,
        max_backoff_secs = config.max_backoff_secs,
        "Starting host-etcd endpoints controller"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let resolver = Arc::new(HickoryResolver::from_system_conf()?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_addr = config.metrics_addr()?;
    let metrics_shutdown = shutdown_rx.clone();
    let metrics_server = tokio::spawn(async move {
        if let Err(e) = metrics::serve(metrics_addr, metrics_shutdown).await {
            error!(error = %e, "Metrics server failed");
        }
    });

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let result = controller::run(client, config, resolver, shutdown_rx).await;
    match &result {
        Ok(()) => {
            if let Err(e) = metrics_server.await {
                warn!(error = %e, "Metrics server task ended abnormally");
            }
        }
        Err(e) => {
            error!(error = %e, "Controller exited with error");
            // No shutdown signal will arrive, so stop the server directly
            metrics_server.abort();
        }
    }

    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => debug!("Received SIGTERM"),
                _ = tokio::signal::ctrl_c() => debug!("Received SIGINT"),
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, waiting for SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
