// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch fan-in and reconcile workers.
//!
//! Five reflectors feed the shared [`Stores`]; every event any of them sees adds the
//! same constant key to a [`WorkQueue`], so bursts of changes coalesce into at most one
//! pending reconcile. Workers drain the queue until shutdown.

use crate::config::Config;
use crate::constants::{
    CLUSTER_CONFIG_NAME, HOST_ETCD_ENDPOINTS_NAME, WORKER_RESTART_PERIOD_SECS, WORK_QUEUE_KEY,
};
use crate::context::{Context, Stores};
use crate::crd::{Etcd, Infrastructure, Network};
use crate::dns::SrvResolver;
use crate::metrics;
use crate::queue::WorkQueue;
use crate::reconcilers::HostEndpointsReconciler;
use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Endpoints, Node};
use kube::runtime::reflector::{self, store::Writer};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Run reflectors and workers until `shutdown` flips to `true`.
///
/// In-flight reconciles are allowed to finish; keys still queued are not processed.
///
/// # Errors
///
/// Returns an error if the reflector stores never become ready.
pub async fn run(
    client: Client,
    config: Config,
    resolver: Arc<dyn SrvResolver>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (etcds, etcds_writer) = reflector::store::<Etcd>();
    let (nodes, nodes_writer) = reflector::store::<Node>();
    let (infrastructures, infrastructures_writer) = reflector::store::<Infrastructure>();
    let (networks, networks_writer) = reflector::store::<Network>();
    let (endpoints, endpoints_writer) = reflector::store::<Endpoints>();

    let stores = Stores {
        etcds,
        nodes,
        infrastructures,
        networks,
        endpoints,
    };
    let queue = Arc::new(WorkQueue::new(config.max_backoff()));
    let by_cluster_name =
        watcher::Config::default().fields(&format!("metadata.name={CLUSTER_CONFIG_NAME}"));

    let reflectors = vec![
        spawn_reflector(
            Api::<Etcd>::all(client.clone()),
            by_cluster_name.clone(),
            etcds_writer,
            &queue,
            "Etcd",
        ),
        spawn_reflector(
            Api::<Endpoints>::namespaced(client.clone(), &config.namespace),
            watcher::Config::default()
                .fields(&format!("metadata.name={HOST_ETCD_ENDPOINTS_NAME}")),
            endpoints_writer,
            &queue,
            "Endpoints",
        ),
        spawn_reflector(
            Api::<Node>::all(client.clone()),
            watcher::Config::default(),
            nodes_writer,
            &queue,
            "Node",
        ),
        spawn_reflector(
            Api::<Infrastructure>::all(client.clone()),
            by_cluster_name.clone(),
            infrastructures_writer,
            &queue,
            "Infrastructure",
        ),
        spawn_reflector(
            Api::<Network>::all(client.clone()),
            by_cluster_name,
            networks_writer,
            &queue,
            "Network",
        ),
    ];

    info!("Waiting for reflector stores to sync");
    tokio::select! {
        ready = stores.wait_until_ready() => ready?,
        _ = shutdown.changed() => {
            info!("Shutdown requested before stores synced");
            abort_all(&reflectors);
            return Ok(());
        }
    }

    let ctx = Arc::new(Context::new(client, stores, config));
    let reconciler = ctx.reconciler(resolver);

    // Reconcile once at startup even if no watch event arrives
    queue.add(WORK_QUEUE_KEY);

    info!(
        workers = ctx.config.workers,
        namespace = %ctx.config.namespace,
        "Starting host-etcd workers"
    );
    let workers: Vec<JoinHandle<()>> = (0..ctx.config.workers)
        .map(|id| tokio::spawn(supervise_worker(id, Arc::clone(&queue), reconciler.clone())))
        .collect();

    // A dropped sender counts as shutdown
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }

    info!("Shutting down work queue");
    queue.shut_down();
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "Worker task ended abnormally");
        }
    }
    abort_all(&reflectors);
    info!("Controller stopped");

    Ok(())
}

fn abort_all(handles: &[JoinHandle<()>]) {
    for handle in handles {
        handle.abort();
    }
}

/// Watch `api` into `writer`, adding the work key on every touched object.
fn spawn_reflector<K>(
    api: Api<K>,
    config: watcher::Config,
    writer: Writer<K>,
    queue: &Arc<WorkQueue>,
    kind: &'static str,
) -> JoinHandle<()>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    let queue = Arc::clone(queue);
    tokio::spawn(async move {
        debug!(kind = kind, "Starting reflector");
        watcher(api, config)
            .default_backoff()
            .reflect(writer)
            .touched_objects()
            .for_each(|event| {
                match event {
                    Ok(_) => {
                        queue.add(WORK_QUEUE_KEY);
                        metrics::set_queue_depth(queue.len());
                    }
                    Err(e) => warn!(kind = kind, error = %e, "Watch error"),
                }
                futures::future::ready(())
            })
            .await;
        warn!(kind = kind, "Reflector stream ended");
    })
}

/// Keep worker `id` running, restarting it after a short pause if it panics.
async fn supervise_worker(id: usize, queue: Arc<WorkQueue>, reconciler: HostEndpointsReconciler) {
    loop {
        let handle = tokio::spawn(run_worker(Arc::clone(&queue), reconciler.clone()));
        match handle.await {
            Ok(()) => return,
            Err(e) => {
                error!(worker = id, error = %e, "Worker panicked");
                if queue.is_shutting_down() {
                    return;
                }
                tokio::time::sleep(Duration::from_secs(WORKER_RESTART_PERIOD_SECS)).await;
            }
        }
    }
}

async fn run_worker(queue: Arc<WorkQueue>, reconciler: HostEndpointsReconciler) {
    while process_next_work_item(&queue, &reconciler).await {}
}

/// Take one key from `queue` and reconcile it.
///
/// On success the key's backoff is reset; on failure the key is requeued with backoff.
/// Returns `false` once the queue is shut down.
pub async fn process_next_work_item(
    queue: &Arc<WorkQueue>,
    reconciler: &HostEndpointsReconciler,
) -> bool {
    let Some(key) = queue.get().await else {
        return false;
    };
    let _done = queue.done_on_drop(&key);
    metrics::set_queue_depth(queue.len());

    match reconciler.sync().await {
        Ok(()) => queue.forget(&key),
        Err(e) => {
            error!(
                key = %key,
                error = %e,
                requeues = queue.num_requeues(&key),
                "host-etcd reconcile failed, requeueing"
            );
            metrics::record_requeue();
            queue.add_rate_limited(&key);
        }
    }

    true
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
