// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Poller for discovery-capable hostname sources.
//!
//! Every interval, each discovery source is enumerated and a SHA-256
//! signature of its sorted hostname set is compared with the previous poll.
//! A changed signature fires the callback (which feeds the trigger mesh).
//! The first observation of a source only records its signature, since
//! startup already schedules a full pass.
//!
//! `start` and `stop` are safe to call repeatedly and in any order.

use crate::sources::HostnameSource;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

type Signature = [u8; 32];

/// Periodic poller over discovery sources.
pub struct FileWatcher {
    sources: Vec<Arc<dyn HostnameSource>>,
    interval: Duration,
    on_change: Arc<dyn Fn() + Send + Sync>,
    signatures: Mutex<HashMap<&'static str, Signature>>,
    task: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl FileWatcher {
    /// Create a watcher over `sources`, firing `on_change` when any
    /// source's hostname set changes.
    #[must_use]
    pub fn new(
        sources: Vec<Arc<dyn HostnameSource>>,
        interval: Duration,
        on_change: Arc<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self {
            sources,
            interval,
            on_change,
            signatures: Mutex::new(HashMap::new()),
            task: Mutex::new(None),
        }
    }

    /// Poll every source once, synchronously. Returns whether any source
    /// changed (and fires the callback if so).
    pub async fn poll_now(&self) -> bool {
        let mut changed = false;
        for source in &self.sources {
            let mut hostnames = source.discover().await;
            hostnames.sort();
            hostnames.dedup();
            let signature = signature_of(&hostnames);

            let mut signatures = self.signatures.lock().await;
            match signatures.insert(source.name(), signature) {
                Some(previous) if previous != signature => {
                    debug!(source = source.name(), count = hostnames.len(), "discovered hostname set changed");
                    changed = true;
                }
                Some(_) => {}
                None => {
                    debug!(source = source.name(), count = hostnames.len(), "initial hostname set recorded");
                }
            }
        }

        if changed {
            (self.on_change)();
        }
        changed
    }

    /// Spawn the polling loop. A second call while running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let watcher = self.clone();
        let handle = tokio::spawn(async move {
            info!(
                interval_secs = watcher.interval.as_secs(),
                sources = watcher.sources.len(),
                "file watcher running"
            );
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("file watcher stopping");
                        return;
                    }
                    () = tokio::time::sleep(watcher.interval) => {
                        watcher.poll_now().await;
                    }
                }
            }
        });
        *task = Some((shutdown_tx, handle));
    }

    /// Stop the polling loop and wait for it to exit. A no-op when not
    /// running.
    pub async fn stop(&self) {
        let stopped = self.task.lock().await.take();
        if let Some((shutdown_tx, handle)) = stopped {
            let _ = shutdown_tx.send(true);
            let _ = handle.await;
        }
    }
}

fn signature_of(hostnames: &[String]) -> Signature {
    let mut hasher = Sha256::new();
    for hostname in hostnames {
        hasher.update(hostname.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().into()
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod watcher_tests;
