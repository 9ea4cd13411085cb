// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Trigger mesh: one writer in front of the reconciler.
//!
//! Runtime events, file-discovery changes, the periodic safety-net tick, and
//! explicit triggers all funnel into one debouncer. After any input, a
//! reconcile is scheduled no earlier than the debounce window from now;
//! inputs arriving inside the window coalesce into that same pending run.
//! At most one reconcile runs at a time, and inputs that arrive during a run
//! collapse into exactly one follow-up. Bursts therefore cost at most
//! (current + 1) passes, which is also the system's back-pressure story:
//! there is no queue to grow.
//!
//! Shutdown cancels both the pending timer and the in-flight pass.

use crate::metrics;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Why a reconcile was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// First pass after startup
    Startup,
    /// Container runtime event (or post-reconnect resync)
    RuntimeEvent,
    /// A discovery-capable source's hostname set changed
    FileChange,
    /// Safety-net interval elapsed
    Periodic,
    /// A pending provider came up and needs a catch-up pass
    ProviderReady,
    /// Explicit on-demand request
    Manual,
}

impl Trigger {
    /// Metrics label for this trigger kind.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::RuntimeEvent => "runtime_event",
            Self::FileChange => "file_change",
            Self::Periodic => "periodic",
            Self::ProviderReady => "provider_ready",
            Self::Manual => "manual",
        }
    }
}

/// Cloneable input side of the trigger mesh.
#[derive(Clone)]
pub struct TriggerHandle {
    tx: mpsc::UnboundedSender<Trigger>,
}

impl TriggerHandle {
    /// Request a reconcile. Never blocks; harmless after shutdown.
    pub fn notify(&self, trigger: Trigger) {
        metrics::record_trigger(trigger.label());
        let _ = self.tx.send(trigger);
    }
}

/// Debouncing single-writer loop in front of the reconciler.
pub struct Debouncer {
    rx: mpsc::UnboundedReceiver<Trigger>,
    handle: TriggerHandle,
    debounce: Duration,
    interval: Option<Duration>,
}

impl Debouncer {
    /// Create a debouncer with the given window and optional safety-net
    /// interval (`None` disables the periodic tick).
    #[must_use]
    pub fn new(debounce: Duration, interval: Option<Duration>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            handle: TriggerHandle { tx },
            debounce,
            interval,
        }
    }

    /// A handle for feeding triggers in.
    #[must_use]
    pub fn handle(&self) -> TriggerHandle {
        self.handle.clone()
    }

    /// Run until shutdown, invoking `reconcile` once per coalesced batch of
    /// triggers.
    pub async fn run<F, Fut>(mut self, mut shutdown: watch::Receiver<bool>, mut reconcile: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut ticker = self.interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        let mut deadline: Option<Instant> = None;

        info!(
            debounce_ms = self.debounce.as_millis() as u64,
            interval_secs = self.interval.map_or(0, |i| i.as_secs()),
            "trigger debouncer running"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("debouncer stopping, pending run cancelled");
                    return;
                }
                received = self.rx.recv() => {
                    let Some(trigger) = received else { return };
                    if deadline.is_none() {
                        debug!(trigger = trigger.label(), "reconcile scheduled");
                        deadline = Some(Instant::now() + self.debounce);
                    } else {
                        debug!(trigger = trigger.label(), "coalesced into pending reconcile");
                    }
                }
                () = tick(&mut ticker) => {
                    if deadline.is_none() {
                        debug!("safety-net tick, reconcile scheduled");
                        metrics::record_trigger(Trigger::Periodic.label());
                        deadline = Some(Instant::now() + self.debounce);
                    }
                }
                () = wait(deadline) => {
                    deadline = None;
                    // Run the pass; shutdown cancels it mid-flight
                    tokio::select! {
                        _ = shutdown.changed() => {
                            debug!("shutdown during reconcile, dropping in-flight pass");
                            return;
                        }
                        () = reconcile() => {}
                    }
                    // Inputs that arrived during the run collapse into one
                    // follow-up
                    let mut follow_up = false;
                    while let Ok(trigger) = self.rx.try_recv() {
                        debug!(trigger = trigger.label(), "arrived during reconcile");
                        follow_up = true;
                    }
                    if follow_up {
                        debug!("scheduling single follow-up reconcile");
                        deadline = Some(Instant::now() + self.debounce);
                    }
                }
            }
        }
    }
}

/// Await the next safety-net tick, or forever when disabled.
async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Await the pending deadline, or forever when nothing is scheduled.
async fn wait(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod trigger_tests;
