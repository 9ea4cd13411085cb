// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the trigger debouncer.

use crate::trigger::{Debouncer, Trigger};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct Harness {
    runs: Arc<AtomicUsize>,
    shutdown_tx: watch::Sender<bool>,
    handle: crate::trigger::TriggerHandle,
    task: tokio::task::JoinHandle<()>,
}

fn start(debounce: Duration, interval: Option<Duration>, run_delay: Duration) -> Harness {
    let debouncer = Debouncer::new(debounce, interval);
    let handle = debouncer.handle();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(debouncer.run(shutdown_rx, move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(run_delay).await;
        }
    }));

    Harness {
        runs,
        shutdown_tx,
        handle,
        task,
    }
}

impl Harness {
    async fn stop(self) -> usize {
        self.shutdown_tx.send(true).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.task).await;
        self.runs.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_single_trigger_runs_once_after_debounce() {
    let h = start(Duration::from_millis(30), None, Duration::ZERO);
    h.handle.notify(Trigger::Manual);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.runs.load(Ordering::SeqCst), 0, "ran before the window closed");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.stop().await, 1);
}

#[tokio::test]
async fn test_burst_coalesces_into_one_run() {
    let h = start(Duration::from_millis(50), None, Duration::ZERO);
    for _ in 0..25 {
        h.handle.notify(Trigger::RuntimeEvent);
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.stop().await, 1);
}

#[tokio::test]
async fn test_triggers_during_run_queue_exactly_one_follow_up() {
    // Reconcile takes 100ms; fire several triggers while it runs
    let h = start(Duration::from_millis(10), None, Duration::from_millis(100));
    h.handle.notify(Trigger::Manual);
    tokio::time::sleep(Duration::from_millis(40)).await; // run is in flight

    for _ in 0..10 {
        h.handle.notify(Trigger::RuntimeEvent);
    }

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.stop().await, 2, "storm during a run must cost one follow-up");
}

#[tokio::test]
async fn test_separate_windows_run_separately() {
    let h = start(Duration::from_millis(20), None, Duration::ZERO);
    h.handle.notify(Trigger::Manual);
    tokio::time::sleep(Duration::from_millis(150)).await;
    h.handle.notify(Trigger::Manual);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(h.stop().await, 2);
}

#[tokio::test]
async fn test_periodic_tick_schedules_runs() {
    let h = start(
        Duration::from_millis(10),
        Some(Duration::from_millis(80)),
        Duration::ZERO,
    );

    tokio::time::sleep(Duration::from_millis(300)).await;
    let runs = h.stop().await;
    assert!(runs >= 2, "expected periodic runs, got {runs}");
}

#[tokio::test]
async fn test_shutdown_cancels_pending_run() {
    let h = start(Duration::from_millis(200), None, Duration::ZERO);
    h.handle.notify(Trigger::Manual);
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Shut down inside the debounce window: the pending run must not fire
    assert_eq!(h.stop().await, 0);
}

#[tokio::test]
async fn test_notify_after_shutdown_is_harmless() {
    let h = start(Duration::from_millis(10), None, Duration::ZERO);
    let handle = h.handle.clone();
    h.stop().await;
    handle.notify(Trigger::Manual);
}
