// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider lifecycle manager.
//!
//! Every configured instance starts in the pending set. [`ProviderManager::initialize`]
//! pings them all once without blocking startup on the result; failures stay
//! pending and are retried by [`ProviderManager::run_retry_loop`] with
//! exponential backoff (base 5s, capped at 5 minutes, with jitter). The
//! reconciler only ever sees the ready set, and readiness checks report a
//! degraded state while anything is pending.
//!
//! The ready/pending sets live behind a single mutex with short critical
//! sections; pings never run under the lock.

use crate::constants::{PROVIDER_RETRY_BASE_SECS, PROVIDER_RETRY_CAP_SECS};
use crate::providers::ProviderInstance;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct PendingEntry {
    instance: Arc<ProviderInstance>,
    attempts: u32,
    next_attempt: Instant,
}

#[derive(Default)]
struct ManagerState {
    ready: Vec<Arc<ProviderInstance>>,
    pending: Vec<PendingEntry>,
}

/// Tracks which provider instances are usable right now.
pub struct ProviderManager {
    state: Mutex<ManagerState>,
    retry_base: Duration,
    retry_cap: Duration,
}

impl ProviderManager {
    /// Create a manager over the configured instances; everything starts
    /// pending until the first ping.
    #[must_use]
    pub fn new(instances: Vec<ProviderInstance>) -> Self {
        Self::with_backoff(
            instances,
            Duration::from_secs(PROVIDER_RETRY_BASE_SECS),
            Duration::from_secs(PROVIDER_RETRY_CAP_SECS),
        )
    }

    /// Like [`ProviderManager::new`] with explicit backoff bounds.
    #[must_use]
    pub fn with_backoff(
        instances: Vec<ProviderInstance>,
        retry_base: Duration,
        retry_cap: Duration,
    ) -> Self {
        let now = Instant::now();
        let pending = instances
            .into_iter()
            .map(|instance| PendingEntry {
                instance: Arc::new(instance),
                attempts: 0,
                next_attempt: now,
            })
            .collect();
        Self {
            state: Mutex::new(ManagerState {
                ready: Vec::new(),
                pending,
            }),
            retry_base,
            retry_cap,
        }
    }

    /// Ping every pending instance once, promoting successes to ready.
    ///
    /// Called at startup; never fails, and never blocks on a provider being
    /// reachable beyond the ping timeout itself.
    pub async fn initialize(&self) {
        let due: Vec<Arc<ProviderInstance>> = {
            let state = self.state.lock().expect("manager lock poisoned");
            state.pending.iter().map(|e| e.instance.clone()).collect()
        };

        for instance in due {
            self.attempt(&instance).await;
        }

        let (ready, pending) = self.counts();
        info!(ready, pending, "provider manager initialized");
    }

    /// Instances that are currently usable.
    #[must_use]
    pub fn ready(&self) -> Vec<Arc<ProviderInstance>> {
        self.state
            .lock()
            .expect("manager lock poisoned")
            .ready
            .clone()
    }

    /// Names of instances still waiting to come up.
    #[must_use]
    pub fn pending_names(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("manager lock poisoned")
            .pending
            .iter()
            .map(|e| e.instance.name.clone())
            .collect()
    }

    /// Whether any instance is still pending.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self
            .state
            .lock()
            .expect("manager lock poisoned")
            .pending
            .is_empty()
    }

    /// (ready, pending) instance counts.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        let state = self.state.lock().expect("manager lock poisoned");
        (state.ready.len(), state.pending.len())
    }

    /// Background retry loop: pings pending instances as their backoff
    /// expires until shutdown. `on_ready` fires whenever an instance comes
    /// up, so the caller can schedule a catch-up reconcile.
    pub async fn run_retry_loop<F>(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
        on_ready: F,
    ) where
        F: Fn() + Send + Sync + 'static,
    {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("provider retry loop stopping");
                    return;
                }
                () = tokio::time::sleep(Duration::from_secs(1)) => {}
            }

            let now = Instant::now();
            let due: Vec<Arc<ProviderInstance>> = {
                let state = self.state.lock().expect("manager lock poisoned");
                state
                    .pending
                    .iter()
                    .filter(|e| e.next_attempt <= now)
                    .map(|e| e.instance.clone())
                    .collect()
            };

            for instance in due {
                if self.attempt(&instance).await {
                    on_ready();
                }
            }
        }
    }

    /// Ping one pending instance and move it between sets accordingly.
    /// Returns true when the instance just became ready.
    async fn attempt(&self, instance: &Arc<ProviderInstance>) -> bool {
        let result = instance.adapter.ping().await;

        let mut state = self.state.lock().expect("manager lock poisoned");
        let Some(position) = state
            .pending
            .iter()
            .position(|e| e.instance.name == instance.name)
        else {
            return false;
        };

        match result {
            Ok(()) => {
                let entry = state.pending.remove(position);
                info!(provider = %instance.name, "provider is ready");
                state.ready.push(entry.instance);
                true
            }
            Err(e) => {
                let entry = &mut state.pending[position];
                entry.attempts += 1;
                let delay = self.backoff(entry.attempts);
                entry.next_attempt = Instant::now() + delay;
                warn!(
                    provider = %instance.name,
                    attempts = entry.attempts,
                    retry_in_secs = delay.as_secs(),
                    error = %e,
                    "provider ping failed, will retry"
                );
                false
            }
        }
    }

    /// Exponential backoff with jitter: base * 2^(attempts-1), capped.
    fn backoff(&self, attempts: u32) -> Duration {
        let exp = attempts.saturating_sub(1).min(16);
        let raw = self.retry_base.saturating_mul(2u32.saturating_pow(exp));
        let capped = raw.min(self.retry_cap);
        // Up to 20% jitter keeps a fleet of instances from thundering
        let jitter = capped.mul_f64(0.2 * rand::random::<f64>());
        capped + jitter
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod manager_tests;
