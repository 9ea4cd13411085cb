// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the dnsweaver daemon.
//!
//! This module provides metrics collection with the namespace prefix
//! `dnsweaver_`.
//!
//! # Metrics Categories
//!
//! - **Reconcile Metrics** - Track reconcile passes and their outcomes
//! - **Action Metrics** - Track per-provider record mutations and skips
//! - **Trigger Metrics** - Track what causes reconcile passes
//! - **Provider Metrics** - Track ready/pending provider counts
//!
//! # Example
//!
//! ```rust,no_run
//! use dnsweaver::metrics::{gather_metrics, record_trigger};
//!
//! record_trigger("runtime_event");
//! let exposition = gather_metrics().unwrap();
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all dnsweaver metrics
const METRICS_NAMESPACE: &str = "dnsweaver";

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via the
/// `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of reconcile passes by outcome
///
/// Labels:
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconcile_passes_total"),
        "Total number of reconcile passes by outcome",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconcile passes in seconds
pub static RECONCILE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconcile_duration_seconds"),
        "Duration of reconcile passes in seconds",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &[]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of record actions by provider, action, and outcome
///
/// Labels:
/// - `provider`: Provider instance name
/// - `action`: One of `create`, `update`, `delete`, `marker_create`,
///   `marker_delete`, `skip`
/// - `status`: `success` or `error`
pub static ACTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_actions_total"),
        "Total number of record actions by provider, action, and outcome",
    );
    let counter = CounterVec::new(opts, &["provider", "action", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of reconcile triggers by kind
///
/// Labels:
/// - `kind`: `startup`, `runtime_event`, `file_change`, `periodic`,
///   `provider_ready`, `manual`
pub static TRIGGERS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_triggers_total"),
        "Total number of reconcile triggers by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of provider instances currently ready
pub static PROVIDERS_READY: LazyLock<Gauge> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_providers_ready"),
        "Number of provider instances currently ready",
    );
    let gauge = Gauge::with_opts(opts).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Number of provider instances still pending
pub static PROVIDERS_PENDING: LazyLock<Gauge> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_providers_pending"),
        "Number of provider instances still pending",
    );
    let gauge = Gauge::with_opts(opts).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Number of hostnames currently tracked as managed
pub static MANAGED_HOSTNAMES: LazyLock<Gauge> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_managed_hostnames"),
        "Number of hostnames currently tracked as managed",
    );
    let gauge = Gauge::with_opts(opts).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a completed reconcile pass
pub fn record_reconcile_run(duration: Duration, success: bool) {
    let status = if success { "success" } else { "error" };
    RECONCILE_TOTAL.with_label_values(&[status]).inc();
    RECONCILE_DURATION_SECONDS
        .with_label_values(&[])
        .observe(duration.as_secs_f64());
}

/// Record one record action
pub fn record_action(provider: &str, action: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    ACTIONS_TOTAL
        .with_label_values(&[provider, action, status])
        .inc();
}

/// Record a reconcile trigger
pub fn record_trigger(kind: &str) {
    TRIGGERS_TOTAL.with_label_values(&[kind]).inc();
}

/// Update the provider ready/pending gauges
pub fn set_provider_counts(ready: usize, pending: usize) {
    #[allow(clippy::cast_precision_loss)]
    {
        PROVIDERS_READY.set(ready as f64);
        PROVIDERS_PENDING.set(pending as f64);
    }
}

/// Update the managed hostname gauge
pub fn set_managed_hostnames(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    MANAGED_HOSTNAMES.set(count as f64);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
///
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
