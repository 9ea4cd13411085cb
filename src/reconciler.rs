// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The reconcile control loop.
//!
//! One pass computes the desired hostname set from workload labels and
//! discovery sources, snapshots every ready provider's records, and issues
//! the creates, updates, and deletes that close the gap. Ownership markers
//! separate records this system manages from foreign ones; orphan cleanup
//! never deletes a record whose marker is absent (unless the instance runs
//! in `authoritative` mode, where the matcher is the ownership signal).
//!
//! Failure containment rules:
//! - a provider whose listing failed receives no destructive operations
//!   this pass (creates still proceed; they are idempotent);
//! - per-action failures are recorded and counted, the pass completes;
//! - orphans whose cleanup did not finish stay tracked so the next pass
//!   retries them.
//!
//! Startup calls [`Reconciler::recover_ownership`] to re-seed the tracked
//! hostname set from markers, so orphan detection survives restarts.

use crate::cache::RecordCache;
use crate::dns_errors::DnsError;
use crate::docker::WorkloadLister;
use crate::metrics;
use crate::ownership;
use crate::providers::manager::ProviderManager;
use crate::providers::{ProviderInstance, ProviderMode, Record};
use crate::sources::SourceRegistry;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Behavior switches for the control loop, from configuration.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Master switch; a disabled reconciler returns immediately
    pub enabled: bool,
    /// Log intended actions without mutating any backend
    pub dry_run: bool,
    /// Delete records for hostnames that disappeared
    pub cleanup_orphans: bool,
    /// Maintain and require ownership markers
    pub ownership_tracking: bool,
    /// Backfill markers on matching foreign records instead of skipping them
    pub adopt_existing: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            dry_run: false,
            cleanup_orphans: true,
            ownership_tracking: true,
            adopt_existing: false,
        }
    }
}

/// What a single action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Primary record created
    Create,
    /// Primary record replaced in place
    Update,
    /// Primary record deleted
    Delete,
    /// Ownership marker created
    MarkerCreate,
    /// Ownership marker deleted
    MarkerDelete,
    /// Nothing done, with a reason
    Skip,
}

impl ActionKind {
    /// Metrics label for this action.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::MarkerCreate => "marker_create",
            Self::MarkerDelete => "marker_delete",
            Self::Skip => "skip",
        }
    }
}

/// One action taken (or skipped) during a pass, with attribution.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    /// Provider instance name, empty for provider-less skips
    pub provider: String,
    /// Hostname the action concerned
    pub hostname: String,
    /// What was done
    pub action: ActionKind,
    /// Whether it succeeded
    pub success: bool,
    /// Skip reason or error text
    pub reason: Option<String>,
}

/// Per-run record of everything a pass did.
#[derive(Debug, Default)]
pub struct ReconcileSummary {
    /// Records and markers created
    pub created: usize,
    /// Records replaced in place
    pub updated: usize,
    /// Records and markers deleted
    pub deleted: usize,
    /// Actions skipped, with reasons in `actions`
    pub skipped: usize,
    /// Actions that failed
    pub failed: usize,
    /// Every individual action
    pub actions: Vec<ActionRecord>,
    /// Wall-clock duration of the pass
    pub duration: Duration,
}

impl ReconcileSummary {
    fn record(
        &mut self,
        provider: &str,
        hostname: &str,
        action: ActionKind,
        success: bool,
        reason: Option<String>,
    ) {
        if success {
            match action {
                ActionKind::Create | ActionKind::MarkerCreate => self.created += 1,
                ActionKind::Update => self.updated += 1,
                ActionKind::Delete | ActionKind::MarkerDelete => self.deleted += 1,
                ActionKind::Skip => self.skipped += 1,
            }
        } else {
            self.failed += 1;
        }
        metrics::record_action(provider, action.label(), success);
        self.actions.push(ActionRecord {
            provider: provider.to_string(),
            hostname: hostname.to_string(),
            action,
            success,
            reason,
        });
    }
}

/// The control loop and its tracked state.
pub struct Reconciler {
    runtime: Arc<dyn WorkloadLister>,
    sources: SourceRegistry,
    manager: Arc<ProviderManager>,
    options: ReconcileOptions,
    // Hostnames last reconciled successfully, for orphan detection.
    // std lock: accessors are sync and critical sections are short.
    known: RwLock<BTreeSet<String>>,
}

impl Reconciler {
    /// Wire up the control loop.
    #[must_use]
    pub fn new(
        runtime: Arc<dyn WorkloadLister>,
        sources: SourceRegistry,
        manager: Arc<ProviderManager>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            runtime,
            sources,
            manager,
            options,
            known: RwLock::new(BTreeSet::new()),
        }
    }

    /// Consistent snapshot of the tracked hostname set.
    #[must_use]
    pub fn known_hostnames(&self) -> Vec<String> {
        self.known
            .read()
            .expect("known set lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Re-seed the tracked set from ownership markers, so a restart still
    /// cleans up records created by a previous process.
    pub async fn recover_ownership(&self) {
        if !self.options.ownership_tracking {
            return;
        }
        let mut recovered = BTreeSet::new();
        for instance in self.manager.ready() {
            if !instance.adapter.capabilities().supports_ownership_txt {
                continue;
            }
            match instance.adapter.list().await {
                Ok(records) => {
                    for record in &records {
                        if let Some(hostname) = ownership::marked_hostname(record) {
                            recovered.insert(hostname);
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        provider = %instance.name,
                        error = %e,
                        "ownership recovery could not list provider"
                    );
                }
            }
        }

        if !recovered.is_empty() {
            info!(hostnames = recovered.len(), "ownership recovered from markers");
            self.known
                .write()
                .expect("known set lock poisoned")
                .extend(recovered);
        }
    }

    /// Run one reconcile pass.
    pub async fn reconcile(&self) -> ReconcileSummary {
        let started = Instant::now();
        let mut summary = ReconcileSummary::default();

        if !self.options.enabled {
            debug!("reconciler disabled, skipping pass");
            return summary;
        }

        // Desired state: workload labels plus discovery sources
        let workloads = match self.runtime.list().await {
            Ok(workloads) => workloads,
            Err(e) => {
                // An empty workload list from a dead runtime must not read
                // as "everything was removed"
                error!(error = %e, "workload listing failed, aborting pass");
                summary.failed += 1;
                summary.duration = started.elapsed();
                metrics::record_reconcile_run(summary.duration, false);
                return summary;
            }
        };

        let mut desired: BTreeSet<String> = BTreeSet::new();
        for workload in &workloads {
            let extracted = self.sources.extract_all(&workload.labels);
            if !extracted.is_empty() {
                debug!(
                    workload = %workload.name,
                    hostnames = extracted.len(),
                    "hostnames extracted from workload"
                );
            }
            desired.extend(extracted);
        }
        desired.extend(self.sources.discover_all().await);

        let instances = self.manager.ready();
        info!(
            workloads = workloads.len(),
            hostnames = desired.len(),
            providers = instances.len(),
            dry_run = self.options.dry_run,
            "reconcile pass starting"
        );

        // Actual state, one listing per provider
        let cache = RecordCache::build(&instances).await;

        // Converge every desired hostname on every matching provider
        for hostname in &desired {
            let mut matched = false;
            for instance in &instances {
                if !instance.matcher.matches(hostname) {
                    continue;
                }
                matched = true;
                self.apply_desired(hostname, instance, &cache, &mut summary).await;
            }
            if !matched {
                debug!(hostname, "no provider claims this hostname");
                summary.record(
                    "",
                    hostname,
                    ActionKind::Skip,
                    true,
                    Some("no_provider".to_string()),
                );
            }
        }

        // Orphan cleanup: previously tracked hostnames that disappeared
        let known_snapshot = self
            .known
            .read()
            .expect("known set lock poisoned")
            .clone();
        let mut unfinished: BTreeSet<String> = BTreeSet::new();
        if self.options.cleanup_orphans {
            for hostname in known_snapshot.difference(&desired) {
                if !self.cleanup_orphan(hostname, &instances, &cache, &mut summary).await {
                    unfinished.insert(hostname.clone());
                }
            }
            self.authoritative_sweep(&desired, &known_snapshot, &instances, &cache, &mut summary)
                .await;
        }

        // Track the new state; unfinished orphans stay so the next pass
        // retries their cleanup
        {
            let mut known = self.known.write().expect("known set lock poisoned");
            *known = desired;
            known.extend(unfinished);
        }

        summary.duration = started.elapsed();
        metrics::record_reconcile_run(summary.duration, summary.failed == 0);
        metrics::set_managed_hostnames(self.known.read().expect("known set lock poisoned").len());
        info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_ms = summary.duration.as_millis() as u64,
            "reconcile pass finished"
        );
        summary
    }

    /// Converge one (hostname, instance) pair toward the desired record.
    async fn apply_desired(
        &self,
        hostname: &str,
        instance: &Arc<ProviderInstance>,
        cache: &RecordCache,
        summary: &mut ReconcileSummary,
    ) {
        let desired = instance.desired_record(hostname);
        let caps = instance.adapter.capabilities();

        if cache.is_available(&instance.name) {
            let existing = cache.records_for(&instance.name, hostname, instance.record_type);

            if existing.iter().any(|r| **r == desired) {
                summary.record(
                    &instance.name,
                    hostname,
                    ActionKind::Skip,
                    true,
                    Some("already_exists".to_string()),
                );
                self.ensure_marker(hostname, instance, cache, summary, true).await;
                return;
            }

            if let Some(current) = existing.first() {
                if caps.supports_native_update {
                    match self.do_update(instance, current, &desired).await {
                        Ok(()) => {
                            summary.record(&instance.name, hostname, ActionKind::Update, true, None);
                            self.ensure_marker(hostname, instance, cache, summary, true).await;
                        }
                        Err(e) => {
                            error!(
                                provider = %instance.name,
                                hostname,
                                error = %e,
                                "record update failed"
                            );
                            summary.record(
                                &instance.name,
                                hostname,
                                ActionKind::Update,
                                false,
                                Some(e.to_string()),
                            );
                        }
                    }
                    return;
                }
                // No native update: fall through to create, whose conflict
                // is reclassified below
            }
        }

        match self.do_create(instance, &desired).await {
            Ok(()) => {
                summary.record(&instance.name, hostname, ActionKind::Create, true, None);
                self.ensure_marker(hostname, instance, cache, summary, true).await;
            }
            Err(DnsError::AlreadyExists { existing, .. }) => {
                // A record we did not create is already there; not an error
                debug!(
                    provider = %instance.name,
                    hostname,
                    existing,
                    "create conflict reclassified as already-exists"
                );
                summary.record(
                    &instance.name,
                    hostname,
                    ActionKind::Skip,
                    true,
                    Some("already_exists".to_string()),
                );
                self.ensure_marker(hostname, instance, cache, summary, false).await;
            }
            Err(e) => {
                error!(provider = %instance.name, hostname, error = %e, "record create failed");
                summary.record(
                    &instance.name,
                    hostname,
                    ActionKind::Create,
                    false,
                    Some(e.to_string()),
                );
            }
        }
    }

    /// Idempotently create the ownership marker for `hostname`.
    ///
    /// `owned_content` says the primary record's content is ours (created,
    /// updated, or byte-equal); a conflicting foreign record only gets a
    /// marker when adopt-existing is enabled. Marker failures are warnings,
    /// never fatal to the pass.
    async fn ensure_marker(
        &self,
        hostname: &str,
        instance: &Arc<ProviderInstance>,
        cache: &RecordCache,
        summary: &mut ReconcileSummary,
        owned_content: bool,
    ) {
        if !self.options.ownership_tracking {
            return;
        }
        if !instance.adapter.capabilities().supports_ownership_txt {
            return;
        }
        if !owned_content && !self.options.adopt_existing {
            return;
        }
        if cache.is_available(&instance.name) && cache.has_marker(&instance.name, hostname) {
            return;
        }

        let marker = ownership::marker_record(hostname);
        match self.do_create(instance, &marker).await {
            Ok(()) | Err(DnsError::AlreadyExists { .. }) => {
                summary.record(&instance.name, hostname, ActionKind::MarkerCreate, true, None);
            }
            Err(e) => {
                warn!(provider = %instance.name, hostname, error = %e, "marker create failed");
                summary.record(
                    &instance.name,
                    hostname,
                    ActionKind::MarkerCreate,
                    false,
                    Some(e.to_string()),
                );
            }
        }
    }

    /// Remove one orphaned hostname from every matching provider. Returns
    /// whether cleanup finished everywhere (skips count as finished).
    async fn cleanup_orphan(
        &self,
        hostname: &str,
        instances: &[Arc<ProviderInstance>],
        cache: &RecordCache,
        summary: &mut ReconcileSummary,
    ) -> bool {
        let mut finished = true;

        for instance in instances {
            if !instance.matcher.matches(hostname) {
                continue;
            }

            if instance.mode == ProviderMode::Additive {
                summary.record(
                    &instance.name,
                    hostname,
                    ActionKind::Skip,
                    true,
                    Some("additive_mode".to_string()),
                );
                continue;
            }

            if !cache.is_available(&instance.name) {
                // No destructive operations against a provider we could not
                // list; retry next pass
                summary.record(
                    &instance.name,
                    hostname,
                    ActionKind::Skip,
                    true,
                    Some("provider_unavailable".to_string()),
                );
                finished = false;
                continue;
            }

            let caps = instance.adapter.capabilities();
            let delete_marker = if self.options.ownership_tracking {
                if caps.supports_ownership_txt {
                    if !cache.has_marker(&instance.name, hostname) {
                        debug!(
                            provider = %instance.name,
                            hostname,
                            "record has no ownership marker, leaving it alone"
                        );
                        summary.record(
                            &instance.name,
                            hostname,
                            ActionKind::Skip,
                            true,
                            Some("no_ownership_record".to_string()),
                        );
                        continue;
                    }
                    true
                } else if instance.mode == ProviderMode::Authoritative {
                    // Matcher-as-ownership for backends that cannot store TXT
                    false
                } else {
                    summary.record(
                        &instance.name,
                        hostname,
                        ActionKind::Skip,
                        true,
                        Some("ownership_not_verifiable".to_string()),
                    );
                    continue;
                }
            } else {
                false
            };

            if !self
                .delete_primary(hostname, instance, cache, summary)
                .await
            {
                finished = false;
                continue;
            }

            if delete_marker {
                let marker = ownership::marker_record(hostname);
                match self.do_delete(instance, &marker).await {
                    Ok(()) => {
                        summary.record(&instance.name, hostname, ActionKind::MarkerDelete, true, None);
                    }
                    Err(e) => {
                        // Marker residue is harmless; retry next pass
                        warn!(provider = %instance.name, hostname, error = %e, "marker delete failed");
                        summary.record(
                            &instance.name,
                            hostname,
                            ActionKind::MarkerDelete,
                            false,
                            Some(e.to_string()),
                        );
                        finished = false;
                    }
                }
            }
        }

        finished
    }

    /// Delete the primary record(s) for `hostname` at one instance.
    async fn delete_primary(
        &self,
        hostname: &str,
        instance: &Arc<ProviderInstance>,
        cache: &RecordCache,
        summary: &mut ReconcileSummary,
    ) -> bool {
        let cached: Vec<Record> = cache
            .records_for(&instance.name, hostname, instance.record_type)
            .into_iter()
            .cloned()
            .collect();
        // Nothing cached still issues one shaped delete, covering records
        // that appeared after the listing
        let targets = if cached.is_empty() {
            vec![instance.desired_record(hostname)]
        } else {
            cached
        };

        let mut ok = true;
        for record in targets {
            match self.do_delete(instance, &record).await {
                Ok(()) => {
                    summary.record(&instance.name, hostname, ActionKind::Delete, true, None);
                }
                Err(e) => {
                    error!(provider = %instance.name, hostname, error = %e, "record delete failed");
                    summary.record(
                        &instance.name,
                        hostname,
                        ActionKind::Delete,
                        false,
                        Some(e.to_string()),
                    );
                    ok = false;
                }
            }
        }
        ok
    }

    /// Authoritative sweep: in `authoritative` mode the matcher is the
    /// ownership signal, so any matching record without a desired hostname
    /// goes away, marker or not.
    async fn authoritative_sweep(
        &self,
        desired: &BTreeSet<String>,
        known: &BTreeSet<String>,
        instances: &[Arc<ProviderInstance>],
        cache: &RecordCache,
        summary: &mut ReconcileSummary,
    ) {
        for instance in instances {
            if instance.mode != ProviderMode::Authoritative {
                continue;
            }
            if !cache.is_available(&instance.name) {
                continue;
            }

            for hostname in cache.hostnames_with_records(&instance.name, instance.record_type) {
                if desired.contains(&hostname) || !instance.matcher.matches(&hostname) {
                    continue;
                }
                // Tracked orphans were already handled with marker checks
                if known.contains(&hostname) {
                    continue;
                }
                info!(
                    provider = %instance.name,
                    hostname,
                    "authoritative sweep removing unmatched record"
                );
                self.delete_primary(&hostname, instance, cache, summary).await;
                if self.options.ownership_tracking
                    && instance.adapter.capabilities().supports_ownership_txt
                    && cache.has_marker(&instance.name, &hostname)
                {
                    let marker = ownership::marker_record(&hostname);
                    if let Err(e) = self.do_delete(instance, &marker).await {
                        warn!(provider = %instance.name, hostname, error = %e, "marker delete failed");
                    } else {
                        summary.record(&instance.name, &hostname, ActionKind::MarkerDelete, true, None);
                    }
                }
            }
        }
    }

    async fn do_create(
        &self,
        instance: &Arc<ProviderInstance>,
        record: &Record,
    ) -> Result<(), DnsError> {
        if self.options.dry_run {
            info!(provider = %instance.name, record = %record, "dry-run: would create");
            return Ok(());
        }
        instance.adapter.create(record).await
    }

    async fn do_delete(
        &self,
        instance: &Arc<ProviderInstance>,
        record: &Record,
    ) -> Result<(), DnsError> {
        if self.options.dry_run {
            info!(provider = %instance.name, record = %record, "dry-run: would delete");
            return Ok(());
        }
        instance.adapter.delete(record).await
    }

    async fn do_update(
        &self,
        instance: &Arc<ProviderInstance>,
        existing: &Record,
        desired: &Record,
    ) -> Result<(), DnsError> {
        if self.options.dry_run {
            info!(
                provider = %instance.name,
                from = %existing,
                to = %desired,
                "dry-run: would update"
            );
            return Ok(());
        }
        instance.adapter.update(existing, desired).await
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
