// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-pass record cache.
//!
//! Built once at the start of every reconcile pass by listing each ready
//! provider. A provider whose `list` fails is flagged unavailable for the
//! whole pass: the reconciler suppresses destructive operations against it,
//! so a transient outage can never look like "everything was removed" and
//! trigger mass deletion.

use crate::ownership;
use crate::providers::{ProviderInstance, Record, RecordType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One provider's listing, indexed by hostname.
#[derive(Debug, Default)]
struct ProviderRecords {
    available: bool,
    by_hostname: HashMap<String, Vec<Record>>,
}

/// Snapshot of every ready provider's records for one reconcile pass.
#[derive(Debug, Default)]
pub struct RecordCache {
    providers: HashMap<String, ProviderRecords>,
}

impl RecordCache {
    /// List every instance and index the results.
    ///
    /// Failures are absorbed into the per-provider unavailable flag; this
    /// never errors.
    pub async fn build(instances: &[Arc<ProviderInstance>]) -> Self {
        let listings = futures::future::join_all(
            instances.iter().map(|i| async move { (i, i.adapter.list().await) }),
        )
        .await;

        let mut providers = HashMap::new();
        for (instance, listing) in listings {
            let entry = match listing {
                Ok(records) => {
                    let mut by_hostname: HashMap<String, Vec<Record>> = HashMap::new();
                    for record in records {
                        by_hostname.entry(record.hostname.clone()).or_default().push(record);
                    }
                    debug!(
                        provider = %instance.name,
                        hostnames = by_hostname.len(),
                        "provider records cached"
                    );
                    ProviderRecords {
                        available: true,
                        by_hostname,
                    }
                }
                Err(e) => {
                    warn!(
                        provider = %instance.name,
                        error = %e,
                        "provider list failed, suppressing destructive operations this pass"
                    );
                    ProviderRecords::default()
                }
            };
            providers.insert(instance.name.clone(), entry);
        }

        Self { providers }
    }

    /// Whether the provider's listing succeeded this pass.
    #[must_use]
    pub fn is_available(&self, provider: &str) -> bool {
        self.providers.get(provider).is_some_and(|p| p.available)
    }

    /// Records of one type at `hostname` in `provider`.
    #[must_use]
    pub fn records_for(&self, provider: &str, hostname: &str, record_type: RecordType) -> Vec<&Record> {
        self.providers
            .get(provider)
            .and_then(|p| p.by_hostname.get(hostname))
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.record_type == record_type)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `provider` holds the ownership marker for `hostname`.
    #[must_use]
    pub fn has_marker(&self, provider: &str, hostname: &str) -> bool {
        let marker = ownership::marker_name(hostname);
        self.providers
            .get(provider)
            .and_then(|p| p.by_hostname.get(&marker))
            .is_some_and(|records| {
                records.iter().any(|r| ownership::marked_hostname(r).is_some())
            })
    }

    /// Hostnames in `provider` that carry primary records of `record_type`
    /// (markers and other TXT records excluded). Used for the authoritative
    /// sweep.
    #[must_use]
    pub fn hostnames_with_records(&self, provider: &str, record_type: RecordType) -> Vec<String> {
        self.providers
            .get(provider)
            .map(|p| {
                let mut names: Vec<String> = p
                    .by_hostname
                    .iter()
                    .filter(|(_, records)| records.iter().any(|r| r.record_type == record_type))
                    .map(|(name, _)| name.clone())
                    .collect();
                names.sort();
                names
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
