// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hostname sources: where desired hostnames come from.
//!
//! A source has two capabilities: pure extraction over a single workload's
//! labels, and (optionally) discovery of hostnames from external artifacts
//! such as reverse-proxy configuration files. Extraction never fails:
//! malformed input is logged and skipped, so one broken label can never
//! stall a reconcile pass.
//!
//! The [`SourceRegistry`] owns the configured sources; reconciliation unions
//! their outputs.

pub mod file;
pub mod traefik;

use crate::hostname;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// One way of producing hostnames.
#[async_trait]
pub trait HostnameSource: Send + Sync {
    /// Registry name of the source.
    fn name(&self) -> &'static str;

    /// Extract hostnames from a single workload's labels.
    ///
    /// Pure and infallible: malformed labels are skipped, never propagated.
    fn extract(&self, labels: &HashMap<String, String>) -> Vec<String>;

    /// Whether this source can discover hostnames independently of workloads.
    fn can_discover(&self) -> bool {
        false
    }

    /// Enumerate hostnames from external artifacts.
    async fn discover(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Simple label source: hostnames listed directly on the workload under the
/// `dnsweaver.hostnames` label, comma-separated.
pub struct LabelSource;

/// The label read by [`LabelSource`].
pub const HOSTNAMES_LABEL: &str = "dnsweaver.hostnames";

#[async_trait]
impl HostnameSource for LabelSource {
    fn name(&self) -> &'static str {
        "label"
    }

    fn extract(&self, labels: &HashMap<String, String>) -> Vec<String> {
        let Some(value) = labels.get(HOSTNAMES_LABEL) else {
            return Vec::new();
        };
        value
            .split(',')
            .filter_map(|raw| match hostname::normalize(raw) {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!(label = HOSTNAMES_LABEL, raw, error = %e, "skipping invalid hostname");
                    None
                }
            })
            .collect()
    }
}

/// Named collection of sources consulted by the reconciler.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn HostnameSource>>,
}

impl SourceRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source. Later sources only ever add hostnames, so order does
    /// not matter.
    pub fn register(&mut self, source: Arc<dyn HostnameSource>) {
        debug!(source = source.name(), "hostname source registered");
        self.sources.push(source);
    }

    /// All registered sources.
    #[must_use]
    pub fn sources(&self) -> &[Arc<dyn HostnameSource>] {
        &self.sources
    }

    /// Sources that support discovery, for the file watcher.
    #[must_use]
    pub fn discovery_sources(&self) -> Vec<Arc<dyn HostnameSource>> {
        self.sources
            .iter()
            .filter(|s| s.can_discover())
            .cloned()
            .collect()
    }

    /// Union of every source's extraction over one workload's labels.
    #[must_use]
    pub fn extract_all(&self, labels: &HashMap<String, String>) -> BTreeSet<String> {
        self.sources
            .iter()
            .flat_map(|s| s.extract(labels))
            .collect()
    }

    /// Union of every discovery-capable source's output.
    pub async fn discover_all(&self) -> BTreeSet<String> {
        let mut all = BTreeSet::new();
        for source in self.discovery_sources() {
            all.extend(source.discover().await);
        }
        all
    }
}
