// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests: an in-memory DNS backend and
// a scripted workload lister.

use async_trait::async_trait;
use dnsweaver::dns_errors::DnsError;
use dnsweaver::docker::{Workload, WorkloadLister};
use dnsweaver::matcher::{DomainMatcher, MatchMode};
use dnsweaver::providers::{
    Capabilities, DnsProvider, ProviderInstance, ProviderMode, Record, RecordType,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory DNS backend with switchable ping/list failures.
#[derive(Default)]
pub struct MemoryProvider {
    records: Mutex<Vec<Record>>,
    fail_ping: AtomicBool,
    fail_list: AtomicBool,
}

impl MemoryProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_ping(&self, fail: bool) {
        self.fail_ping.store(fail, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn seed(&self, record: Record) {
        self.records.lock().unwrap().push(record);
    }

    pub fn contains(&self, record: &Record) -> bool {
        self.records.lock().unwrap().iter().any(|r| r == record)
    }

    pub fn has_hostname(&self, hostname: &str, record_type: RecordType) -> bool {
        self.records
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.hostname == hostname && r.record_type == record_type)
    }
}

#[async_trait]
impl DnsProvider for MemoryProvider {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), DnsError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(DnsError::Transient {
                endpoint: "memory".to_string(),
                reason: "injected ping failure".to_string(),
            });
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Record>, DnsError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(DnsError::Transient {
                endpoint: "memory".to_string(),
                reason: "injected list failure".to_string(),
            });
        }
        Ok(self.records())
    }

    async fn create(&self, record: &Record) -> Result<(), DnsError> {
        let mut records = self.records.lock().unwrap();
        let same_name: Vec<&Record> = records
            .iter()
            .filter(|r| r.hostname == record.hostname && r.record_type == record.record_type)
            .collect();
        if same_name.iter().any(|r| *r == record) {
            return Ok(());
        }
        if let Some(other) = same_name.first() {
            return Err(DnsError::AlreadyExists {
                hostname: record.hostname.clone(),
                existing: other.target.clone(),
            });
        }
        records.push(record.clone());
        Ok(())
    }

    async fn delete(&self, record: &Record) -> Result<(), DnsError> {
        let canon = |t: &str| t.trim_end_matches('.').to_ascii_lowercase();
        let mut records = self.records.lock().unwrap();
        records.retain(|r| {
            !(r.hostname == record.hostname
                && r.record_type == record.record_type
                && canon(&r.target) == canon(&record.target))
        });
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_ownership_txt: true,
            supports_native_update: false,
            record_types: vec![
                RecordType::A,
                RecordType::Cname,
                RecordType::Txt,
                RecordType::Srv,
            ],
        }
    }
}

/// Scripted workload lister.
#[derive(Default)]
pub struct StaticLister {
    workloads: Mutex<Vec<Workload>>,
}

impl StaticLister {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_workloads(&self, workloads: Vec<Workload>) {
        *self.workloads.lock().unwrap() = workloads;
    }
}

#[async_trait]
impl WorkloadLister for StaticLister {
    async fn list(&self) -> anyhow::Result<Vec<Workload>> {
        Ok(self.workloads.lock().unwrap().clone())
    }
}

/// A workload carrying a single Traefik router rule.
pub fn traefik_workload(id: &str, hostname: &str) -> Workload {
    let mut labels = HashMap::new();
    labels.insert(
        format!("traefik.http.routers.{id}.rule"),
        format!("Host(`{hostname}`)"),
    );
    Workload {
        id: id.to_string(),
        name: id.to_string(),
        labels,
    }
}

/// An A-record provider instance over the given backend.
pub fn a_instance(
    name: &str,
    adapter: Arc<dyn DnsProvider>,
    includes: &[&str],
    excludes: &[&str],
    target: &str,
    mode: ProviderMode,
) -> ProviderInstance {
    ProviderInstance {
        name: name.to_string(),
        matcher: DomainMatcher::new(
            &includes.iter().map(ToString::to_string).collect::<Vec<_>>(),
            &excludes.iter().map(ToString::to_string).collect::<Vec<_>>(),
            MatchMode::Glob,
        )
        .unwrap(),
        record_type: RecordType::A,
        target: target.to_string(),
        ttl: 300,
        mode,
        adapter,
    }
}

/// A CNAME-record provider instance over the given backend.
#[allow(dead_code)]
pub fn cname_instance(
    name: &str,
    adapter: Arc<dyn DnsProvider>,
    includes: &[&str],
    excludes: &[&str],
    target: &str,
    mode: ProviderMode,
) -> ProviderInstance {
    ProviderInstance {
        record_type: RecordType::Cname,
        ..a_instance(name, adapter, includes, excludes, target, mode)
    }
}
