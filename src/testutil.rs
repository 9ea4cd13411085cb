// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared helpers for unit tests: an in-memory provider backend and
//! instance builders.

use crate::dns_errors::DnsError;
use crate::matcher::{DomainMatcher, MatchMode};
use crate::providers::{
    Capabilities, DnsProvider, ProviderInstance, ProviderMode, Record, RecordType,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory provider with switchable failure modes.
#[derive(Default)]
pub struct MemoryProvider {
    records: Mutex<Vec<Record>>,
    fail_ping: AtomicBool,
    fail_list: AtomicBool,
    supports_txt: bool,
    supports_update: bool,
}

impl MemoryProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            supports_txt: true,
            supports_update: false,
            ..Self::default()
        })
    }

    pub fn with_native_update() -> Arc<Self> {
        Arc::new(Self {
            supports_txt: true,
            supports_update: true,
            ..Self::default()
        })
    }

    pub fn without_ownership_txt() -> Arc<Self> {
        Arc::new(Self {
            supports_txt: false,
            supports_update: false,
            ..Self::default()
        })
    }

    pub fn set_fail_ping(&self, fail: bool) {
        self.fail_ping.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

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

    async fn update(&self, existing: &Record, desired: &Record) -> Result<(), DnsError> {
        if !self.supports_update {
            return Err(DnsError::NotSupported {
                provider: "memory".to_string(),
                operation: "update".to_string(),
            });
        }
        let mut records = self.records.lock().unwrap();
        records.retain(|r| {
            !(r.hostname == existing.hostname && r.record_type == existing.record_type)
        });
        records.push(desired.clone());
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_ownership_txt: self.supports_txt,
            supports_native_update: self.supports_update,
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
    workloads: Mutex<Vec<crate::docker::Workload>>,
    fail: AtomicBool,
}

impl StaticLister {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_workloads(&self, workloads: Vec<crate::docker::Workload>) {
        *self.workloads.lock().unwrap() = workloads;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl crate::docker::WorkloadLister for StaticLister {
    async fn list(&self) -> anyhow::Result<Vec<crate::docker::Workload>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("injected runtime failure");
        }
        Ok(self.workloads.lock().unwrap().clone())
    }
}

/// A workload with the given labels.
pub fn workload(id: &str, labels: &[(&str, &str)]) -> crate::docker::Workload {
    crate::docker::Workload {
        id: id.to_string(),
        name: id.to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    }
}

/// Build an A-record instance over the given adapter.
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

/// Build a CNAME-record instance over the given adapter.
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
