// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the RFC 2136 provider, against an in-memory zone.

use crate::constants::{CATALOG_PREFIX, OWNERSHIP_PREFIX};
use crate::dns_errors::DnsError;
use crate::ownership;
use crate::providers::rfc2136::{Rfc2136Provider, ZoneClient};
use crate::providers::{DnsProvider, Record, RecordType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory zone honoring the update semantics the provider relies on:
/// append is idempotent, TXT creation carries an exists prerequisite, and
/// TXT swaps reject mismatched current contents.
#[derive(Default)]
struct ZoneState {
    records: Mutex<Vec<Record>>,
    txt: Mutex<HashMap<String, Vec<String>>>,
    axfr_allowed: AtomicBool,
    axfr_attempts: AtomicUsize,
}

#[derive(Clone, Default)]
struct MockZone(Arc<ZoneState>);

impl MockZone {
    fn new() -> Self {
        Self::default()
    }

    fn allow_axfr(&self, allowed: bool) {
        self.0.axfr_allowed.store(allowed, Ordering::SeqCst);
    }

    fn axfr_attempts(&self) -> usize {
        self.0.axfr_attempts.load(Ordering::SeqCst)
    }

    fn records(&self) -> Vec<Record> {
        self.0.records.lock().unwrap().clone()
    }

    fn txt_segments(&self, name: &str) -> Option<Vec<String>> {
        self.0.txt.lock().unwrap().get(name).cloned()
    }

    fn txt_as_record(name: &str, segments: &[String]) -> Record {
        Record::new(name, RecordType::Txt, &segments.concat(), 300)
    }
}

#[async_trait]
impl ZoneClient for MockZone {
    fn zone(&self) -> &str {
        "example.com"
    }

    fn endpoint(&self) -> String {
        "mock:53".to_string()
    }

    async fn query(
        &self,
        hostname: &str,
        record_type: RecordType,
    ) -> Result<Vec<Record>, DnsError> {
        if record_type == RecordType::Txt {
            return Ok(self
                .txt_segments(hostname)
                .map(|segs| vec![Self::txt_as_record(hostname, &segs)])
                .unwrap_or_default());
        }
        Ok(self
            .records()
            .into_iter()
            .filter(|r| r.hostname == hostname && r.record_type == record_type)
            .collect())
    }

    async fn append(&self, record: &Record) -> Result<(), DnsError> {
        if record.record_type == RecordType::Txt {
            let mut txt = self.0.txt.lock().unwrap();
            let segments = txt.entry(record.hostname.clone()).or_default();
            if !segments.contains(&record.target) {
                segments.push(record.target.clone());
            }
            return Ok(());
        }
        let mut records = self.0.records.lock().unwrap();
        if !records.iter().any(|r| r == record) {
            records.push(record.clone());
        }
        Ok(())
    }

    async fn delete(&self, record: &Record) -> Result<(), DnsError> {
        if record.record_type == RecordType::Txt {
            let mut txt = self.0.txt.lock().unwrap();
            if let Some(segments) = txt.get_mut(&record.hostname) {
                segments.retain(|s| s != &record.target);
                if segments.is_empty() {
                    txt.remove(&record.hostname);
                }
            }
            return Ok(());
        }
        self.0.records.lock().unwrap().retain(|r| r != record);
        Ok(())
    }

    async fn delete_rrset(
        &self,
        hostname: &str,
        record_type: RecordType,
    ) -> Result<(), DnsError> {
        if record_type == RecordType::Txt {
            self.0.txt.lock().unwrap().remove(hostname);
            return Ok(());
        }
        self.0
            .records
            .lock()
            .unwrap()
            .retain(|r| !(r.hostname == hostname && r.record_type == record_type));
        Ok(())
    }

    async fn create_txt(
        &self,
        hostname: &str,
        segments: &[String],
        _ttl: u32,
    ) -> Result<(), DnsError> {
        let mut txt = self.0.txt.lock().unwrap();
        if txt.contains_key(hostname) {
            return Err(DnsError::AlreadyExists {
                hostname: hostname.to_string(),
                existing: String::new(),
            });
        }
        txt.insert(hostname.to_string(), segments.to_vec());
        Ok(())
    }

    async fn swap_txt(
        &self,
        hostname: &str,
        current: &[String],
        replacement: &[String],
        _ttl: u32,
    ) -> Result<(), DnsError> {
        let mut txt = self.0.txt.lock().unwrap();
        match txt.get(hostname) {
            None => Err(DnsError::NotFound {
                hostname: hostname.to_string(),
            }),
            Some(stored) if stored.as_slice() != current => Err(DnsError::AlreadyExists {
                hostname: hostname.to_string(),
                existing: stored.join(","),
            }),
            Some(_) => {
                txt.insert(hostname.to_string(), replacement.to_vec());
                Ok(())
            }
        }
    }

    async fn query_txt_segments(&self, hostname: &str) -> Result<Option<Vec<String>>, DnsError> {
        Ok(self.txt_segments(hostname))
    }

    async fn axfr(&self) -> Result<Vec<Record>, DnsError> {
        self.0.axfr_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.0.axfr_allowed.load(Ordering::SeqCst) {
            return Err(DnsError::Auth {
                endpoint: self.endpoint(),
                reason: "zone transfer refused".to_string(),
            });
        }
        let mut all = self.records();
        let txt = self.0.txt.lock().unwrap();
        for (name, segments) in txt.iter() {
            all.push(Self::txt_as_record(name, segments));
        }
        Ok(all)
    }

    async fn check_zone(&self) -> Result<(), DnsError> {
        Ok(())
    }
}

fn a_record(hostname: &str, ip: &str) -> Record {
    Record::new(hostname, RecordType::A, ip, 300)
}

fn chunk_name(index: usize) -> String {
    format!("{CATALOG_PREFIX}{index}.example.com")
}

#[tokio::test]
async fn test_create_adds_record_and_catalog_entry() {
    let zone = MockZone::new();
    let provider = Rfc2136Provider::new(zone.clone(), false);

    provider.create(&a_record("app.example.com", "10.0.0.5")).await.unwrap();

    assert!(zone.records().contains(&a_record("app.example.com", "10.0.0.5")));
    assert_eq!(
        provider.catalog().hostnames().await.unwrap(),
        vec!["app.example.com".to_string()]
    );
    // Chunk 0 materialized as a real TXT record in the zone
    assert_eq!(
        zone.txt_segments(&chunk_name(0)),
        Some(vec!["app.example.com".to_string()])
    );
}

#[tokio::test]
async fn test_create_identical_is_noop() {
    let zone = MockZone::new();
    let provider = Rfc2136Provider::new(zone.clone(), false);

    provider.create(&a_record("app.example.com", "10.0.0.5")).await.unwrap();
    provider.create(&a_record("app.example.com", "10.0.0.5")).await.unwrap();

    assert_eq!(zone.records().len(), 1);
    assert_eq!(provider.catalog().hostnames().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_conflict_surfaces_and_skips_catalog() {
    let zone = MockZone::new();
    let provider = Rfc2136Provider::new(zone.clone(), false);
    provider.create(&a_record("app.example.com", "10.0.0.9")).await.unwrap();

    let err = provider
        .create(&a_record("app.example.com", "10.0.0.5"))
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::AlreadyExists { ref existing, .. } if existing == "10.0.0.9"));

    // The conflicting write never reached the zone or polluted the catalog
    assert_eq!(zone.records(), vec![a_record("app.example.com", "10.0.0.9")]);
    assert_eq!(provider.catalog().hostnames().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_marker_records_not_catalogued() {
    let zone = MockZone::new();
    let provider = Rfc2136Provider::new(zone.clone(), false);

    provider
        .create(&ownership::marker_record("app.example.com"))
        .await
        .unwrap();

    assert!(zone
        .txt_segments(&format!("{OWNERSHIP_PREFIX}app.example.com"))
        .is_some());
    assert!(provider.catalog().hostnames().await.unwrap().is_empty());
    assert!(zone.txt_segments(&chunk_name(0)).is_none());
}

#[tokio::test]
async fn test_delete_removes_record_and_catalog_entry() {
    let zone = MockZone::new();
    let provider = Rfc2136Provider::new(zone.clone(), false);
    provider.create(&a_record("app.example.com", "10.0.0.5")).await.unwrap();
    provider.create(&a_record("db.example.com", "10.0.0.6")).await.unwrap();

    provider.delete(&a_record("app.example.com", "10.0.0.5")).await.unwrap();

    assert_eq!(zone.records(), vec![a_record("db.example.com", "10.0.0.6")]);
    assert_eq!(
        provider.catalog().hostnames().await.unwrap(),
        vec!["db.example.com".to_string()]
    );
}

#[tokio::test]
async fn test_delete_of_last_hostname_keeps_sentinel_chunk() {
    let zone = MockZone::new();
    let provider = Rfc2136Provider::new(zone.clone(), false);
    provider.create(&a_record("app.example.com", "10.0.0.5")).await.unwrap();

    provider.delete(&a_record("app.example.com", "10.0.0.5")).await.unwrap();

    assert!(provider.catalog().hostnames().await.unwrap().is_empty());
    // Chunk 0 stays behind as the empty sentinel
    assert_eq!(zone.txt_segments(&chunk_name(0)), Some(vec![String::new()]));
}

#[tokio::test]
async fn test_update_replaces_record_and_keeps_catalog() {
    let zone = MockZone::new();
    let provider = Rfc2136Provider::new(zone.clone(), false);
    provider.create(&a_record("app.example.com", "10.0.0.9")).await.unwrap();

    provider
        .update(
            &a_record("app.example.com", "10.0.0.9"),
            &a_record("app.example.com", "10.0.0.5"),
        )
        .await
        .unwrap();

    assert_eq!(zone.records(), vec![a_record("app.example.com", "10.0.0.5")]);
    assert_eq!(
        provider.catalog().hostnames().await.unwrap(),
        vec!["app.example.com".to_string()]
    );
}

#[tokio::test]
async fn test_list_via_catalog_returns_records_and_markers() {
    let zone = MockZone::new();
    let provider = Rfc2136Provider::new(zone.clone(), false);
    provider.create(&a_record("app.example.com", "10.0.0.5")).await.unwrap();
    provider
        .create(&ownership::marker_record("app.example.com"))
        .await
        .unwrap();

    let listing = provider.list().await.unwrap();

    assert!(listing.contains(&a_record("app.example.com", "10.0.0.5")));
    assert!(listing
        .iter()
        .any(|r| ownership::marked_hostname(r).as_deref() == Some("app.example.com")));
    // The catalog chunks themselves never show up in a listing
    assert!(listing.iter().all(|r| !r.hostname.starts_with(CATALOG_PREFIX)));
    assert_eq!(zone.axfr_attempts(), 0);
}

#[tokio::test]
async fn test_list_prefers_axfr_when_allowed() {
    let zone = MockZone::new();
    zone.allow_axfr(true);
    let provider = Rfc2136Provider::new(zone.clone(), true);
    provider.create(&a_record("app.example.com", "10.0.0.5")).await.unwrap();

    let listing = provider.list().await.unwrap();

    assert_eq!(zone.axfr_attempts(), 1);
    assert!(listing.contains(&a_record("app.example.com", "10.0.0.5")));
    // AXFR sees the chunk TXT records too; the provider filters them out
    assert!(listing.iter().all(|r| !r.hostname.starts_with(CATALOG_PREFIX)));
}

#[tokio::test]
async fn test_refused_axfr_falls_back_to_catalog() {
    let zone = MockZone::new();
    zone.allow_axfr(false);
    let provider = Rfc2136Provider::new(zone.clone(), true);
    provider.create(&a_record("app.example.com", "10.0.0.5")).await.unwrap();

    let listing = provider.list().await.unwrap();

    // The transfer was attempted, refused, and the catalog filled in
    assert_eq!(zone.axfr_attempts(), 1);
    assert_eq!(listing, vec![a_record("app.example.com", "10.0.0.5")]);
}

#[tokio::test]
async fn test_ping_checks_the_zone() {
    let provider = Rfc2136Provider::new(MockZone::new(), false);
    assert!(provider.ping().await.is_ok());
}

#[tokio::test]
async fn test_capabilities() {
    let provider = Rfc2136Provider::new(MockZone::new(), false);
    let caps = provider.capabilities();
    assert!(caps.supports_ownership_txt);
    assert!(caps.supports_native_update);
    assert!(caps.supports_type(RecordType::Txt));
}
