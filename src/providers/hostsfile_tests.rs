// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the hosts-file provider.

use crate::dns_errors::DnsError;
use crate::providers::hostsfile::{parse_managed_block, render, HostsFileProvider, BLOCK_BEGIN};
use crate::providers::{DnsProvider, Record, RecordType};
use std::collections::BTreeMap;

fn record(hostname: &str, ip: &str) -> Record {
    Record::new(hostname, RecordType::A, ip, 300)
}

#[tokio::test]
async fn test_create_and_list_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    let provider = HostsFileProvider::new(&path, 300);

    provider.create(&record("app.example.com", "10.0.0.5")).await.unwrap();
    provider.create(&record("db.example.com", "10.0.0.6")).await.unwrap();

    let records = provider.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.contains(&record("app.example.com", "10.0.0.5")));
    assert!(records.contains(&record("db.example.com", "10.0.0.6")));
}

#[tokio::test]
async fn test_create_identical_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    let provider = HostsFileProvider::new(&path, 300);

    provider.create(&record("app.example.com", "10.0.0.5")).await.unwrap();
    provider.create(&record("app.example.com", "10.0.0.5")).await.unwrap();
    assert_eq!(provider.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_conflicting_target_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    let provider = HostsFileProvider::new(&path, 300);

    provider.create(&record("app.example.com", "10.0.0.5")).await.unwrap();
    let err = provider
        .create(&record("app.example.com", "10.0.0.9"))
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_delete_absent_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    let provider = HostsFileProvider::new(&path, 300);
    provider.delete(&record("ghost.example.com", "10.0.0.1")).await.unwrap();
}

#[tokio::test]
async fn test_update_replaces_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    let provider = HostsFileProvider::new(&path, 300);

    provider.create(&record("app.example.com", "10.0.0.5")).await.unwrap();
    provider
        .update(&record("app.example.com", "10.0.0.5"), &record("app.example.com", "10.0.0.9"))
        .await
        .unwrap();

    let records = provider.list().await.unwrap();
    assert_eq!(records, vec![record("app.example.com", "10.0.0.9")]);
}

#[tokio::test]
async fn test_unmanaged_content_is_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    std::fs::write(&path, "127.0.0.1\tlocalhost\n::1\tip6-localhost\n").unwrap();

    let provider = HostsFileProvider::new(&path, 300);
    provider.create(&record("app.example.com", "10.0.0.5")).await.unwrap();
    provider.delete(&record("app.example.com", "10.0.0.5")).await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("127.0.0.1\tlocalhost\n::1\tip6-localhost\n"));
    assert!(content.contains(BLOCK_BEGIN));
}

#[tokio::test]
async fn test_cname_records_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let provider = HostsFileProvider::new(&dir.path().join("hosts"), 300);
    let cname = Record::new("app.example.com", RecordType::Cname, "other.example.com", 300);
    let err = provider.create(&cname).await.unwrap_err();
    assert!(matches!(err, DnsError::Validation { .. }));
}

#[test]
fn test_parse_ignores_content_outside_block() {
    let content = "\
127.0.0.1\tlocalhost
# BEGIN dnsweaver managed records
10.0.0.5\tapp.example.com
# END dnsweaver managed records
192.168.0.1\trouter
";
    let entries = parse_managed_block(content);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries["app.example.com"], "10.0.0.5");
}

#[test]
fn test_render_is_stable_under_round_trip() {
    let mut entries = BTreeMap::new();
    entries.insert("b.example.com".to_string(), "10.0.0.2".to_string());
    entries.insert("a.example.com".to_string(), "10.0.0.1".to_string());

    let first = render("127.0.0.1\tlocalhost\n", &entries);
    let second = render(&first, &entries);
    assert_eq!(first, second);
    // Sorted by hostname inside the block
    let a = first.find("a.example.com").unwrap();
    let b = first.find("b.example.com").unwrap();
    assert!(a < b);
}
