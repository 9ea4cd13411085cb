// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the provider record model.

use crate::providers::{validate_target, Record, RecordType, SrvData};

#[test]
fn test_record_equality_ignores_backend_id() {
    let mut a = Record::new("app.example.com", RecordType::A, "10.0.0.5", 300);
    let mut b = a.clone();
    a.id = Some("rec-123".to_string());
    b.id = Some("rec-456".to_string());
    assert_eq!(a, b);
}

#[test]
fn test_record_equality_target_is_name_insensitive() {
    let a = Record::new("app.example.com", RecordType::Cname, "Target.Example.NET.", 300);
    let b = Record::new("app.example.com", RecordType::Cname, "target.example.net", 300);
    assert_eq!(a, b);
}

#[test]
fn test_record_inequality_on_target() {
    let a = Record::new("app.example.com", RecordType::A, "10.0.0.5", 300);
    let b = Record::new("app.example.com", RecordType::A, "10.0.0.9", 300);
    assert_ne!(a, b);
}

#[test]
fn test_record_inequality_on_ttl() {
    let a = Record::new("app.example.com", RecordType::A, "10.0.0.5", 300);
    let b = Record::new("app.example.com", RecordType::A, "10.0.0.5", 600);
    assert_ne!(a, b);
}

#[test]
fn test_srv_equality_compares_tuple() {
    let mut a = Record::new("_sip._tcp.example.com", RecordType::Srv, "sip.example.com", 300);
    let mut b = a.clone();
    a.srv = Some(SrvData {
        priority: 10,
        weight: 5,
        port: 5060,
    });
    b.srv = Some(SrvData {
        priority: 10,
        weight: 5,
        port: 5061,
    });
    assert_ne!(a, b);

    b.srv = a.srv;
    assert_eq!(a, b);
}

#[test]
fn test_record_type_round_trip() {
    for (text, rt) in [
        ("A", RecordType::A),
        ("cname", RecordType::Cname),
        ("TXT", RecordType::Txt),
        ("srv", RecordType::Srv),
    ] {
        assert_eq!(text.parse::<RecordType>().unwrap(), rt);
    }
    assert!("AAAA".parse::<RecordType>().is_err());
}

#[test]
fn test_validate_target_a_requires_ipv4() {
    assert!(validate_target(RecordType::A, "10.0.0.5").is_ok());
    assert!(validate_target(RecordType::A, "example.com").is_err());
    assert!(validate_target(RecordType::A, "::1").is_err());
}

#[test]
fn test_validate_target_cname_requires_hostname() {
    assert!(validate_target(RecordType::Cname, "example.net").is_ok());
    assert!(validate_target(RecordType::Cname, "10.0.0.5").is_err());
    assert!(validate_target(RecordType::Cname, "").is_err());
}

#[test]
fn test_validate_target_rejects_txt_instances() {
    assert!(validate_target(RecordType::Txt, "anything").is_err());
    assert!(validate_target(RecordType::Srv, "sip.example.com").is_err());
}
