// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `dns_errors.rs`

use crate::dns_errors::DnsError;

#[test]
fn test_transient_classification() {
    let err = DnsError::Transient {
        endpoint: "10.0.0.1:53".to_string(),
        reason: "connection refused".to_string(),
    };
    assert!(err.is_transient());
    assert!(!err.is_conflict());
    assert_eq!(err.label(), "transient");
}

#[test]
fn test_unavailable_is_transient() {
    let err = DnsError::Unavailable {
        provider: "internal".to_string(),
        reason: "list timed out".to_string(),
    };
    assert!(err.is_transient());
    assert_eq!(err.label(), "unavailable");
}

#[test]
fn test_conflict_classification() {
    let exists = DnsError::AlreadyExists {
        hostname: "app.example.com".to_string(),
        existing: "10.0.0.9".to_string(),
    };
    let missing = DnsError::NotFound {
        hostname: "app.example.com".to_string(),
    };
    assert!(exists.is_conflict());
    assert!(missing.is_conflict());
    assert!(!exists.is_transient());
    assert_eq!(exists.label(), "already_exists");
    assert_eq!(missing.label(), "not_found");
}

#[test]
fn test_auth_is_not_retried() {
    let err = DnsError::Auth {
        endpoint: "https://dns.example.net".to_string(),
        reason: "TSIG verification failed".to_string(),
    };
    assert!(!err.is_transient());
    assert!(!err.is_conflict());
    assert_eq!(err.label(), "auth_failure");
}

#[test]
fn test_from_status_mapping() {
    let auth = DnsError::from_status("https://api", "h.example.com", 401, "bad token");
    assert!(matches!(auth, DnsError::Auth { .. }));

    let missing = DnsError::from_status("https://api", "h.example.com", 404, "");
    assert!(matches!(missing, DnsError::NotFound { ref hostname } if hostname == "h.example.com"));

    let conflict = DnsError::from_status("https://api", "h.example.com", 409, "10.0.0.9");
    assert!(matches!(conflict, DnsError::AlreadyExists { .. }));

    let server = DnsError::from_status("https://api", "h.example.com", 503, "overloaded");
    assert!(server.is_transient());

    let throttled = DnsError::from_status("https://api", "h.example.com", 429, "slow down");
    assert!(throttled.is_transient());
}

#[test]
fn test_error_display_includes_context() {
    let err = DnsError::Validation {
        hostname: "x.example.com".to_string(),
        reason: "name is outside zone 'example.net'".to_string(),
    };
    let rendered = err.to_string();
    assert!(rendered.contains("x.example.com"));
    assert!(rendered.contains("example.net"));
}
