// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `hostname.rs`

use crate::hostname::{is_within, normalize};

#[test]
fn test_normalize_lowercases() {
    assert_eq!(normalize("App.Example.COM").unwrap(), "app.example.com");
}

#[test]
fn test_normalize_strips_trailing_dot() {
    assert_eq!(normalize("app.example.com.").unwrap(), "app.example.com");
}

#[test]
fn test_normalize_is_idempotent() {
    let once = normalize("App.Example.Com.").unwrap();
    let twice = normalize(&once).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_normalize_rejects_empty() {
    assert!(normalize("").is_err());
    assert!(normalize(".").is_err());
    assert!(normalize("   ").is_err());
}

#[test]
fn test_normalize_rejects_empty_labels() {
    assert!(normalize("a..example.com").is_err());
    assert!(normalize(".example.com").is_err());
}

#[test]
fn test_normalize_rejects_whitespace() {
    assert!(normalize("app example.com").is_err());
}

#[test]
fn test_normalize_rejects_overlong_names() {
    // 4 * 63 + 3 dots = 255 bytes, over the 253 limit
    let long = format!("{0}.{0}.{0}.{0}", "a".repeat(63));
    assert!(normalize(&long).is_err());

    // 253 bytes exactly is accepted
    let ok = format!("{}.{}.{}", "a".repeat(63), "b".repeat(63), "c".repeat(125));
    assert_eq!(ok.len(), 253);
    assert!(normalize(&ok).is_ok());
}

#[test]
fn test_normalize_single_label() {
    assert_eq!(normalize("localhost").unwrap(), "localhost");
}

#[test]
fn test_is_within_suffix_match() {
    assert!(is_within("app.example.com", "example.com"));
    assert!(is_within("example.com", "example.com"));
    assert!(is_within("App.Example.Com.", "example.com."));
    assert!(!is_within("badexample.com", "example.com"));
    assert!(!is_within("example.com", "app.example.com"));
}
