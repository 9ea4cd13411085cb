// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `matcher.rs`

use crate::matcher::{DomainMatcher, MatchMode};

fn glob(includes: &[&str], excludes: &[&str]) -> DomainMatcher {
    DomainMatcher::new(
        &includes.iter().map(ToString::to_string).collect::<Vec<_>>(),
        &excludes.iter().map(ToString::to_string).collect::<Vec<_>>(),
        MatchMode::Glob,
    )
    .unwrap()
}

#[test]
fn test_glob_star_crosses_dots() {
    let m = glob(&["*.example.com"], &[]);
    assert!(m.matches("app.example.com"));
    assert!(m.matches("deep.nested.example.com"));
    assert!(!m.matches("example.com"));
    assert!(!m.matches("app.example.net"));
}

#[test]
fn test_glob_question_mark_single_char() {
    let m = glob(&["host?.example.com"], &[]);
    assert!(m.matches("host1.example.com"));
    assert!(m.matches("hosta.example.com"));
    assert!(!m.matches("host.example.com"));
    assert!(!m.matches("host12.example.com"));
}

#[test]
fn test_glob_character_class() {
    let m = glob(&["host[0-3].example.com"], &[]);
    assert!(m.matches("host0.example.com"));
    assert!(m.matches("host3.example.com"));
    assert!(!m.matches("host4.example.com"));
}

#[test]
fn test_glob_is_case_insensitive() {
    let m = glob(&["*.Example.COM"], &[]);
    assert!(m.matches("APP.example.com"));
}

#[test]
fn test_glob_literal_dots_not_wildcards() {
    let m = glob(&["app.example.com"], &[]);
    assert!(m.matches("app.example.com"));
    assert!(!m.matches("appxexample.com"));
    assert!(!m.matches("app-example-com"));
}

#[test]
fn test_excludes_take_precedence() {
    let m = glob(&["*.example.net"], &["*.local.example.net"]);
    assert!(m.matches("www.example.net"));
    assert!(!m.matches("sonarr.local.example.net"));
}

#[test]
fn test_split_horizon_pair() {
    // The internal/external pair from a split-horizon setup: together they
    // partition *.example.net without overlap.
    let internal = glob(&["*.local.example.net"], &[]);
    let external = glob(&["*.example.net"], &["*.local.example.net"]);

    assert!(internal.matches("sonarr.local.example.net"));
    assert!(!external.matches("sonarr.local.example.net"));
    assert!(external.matches("www.example.net"));
    assert!(!internal.matches("www.example.net"));
}

#[test]
fn test_regex_mode_full_match() {
    let m = DomainMatcher::new(
        &[r"[a-z]+\.example\.com".to_string()],
        &[],
        MatchMode::Regex,
    )
    .unwrap();
    assert!(m.matches("app.example.com"));
    // Full match: a regex that matches a substring is not enough
    assert!(!m.matches("app.example.com.evil.net"));
    assert!(!m.matches("prefix-app.example.com"));
}

#[test]
fn test_regex_mode_case_insensitive() {
    let m = DomainMatcher::new(&[r".*\.example\.com".to_string()], &[], MatchMode::Regex).unwrap();
    assert!(m.matches("APP.EXAMPLE.COM"));
}

#[test]
fn test_empty_includes_rejected() {
    assert!(DomainMatcher::new(&[], &[], MatchMode::Glob).is_err());
}

#[test]
fn test_invalid_regex_rejected() {
    assert!(DomainMatcher::new(&["(unclosed".to_string()], &[], MatchMode::Regex).is_err());
}

#[test]
fn test_trailing_dot_tolerated() {
    let m = glob(&["*.example.com"], &[]);
    assert!(m.matches("app.example.com."));
}

#[test]
fn test_multiple_includes_any_match() {
    let m = glob(&["*.example.com", "*.example.org"], &[]);
    assert!(m.matches("a.example.com"));
    assert!(m.matches("b.example.org"));
    assert!(!m.matches("c.example.net"));
}
