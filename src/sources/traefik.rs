// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Traefik router-rule hostname source.
//!
//! Scans workload labels of the form
//! `traefik.http.routers.<name>.rule` / `traefik.tcp.routers.<name>.rule`
//! and extracts the arguments of `Host(...)` and `HostSNI(...)` matchers.
//! Rules may combine matchers with `&&`, `||`, and parentheses; everything
//! that is not a Host matcher (`PathPrefix`, `Headers`, ...) is ignored, as
//! is the `HostSNI(*)` wildcard.

use crate::hostname;
use crate::sources::HostnameSource;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

static ROUTER_RULE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^traefik\.(?:http|tcp)\.routers\.[^.]+\.rule$").expect("static regex")
});

static HOST_MATCHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bHost(?:SNI)?\s*\(([^)]*)\)").expect("static regex")
});

/// Extract every hostname mentioned by Host matchers in a rule string.
///
/// Arguments may be backtick- or double-quoted and comma-separated:
/// ``Host(`a.example.com`, `b.example.com`) && PathPrefix(`/api`)``.
#[must_use]
pub fn parse_rule(rule: &str) -> Vec<String> {
    let mut hostnames = Vec::new();
    for captures in HOST_MATCHER.captures_iter(rule) {
        for arg in captures[1].split(',') {
            let raw = arg.trim().trim_matches(['`', '"', '\'']);
            if raw.is_empty() || raw == "*" {
                continue;
            }
            match hostname::normalize(raw) {
                Ok(name) => hostnames.push(name),
                Err(e) => {
                    warn!(rule, raw, error = %e, "skipping invalid hostname in router rule");
                }
            }
        }
    }
    hostnames
}

/// Source reading Traefik router rules from workload labels.
pub struct TraefikSource;

#[async_trait]
impl HostnameSource for TraefikSource {
    fn name(&self) -> &'static str {
        "traefik"
    }

    fn extract(&self, labels: &HashMap<String, String>) -> Vec<String> {
        let mut hostnames = Vec::new();
        for (key, rule) in labels {
            if ROUTER_RULE_LABEL.is_match(key) {
                hostnames.extend(parse_rule(rule));
            }
        }
        hostnames.sort();
        hostnames.dedup();
        hostnames
    }
}

#[cfg(test)]
#[path = "traefik_tests.rs"]
mod traefik_tests;
