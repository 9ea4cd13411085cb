// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! File-based hostname source with discovery.
//!
//! Reads hostnames from configured files, independently of any workload:
//!
//! - `.yml`/`.yaml` files are parsed as Traefik dynamic configuration and
//!   contribute the Host matchers of `http.routers.*.rule` and
//!   `tcp.routers.*.rule`;
//! - any other file is newline-delimited hostnames, `#` starting a comment.
//!
//! Unreadable or malformed files log a warning and contribute nothing; a
//! broken file must not stall reconciliation.

use crate::hostname;
use crate::sources::{traefik, HostnameSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Discovery-capable source over a fixed set of files.
pub struct FileSource {
    paths: Vec<PathBuf>,
}

impl FileSource {
    /// Create a source over `paths`.
    #[must_use]
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    async fn read_one(path: &Path) -> Vec<String> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read hostname file");
                return Vec::new();
            }
        };

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"));

        let hostnames = if is_yaml {
            parse_traefik_dynamic(path, &content)
        } else {
            parse_plain_list(&content)
        };
        debug!(path = %path.display(), count = hostnames.len(), "hostnames discovered from file");
        hostnames
    }
}

#[async_trait]
impl HostnameSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn extract(&self, _labels: &HashMap<String, String>) -> Vec<String> {
        // Files are workload-independent; everything comes from discovery
        Vec::new()
    }

    fn can_discover(&self) -> bool {
        true
    }

    async fn discover(&self) -> Vec<String> {
        let mut all = Vec::new();
        for path in &self.paths {
            all.extend(Self::read_one(path).await);
        }
        all.sort();
        all.dedup();
        all
    }
}

/// One hostname per line; blank lines and `#` comments skipped.
fn parse_plain_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .filter_map(|raw| match hostname::normalize(raw) {
            Ok(name) => Some(name),
            Err(e) => {
                warn!(raw, error = %e, "skipping invalid hostname in list file");
                None
            }
        })
        .collect()
}

/// Walk a Traefik dynamic configuration document for router rules.
fn parse_traefik_dynamic(path: &Path, content: &str) -> Vec<String> {
    let doc: serde_yaml::Value = match serde_yaml::from_str(content) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse Traefik configuration");
            return Vec::new();
        }
    };

    let mut hostnames = Vec::new();
    for section in ["http", "tcp"] {
        let routers = doc
            .get(section)
            .and_then(|s| s.get("routers"))
            .and_then(serde_yaml::Value::as_mapping);
        let Some(routers) = routers else { continue };
        for (_name, router) in routers {
            if let Some(rule) = router.get("rule").and_then(serde_yaml::Value::as_str) {
                hostnames.extend(traefik::parse_rule(rule));
            }
        }
    }
    hostnames
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod file_tests;
