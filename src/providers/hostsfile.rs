// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Local hosts-format file provider backend.
//!
//! Maintains a managed block inside a hosts(5)-style file:
//!
//! ```text
//! # BEGIN dnsweaver managed records
//! 10.0.0.5    app.example.com
//! # END dnsweaver managed records
//! ```
//!
//! Content outside the block is preserved byte-for-byte. Rewrites go through
//! a temporary file in the same directory followed by a rename, so readers
//! never observe a half-written file. Only A records are representable; the
//! backend reports `supportsOwnershipTXT = false` and the reconciler treats
//! its records as foreign in `managed` mode.

use crate::dns_errors::DnsError;
use crate::providers::{Capabilities, DnsProvider, Record, RecordType};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// First line of the managed block.
pub const BLOCK_BEGIN: &str = "# BEGIN dnsweaver managed records";
/// Last line of the managed block.
pub const BLOCK_END: &str = "# END dnsweaver managed records";

/// Hosts-file backend rooted at one file path.
pub struct HostsFileProvider {
    path: PathBuf,
    default_ttl: u32,
    // File rewrites are read-modify-write; serialize them.
    lock: Mutex<()>,
}

impl HostsFileProvider {
    /// Create a provider managing the block in the file at `path`.
    ///
    /// `default_ttl` is stamped onto listed records, since the file format
    /// carries no TTL of its own.
    #[must_use]
    pub fn new(path: &Path, default_ttl: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            default_ttl,
            lock: Mutex::new(()),
        }
    }

    async fn read_file(&self) -> Result<String, DnsError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(DnsError::Transient {
                endpoint: self.path.display().to_string(),
                reason: format!("failed to read hosts file: {e}"),
            }),
        }
    }

    async fn write_file(&self, content: &str) -> Result<(), DnsError> {
        let tmp = self.path.with_extension("dnsweaver.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| DnsError::Transient {
                endpoint: self.path.display().to_string(),
                reason: format!("failed to write hosts file: {e}"),
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| DnsError::Transient {
                endpoint: self.path.display().to_string(),
                reason: format!("failed to replace hosts file: {e}"),
            })
    }

    async fn entries(&self) -> Result<BTreeMap<String, String>, DnsError> {
        Ok(parse_managed_block(&self.read_file().await?))
    }

    async fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), DnsError> {
        let content = self.read_file().await?;
        self.write_file(&render(&content, entries)).await
    }

    fn require_a_record(&self, record: &Record) -> Result<(), DnsError> {
        if record.record_type == RecordType::A {
            Ok(())
        } else {
            Err(DnsError::Validation {
                hostname: record.hostname.clone(),
                reason: format!(
                    "hosts file backend cannot store {} records",
                    record.record_type
                ),
            })
        }
    }
}

#[async_trait]
impl DnsProvider for HostsFileProvider {
    fn kind(&self) -> &'static str {
        "hostsfile"
    }

    async fn ping(&self) -> Result<(), DnsError> {
        if self.path.exists() {
            self.read_file().await.map(|_| ())
        } else {
            let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
            if parent.is_dir() {
                Ok(())
            } else {
                Err(DnsError::Transient {
                    endpoint: self.path.display().to_string(),
                    reason: format!("directory {} does not exist", parent.display()),
                })
            }
        }
    }

    async fn list(&self) -> Result<Vec<Record>, DnsError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .entries()
            .await?
            .into_iter()
            .map(|(hostname, ip)| Record::new(&hostname, RecordType::A, &ip, self.default_ttl))
            .collect())
    }

    async fn create(&self, record: &Record) -> Result<(), DnsError> {
        self.require_a_record(record)?;
        let _guard = self.lock.lock().await;
        let mut entries = self.entries().await?;
        match entries.get(&record.hostname) {
            Some(existing) if existing == &record.target => return Ok(()),
            Some(existing) => {
                return Err(DnsError::AlreadyExists {
                    hostname: record.hostname.clone(),
                    existing: existing.clone(),
                })
            }
            None => {}
        }
        entries.insert(record.hostname.clone(), record.target.clone());
        self.store(&entries).await?;
        debug!(record = %record, path = %self.path.display(), "hosts entry added");
        Ok(())
    }

    async fn delete(&self, record: &Record) -> Result<(), DnsError> {
        if record.record_type != RecordType::A {
            // Nothing but A records can exist here; deleting anything else
            // is trivially complete.
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        let mut entries = self.entries().await?;
        if entries.remove(&record.hostname).is_some() {
            self.store(&entries).await?;
            debug!(record = %record, path = %self.path.display(), "hosts entry removed");
        }
        Ok(())
    }

    async fn update(&self, existing: &Record, desired: &Record) -> Result<(), DnsError> {
        self.require_a_record(desired)?;
        let _guard = self.lock.lock().await;
        let mut entries = self.entries().await?;
        entries.remove(&existing.hostname);
        entries.insert(desired.hostname.clone(), desired.target.clone());
        self.store(&entries).await?;
        debug!(record = %desired, path = %self.path.display(), "hosts entry replaced");
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_ownership_txt: false,
            supports_native_update: true,
            record_types: vec![RecordType::A],
        }
    }
}

/// Extract hostname → address pairs from the managed block of `content`.
#[must_use]
pub fn parse_managed_block(content: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    let mut inside = false;
    for line in content.lines() {
        let line = line.trim();
        if line == BLOCK_BEGIN {
            inside = true;
            continue;
        }
        if line == BLOCK_END {
            inside = false;
            continue;
        }
        if !inside || line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        if let (Some(ip), Some(host)) = (parts.next(), parts.next()) {
            entries.insert(host.to_string(), ip.to_string());
        }
    }
    entries
}

/// Rebuild the file: everything outside the managed block is kept, the block
/// itself is regenerated from `entries` (sorted by hostname) at the position
/// of the old block, or appended when the file had none.
#[must_use]
pub fn render(content: &str, entries: &BTreeMap<String, String>) -> String {
    let mut block = String::new();
    block.push_str(BLOCK_BEGIN);
    block.push('\n');
    for (host, ip) in entries {
        block.push_str(&format!("{ip}\t{host}\n"));
    }
    block.push_str(BLOCK_END);
    block.push('\n');

    let begin = content.find(BLOCK_BEGIN);
    let end = content.find(BLOCK_END);
    match (begin, end) {
        (Some(b), Some(e)) if e >= b => {
            let after = &content[e + BLOCK_END.len()..];
            let after = after.strip_prefix('\n').unwrap_or(after);
            format!("{}{block}{after}", &content[..b])
        }
        _ => {
            let mut out = content.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&block);
            out
        }
    }
}

#[cfg(test)]
#[path = "hostsfile_tests.rs"]
mod hostsfile_tests;
