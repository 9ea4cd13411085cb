// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RFC 2136 provider backend.
//!
//! Wraps a dynamic-update client for one zone and keeps the chunked TXT
//! hostname catalog in step with every create and delete, so the zone can be
//! enumerated later even when the server refuses AXFR. When `allow_axfr` is
//! set, `list` first attempts a zone transfer and only falls back to the
//! catalog on refusal.
//!
//! The backend is generic over [`ZoneClient`], the slice of update-client
//! operations it relies on; production uses [`DnsUpdateClient`], tests an
//! in-memory zone.

use crate::catalog::{ChunkStore, HostnameCatalog};
use crate::constants::{CATALOG_PREFIX, OWNERSHIP_PREFIX, TXT_RECORD_TTL_SECS};
use crate::ddns::DnsUpdateClient;
use crate::dns_errors::DnsError;
use crate::providers::{Capabilities, DnsProvider, Record, RecordType};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Dynamic-update operations the backend and its catalog depend on.
#[async_trait]
pub trait ZoneClient: Send + Sync {
    /// The zone this client updates, normalized (no trailing dot).
    fn zone(&self) -> &str;

    /// Server endpoint, for log and error attribution.
    fn endpoint(&self) -> String;

    /// Query records of one type at a name; absent names yield an empty vec.
    async fn query(
        &self,
        hostname: &str,
        record_type: RecordType,
    ) -> Result<Vec<Record>, DnsError>;

    /// Add a record with no prerequisites.
    async fn append(&self, record: &Record) -> Result<(), DnsError>;

    /// Delete one record by exact rdata; absent records are a no-op.
    async fn delete(&self, record: &Record) -> Result<(), DnsError>;

    /// Delete every record of `record_type` at `hostname`.
    async fn delete_rrset(&self, hostname: &str, record_type: RecordType)
        -> Result<(), DnsError>;

    /// Create a multi-segment TXT RRset that must not exist yet.
    async fn create_txt(
        &self,
        hostname: &str,
        segments: &[String],
        ttl: u32,
    ) -> Result<(), DnsError>;

    /// Atomically replace a TXT RRset whose current segments are known.
    async fn swap_txt(
        &self,
        hostname: &str,
        current: &[String],
        replacement: &[String],
        ttl: u32,
    ) -> Result<(), DnsError>;

    /// Raw TXT segments at a name, `None` when no TXT record exists.
    async fn query_txt_segments(&self, hostname: &str) -> Result<Option<Vec<String>>, DnsError>;

    /// Enumerate the zone by AXFR; servers commonly refuse this.
    async fn axfr(&self) -> Result<Vec<Record>, DnsError>;

    /// Check that the server is reachable and serves the zone.
    async fn check_zone(&self) -> Result<(), DnsError>;
}

#[async_trait]
impl ZoneClient for DnsUpdateClient {
    fn zone(&self) -> &str {
        DnsUpdateClient::zone(self)
    }

    fn endpoint(&self) -> String {
        self.server().to_string()
    }

    async fn query(
        &self,
        hostname: &str,
        record_type: RecordType,
    ) -> Result<Vec<Record>, DnsError> {
        DnsUpdateClient::query(self, hostname, record_type).await
    }

    async fn append(&self, record: &Record) -> Result<(), DnsError> {
        DnsUpdateClient::append(self, record).await
    }

    async fn delete(&self, record: &Record) -> Result<(), DnsError> {
        DnsUpdateClient::delete(self, record).await
    }

    async fn delete_rrset(
        &self,
        hostname: &str,
        record_type: RecordType,
    ) -> Result<(), DnsError> {
        DnsUpdateClient::delete_rrset(self, hostname, record_type).await
    }

    async fn create_txt(
        &self,
        hostname: &str,
        segments: &[String],
        ttl: u32,
    ) -> Result<(), DnsError> {
        DnsUpdateClient::create_txt(self, hostname, segments, ttl).await
    }

    async fn swap_txt(
        &self,
        hostname: &str,
        current: &[String],
        replacement: &[String],
        ttl: u32,
    ) -> Result<(), DnsError> {
        DnsUpdateClient::swap_txt(self, hostname, current, replacement, ttl).await
    }

    async fn query_txt_segments(&self, hostname: &str) -> Result<Option<Vec<String>>, DnsError> {
        DnsUpdateClient::query_txt_segments(self, hostname).await
    }

    async fn axfr(&self) -> Result<Vec<Record>, DnsError> {
        DnsUpdateClient::axfr(self).await
    }

    async fn check_zone(&self) -> Result<(), DnsError> {
        DnsUpdateClient::check_zone(self).await
    }
}

/// Catalog chunk storage on top of dynamic updates.
///
/// Chunk `N` lives at `_dnsweaver-catalog-N.<zone>`. An empty chunk (the
/// sentinel) is stored as a single empty character-string, since a TXT record
/// cannot have zero segments on the wire.
pub struct DnsChunkStore<C = DnsUpdateClient> {
    client: C,
}

impl<C: ZoneClient> DnsChunkStore<C> {
    fn chunk_name(&self, index: usize) -> String {
        format!("{CATALOG_PREFIX}{index}.{}", self.client.zone())
    }

    fn to_wire(hostnames: &[String]) -> Vec<String> {
        if hostnames.is_empty() {
            vec![String::new()]
        } else {
            hostnames.to_vec()
        }
    }
}

#[async_trait]
impl<C: ZoneClient> ChunkStore for DnsChunkStore<C> {
    async fn read(&self, index: usize) -> Result<Option<Vec<String>>, DnsError> {
        let segments = self.client.query_txt_segments(&self.chunk_name(index)).await?;
        Ok(segments.map(|segs| segs.into_iter().filter(|s| !s.is_empty()).collect()))
    }

    async fn write(
        &self,
        index: usize,
        previous: Option<&[String]>,
        hostnames: &[String],
    ) -> Result<(), DnsError> {
        let name = self.chunk_name(index);
        let replacement = Self::to_wire(hostnames);
        match previous {
            None => {
                self.client
                    .create_txt(&name, &replacement, TXT_RECORD_TTL_SECS)
                    .await
            }
            Some(current) => {
                self.client
                    .swap_txt(&name, &Self::to_wire(current), &replacement, TXT_RECORD_TTL_SECS)
                    .await
            }
        }
    }

    async fn remove(&self, index: usize) -> Result<(), DnsError> {
        self.client
            .delete_rrset(&self.chunk_name(index), RecordType::Txt)
            .await
    }
}

/// Dynamic-update backend for one zone on one server.
pub struct Rfc2136Provider<C: ZoneClient = DnsUpdateClient> {
    client: C,
    catalog: HostnameCatalog<DnsChunkStore<C>>,
    allow_axfr: bool,
}

impl<C: ZoneClient + Clone> Rfc2136Provider<C> {
    /// Build a provider over an update client.
    #[must_use]
    pub fn new(client: C, allow_axfr: bool) -> Self {
        let catalog = HostnameCatalog::new(DnsChunkStore {
            client: client.clone(),
        });
        Self {
            client,
            catalog,
            allow_axfr,
        }
    }

    /// The catalog tracking this zone's managed hostnames.
    #[must_use]
    pub fn catalog(&self) -> &HostnameCatalog<DnsChunkStore<C>> {
        &self.catalog
    }

    /// Whether a record name belongs to the catalog namespace.
    fn is_catalog_name(hostname: &str) -> bool {
        hostname.starts_with(CATALOG_PREFIX)
    }

    /// Whether a record name is an ownership marker.
    fn is_marker_name(hostname: &str) -> bool {
        hostname.starts_with(OWNERSHIP_PREFIX)
    }

    /// Hostnames that participate in the catalog: primary records only,
    /// never markers or the catalog chunks themselves.
    fn catalogued(record: &Record) -> bool {
        !matches!(record.record_type, RecordType::Txt)
            && !Self::is_catalog_name(&record.hostname)
            && !Self::is_marker_name(&record.hostname)
    }

    /// Enumerate through the catalog: each catalogued hostname is resolved
    /// for primary records, plus its ownership marker when present.
    async fn list_via_catalog(&self) -> Result<Vec<Record>, DnsError> {
        let mut records = Vec::new();
        for hostname in self.catalog.hostnames().await? {
            for record_type in [RecordType::A, RecordType::Cname, RecordType::Srv] {
                records.extend(self.client.query(&hostname, record_type).await?);
            }
            let marker = format!("{OWNERSHIP_PREFIX}{hostname}");
            records.extend(self.client.query(&marker, RecordType::Txt).await?);
        }
        Ok(records)
    }
}

#[async_trait]
impl<C: ZoneClient + Clone> DnsProvider for Rfc2136Provider<C> {
    fn kind(&self) -> &'static str {
        "rfc2136"
    }

    async fn ping(&self) -> Result<(), DnsError> {
        self.client.check_zone().await
    }

    async fn list(&self) -> Result<Vec<Record>, DnsError> {
        if self.allow_axfr {
            match self.client.axfr().await {
                Ok(records) => {
                    return Ok(records
                        .into_iter()
                        .filter(|r| !Self::is_catalog_name(&r.hostname))
                        .collect())
                }
                Err(e) => {
                    warn!(
                        server = %self.client.endpoint(),
                        error = %e,
                        "AXFR failed, falling back to catalog enumeration"
                    );
                }
            }
        }
        self.list_via_catalog().await
    }

    async fn create(&self, record: &Record) -> Result<(), DnsError> {
        // The server-side append of an identical record is a no-op, but a
        // same-name different-target record must surface as a conflict, so
        // look before writing.
        let existing = self.client.query(&record.hostname, record.record_type).await?;
        if existing.iter().any(|r| r == record) {
            debug!(record = %record, "record already present, skipping update");
        } else if let Some(other) = existing.first() {
            return Err(DnsError::AlreadyExists {
                hostname: record.hostname.clone(),
                existing: other.target.clone(),
            });
        } else {
            self.client.append(record).await?;
        }

        if Self::catalogued(record) {
            self.catalog.add(&record.hostname).await?;
        }
        Ok(())
    }

    async fn delete(&self, record: &Record) -> Result<(), DnsError> {
        self.client.delete(record).await?;
        if Self::catalogued(record) {
            self.catalog.remove(&record.hostname).await?;
        }
        Ok(())
    }

    async fn update(&self, existing: &Record, desired: &Record) -> Result<(), DnsError> {
        self.client
            .delete_rrset(&existing.hostname, existing.record_type)
            .await?;
        self.client.append(desired).await?;
        if Self::catalogued(desired) {
            self.catalog.add(&desired.hostname).await?;
        }
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_ownership_txt: true,
            supports_native_update: true,
            record_types: vec![
                RecordType::A,
                RecordType::Cname,
                RecordType::Txt,
                RecordType::Srv,
            ],
        }
    }
}

#[cfg(test)]
#[path = "rfc2136_tests.rs"]
mod rfc2136_tests;
