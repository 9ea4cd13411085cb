// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Chunked TXT hostname catalog for zones that refuse transfers.
//!
//! Servers commonly forbid AXFR, which leaves no way to enumerate the
//! hostnames this system manages in a zone. The catalog emulates enumeration
//! with plain TXT records: `_dnsweaver-catalog-0.<zone>`,
//! `_dnsweaver-catalog-1.<zone>`, ... where each record's character-string
//! segments are hostnames. Readers query indices 0, 1, 2, ... and stop at the
//! first missing index, so writers must keep the numbering dense.
//!
//! Invariants maintained here:
//! - chunk 0 always exists after a successful operation (sentinel, kept even
//!   when empty);
//! - no chunk holds more than [`CATALOG_MAX_CHUNK_HOSTNAMES`] names or more
//!   than [`CATALOG_MAX_CHUNK_BYTES`] of segment payload;
//! - deleting a middle chunk triggers a compaction so no gap is left behind;
//! - a failed write rolls the in-memory view back (state is reloaded on the
//!   next operation).
//!
//! Chunk writes go through [`ChunkStore`], whose DNS implementation performs
//! each replacement as a single UPDATE message.

use crate::constants::{CATALOG_MAX_CHUNK_BYTES, CATALOG_MAX_CHUNK_HOSTNAMES, MAX_HOSTNAME_BYTES};
use crate::dns_errors::DnsError;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Storage abstraction for catalog chunks.
///
/// Implemented over RFC 2136 for real zones and over a hash map in tests.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Read the hostnames of chunk `index`; `None` when the chunk is absent.
    async fn read(&self, index: usize) -> Result<Option<Vec<String>>, DnsError>;

    /// Atomically replace chunk `index` with `hostnames`.
    ///
    /// `previous` carries the expected current contents (`None` asserts the
    /// chunk does not exist yet) so the store can reject interleaved writers.
    async fn write(
        &self,
        index: usize,
        previous: Option<&[String]>,
        hostnames: &[String],
    ) -> Result<(), DnsError>;

    /// Delete chunk `index` entirely.
    async fn remove(&self, index: usize) -> Result<(), DnsError>;
}

#[derive(Debug, Clone, Default)]
struct Chunk {
    hostnames: Vec<String>,
}

impl Chunk {
    /// Segment payload of this chunk: each hostname costs its length plus
    /// one length byte.
    fn byte_size(&self) -> usize {
        self.hostnames.iter().map(|h| h.len() + 1).sum()
    }

    fn fits(&self, hostname: &str) -> bool {
        self.hostnames.len() < CATALOG_MAX_CHUNK_HOSTNAMES
            && self.byte_size() + hostname.len() + 1 <= CATALOG_MAX_CHUNK_BYTES
    }
}

/// In-memory view of the catalog plus its backing store.
///
/// All operations serialize behind one mutex; the dense-chunk invariant does
/// not survive interleaved writers within a zone. A `None` state means the
/// view is not loaded (startup, or rolled back after a failed write) and is
/// re-read from the store on the next operation.
pub struct HostnameCatalog<S> {
    store: S,
    state: Mutex<Option<Vec<Chunk>>>,
}

impl<S: ChunkStore> HostnameCatalog<S> {
    /// Wrap a chunk store. Nothing is read until the first operation.
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: Mutex::new(None),
        }
    }

    /// Add a hostname to the catalog. Returns `false` when it was already
    /// present.
    ///
    /// The name goes into the lowest-indexed chunk with room for it, or a new
    /// trailing chunk when none fits.
    ///
    /// # Errors
    ///
    /// [`DnsError::Validation`] for names over 253 bytes; store errors
    /// otherwise. On a store error the in-memory view is invalidated and
    /// reloaded by the next operation.
    pub async fn add(&self, hostname: &str) -> Result<bool, DnsError> {
        if hostname.len() > MAX_HOSTNAME_BYTES {
            return Err(DnsError::Validation {
                hostname: hostname.to_string(),
                reason: format!(
                    "hostname is {} bytes, catalog limit is {MAX_HOSTNAME_BYTES}",
                    hostname.len()
                ),
            });
        }

        let mut guard = self.state.lock().await;
        let mut chunks = self.take_loaded(&mut guard).await?;

        if chunks.iter().any(|c| c.hostnames.iter().any(|h| h == hostname)) {
            *guard = Some(chunks);
            return Ok(false);
        }

        // Lowest-indexed chunk that can absorb the name, else a new chunk.
        // A brand-new catalog writes its first name straight into chunk 0,
        // which doubles as the sentinel.
        let target = chunks.iter().position(|c| c.fits(hostname));
        let (index, previous) = match target {
            Some(i) => (i, Some(chunks[i].hostnames.clone())),
            None => (chunks.len(), None),
        };
        let mut updated = match target {
            Some(i) => chunks[i].clone(),
            None => Chunk::default(),
        };
        updated.hostnames.push(hostname.to_string());
        updated.hostnames.sort();

        match self
            .store
            .write(index, previous.as_deref(), &updated.hostnames)
            .await
        {
            Ok(()) => {}
            Err(e) => {
                warn!(index, error = %e, "catalog chunk write failed, rolling back local state");
                return Err(e);
            }
        }

        if index == chunks.len() {
            chunks.push(updated);
        } else {
            chunks[index] = updated;
        }
        debug!(hostname, chunk = index, "hostname added to catalog");
        *guard = Some(chunks);
        Ok(true)
    }

    /// Remove a hostname from the catalog. Returns `false` when it was not
    /// present.
    ///
    /// A chunk left empty by the removal is deleted unless it is chunk 0,
    /// which is retained (empty) as the sentinel. Deleting a middle chunk
    /// would leave a hole that hides later chunks from readers, so the
    /// catalog is compacted in that case before the lock is released.
    ///
    /// # Errors
    ///
    /// Store errors; the in-memory view is invalidated on failure.
    pub async fn remove(&self, hostname: &str) -> Result<bool, DnsError> {
        let mut guard = self.state.lock().await;
        let mut chunks = self.take_loaded(&mut guard).await?;

        let Some(index) = chunks
            .iter()
            .position(|c| c.hostnames.iter().any(|h| h == hostname))
        else {
            *guard = Some(chunks);
            return Ok(false);
        };

        let previous = chunks[index].hostnames.clone();
        let mut updated = chunks[index].clone();
        updated.hostnames.retain(|h| h != hostname);

        if updated.hostnames.is_empty() && index > 0 {
            match self.store.remove(index).await {
                Ok(()) => {}
                Err(e) => {
                    warn!(index, error = %e, "catalog chunk delete failed, rolling back local state");
                    return Err(e);
                }
            }
            chunks.remove(index);
            debug!(hostname, chunk = index, "catalog chunk emptied and deleted");

            // Removing anything but the trailing chunk leaves a hole in the
            // numbering; rebuild densely before anyone enumerates.
            if index < chunks.len() {
                let rebuilt = self.rewrite(chunks).await?;
                *guard = Some(rebuilt);
            } else {
                *guard = Some(chunks);
            }
            return Ok(true);
        }

        match self
            .store
            .write(index, Some(&previous), &updated.hostnames)
            .await
        {
            Ok(()) => {}
            Err(e) => {
                warn!(index, error = %e, "catalog chunk write failed, rolling back local state");
                return Err(e);
            }
        }
        chunks[index] = updated;
        debug!(hostname, chunk = index, "hostname removed from catalog");
        *guard = Some(chunks);
        Ok(true)
    }

    /// All hostnames in the catalog, sorted, each exactly once.
    ///
    /// # Errors
    ///
    /// Store errors during the initial load.
    pub async fn hostnames(&self) -> Result<Vec<String>, DnsError> {
        let mut guard = self.state.lock().await;
        let chunks = self.take_loaded(&mut guard).await?;
        let all = collect_sorted(&chunks);
        *guard = Some(chunks);
        Ok(all)
    }

    /// Whether the catalog contains `hostname`.
    ///
    /// # Errors
    ///
    /// Store errors during the initial load.
    pub async fn contains(&self, hostname: &str) -> Result<bool, DnsError> {
        let mut guard = self.state.lock().await;
        let chunks = self.take_loaded(&mut guard).await?;
        let found = chunks
            .iter()
            .any(|c| c.hostnames.iter().any(|h| h == hostname));
        *guard = Some(chunks);
        Ok(found)
    }

    /// Number of chunks currently present (including the sentinel).
    ///
    /// # Errors
    ///
    /// Store errors during the initial load.
    pub async fn chunk_count(&self) -> Result<usize, DnsError> {
        let mut guard = self.state.lock().await;
        let chunks = self.take_loaded(&mut guard).await?;
        let count = chunks.len();
        *guard = Some(chunks);
        Ok(count)
    }

    /// Rebuild every chunk from the sorted hostname union, restoring dense
    /// numbering and tight packing.
    ///
    /// # Errors
    ///
    /// Store errors; the in-memory view is invalidated on failure.
    pub async fn compact(&self) -> Result<(), DnsError> {
        let mut guard = self.state.lock().await;
        let chunks = self.take_loaded(&mut guard).await?;
        let rebuilt = self.rewrite(chunks).await?;
        *guard = Some(rebuilt);
        Ok(())
    }

    /// Drop the in-memory view; the next operation reloads from the store.
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
    }

    /// Take the loaded view out of the guard, reading it from the store
    /// first when absent. The caller must put the view back on success;
    /// returning early on error leaves the state invalidated.
    async fn take_loaded(
        &self,
        guard: &mut Option<Vec<Chunk>>,
    ) -> Result<Vec<Chunk>, DnsError> {
        if let Some(chunks) = guard.take() {
            return Ok(chunks);
        }
        let mut chunks = Vec::new();
        // Sequential scan; the first missing index ends the catalog.
        loop {
            match self.store.read(chunks.len()).await? {
                Some(hostnames) => chunks.push(Chunk { hostnames }),
                None => break,
            }
        }
        debug!(chunks = chunks.len(), "catalog loaded");
        Ok(chunks)
    }

    /// Write a fresh dense partition of the hostnames in `old`, deleting
    /// surplus trailing chunks left over from the previous layout.
    async fn rewrite(&self, old: Vec<Chunk>) -> Result<Vec<Chunk>, DnsError> {
        let hostnames = collect_sorted(&old);

        let mut fresh: Vec<Chunk> = vec![Chunk::default()];
        for hostname in hostnames {
            if !fresh.last().expect("non-empty").fits(&hostname) {
                fresh.push(Chunk::default());
            }
            fresh.last_mut().expect("non-empty").hostnames.push(hostname);
        }

        for (index, chunk) in fresh.iter().enumerate() {
            let previous = old.get(index).map(|c| c.hostnames.clone());
            match self
                .store
                .write(index, previous.as_deref(), &chunk.hostnames)
                .await
            {
                Ok(()) => {}
                Err(e) => {
                    warn!(index, error = %e, "catalog rewrite failed, rolling back local state");
                    return Err(e);
                }
            }
        }
        for index in fresh.len()..old.len() {
            match self.store.remove(index).await {
                Ok(()) => {}
                Err(e) => {
                    warn!(index, error = %e, "catalog chunk cleanup failed, rolling back local state");
                    return Err(e);
                }
            }
        }

        debug!(chunks = fresh.len(), "catalog compacted");
        Ok(fresh)
    }
}

fn collect_sorted(chunks: &[Chunk]) -> Vec<String> {
    let mut all: Vec<String> = chunks.iter().flat_map(|c| c.hostnames.clone()).collect();
    all.sort();
    all.dedup();
    all
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod catalog_tests;
