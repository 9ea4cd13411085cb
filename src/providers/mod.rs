// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider adapters: uniform CRUD over heterogeneous DNS backends.
//!
//! Every backend implements [`DnsProvider`], a fixed capability set of
//! `ping`/`list`/`create`/`delete` plus optional `update`. Adapters are
//! idempotent by contract: creating a record that already exists with
//! identical content succeeds, deleting a missing record succeeds, and an
//! existing record with a *different* target surfaces as
//! [`DnsError::AlreadyExists`] so the reconciler can decide to update.
//!
//! A configured backend plus its matcher, record template, and operational
//! mode is a [`ProviderInstance`]; the [`manager`] tracks which instances are
//! ready and retries the rest in the background.

pub mod hostsfile;
pub mod manager;
pub mod restapi;
pub mod rfc2136;
pub mod sshfile;
pub mod webhook;

use crate::dns_errors::DnsError;
use crate::matcher::DomainMatcher;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;

/// DNS record types handled by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// Canonical name record
    #[serde(rename = "CNAME")]
    Cname,
    /// Text record (ownership markers, catalog chunks)
    #[serde(rename = "TXT")]
    Txt,
    /// Service locator record
    #[serde(rename = "SRV")]
    Srv,
}

impl RecordType {
    /// Uppercase wire-style name of the record type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Cname => "CNAME",
            Self::Txt => "TXT",
            Self::Srv => "SRV",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "CNAME" => Ok(Self::Cname),
            "TXT" => Ok(Self::Txt),
            "SRV" => Ok(Self::Srv),
            other => Err(DnsError::ConfigInvalid {
                reason: format!("unsupported record type '{other}'"),
            }),
        }
    }
}

/// Priority/weight/port tuple carried by SRV records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvData {
    /// Priority of the target host (lower is higher priority)
    pub priority: u16,
    /// Relative weight for records with the same priority
    pub weight: u16,
    /// TCP or UDP port on which the service is found
    pub port: u16,
}

/// A single DNS record as seen by a provider.
///
/// Equality ignores the backend-specific identifier; SRV records additionally
/// compare their priority/weight/port tuple. Targets compare with DNS name
/// semantics (case-insensitive, trailing dot stripped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Owner name in normalized form (lowercase, no trailing dot)
    pub hostname: String,
    /// Record type
    pub record_type: RecordType,
    /// Record data: IPv4 address for A, target name for CNAME/SRV, value for TXT
    pub target: String,
    /// Time to live in seconds
    pub ttl: u32,
    /// Opaque backend identifier (REST record id, file line number), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// SRV tuple, present only for SRV records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srv: Option<SrvData>,
}

impl Record {
    /// Construct a record with no backend identifier or SRV data.
    #[must_use]
    pub fn new(hostname: &str, record_type: RecordType, target: &str, ttl: u32) -> Self {
        Self {
            hostname: hostname.to_string(),
            record_type,
            target: target.to_string(),
            ttl,
            id: None,
            srv: None,
        }
    }

    fn canonical_target(&self) -> String {
        self.target.trim_end_matches('.').to_ascii_lowercase()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.hostname == other.hostname
            && self.record_type == other.record_type
            && self.canonical_target() == other.canonical_target()
            && self.ttl == other.ttl
            && (self.record_type != RecordType::Srv || self.srv == other.srv)
    }
}

impl Eq for Record {}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} (ttl {})",
            self.hostname, self.record_type, self.target, self.ttl
        )
    }
}

/// What a backend can and cannot do.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Whether the backend can store TXT ownership markers
    pub supports_ownership_txt: bool,
    /// Whether the backend implements an in-place `update`
    pub supports_native_update: bool,
    /// Record types the backend accepts
    pub record_types: Vec<RecordType>,
}

impl Capabilities {
    /// Whether the backend accepts records of the given type.
    #[must_use]
    pub fn supports_type(&self, record_type: RecordType) -> bool {
        self.record_types.contains(&record_type)
    }
}

/// Operational mode of a provider instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    /// Only touch records this system created (ownership markers required)
    #[default]
    Managed,
    /// The matcher is authoritative: sweep anything it admits that is not desired
    Authoritative,
    /// Create records, never delete anything
    Additive,
}

impl FromStr for ProviderMode {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "managed" => Ok(Self::Managed),
            "authoritative" => Ok(Self::Authoritative),
            "additive" => Ok(Self::Additive),
            other => Err(DnsError::ConfigInvalid {
                reason: format!("unknown provider mode '{other}'"),
            }),
        }
    }
}

/// Uniform asynchronous contract implemented by every DNS backend.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Short type tag of the backend ("rfc2136", "webhook", ...).
    fn kind(&self) -> &'static str;

    /// Cheap connectivity/credential check.
    async fn ping(&self) -> Result<(), DnsError>;

    /// Enumerate the records the backend currently holds.
    async fn list(&self) -> Result<Vec<Record>, DnsError>;

    /// Create a record. Creating an identical record again is a no-op;
    /// an existing record with a different target is [`DnsError::AlreadyExists`].
    async fn create(&self, record: &Record) -> Result<(), DnsError>;

    /// Delete a record. Deleting a missing record is a no-op.
    async fn delete(&self, record: &Record) -> Result<(), DnsError>;

    /// Replace `existing` with `desired` in place.
    ///
    /// Only meaningful when `capabilities().supports_native_update`; the
    /// default implementation refuses.
    async fn update(&self, existing: &Record, desired: &Record) -> Result<(), DnsError> {
        let _ = (existing, desired);
        Err(DnsError::NotSupported {
            provider: self.kind().to_string(),
            operation: "update".to_string(),
        })
    }

    /// Capability flags for this backend.
    fn capabilities(&self) -> Capabilities;
}

/// A configured backend instance: adapter plus routing and record template.
#[derive(Clone)]
pub struct ProviderInstance {
    /// Unique instance name from configuration
    pub name: String,
    /// Membership predicate for hostnames
    pub matcher: DomainMatcher,
    /// Record type this instance writes (A or CNAME)
    pub record_type: RecordType,
    /// Record target: IPv4 address for A instances, hostname for CNAME
    pub target: String,
    /// Default TTL for created records
    pub ttl: u32,
    /// Deletion policy
    pub mode: ProviderMode,
    /// The backend adapter
    pub adapter: Arc<dyn DnsProvider>,
}

impl ProviderInstance {
    /// The record this instance intends to publish for `hostname`.
    #[must_use]
    pub fn desired_record(&self, hostname: &str) -> Record {
        Record::new(hostname, self.record_type, &self.target, self.ttl)
    }
}

impl fmt::Debug for ProviderInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderInstance")
            .field("name", &self.name)
            .field("kind", &self.adapter.kind())
            .field("record_type", &self.record_type)
            .field("target", &self.target)
            .field("ttl", &self.ttl)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Check that an instance's target agrees with its record type.
///
/// A instances need an IPv4 address, CNAME instances need a hostname.
///
/// # Errors
///
/// Returns [`DnsError::ConfigInvalid`] on a mismatch or an unsupported
/// instance record type.
pub fn validate_target(record_type: RecordType, target: &str) -> Result<(), DnsError> {
    match record_type {
        RecordType::A => {
            Ipv4Addr::from_str(target).map_err(|_| DnsError::ConfigInvalid {
                reason: format!("A record target '{target}' is not an IPv4 address"),
            })?;
        }
        RecordType::Cname => {
            crate::hostname::normalize(target).map_err(|_| DnsError::ConfigInvalid {
                reason: format!("CNAME record target '{target}' is not a valid hostname"),
            })?;
            if Ipv4Addr::from_str(target).is_ok() {
                return Err(DnsError::ConfigInvalid {
                    reason: format!("CNAME record target '{target}' must be a hostname, not an IP"),
                });
            }
        }
        RecordType::Txt | RecordType::Srv => {
            return Err(DnsError::ConfigInvalid {
                reason: format!("instances cannot be configured with record type {record_type}"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
