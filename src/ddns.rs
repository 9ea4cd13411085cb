// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Dynamic DNS update client (RFC 2136) with optional TSIG authentication.
//!
//! This module wraps the hickory sync client for a single zone on a single
//! server. All network calls run inside `tokio::task::spawn_blocking` since
//! the hickory client is synchronous. It provides:
//!
//! - Record creation via `append` (idempotent, no prerequisites)
//! - RRset creation via `create` (prerequisite: RRset must not exist)
//! - Atomic RRset replacement via `compare_and_swap` (prerequisite: current
//!   contents match; the update section deletes the RRset and inserts the
//!   replacement in one UPDATE message)
//! - Record and RRset deletion
//! - Queries and best-effort AXFR enumeration
//!
//! Every owner name is validated to be within the configured zone before a
//! message is sent.

use crate::constants::TSIG_FUDGE_TIME_SECS;
use crate::dns_errors::DnsError;
use crate::providers::{Record as WireRecord, RecordType as WireType, SrvData};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hickory_client::client::{Client, SyncClient};
use hickory_client::op::ResponseCode;
use hickory_client::rr::rdata;
use hickory_client::rr::rdata::tsig::TsigAlgorithm;
use hickory_client::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_client::tcp::TcpClientConnection;
use hickory_client::udp::UdpClientConnection;
use hickory_proto::rr::dnssec::tsig::TSigner;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use tracing::{debug, info};

/// TSIG HMAC algorithms supported for dynamic updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TsigAlgorithmKind {
    /// HMAC-SHA256 (RFC 8945 mandatory, the default)
    #[default]
    HmacSha256,
    /// HMAC-SHA512
    HmacSha512,
    /// HMAC-MD5 (legacy servers only)
    HmacMd5,
}

impl TsigAlgorithmKind {
    fn to_hickory(self) -> TsigAlgorithm {
        match self {
            Self::HmacSha256 => TsigAlgorithm::HmacSha256,
            Self::HmacSha512 => TsigAlgorithm::HmacSha512,
            Self::HmacMd5 => TsigAlgorithm::HmacMd5,
        }
    }
}

impl FromStr for TsigAlgorithmKind {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hmac-sha256" => Ok(Self::HmacSha256),
            "hmac-sha512" => Ok(Self::HmacSha512),
            "hmac-md5" => Ok(Self::HmacMd5),
            other => Err(DnsError::ConfigInvalid {
                reason: format!(
                    "unsupported TSIG algorithm '{other}'. Supported: hmac-sha256, hmac-sha512, hmac-md5"
                ),
            }),
        }
    }
}

/// TSIG key material for authenticating updates.
#[derive(Debug, Clone)]
pub struct TsigCredentials {
    /// Key name as configured on the server
    pub key_name: String,
    /// HMAC algorithm
    pub algorithm: TsigAlgorithmKind,
    /// Base64-encoded shared secret
    pub secret: String,
}

/// RFC 2136 client bound to one zone on one server.
#[derive(Debug, Clone)]
pub struct DnsUpdateClient {
    server: SocketAddr,
    zone: Name,
    zone_text: String,
    tsig: Option<TsigCredentials>,
}

impl DnsUpdateClient {
    /// Create a client for `zone` served at `server`.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::ConfigInvalid`] if the zone name does not parse.
    pub fn new(
        server: SocketAddr,
        zone: &str,
        tsig: Option<TsigCredentials>,
    ) -> Result<Self, DnsError> {
        let zone_text = zone.trim_end_matches('.').to_ascii_lowercase();
        let zone = Name::from_str(&format!("{zone_text}."))
            .map_err(|e| DnsError::ConfigInvalid {
                reason: format!("invalid zone name '{zone}': {e}"),
            })?;
        Ok(Self {
            server,
            zone,
            zone_text,
            tsig,
        })
    }

    /// The zone this client updates, in normalized form (no trailing dot).
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone_text
    }

    /// The server endpoint, for log and error attribution.
    #[must_use]
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Parse `hostname` and verify it lies within the configured zone.
    ///
    /// The check is a case-insensitive, FQDN-normalized suffix match.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Validation`] for unparseable names or names
    /// outside the zone.
    pub fn qualify(&self, hostname: &str) -> Result<Name, DnsError> {
        let fqdn = format!("{}.", hostname.trim_end_matches('.'));
        let name = Name::from_str(&fqdn).map_err(|e| DnsError::Validation {
            hostname: hostname.to_string(),
            reason: format!("invalid DNS name: {e}"),
        })?;
        if !self.zone.zone_of(&name) {
            return Err(DnsError::Validation {
                hostname: hostname.to_string(),
                reason: format!("name is outside zone '{}'", self.zone_text),
            });
        }
        Ok(name)
    }

    /// Add a record with no prerequisites (idempotent append).
    ///
    /// # Errors
    ///
    /// Returns an error when the name is outside the zone, the connection
    /// fails, or the server rejects the update.
    pub async fn append(&self, record: &WireRecord) -> Result<(), DnsError> {
        let name = self.qualify(&record.hostname)?;
        let wire = build_record(name, record)?;
        let this = self.clone();
        let hostname = record.hostname.clone();

        run_update(move || {
            let client = this.connect_udp()?;
            debug!(server = %this.server, record = %hostname, "sending RFC 2136 append");
            let response = client
                .append(wire, this.zone.clone(), false)
                .map_err(|e| client_error(&this.server.to_string(), &e))?;
            check_response(&this.server.to_string(), &hostname, response.response_code())
        })
        .await
    }

    /// Create an RRset that must not exist yet (single UPDATE with an
    /// NXRRSET prerequisite). [`DnsError::AlreadyExists`] when it does.
    ///
    /// # Errors
    ///
    /// See [`DnsUpdateClient::append`].
    pub async fn create(&self, record: &WireRecord) -> Result<(), DnsError> {
        let name = self.qualify(&record.hostname)?;
        let wire = build_record(name, record)?;
        let this = self.clone();
        let hostname = record.hostname.clone();

        run_update(move || {
            let client = this.connect_udp()?;
            debug!(server = %this.server, record = %hostname, "sending RFC 2136 create");
            let response = client
                .create(wire, this.zone.clone())
                .map_err(|e| client_error(&this.server.to_string(), &e))?;
            check_response(&this.server.to_string(), &hostname, response.response_code())
        })
        .await
    }

    /// Create a multi-segment TXT RRset that must not exist yet.
    ///
    /// Like [`DnsUpdateClient::create`] but carrying explicit character-string
    /// segments, as catalog chunks require.
    ///
    /// # Errors
    ///
    /// [`DnsError::AlreadyExists`] when the RRset exists; see
    /// [`DnsUpdateClient::append`] for the rest.
    pub async fn create_txt(
        &self,
        hostname: &str,
        segments: &[String],
        ttl: u32,
    ) -> Result<(), DnsError> {
        let name = self.qualify(hostname)?;
        let wire = txt_record(name, segments, ttl);
        let this = self.clone();
        let hostname = hostname.to_string();

        run_update(move || {
            let client = this.connect_udp()?;
            debug!(server = %this.server, record = %hostname, "sending RFC 2136 TXT create");
            let response = client
                .create(wire, this.zone.clone())
                .map_err(|e| client_error(&this.server.to_string(), &e))?;
            check_response(&this.server.to_string(), &hostname, response.response_code())
        })
        .await
    }

    /// Atomically replace a TXT RRset in one UPDATE message.
    ///
    /// The prerequisite section asserts the current segments, the update
    /// section deletes the RRset and inserts the replacement, so a concurrent
    /// writer cannot interleave. `current` must be what the server holds.
    ///
    /// # Errors
    ///
    /// [`DnsError::AlreadyExists`] or [`DnsError::NotFound`] when the
    /// prerequisite fails (the caller should reload and retry), transport and
    /// auth errors otherwise.
    pub async fn swap_txt(
        &self,
        hostname: &str,
        current: &[String],
        replacement: &[String],
        ttl: u32,
    ) -> Result<(), DnsError> {
        let name = self.qualify(hostname)?;
        let old = txt_record(name.clone(), current, ttl);
        let new = txt_record(name, replacement, ttl);
        let this = self.clone();
        let hostname = hostname.to_string();

        run_update(move || {
            let client = this.connect_udp()?;
            debug!(server = %this.server, record = %hostname, "sending RFC 2136 compare-and-swap");
            let response = client
                .compare_and_swap(old, new, this.zone.clone())
                .map_err(|e| client_error(&this.server.to_string(), &e))?;
            check_response(&this.server.to_string(), &hostname, response.response_code())
        })
        .await
    }

    /// Delete one record by exact rdata, leaving siblings in the RRset.
    ///
    /// Deleting a record that is not present is a successful no-op.
    ///
    /// # Errors
    ///
    /// See [`DnsUpdateClient::append`].
    pub async fn delete(&self, record: &WireRecord) -> Result<(), DnsError> {
        let name = self.qualify(&record.hostname)?;
        let wire = build_record(name, record)?;
        let this = self.clone();
        let hostname = record.hostname.clone();

        run_update(move || {
            let client = this.connect_udp()?;
            debug!(server = %this.server, record = %hostname, "sending RFC 2136 delete");
            let response = client
                .delete_by_rdata(wire, this.zone.clone())
                .map_err(|e| client_error(&this.server.to_string(), &e))?;
            check_response(&this.server.to_string(), &hostname, response.response_code())
        })
        .await
    }

    /// Delete every record of `record_type` at `hostname`.
    ///
    /// # Errors
    ///
    /// See [`DnsUpdateClient::append`].
    pub async fn delete_rrset(
        &self,
        hostname: &str,
        record_type: WireType,
    ) -> Result<(), DnsError> {
        let name = self.qualify(hostname)?;
        let rr_type = to_hickory_type(record_type);
        let this = self.clone();
        let hostname = hostname.to_string();

        run_update(move || {
            let client = this.connect_udp()?;
            let record = Record::with(name, rr_type, 0);
            debug!(server = %this.server, record = %hostname, "sending RFC 2136 delete-rrset");
            let response = client
                .delete_rrset(record, this.zone.clone())
                .map_err(|e| client_error(&this.server.to_string(), &e))?;
            check_response(&this.server.to_string(), &hostname, response.response_code())
        })
        .await
    }

    /// Query records of one type at a name. NXDOMAIN and empty answers both
    /// yield an empty vector.
    ///
    /// # Errors
    ///
    /// Transport and auth failures; never errors on absent names.
    pub async fn query(
        &self,
        hostname: &str,
        record_type: WireType,
    ) -> Result<Vec<WireRecord>, DnsError> {
        let name = self.qualify(hostname)?;
        let rr_type = to_hickory_type(record_type);
        let this = self.clone();
        let hostname = hostname.to_string();

        run_update(move || {
            let client = this.connect_udp()?;
            let response = client
                .query(&name, DNSClass::IN, rr_type)
                .map_err(|e| client_error(&this.server.to_string(), &e))?;
            match response.response_code() {
                ResponseCode::NoError => Ok(response
                    .answers()
                    .iter()
                    .filter_map(convert_record)
                    .collect()),
                ResponseCode::NXDomain => Ok(Vec::new()),
                code => Err(response_error(&this.server.to_string(), &hostname, code)),
            }
        })
        .await
    }

    /// Query the raw TXT character-string segments at a name.
    ///
    /// Returns `None` when no TXT record exists. Used by the catalog, which
    /// needs segment boundaries rather than a joined value.
    ///
    /// # Errors
    ///
    /// Transport and auth failures.
    pub async fn query_txt_segments(
        &self,
        hostname: &str,
    ) -> Result<Option<Vec<String>>, DnsError> {
        let name = self.qualify(hostname)?;
        let this = self.clone();
        let hostname = hostname.to_string();

        run_update(move || {
            let client = this.connect_udp()?;
            let response = client
                .query(&name, DNSClass::IN, RecordType::TXT)
                .map_err(|e| client_error(&this.server.to_string(), &e))?;
            match response.response_code() {
                ResponseCode::NXDomain => Ok(None),
                ResponseCode::NoError => {
                    let mut segments = Vec::new();
                    let mut found = false;
                    for answer in response.answers() {
                        if let Some(RData::TXT(txt)) = answer.data() {
                            found = true;
                            segments.extend(
                                txt.txt_data()
                                    .iter()
                                    .map(|s| String::from_utf8_lossy(s).into_owned()),
                            );
                        }
                    }
                    Ok(found.then_some(segments))
                }
                code => Err(response_error(&this.server.to_string(), &hostname, code)),
            }
        })
        .await
    }

    /// Enumerate the zone by AXFR over TCP.
    ///
    /// Many servers refuse zone transfers; callers fall back to the catalog
    /// when this returns an error.
    ///
    /// # Errors
    ///
    /// [`DnsError::Auth`] on REFUSED/NOTAUTH, transport errors otherwise.
    pub async fn axfr(&self) -> Result<Vec<WireRecord>, DnsError> {
        let this = self.clone();

        run_update(move || {
            let conn = TcpClientConnection::new(this.server).map_err(|e| DnsError::Transient {
                endpoint: this.server.to_string(),
                reason: format!("TCP connection failed: {e}"),
            })?;
            let client = match &this.tsig {
                Some(creds) => SyncClient::with_tsigner(conn, create_tsig_signer(creds)?),
                None => SyncClient::new(conn),
            };
            info!(server = %this.server, zone = %this.zone_text, "attempting AXFR");
            let response = client
                .query(&this.zone, DNSClass::IN, RecordType::AXFR)
                .map_err(|e| client_error(&this.server.to_string(), &e))?;
            check_response(&this.server.to_string(), &this.zone_text, response.response_code())?;
            Ok(response
                .answers()
                .iter()
                .filter_map(convert_record)
                .collect())
        })
        .await
    }

    /// Check server reachability by querying the zone SOA.
    ///
    /// # Errors
    ///
    /// Transport and auth failures; an NXDOMAIN answer also fails since the
    /// server does not serve the zone.
    pub async fn check_zone(&self) -> Result<(), DnsError> {
        let this = self.clone();

        run_update(move || {
            let client = this.connect_udp()?;
            let response = client
                .query(&this.zone, DNSClass::IN, RecordType::SOA)
                .map_err(|e| client_error(&this.server.to_string(), &e))?;
            match response.response_code() {
                ResponseCode::NoError => Ok(()),
                ResponseCode::NXDomain => Err(DnsError::ConfigInvalid {
                    reason: format!(
                        "server {} does not serve zone '{}'",
                        this.server, this.zone_text
                    ),
                }),
                code => check_response(&this.server.to_string(), &this.zone_text, code),
            }
        })
        .await
    }

    fn connect_udp(&self) -> Result<SyncClient<UdpClientConnection>, DnsError> {
        let conn = UdpClientConnection::new(self.server).map_err(|e| DnsError::Transient {
            endpoint: self.server.to_string(),
            reason: format!("UDP connection failed: {e}"),
        })?;
        Ok(match &self.tsig {
            Some(creds) => SyncClient::with_tsigner(conn, create_tsig_signer(creds)?),
            None => SyncClient::new(conn),
        })
    }
}

/// Run a blocking hickory operation on the blocking thread pool.
async fn run_update<T, F>(op: F) -> Result<T, DnsError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DnsError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| DnsError::Transient {
            endpoint: "local".to_string(),
            reason: format!("DNS update task failed: {e}"),
        })?
}

/// Create a TSIG signer from credentials.
fn create_tsig_signer(creds: &TsigCredentials) -> Result<TSigner, DnsError> {
    let key_bytes = BASE64.decode(&creds.secret).map_err(|e| DnsError::ConfigInvalid {
        reason: format!("TSIG secret for key '{}' is not valid base64: {e}", creds.key_name),
    })?;
    let key_name = Name::from_str(&creds.key_name).map_err(|e| DnsError::ConfigInvalid {
        reason: format!("invalid TSIG key name '{}': {e}", creds.key_name),
    })?;
    TSigner::new(
        key_bytes,
        creds.algorithm.to_hickory(),
        key_name,
        TSIG_FUDGE_TIME_SECS,
    )
    .map_err(|e| DnsError::ConfigInvalid {
        reason: format!("failed to create TSIG signer: {e}"),
    })
}

fn to_hickory_type(record_type: WireType) -> RecordType {
    match record_type {
        WireType::A => RecordType::A,
        WireType::Cname => RecordType::CNAME,
        WireType::Txt => RecordType::TXT,
        WireType::Srv => RecordType::SRV,
    }
}

/// Build a hickory record from the provider-layer representation.
fn build_record(name: Name, record: &WireRecord) -> Result<Record, DnsError> {
    let rdata = match record.record_type {
        WireType::A => {
            let addr = Ipv4Addr::from_str(&record.target).map_err(|_| DnsError::Validation {
                hostname: record.hostname.clone(),
                reason: format!("'{}' is not an IPv4 address", record.target),
            })?;
            RData::A(addr.into())
        }
        WireType::Cname => {
            let target = parse_target_name(record)?;
            RData::CNAME(rdata::CNAME(target))
        }
        WireType::Txt => RData::TXT(rdata::TXT::new(vec![record.target.clone()])),
        WireType::Srv => {
            let srv = record.srv.ok_or_else(|| DnsError::Validation {
                hostname: record.hostname.clone(),
                reason: "SRV record without priority/weight/port tuple".to_string(),
            })?;
            let target = parse_target_name(record)?;
            RData::SRV(rdata::SRV::new(srv.priority, srv.weight, srv.port, target))
        }
    };

    let mut wire = Record::from_rdata(name, record.ttl, rdata);
    wire.set_dns_class(DNSClass::IN);
    Ok(wire)
}

fn parse_target_name(record: &WireRecord) -> Result<Name, DnsError> {
    Name::from_str(&format!("{}.", record.target.trim_end_matches('.'))).map_err(|e| {
        DnsError::Validation {
            hostname: record.hostname.clone(),
            reason: format!("invalid target name '{}': {e}", record.target),
        }
    })
}

fn txt_record(name: Name, segments: &[String], ttl: u32) -> Record {
    let mut record = Record::from_rdata(name, ttl, RData::TXT(rdata::TXT::new(segments.to_vec())));
    record.set_dns_class(DNSClass::IN);
    record
}

/// Convert a hickory answer into the provider-layer representation.
///
/// Unhandled record types (SOA, NS, ...) are dropped.
fn convert_record(record: &Record) -> Option<WireRecord> {
    let hostname = crate::hostname::normalize(&record.name().to_utf8()).ok()?;
    let ttl = record.ttl();
    match record.data()? {
        RData::A(addr) => Some(WireRecord::new(&hostname, WireType::A, &addr.to_string(), ttl)),
        RData::CNAME(cname) => Some(WireRecord::new(
            &hostname,
            WireType::Cname,
            cname.0.to_utf8().trim_end_matches('.'),
            ttl,
        )),
        RData::TXT(txt) => {
            let value: String = txt
                .txt_data()
                .iter()
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect();
            Some(WireRecord::new(&hostname, WireType::Txt, &value, ttl))
        }
        RData::SRV(srv) => {
            let mut out = WireRecord::new(
                &hostname,
                WireType::Srv,
                srv.target().to_utf8().trim_end_matches('.'),
                ttl,
            );
            out.srv = Some(SrvData {
                priority: srv.priority(),
                weight: srv.weight(),
                port: srv.port(),
            });
            Some(out)
        }
        _ => None,
    }
}

fn client_error(server: &str, err: &hickory_client::error::ClientError) -> DnsError {
    DnsError::Transient {
        endpoint: server.to_string(),
        reason: err.to_string(),
    }
}

/// Map an UPDATE/QUERY response code onto the error taxonomy.
fn check_response(server: &str, hostname: &str, code: ResponseCode) -> Result<(), DnsError> {
    if code == ResponseCode::NoError {
        Ok(())
    } else {
        Err(response_error(server, hostname, code))
    }
}

fn response_error(server: &str, hostname: &str, code: ResponseCode) -> DnsError {
    match code {
        ResponseCode::Refused | ResponseCode::NotAuth => DnsError::Auth {
            endpoint: server.to_string(),
            reason: format!("server rejected the request: {code:?}"),
        },
        ResponseCode::YXRRSet | ResponseCode::YXDomain => DnsError::AlreadyExists {
            hostname: hostname.to_string(),
            existing: String::new(),
        },
        ResponseCode::NXRRSet => DnsError::NotFound {
            hostname: hostname.to_string(),
        },
        code => DnsError::Transient {
            endpoint: server.to_string(),
            reason: format!("DNS update failed with response code: {code:?}"),
        },
    }
}

#[cfg(test)]
#[path = "ddns_tests.rs"]
mod ddns_tests;
