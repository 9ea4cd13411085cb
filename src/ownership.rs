// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ownership markers: TXT records proving a hostname is managed here.
//!
//! A managed record `h` in a provider is identified by the co-presence of the
//! primary record and `_dnsweaver.h` TXT = `heritage=dnsweaver` in the same
//! backend. Orphan cleanup refuses to delete records whose marker is absent,
//! which protects foreign records that merely match an instance's domains.
//!
//! Markers are ordinary TXT records created and deleted through the normal
//! provider contract; this module only knows the naming scheme.

use crate::constants::{OWNERSHIP_PREFIX, OWNERSHIP_VALUE, TXT_RECORD_TTL_SECS};
use crate::providers::{Record, RecordType};

/// The marker owner name for `hostname`.
#[must_use]
pub fn marker_name(hostname: &str) -> String {
    format!("{OWNERSHIP_PREFIX}{hostname}")
}

/// The TXT record asserting ownership of `hostname`.
#[must_use]
pub fn marker_record(hostname: &str) -> Record {
    Record::new(
        &marker_name(hostname),
        RecordType::Txt,
        OWNERSHIP_VALUE,
        TXT_RECORD_TTL_SECS,
    )
}

/// If `record` is an ownership marker, the hostname it marks.
#[must_use]
pub fn marked_hostname(record: &Record) -> Option<String> {
    if record.record_type != RecordType::Txt {
        return None;
    }
    if record.target.trim() != OWNERSHIP_VALUE {
        return None;
    }
    record
        .hostname
        .strip_prefix(OWNERSHIP_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
#[path = "ownership_tests.rs"]
mod ownership_tests;
