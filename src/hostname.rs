// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hostname normalization and validation.
//!
//! Every hostname produced by a source passes through [`normalize`] before it
//! enters the reconciler. The canonical internal form is lowercase with no
//! trailing dot; providers re-qualify names as needed for their wire formats.

use crate::constants::MAX_HOSTNAME_BYTES;
use crate::dns_errors::DnsError;

/// Normalize a raw hostname into its canonical internal form.
///
/// Lowercases the name, strips a single trailing dot, and validates the
/// result: non-empty, at most 253 bytes, at least one label, no empty labels,
/// no embedded whitespace.
///
/// Normalization is idempotent: `normalize(&normalize(h)?) == normalize(h)`.
///
/// # Errors
///
/// Returns [`DnsError::Validation`] when the name cannot be used as a DNS
/// owner name.
pub fn normalize(raw: &str) -> Result<String, DnsError> {
    let trimmed = raw.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let name = lowered.strip_suffix('.').unwrap_or(&lowered);

    if name.is_empty() {
        return Err(DnsError::Validation {
            hostname: raw.to_string(),
            reason: "hostname is empty".to_string(),
        });
    }
    if name.len() > MAX_HOSTNAME_BYTES {
        return Err(DnsError::Validation {
            hostname: raw.to_string(),
            reason: format!(
                "hostname is {} bytes, maximum is {MAX_HOSTNAME_BYTES}",
                name.len()
            ),
        });
    }
    if name.chars().any(char::is_whitespace) {
        return Err(DnsError::Validation {
            hostname: raw.to_string(),
            reason: "hostname contains whitespace".to_string(),
        });
    }
    if name.split('.').any(str::is_empty) {
        return Err(DnsError::Validation {
            hostname: raw.to_string(),
            reason: "hostname contains an empty label".to_string(),
        });
    }

    Ok(name.to_string())
}

/// Whether `name` equals `suffix` or ends with `.suffix`, case-insensitively.
///
/// Both arguments are compared in normalized form (no trailing dots). Used
/// for zone-containment checks and matcher shortcuts.
#[must_use]
pub fn is_within(name: &str, suffix: &str) -> bool {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    let suffix = suffix.trim_end_matches('.').to_ascii_lowercase();
    name == suffix || name.ends_with(&format!(".{suffix}"))
}

#[cfg(test)]
#[path = "hostname_tests.rs"]
mod hostname_tests;
