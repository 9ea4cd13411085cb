// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for dnsweaver DNS and provider operations.
//!
//! This module provides the error taxonomy shared by all provider backends
//! and the reconciler:
//! - Configuration validation failures (fatal at load)
//! - Transient backend failures (timeouts, 5xx, refused connections)
//! - Authentication failures (TSIG mismatch, rejected tokens)
//! - Conflicts ("already exists" / "does not exist"), which the reconciler
//!   reclassifies rather than surfacing as errors
//! - Per-action validation failures
//! - Whole-provider unavailability within a reconcile pass
//!
//! These errors provide structured error handling for DNS operations,
//! enabling better error reporting in logs and metrics.

use thiserror::Error;

/// Errors surfaced by provider adapters and the RFC 2136 client.
///
/// The variants mirror how the reconciler reacts to a failure: transient
/// errors are retried, conflicts are reclassified, validation failures abort
/// only the offending action, and unavailability suppresses destructive
/// operations for the rest of the pass.
#[derive(Error, Debug, Clone)]
pub enum DnsError {
    /// Invalid configuration detected at load time.
    ///
    /// Always fatal: the process refuses to start with a broken provider or
    /// matcher definition rather than reconciling with partial state.
    #[error("invalid configuration: {reason}")]
    ConfigInvalid {
        /// Explanation of what is invalid
        reason: String,
    },

    /// Transient backend failure (network timeout, 5xx, connection refused).
    ///
    /// Retried by the provider manager's backoff loop and safe to re-attempt
    /// on the next reconcile pass.
    #[error("transient failure talking to {endpoint}: {reason}")]
    Transient {
        /// The backend endpoint that failed
        endpoint: String,
        /// Specific reason for the failure
        reason: String,
    },

    /// Authentication rejected by the backend (TSIG mismatch, bad token).
    ///
    /// Not retried within a pass; surfaced through readiness and re-attempted
    /// on the next reconcile.
    #[error("authentication failed for {endpoint}: {reason}")]
    Auth {
        /// The backend endpoint that rejected the credentials
        endpoint: String,
        /// Specific reason for the rejection
        reason: String,
    },

    /// The record already exists with a different target.
    ///
    /// Distinct from other failures so the reconciler can choose to update
    /// instead of create.
    #[error("record '{hostname}' already exists with target '{existing}'")]
    AlreadyExists {
        /// The hostname in conflict
        hostname: String,
        /// The target currently stored by the backend
        existing: String,
    },

    /// The record was expected to exist but does not.
    ///
    /// Treated as success on deletion paths (idempotent delete).
    #[error("record '{hostname}' does not exist")]
    NotFound {
        /// The hostname that was not found
        hostname: String,
    },

    /// Record data failed validation before any request was sent.
    ///
    /// This includes over-long hostnames, names outside the configured zone,
    /// and target/record-type mismatches. Fatal for the action only.
    #[error("invalid record data for '{hostname}': {reason}")]
    Validation {
        /// The hostname with invalid data
        hostname: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// The provider failed its `list` call at the start of a pass.
    ///
    /// Destructive operations against this provider are suppressed for the
    /// remainder of the pass.
    #[error("provider '{provider}' unavailable this pass: {reason}")]
    Unavailable {
        /// The provider instance name
        provider: String,
        /// Why the listing failed
        reason: String,
    },

    /// The adapter does not implement the requested operation.
    #[error("provider '{provider}' does not support {operation}")]
    NotSupported {
        /// The provider instance name
        provider: String,
        /// The unsupported operation
        operation: String,
    },
}

impl DnsError {
    /// Returns true if this error is transient and the operation should be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Unavailable { .. })
    }

    /// Returns true if this error is a conflict the reconciler reclassifies
    /// instead of reporting.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. } | Self::NotFound { .. })
    }

    /// Returns the metrics/status label for this error.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConfigInvalid { .. } => "config_invalid",
            Self::Transient { .. } => "transient",
            Self::Auth { .. } => "auth_failure",
            Self::AlreadyExists { .. } => "already_exists",
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation",
            Self::Unavailable { .. } => "unavailable",
            Self::NotSupported { .. } => "not_supported",
        }
    }

    /// Classify a reqwest error against the endpoint it targeted.
    ///
    /// Connection problems and timeouts map to [`DnsError::Transient`];
    /// everything else is reported verbatim as transient too, since the HTTP
    /// layer cannot distinguish further without a status code.
    #[must_use]
    pub fn from_http(endpoint: &str, err: &reqwest::Error) -> Self {
        Self::Transient {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        }
    }

    /// Classify an HTTP status code returned by a backend.
    ///
    /// `401`/`403` are authentication failures, `409` is a conflict (the
    /// caller supplies the hostname), `429` and 5xx are transient.
    #[must_use]
    pub fn from_status(endpoint: &str, hostname: &str, status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::Auth {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {status}: {body}"),
            },
            404 => Self::NotFound {
                hostname: hostname.to_string(),
            },
            409 => Self::AlreadyExists {
                hostname: hostname.to_string(),
                existing: body.to_string(),
            },
            _ => Self::Transient {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {status}: {body}"),
            },
        }
    }
}

#[cfg(test)]
#[path = "dns_errors_tests.rs"]
mod dns_errors_tests;
