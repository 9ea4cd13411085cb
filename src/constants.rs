// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the dnsweaver daemon.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Identity Constants
// ============================================================================

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "DNSWEAVER_";

/// TXT name prefix that marks a hostname as managed by this system
pub const OWNERSHIP_PREFIX: &str = "_dnsweaver.";

/// TXT value stored in an ownership marker record
pub const OWNERSHIP_VALUE: &str = "heritage=dnsweaver";

/// Name prefix of catalog chunk TXT records, relative to the zone apex
pub const CATALOG_PREFIX: &str = "_dnsweaver-catalog-";

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS port for queries and dynamic updates
pub const DNS_PORT: u16 = 53;

/// Default TTL for DNS records (5 minutes)
pub const DEFAULT_DNS_RECORD_TTL_SECS: u32 = 300;

/// TTL used for ownership marker and catalog TXT records
pub const TXT_RECORD_TTL_SECS: u32 = 300;

/// TSIG fudge time in seconds (allows for clock skew)
pub const TSIG_FUDGE_TIME_SECS: u16 = 300;

/// Maximum length of a hostname in bytes (RFC 1035 presentation form)
pub const MAX_HOSTNAME_BYTES: usize = 253;

// ============================================================================
// Catalog Constants
// ============================================================================

/// Maximum number of hostnames stored in a single catalog chunk
pub const CATALOG_MAX_CHUNK_HOSTNAMES: usize = 100;

/// Maximum TXT segment payload per catalog chunk, in bytes
pub const CATALOG_MAX_CHUNK_BYTES: usize = 3500;

// ============================================================================
// Reconciliation Constants
// ============================================================================

/// Default debounce window before a triggered reconcile runs
pub const DEFAULT_DEBOUNCE_SECS: u64 = 2;

/// Default safety-net reconcile interval (zero disables)
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 60;

/// Minimum accepted safety-net reconcile interval
pub const MIN_RECONCILE_INTERVAL_SECS: u64 = 1;

/// Default poll interval for discovery-capable file sources
pub const DEFAULT_FILE_POLL_INTERVAL_SECS: u64 = 30;

// ============================================================================
// Provider Manager Constants
// ============================================================================

/// Base delay before a failed provider is pinged again
pub const PROVIDER_RETRY_BASE_SECS: u64 = 5;

/// Upper bound on the provider retry backoff
pub const PROVIDER_RETRY_CAP_SECS: u64 = 300;

// ============================================================================
// Webhook Backend Constants
// ============================================================================

/// Number of attempts for a retryable webhook request
pub const WEBHOOK_MAX_ATTEMPTS: u32 = 4;

/// Base delay between webhook retry attempts, in milliseconds
pub const WEBHOOK_RETRY_BASE_MILLIS: u64 = 500;

/// Request timeout for webhook and REST API backends
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Docker Runtime Constants
// ============================================================================

/// Delay before the Docker event stream is re-established after a disconnect
pub const DEFAULT_DOCKER_RECONNECT_SECS: u64 = 5;

/// Connection timeout for the Docker Engine API, in seconds
pub const DOCKER_CONNECT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// HTTP Surface Constants
// ============================================================================

/// Default port for the health/readiness/metrics HTTP server
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Bind address for the health HTTP server
pub const HEALTH_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

/// Bounded grace period for the health server to drain on shutdown
pub const HEALTH_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Exit code for a fatal configuration error
pub const EXIT_CONFIG_INVALID: i32 = 2;

/// Exit code for an unrecoverable runtime connection failure
pub const EXIT_RUNTIME_UNAVAILABLE: i32 = 3;
