// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration loading and validation.
//!
//! Options come from environment variables prefixed `DNSWEAVER_`, optionally
//! layered over a YAML file whose path is given by `DNSWEAVER_CONFIG_FILE`.
//! Precedence is environment > file > default. Every secret-bearing option
//! (`TOKEN`, `TSIG_SECRET`, `PASSWORD`) has a `<NAME>_FILE` twin whose
//! trimmed file contents replace the direct value; the file wins when both
//! are set, so container secret mounts override stray environment leftovers.
//!
//! Provider instances are named by `DNSWEAVER_INSTANCES` and configured with
//! `DNSWEAVER_<NAME>_*` variables (or the `instances:` map in the file).
//! All validation happens at load time; a broken configuration is fatal.

use crate::constants::{
    DEFAULT_DEBOUNCE_SECS, DEFAULT_DNS_RECORD_TTL_SECS, DEFAULT_DOCKER_RECONNECT_SECS,
    DEFAULT_FILE_POLL_INTERVAL_SECS, DEFAULT_HEALTH_PORT, DEFAULT_RECONCILE_INTERVAL_SECS,
    DNS_PORT, ENV_PREFIX, MIN_RECONCILE_INTERVAL_SECS,
};
use crate::ddns::{DnsUpdateClient, TsigAlgorithmKind, TsigCredentials};
use crate::dns_errors::DnsError;
use crate::docker::RuntimeMode;
use crate::matcher::{DomainMatcher, MatchMode};
use crate::providers::hostsfile::HostsFileProvider;
use crate::providers::restapi::RestApiProvider;
use crate::providers::rfc2136::Rfc2136Provider;
use crate::providers::sshfile::{SshAuth, SshFileProvider};
use crate::providers::webhook::{WebhookAuth, WebhookProvider};
use crate::providers::{validate_target, ProviderInstance, ProviderMode, RecordType};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Log output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact human-readable text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => bail!("unknown log format '{other}' (text, json)"),
        }
    }
}

/// Which backend an instance uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// RFC 2136 dynamic updates
    Rfc2136,
    /// HTTP webhook contract
    Webhook,
    /// Token-authenticated REST API
    RestApi,
    /// Local hosts-format file
    HostsFile,
    /// Remote hosts-format file over SSH
    SshFile,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rfc2136" => Ok(Self::Rfc2136),
            "webhook" => Ok(Self::Webhook),
            "restapi" | "api" => Ok(Self::RestApi),
            "hostsfile" | "hosts" => Ok(Self::HostsFile),
            "sshfile" | "ssh" => Ok(Self::SshFile),
            other => bail!(
                "unknown provider type '{other}' (rfc2136, webhook, restapi, hostsfile, sshfile)"
            ),
        }
    }
}

/// One configured provider instance.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Unique instance name
    pub name: String,
    /// Backend kind
    pub kind: ProviderKind,
    /// Record type written for matched hostnames
    pub record_type: RecordType,
    /// Record target (IPv4 for A, hostname for CNAME)
    pub target: String,
    /// Default TTL
    pub ttl: u32,
    /// Include patterns
    pub domains: Vec<String>,
    /// Exclude patterns
    pub exclude_domains: Vec<String>,
    /// Interpret patterns as regular expressions instead of globs
    pub domains_regex: bool,
    /// Deletion policy
    pub mode: ProviderMode,

    // Backend-specific options; which are required depends on `kind`
    /// DNS server address (rfc2136)
    pub server: Option<String>,
    /// Zone name (rfc2136, restapi)
    pub zone: Option<String>,
    /// TSIG key name (rfc2136)
    pub tsig_key: Option<String>,
    /// TSIG base64 secret (rfc2136)
    pub tsig_secret: Option<String>,
    /// TSIG algorithm (rfc2136)
    pub tsig_algorithm: Option<String>,
    /// Attempt AXFR before falling back to the catalog (rfc2136)
    pub allow_axfr: bool,
    /// Service base URL (webhook, restapi)
    pub url: Option<String>,
    /// Bearer token or custom-header value (webhook, restapi)
    pub token: Option<String>,
    /// Custom auth header name; bearer auth when unset (webhook)
    pub auth_header: Option<String>,
    /// Managed file path (hostsfile, sshfile)
    pub path: Option<String>,
    /// Remote host (sshfile)
    pub host: Option<String>,
    /// Remote SSH port (sshfile)
    pub port: u16,
    /// Remote user (sshfile)
    pub user: Option<String>,
    /// SSH password (sshfile)
    pub password: Option<String>,
    /// SSH private key path (sshfile)
    pub key_file: Option<String>,
}

/// Fully loaded and validated daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Log filter level
    pub log_level: String,
    /// Log encoding
    pub log_format: LogFormat,
    /// Log intended mutations without issuing them
    pub dry_run: bool,
    /// Delete records for disappeared hostnames
    pub cleanup_orphans: bool,
    /// Treat stopped containers as removed
    pub cleanup_on_stop: bool,
    /// Maintain and require ownership markers
    pub ownership_tracking: bool,
    /// Backfill markers on matching foreign records
    pub adopt_existing: bool,
    /// Safety-net reconcile interval; zero disables
    pub reconcile_interval: Duration,
    /// Debounce window in front of the reconciler
    pub debounce: Duration,
    /// Poll interval for discovery sources
    pub file_poll_interval: Duration,
    /// Port of the health/metrics HTTP server
    pub health_port: u16,
    /// Docker endpoint; platform default when unset
    pub docker_host: Option<String>,
    /// Workload enumeration mode
    pub docker_mode: RuntimeMode,
    /// Delay before the event stream reconnects
    pub docker_reconnect: Duration,
    /// Files read by the discovery source
    pub source_files: Vec<PathBuf>,
    /// Provider instances
    pub instances: Vec<InstanceConfig>,
}

// ============================================================================
// YAML file shape
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    #[serde(default)]
    log: FileLog,
    #[serde(default)]
    reconcile: FileReconcile,
    #[serde(default)]
    docker: FileDocker,
    #[serde(default)]
    sources: FileSources,
    #[serde(default)]
    health_port: Option<u16>,
    #[serde(default)]
    instances: BTreeMap<String, FileInstance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLog {
    level: Option<String>,
    format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileReconcile {
    dry_run: Option<bool>,
    cleanup_orphans: Option<bool>,
    cleanup_on_stop: Option<bool>,
    ownership_tracking: Option<bool>,
    adopt_existing: Option<bool>,
    interval: Option<String>,
    debounce: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileDocker {
    host: Option<String>,
    mode: Option<String>,
    reconnect: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSources {
    files: Option<Vec<String>>,
    poll_interval: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileInstance {
    #[serde(rename = "type")]
    kind: Option<String>,
    record_type: Option<String>,
    target: Option<String>,
    ttl: Option<u32>,
    domains: Option<Vec<String>>,
    exclude_domains: Option<Vec<String>>,
    domains_regex: Option<bool>,
    mode: Option<String>,
    server: Option<String>,
    zone: Option<String>,
    tsig_key: Option<String>,
    tsig_secret: Option<String>,
    tsig_secret_file: Option<String>,
    tsig_algorithm: Option<String>,
    allow_axfr: Option<bool>,
    url: Option<String>,
    token: Option<String>,
    token_file: Option<String>,
    auth_header: Option<String>,
    path: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    password_file: Option<String>,
    key_file: Option<String>,
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Load configuration from the process environment and the optional
    /// YAML file.
    ///
    /// # Errors
    ///
    /// Any invalid or inconsistent option is an error; the caller treats it
    /// as fatal.
    pub fn load() -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let file = match env.get(&format!("{ENV_PREFIX}CONFIG_FILE")) {
            Some(path) if !path.is_empty() => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                Some(
                    serde_yaml::from_str::<FileConfig>(&content)
                        .with_context(|| format!("failed to parse config file {path}"))?,
                )
            }
            _ => None,
        };
        Self::from_sources(&env, file.unwrap_or_default())
    }

    /// Assemble configuration from explicit sources. Split out of
    /// [`Config::load`] so tests can drive it without touching the process
    /// environment.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub(crate) fn from_sources(env: &HashMap<String, String>, file: FileConfig) -> Result<Self> {
        let get = |key: &str| env.get(&format!("{ENV_PREFIX}{key}")).cloned();

        let log_level = get("LOG_LEVEL")
            .or(file.log.level)
            .unwrap_or_else(|| "info".to_string());
        if !matches!(log_level.as_str(), "debug" | "info" | "warn" | "error") {
            bail!("invalid LOG_LEVEL '{log_level}' (debug, info, warn, error)");
        }

        let log_format = get("LOG_FORMAT")
            .or(file.log.format)
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();

        let reconcile_interval = parse_duration_option(
            get("RECONCILE_INTERVAL").or(file.reconcile.interval),
            Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
        )?;
        if !reconcile_interval.is_zero()
            && reconcile_interval < Duration::from_secs(MIN_RECONCILE_INTERVAL_SECS)
        {
            bail!("RECONCILE_INTERVAL must be at least {MIN_RECONCILE_INTERVAL_SECS}s (or 0 to disable)");
        }

        let health_port = match get("HEALTH_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid HEALTH_PORT '{raw}'"))?,
            None => file.health_port.unwrap_or(DEFAULT_HEALTH_PORT),
        };
        if health_port == 0 {
            bail!("HEALTH_PORT must be between 1 and 65535");
        }

        let source_files = match get("SOURCE_FILES") {
            Some(list) => split_list(&list).into_iter().map(PathBuf::from).collect(),
            None => file
                .sources
                .files
                .unwrap_or_default()
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        };

        let instance_names: Vec<String> = match get("INSTANCES") {
            Some(list) => split_list(&list),
            None => file.instances.keys().cloned().collect(),
        };

        let mut seen = HashSet::new();
        let mut instances = Vec::new();
        for name in &instance_names {
            if !seen.insert(name.to_ascii_lowercase()) {
                bail!("duplicate provider instance name '{name}'");
            }
            let file_instance = file.instances.get(name);
            instances.push(load_instance(env, name, file_instance)?);
        }

        let config = Self {
            log_level,
            log_format,
            dry_run: parse_bool_option(get("DRY_RUN"), file.reconcile.dry_run, false)?,
            cleanup_orphans: parse_bool_option(
                get("CLEANUP_ORPHANS"),
                file.reconcile.cleanup_orphans,
                true,
            )?,
            cleanup_on_stop: parse_bool_option(
                get("CLEANUP_ON_STOP"),
                file.reconcile.cleanup_on_stop,
                false,
            )?,
            ownership_tracking: parse_bool_option(
                get("OWNERSHIP_TRACKING"),
                file.reconcile.ownership_tracking,
                true,
            )?,
            adopt_existing: parse_bool_option(
                get("ADOPT_EXISTING"),
                file.reconcile.adopt_existing,
                false,
            )?,
            reconcile_interval,
            debounce: parse_duration_option(
                get("DEBOUNCE").or(file.reconcile.debounce),
                Duration::from_secs(DEFAULT_DEBOUNCE_SECS),
            )?,
            file_poll_interval: parse_duration_option(
                get("FILE_POLL_INTERVAL").or(file.sources.poll_interval),
                Duration::from_secs(DEFAULT_FILE_POLL_INTERVAL_SECS),
            )?,
            health_port,
            docker_host: get("DOCKER_HOST").or(file.docker.host).filter(|h| !h.is_empty()),
            docker_mode: get("DOCKER_MODE")
                .or(file.docker.mode)
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or_default(),
            docker_reconnect: parse_duration_option(
                get("DOCKER_RECONNECT").or(file.docker.reconnect),
                Duration::from_secs(DEFAULT_DOCKER_RECONNECT_SECS),
            )?,
            source_files,
            instances,
        };

        info!(
            instances = config.instances.len(),
            source_files = config.source_files.len(),
            "configuration loaded"
        );
        Ok(config)
    }
}

fn load_instance(
    env: &HashMap<String, String>,
    name: &str,
    file: Option<&FileInstance>,
) -> Result<InstanceConfig> {
    let env_name = name.to_ascii_uppercase().replace('-', "_");
    let get = |key: &str| env.get(&format!("{ENV_PREFIX}{env_name}_{key}")).cloned();
    let context = |field: &str| format!("instance '{name}': missing {field}");

    let kind: ProviderKind = get("TYPE")
        .or_else(|| file.and_then(|f| f.kind.clone()))
        .with_context(|| context("TYPE"))?
        .parse()?;

    let record_type: RecordType = get("RECORD_TYPE")
        .or_else(|| file.and_then(|f| f.record_type.clone()))
        .map(|s| s.parse())
        .transpose()
        .map_err(|e: DnsError| anyhow::anyhow!("instance '{name}': {e}"))?
        .unwrap_or(RecordType::A);

    let target = get("TARGET")
        .or_else(|| file.and_then(|f| f.target.clone()))
        .with_context(|| context("TARGET"))?;
    validate_target(record_type, &target)
        .map_err(|e| anyhow::anyhow!("instance '{name}': {e}"))?;

    let domains = get("DOMAINS")
        .map(|list| split_list(&list))
        .or_else(|| file.and_then(|f| f.domains.clone()))
        .unwrap_or_default();
    if domains.is_empty() {
        bail!("instance '{name}': at least one include domain pattern is required");
    }
    let exclude_domains = get("EXCLUDE_DOMAINS")
        .map(|list| split_list(&list))
        .or_else(|| file.and_then(|f| f.exclude_domains.clone()))
        .unwrap_or_default();

    let mode: ProviderMode = get("MODE")
        .or_else(|| file.and_then(|f| f.mode.clone()))
        .map(|s| s.parse())
        .transpose()
        .map_err(|e: DnsError| anyhow::anyhow!("instance '{name}': {e}"))?
        .unwrap_or_default();

    let ttl = match get("TTL") {
        Some(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("instance '{name}': invalid TTL '{raw}'"))?,
        None => file
            .and_then(|f| f.ttl)
            .unwrap_or(DEFAULT_DNS_RECORD_TTL_SECS),
    };

    let config = InstanceConfig {
        name: name.to_string(),
        kind,
        record_type,
        target,
        ttl,
        domains,
        exclude_domains,
        domains_regex: parse_bool_option(
            get("DOMAINS_REGEX"),
            file.and_then(|f| f.domains_regex),
            false,
        )?,
        mode,
        server: get("SERVER").or_else(|| file.and_then(|f| f.server.clone())),
        zone: get("ZONE").or_else(|| file.and_then(|f| f.zone.clone())),
        tsig_key: get("TSIG_KEY").or_else(|| file.and_then(|f| f.tsig_key.clone())),
        tsig_secret: resolve_secret(
            get("TSIG_SECRET").or_else(|| file.and_then(|f| f.tsig_secret.clone())),
            get("TSIG_SECRET_FILE").or_else(|| file.and_then(|f| f.tsig_secret_file.clone())),
        )?,
        tsig_algorithm: get("TSIG_ALGORITHM").or_else(|| file.and_then(|f| f.tsig_algorithm.clone())),
        allow_axfr: parse_bool_option(get("ALLOW_AXFR"), file.and_then(|f| f.allow_axfr), false)?,
        url: get("URL").or_else(|| file.and_then(|f| f.url.clone())),
        token: resolve_secret(
            get("TOKEN").or_else(|| file.and_then(|f| f.token.clone())),
            get("TOKEN_FILE").or_else(|| file.and_then(|f| f.token_file.clone())),
        )?,
        auth_header: get("AUTH_HEADER").or_else(|| file.and_then(|f| f.auth_header.clone())),
        path: get("PATH").or_else(|| file.and_then(|f| f.path.clone())),
        host: get("HOST").or_else(|| file.and_then(|f| f.host.clone())),
        port: match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("instance '{name}': invalid PORT '{raw}'"))?,
            None => file.and_then(|f| f.port).unwrap_or(22),
        },
        user: get("USER").or_else(|| file.and_then(|f| f.user.clone())),
        password: resolve_secret(
            get("PASSWORD").or_else(|| file.and_then(|f| f.password.clone())),
            get("PASSWORD_FILE").or_else(|| file.and_then(|f| f.password_file.clone())),
        )?,
        key_file: get("KEY_FILE").or_else(|| file.and_then(|f| f.key_file.clone())),
    };

    config.validate_backend_options()?;
    Ok(config)
}

impl InstanceConfig {
    /// Check that the options the backend kind needs are present.
    fn validate_backend_options(&self) -> Result<()> {
        let name = &self.name;
        match self.kind {
            ProviderKind::Rfc2136 => {
                if self.server.is_none() {
                    bail!("instance '{name}': rfc2136 requires SERVER");
                }
                if self.zone.is_none() {
                    bail!("instance '{name}': rfc2136 requires ZONE");
                }
                if self.tsig_key.is_some() != self.tsig_secret.is_some() {
                    bail!("instance '{name}': TSIG_KEY and TSIG_SECRET must be set together");
                }
            }
            ProviderKind::Webhook => {
                if self.url.is_none() {
                    bail!("instance '{name}': webhook requires URL");
                }
            }
            ProviderKind::RestApi => {
                if self.url.is_none() || self.zone.is_none() || self.token.is_none() {
                    bail!("instance '{name}': restapi requires URL, ZONE, and TOKEN");
                }
            }
            ProviderKind::HostsFile => {
                if self.path.is_none() {
                    bail!("instance '{name}': hostsfile requires PATH");
                }
            }
            ProviderKind::SshFile => {
                if self.host.is_none() || self.user.is_none() || self.path.is_none() {
                    bail!("instance '{name}': sshfile requires HOST, USER, and PATH");
                }
                if self.password.is_none() && self.key_file.is_none() {
                    bail!("instance '{name}': sshfile requires PASSWORD or KEY_FILE");
                }
            }
        }
        Ok(())
    }

    /// Build the runtime [`ProviderInstance`] for this configuration.
    ///
    /// # Errors
    ///
    /// Pattern compilation and endpoint parsing failures.
    pub fn build(&self) -> Result<ProviderInstance> {
        let mode = if self.domains_regex {
            MatchMode::Regex
        } else {
            MatchMode::Glob
        };
        let matcher = DomainMatcher::new(&self.domains, &self.exclude_domains, mode)
            .map_err(|e| anyhow::anyhow!("instance '{}': {e}", self.name))?;

        let adapter: Arc<dyn crate::providers::DnsProvider> = match self.kind {
            ProviderKind::Rfc2136 => {
                let server = parse_server_addr(self.server.as_deref().expect("validated"))?;
                let tsig = match (&self.tsig_key, &self.tsig_secret) {
                    (Some(key_name), Some(secret)) => Some(TsigCredentials {
                        key_name: key_name.clone(),
                        algorithm: self
                            .tsig_algorithm
                            .as_deref()
                            .map(str::parse::<TsigAlgorithmKind>)
                            .transpose()
                            .map_err(|e| anyhow::anyhow!("instance '{}': {e}", self.name))?
                            .unwrap_or_default(),
                        secret: secret.clone(),
                    }),
                    _ => None,
                };
                let client =
                    DnsUpdateClient::new(server, self.zone.as_deref().expect("validated"), tsig)
                        .map_err(|e| anyhow::anyhow!("instance '{}': {e}", self.name))?;
                Arc::new(Rfc2136Provider::new(client, self.allow_axfr))
            }
            ProviderKind::Webhook => {
                let auth = match (&self.auth_header, &self.token) {
                    (Some(header), Some(token)) => WebhookAuth::Header {
                        name: header.clone(),
                        value: token.clone(),
                    },
                    (None, Some(token)) => WebhookAuth::Bearer(token.clone()),
                    _ => WebhookAuth::None,
                };
                Arc::new(
                    WebhookProvider::new(self.url.as_deref().expect("validated"), auth)
                        .map_err(|e| anyhow::anyhow!("instance '{}': {e}", self.name))?,
                )
            }
            ProviderKind::RestApi => Arc::new(
                RestApiProvider::new(
                    self.url.as_deref().expect("validated"),
                    self.zone.as_deref().expect("validated"),
                    self.token.as_deref().expect("validated"),
                )
                .map_err(|e| anyhow::anyhow!("instance '{}': {e}", self.name))?,
            ),
            ProviderKind::HostsFile => Arc::new(HostsFileProvider::new(
                std::path::Path::new(self.path.as_deref().expect("validated")),
                self.ttl,
            )),
            ProviderKind::SshFile => {
                let auth = match (&self.password, &self.key_file) {
                    (_, Some(key_file)) => SshAuth::KeyFile(key_file.clone()),
                    (Some(password), None) => SshAuth::Password(password.clone()),
                    _ => unreachable!("validated"),
                };
                Arc::new(SshFileProvider::new(
                    self.host.as_deref().expect("validated"),
                    self.port,
                    self.user.as_deref().expect("validated"),
                    auth,
                    self.path.as_deref().expect("validated"),
                    self.ttl,
                ))
            }
        };

        Ok(ProviderInstance {
            name: self.name.clone(),
            matcher,
            record_type: self.record_type,
            target: self.target.clone(),
            ttl: self.ttl,
            mode: self.mode,
            adapter,
        })
    }
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Parse a duration: bare seconds or a `s`/`m`/`h` suffixed integer.
///
/// # Errors
///
/// Malformed values and unknown units.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("duration cannot be empty");
    }

    let split = raw
        .chars()
        .position(|c| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (value, unit) = raw.split_at(split);
    let value: u64 = value
        .parse()
        .with_context(|| format!("invalid duration '{raw}'"))?;

    let seconds = match unit {
        "" | "s" => value,
        "m" => value
            .checked_mul(60)
            .with_context(|| format!("duration '{raw}' overflows"))?,
        "h" => value
            .checked_mul(3600)
            .with_context(|| format!("duration '{raw}' overflows"))?,
        other => bail!("unsupported duration unit '{other}' in '{raw}' (s, m, h)"),
    };
    Ok(Duration::from_secs(seconds))
}

fn parse_duration_option(raw: Option<String>, default: Duration) -> Result<Duration> {
    raw.map_or(Ok(default), |s| parse_duration(&s))
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("invalid boolean '{other}'"),
    }
}

fn parse_bool_option(env: Option<String>, file: Option<bool>, default: bool) -> Result<bool> {
    match env {
        Some(raw) => parse_bool(&raw),
        None => Ok(file.unwrap_or(default)),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Resolve a secret and its `_FILE` twin; the file wins when both are set.
fn resolve_secret(direct: Option<String>, file: Option<String>) -> Result<Option<String>> {
    match file.filter(|p| !p.is_empty()) {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read secret file {path}"))?;
            Ok(Some(content.trim().to_string()))
        }
        None => Ok(direct.filter(|s| !s.is_empty())),
    }
}

/// Parse a DNS server endpoint, defaulting the port to 53.
fn parse_server_addr(raw: &str) -> Result<SocketAddr> {
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Ok(addr);
    }
    format!("{raw}:{DNS_PORT}")
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid DNS server address '{raw}'"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
