// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote hosts-format file provider backend, driven over SSH.
//!
//! The same managed-block file format as the local [`hostsfile`] backend,
//! applied to a file on a remote host. Each operation opens a session,
//! reads the file, rewrites the managed block, and installs the result with
//! a write-temp-then-rename so a crashed session never leaves a torn file.
//!
//! Command execution goes through [`CommandTransport`]; production uses
//! [`SshTransport`] (one session per command), tests a scripted shell.
//!
//! [`hostsfile`]: crate::providers::hostsfile

use crate::dns_errors::DnsError;
use crate::providers::hostsfile::{parse_managed_block, render};
use crate::providers::{Capabilities, DnsProvider, Record, RecordType};
use async_ssh2_tokio::client::{AuthMethod, Client, ServerCheckMethod};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

/// How to authenticate the SSH session.
#[derive(Debug, Clone)]
pub enum SshAuth {
    /// Password authentication
    Password(String),
    /// Private key file on the local filesystem
    KeyFile(String),
}

/// Outcome of one remote command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Remote exit status
    pub exit_status: u32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

/// Executes shell commands on the remote side.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Endpoint description for log and error attribution.
    fn endpoint(&self) -> String;

    /// Run one command and capture its outcome.
    async fn execute(&self, command: &str) -> Result<CommandOutput, DnsError>;
}

/// SSH transport: a fresh session per command.
pub struct SshTransport {
    host: String,
    port: u16,
    user: String,
    auth: SshAuth,
}

impl SshTransport {
    /// Create a transport for `host` as `user`.
    #[must_use]
    pub fn new(host: &str, port: u16, user: &str, auth: SshAuth) -> Self {
        Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            auth,
        }
    }

    async fn connect(&self) -> Result<Client, DnsError> {
        let auth = match &self.auth {
            SshAuth::Password(password) => AuthMethod::with_password(password),
            SshAuth::KeyFile(path) => AuthMethod::with_key_file(path, None),
        };
        Client::connect(
            (self.host.as_str(), self.port),
            &self.user,
            auth,
            ServerCheckMethod::NoCheck,
        )
        .await
        .map_err(|e| DnsError::Transient {
            endpoint: self.endpoint(),
            reason: format!("SSH connection failed: {e}"),
        })
    }
}

#[async_trait]
impl CommandTransport for SshTransport {
    fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, DnsError> {
        let client = self.connect().await?;
        let result = client
            .execute(command)
            .await
            .map_err(|e| DnsError::Transient {
                endpoint: self.endpoint(),
                reason: format!("SSH command failed: {e}"),
            })?;
        Ok(CommandOutput {
            exit_status: result.exit_status,
            stdout: result.stdout,
            stderr: result.stderr,
        })
    }
}

/// SSH-driven hosts-file backend.
pub struct SshFileProvider<T: CommandTransport = SshTransport> {
    transport: T,
    path: String,
    default_ttl: u32,
    // Remote rewrites are read-modify-write; serialize them.
    lock: Mutex<()>,
}

impl SshFileProvider<SshTransport> {
    /// Create a provider managing `path` on `host` as `user`.
    #[must_use]
    pub fn new(
        host: &str,
        port: u16,
        user: &str,
        auth: SshAuth,
        path: &str,
        default_ttl: u32,
    ) -> Self {
        Self::with_transport(SshTransport::new(host, port, user, auth), path, default_ttl)
    }
}

impl<T: CommandTransport> SshFileProvider<T> {
    /// Create a provider over an explicit transport.
    #[must_use]
    pub fn with_transport(transport: T, path: &str, default_ttl: u32) -> Self {
        Self {
            transport,
            path: path.to_string(),
            default_ttl,
            lock: Mutex::new(()),
        }
    }

    async fn run(&self, command: &str) -> Result<String, DnsError> {
        let result = self.transport.execute(command).await?;
        if result.exit_status != 0 {
            return Err(DnsError::Transient {
                endpoint: self.transport.endpoint(),
                reason: format!(
                    "remote command exited with status {}: {}",
                    result.exit_status,
                    result.stderr.trim()
                ),
            });
        }
        Ok(result.stdout)
    }

    async fn read_entries(&self) -> Result<(String, BTreeMap<String, String>), DnsError> {
        // Missing file reads as empty; it is created on the first write
        let content = self
            .run(&format!("cat '{}' 2>/dev/null || true", self.path))
            .await?;
        let entries = parse_managed_block(&content);
        Ok((content, entries))
    }

    async fn store(
        &self,
        content: &str,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), DnsError> {
        let mut rendered = render(content, entries);
        // The heredoc terminator must start its own line
        if !rendered.ends_with('\n') {
            rendered.push('\n');
        }
        let tmp = format!("{}.dnsweaver.tmp", self.path);
        let command = format!(
            "cat > '{tmp}' << 'DNSWEAVER_EOF'\n{rendered}DNSWEAVER_EOF\nmv '{tmp}' '{}'",
            self.path
        );
        self.run(&command).await?;
        Ok(())
    }

    fn require_a_record(&self, record: &Record) -> Result<(), DnsError> {
        if record.record_type == RecordType::A {
            Ok(())
        } else {
            Err(DnsError::Validation {
                hostname: record.hostname.clone(),
                reason: format!(
                    "remote hosts file backend cannot store {} records",
                    record.record_type
                ),
            })
        }
    }
}

#[async_trait]
impl<T: CommandTransport> DnsProvider for SshFileProvider<T> {
    fn kind(&self) -> &'static str {
        "sshfile"
    }

    async fn ping(&self) -> Result<(), DnsError> {
        self.run("true").await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Record>, DnsError> {
        let _guard = self.lock.lock().await;
        let (_, entries) = self.read_entries().await?;
        Ok(entries
            .into_iter()
            .map(|(hostname, ip)| Record::new(&hostname, RecordType::A, &ip, self.default_ttl))
            .collect())
    }

    async fn create(&self, record: &Record) -> Result<(), DnsError> {
        self.require_a_record(record)?;
        let _guard = self.lock.lock().await;
        let (content, mut entries) = self.read_entries().await?;
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
        self.store(&content, &entries).await?;
        debug!(record = %record, endpoint = %self.transport.endpoint(), "remote hosts entry added");
        Ok(())
    }

    async fn delete(&self, record: &Record) -> Result<(), DnsError> {
        if record.record_type != RecordType::A {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        let (content, mut entries) = self.read_entries().await?;
        if entries.remove(&record.hostname).is_some() {
            self.store(&content, &entries).await?;
            debug!(record = %record, endpoint = %self.transport.endpoint(), "remote hosts entry removed");
        }
        Ok(())
    }

    async fn update(&self, existing: &Record, desired: &Record) -> Result<(), DnsError> {
        self.require_a_record(desired)?;
        let _guard = self.lock.lock().await;
        let (content, mut entries) = self.read_entries().await?;
        entries.remove(&existing.hostname);
        entries.insert(desired.hostname.clone(), desired.target.clone());
        self.store(&content, &entries).await?;
        debug!(record = %desired, endpoint = %self.transport.endpoint(), "remote hosts entry replaced");
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

#[cfg(test)]
#[path = "sshfile_tests.rs"]
mod sshfile_tests;
