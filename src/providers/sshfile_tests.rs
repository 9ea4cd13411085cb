// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the SSH hosts-file provider, against a scripted shell.

use crate::dns_errors::DnsError;
use crate::providers::hostsfile::BLOCK_BEGIN;
use crate::providers::sshfile::{CommandOutput, CommandTransport, SshFileProvider};
use crate::providers::{DnsProvider, Record, RecordType};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const REMOTE_PATH: &str = "/etc/hosts.dnsweaver";

/// Scripted remote shell: understands exactly the commands the provider
/// issues (`true`, `cat`, and the heredoc-write-then-rename) against one
/// in-memory file.
#[derive(Default)]
struct ShellState {
    file: Mutex<Option<String>>,
    commands: Mutex<Vec<String>>,
    fail: AtomicBool,
}

#[derive(Clone, Default)]
struct MockShell(Arc<ShellState>);

impl MockShell {
    fn new() -> Self {
        Self::default()
    }

    fn with_file(content: &str) -> Self {
        let shell = Self::default();
        *shell.0.file.lock().unwrap() = Some(content.to_string());
        shell
    }

    fn file(&self) -> Option<String> {
        self.0.file.lock().unwrap().clone()
    }

    fn commands(&self) -> Vec<String> {
        self.0.commands.lock().unwrap().clone()
    }

    fn set_failing(&self, fail: bool) {
        self.0.fail.store(fail, Ordering::SeqCst);
    }

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            exit_status: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }
}

#[async_trait]
impl CommandTransport for MockShell {
    fn endpoint(&self) -> String {
        "dns@gateway.example.net:22".to_string()
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, DnsError> {
        self.0.commands.lock().unwrap().push(command.to_string());
        if self.0.fail.load(Ordering::SeqCst) {
            return Ok(CommandOutput {
                exit_status: 1,
                stdout: String::new(),
                stderr: "read-only file system".to_string(),
            });
        }

        if command == "true" {
            return Ok(Self::ok(""));
        }
        if let Some(start) = command.find("<< 'DNSWEAVER_EOF'\n") {
            // Heredoc write followed by the rename; capture the body
            let body_start = start + "<< 'DNSWEAVER_EOF'\n".len();
            let body_end = command
                .rfind("DNSWEAVER_EOF\nmv ")
                .expect("write command must rename the temp file");
            let body = &command[body_start..body_end];
            assert!(
                command.trim_end().ends_with(&format!("'{REMOTE_PATH}'")),
                "rename must target the managed path"
            );
            *self.0.file.lock().unwrap() = Some(body.to_string());
            return Ok(Self::ok(""));
        }
        if command.starts_with(&format!("cat '{REMOTE_PATH}'")) {
            // `|| true` keeps a missing file from failing the read
            return Ok(Self::ok(&self.file().unwrap_or_default()));
        }
        panic!("unexpected remote command: {command}");
    }
}

fn provider(shell: MockShell) -> SshFileProvider<MockShell> {
    SshFileProvider::with_transport(shell, REMOTE_PATH, 300)
}

fn record(hostname: &str, ip: &str) -> Record {
    Record::new(hostname, RecordType::A, ip, 300)
}

#[tokio::test]
async fn test_create_and_list_round_trip() {
    let shell = MockShell::new();
    let p = provider(shell.clone());

    p.create(&record("app.example.com", "10.0.0.5")).await.unwrap();
    p.create(&record("db.example.com", "10.0.0.6")).await.unwrap();

    let records = p.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.contains(&record("app.example.com", "10.0.0.5")));
    assert!(records.contains(&record("db.example.com", "10.0.0.6")));
}

#[tokio::test]
async fn test_write_goes_through_temp_and_rename() {
    let shell = MockShell::new();
    let p = provider(shell.clone());

    p.create(&record("app.example.com", "10.0.0.5")).await.unwrap();

    let write = shell
        .commands()
        .into_iter()
        .find(|c| c.contains("DNSWEAVER_EOF"))
        .expect("a heredoc write must have been issued");
    assert!(write.starts_with(&format!("cat > '{REMOTE_PATH}.dnsweaver.tmp'")));
    assert!(write.contains(&format!("mv '{REMOTE_PATH}.dnsweaver.tmp' '{REMOTE_PATH}'")));

    let file = shell.file().unwrap();
    assert!(file.contains(BLOCK_BEGIN));
    assert!(file.contains("10.0.0.5\tapp.example.com"));
}

#[tokio::test]
async fn test_create_identical_is_noop() {
    let shell = MockShell::new();
    let p = provider(shell.clone());

    p.create(&record("app.example.com", "10.0.0.5")).await.unwrap();
    let writes_before = shell.commands().len();
    p.create(&record("app.example.com", "10.0.0.5")).await.unwrap();

    // The second create read the file and stopped; no further write
    assert_eq!(
        shell.commands().len(),
        writes_before + 1,
        "identical create must only re-read"
    );
    assert_eq!(p.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_conflicting_target_surfaces() {
    let shell = MockShell::new();
    let p = provider(shell.clone());

    p.create(&record("app.example.com", "10.0.0.5")).await.unwrap();
    let err = p.create(&record("app.example.com", "10.0.0.9")).await.unwrap_err();
    assert!(matches!(err, DnsError::AlreadyExists { ref existing, .. } if existing == "10.0.0.5"));
}

#[tokio::test]
async fn test_delete_absent_is_noop() {
    let shell = MockShell::new();
    let p = provider(shell.clone());

    p.delete(&record("ghost.example.com", "10.0.0.1")).await.unwrap();
    // Nothing was ever written
    assert!(shell.file().is_none());
}

#[tokio::test]
async fn test_delete_preserves_unmanaged_content() {
    let shell = MockShell::with_file("127.0.0.1\tlocalhost\n");
    let p = provider(shell.clone());

    p.create(&record("app.example.com", "10.0.0.5")).await.unwrap();
    p.delete(&record("app.example.com", "10.0.0.5")).await.unwrap();

    let file = shell.file().unwrap();
    assert!(file.starts_with("127.0.0.1\tlocalhost\n"));
    assert!(!file.contains("app.example.com"));
}

#[tokio::test]
async fn test_update_replaces_entry() {
    let shell = MockShell::new();
    let p = provider(shell.clone());

    p.create(&record("app.example.com", "10.0.0.5")).await.unwrap();
    p.update(
        &record("app.example.com", "10.0.0.5"),
        &record("app.example.com", "10.0.0.9"),
    )
    .await
    .unwrap();

    assert_eq!(p.list().await.unwrap(), vec![record("app.example.com", "10.0.0.9")]);
}

#[tokio::test]
async fn test_nonzero_exit_status_is_transient() {
    let shell = MockShell::new();
    shell.set_failing(true);
    let p = provider(shell);

    let err = p.list().await.unwrap_err();
    match err {
        DnsError::Transient { reason, .. } => {
            assert!(reason.contains("status 1"));
            assert!(reason.contains("read-only file system"));
        }
        other => panic!("expected a transient error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ping_runs_a_command() {
    let shell = MockShell::new();
    let p = provider(shell.clone());

    p.ping().await.unwrap();
    assert_eq!(shell.commands(), vec!["true".to_string()]);
}

#[tokio::test]
async fn test_cname_records_rejected() {
    let p = provider(MockShell::new());
    let cname = Record::new("app.example.com", RecordType::Cname, "other.example.com", 300);
    let err = p.create(&cname).await.unwrap_err();
    assert!(matches!(err, DnsError::Validation { .. }));
}

#[tokio::test]
async fn test_capabilities_have_no_ownership_txt() {
    let p = provider(MockShell::new());
    let caps = p.capabilities();
    assert!(!caps.supports_ownership_txt);
    assert_eq!(caps.record_types, vec![RecordType::A]);
}
