// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use dnsweaver::{
    config::{Config, LogFormat},
    constants::{
        EXIT_CONFIG_INVALID, EXIT_RUNTIME_UNAVAILABLE, HEALTH_SERVER_BIND_ADDRESS,
        HEALTH_SHUTDOWN_TIMEOUT_SECS, TOKIO_WORKER_THREADS,
    },
    docker::DockerRuntime,
    health::{self, HealthState},
    providers::manager::ProviderManager,
    reconciler::{ReconcileOptions, Reconciler},
    sources::{file::FileSource, traefik::TraefikSource, LabelSource, SourceRegistry},
    trigger::{Debouncer, Trigger},
    watcher::FileWatcher,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Interval at which the Docker connection is re-probed for readiness
const RUNTIME_PROBE_INTERVAL_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "dnsweaver", version, about = "Label-driven DNS reconciler for Docker hosts")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log intended mutations without issuing them
    #[arg(long)]
    dry_run: bool,

    /// Override the configured log level
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override the configured log format (text, json)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<String>,

    /// Run a single reconcile pass and exit
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("dnsweaver")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise uses the
/// configured level. The configured format selects text or JSON output.
fn initialize_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting dnsweaver");
}

#[allow(clippy::too_many_lines)]
async fn async_main(cli: Cli) -> Result<()> {
    if let Some(path) = &cli.config {
        // The loader reads the file path from the environment
        std::env::set_var("DNSWEAVER_CONFIG_FILE", path);
    }

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e:#}");
            std::process::exit(EXIT_CONFIG_INVALID);
        }
    };
    if cli.dry_run {
        config.dry_run = true;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        match format.parse() {
            Ok(parsed) => config.log_format = parsed,
            Err(e) => {
                eprintln!("invalid configuration: {e:#}");
                std::process::exit(EXIT_CONFIG_INVALID);
            }
        }
    }

    initialize_logging(&config);

    // Provider instances; any construction failure is a config error
    let mut instances = Vec::new();
    for instance_config in &config.instances {
        match instance_config.build() {
            Ok(instance) => instances.push(instance),
            Err(e) => {
                error!("invalid configuration: {e:#}");
                std::process::exit(EXIT_CONFIG_INVALID);
            }
        }
    }
    if instances.is_empty() {
        warn!("no provider instances configured, nothing will be written");
    }

    // Container runtime; an unreachable engine at startup is fatal
    let runtime = match DockerRuntime::connect(
        config.docker_host.as_deref(),
        config.docker_mode,
        !config.cleanup_on_stop,
        config.docker_reconnect,
    ) {
        Ok(runtime) => Arc::new(runtime),
        Err(e) => {
            error!("cannot connect to Docker: {e:#}");
            std::process::exit(EXIT_RUNTIME_UNAVAILABLE);
        }
    };
    if let Err(e) = runtime.ping().await {
        error!("Docker engine is unreachable: {e:#}");
        std::process::exit(EXIT_RUNTIME_UNAVAILABLE);
    }

    // Hostname sources
    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(TraefikSource));
    registry.register(Arc::new(LabelSource));
    if !config.source_files.is_empty() {
        registry.register(Arc::new(FileSource::new(config.source_files.clone())));
    }

    // Providers come up in the background; startup never blocks on them
    let manager = Arc::new(ProviderManager::new(instances));
    manager.initialize().await;

    let options = ReconcileOptions {
        enabled: true,
        dry_run: config.dry_run,
        cleanup_orphans: config.cleanup_orphans,
        ownership_tracking: config.ownership_tracking,
        adopt_existing: config.adopt_existing,
    };
    let reconciler = Arc::new(Reconciler::new(
        runtime.clone(),
        registry.clone(),
        manager.clone(),
        options,
    ));

    // Orphan detection must survive restarts
    reconciler.recover_ownership().await;

    if cli.once {
        let summary = reconciler.reconcile().await;
        info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            skipped = summary.skipped,
            failed = summary.failed,
            "single pass complete"
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Health / readiness / metrics surface
    let health_state = HealthState::new(manager.clone());
    let bind_addr = format!("{HEALTH_SERVER_BIND_ADDRESS}:{}", config.health_port);
    let health_handle = tokio::spawn({
        let state = health_state.clone();
        let shutdown = shutdown_rx.clone();
        async move {
            if let Err(e) = health::serve(&bind_addr, state, shutdown).await {
                error!("health server error: {e:#}");
            }
        }
    });

    // Trigger mesh: every input funnels through the debouncer
    let interval = (!config.reconcile_interval.is_zero()).then_some(config.reconcile_interval);
    let debouncer = Debouncer::new(config.debounce, interval);
    let trigger = debouncer.handle();

    let reconcile_loop = tokio::spawn({
        let reconciler = reconciler.clone();
        let shutdown = shutdown_rx.clone();
        debouncer.run(shutdown, move || {
            let reconciler = reconciler.clone();
            async move {
                reconciler.reconcile().await;
            }
        })
    });

    // Provider retry loop; recovered providers trigger a catch-up pass
    let retry_loop = tokio::spawn({
        let trigger = trigger.clone();
        manager.clone().run_retry_loop(shutdown_rx.clone(), move || {
            trigger.notify(Trigger::ProviderReady);
        })
    });

    // Runtime event stream
    let event_loop = tokio::spawn({
        let runtime = runtime.clone();
        let trigger = trigger.clone();
        let shutdown = shutdown_rx.clone();
        async move {
            runtime
                .run_event_stream(shutdown, move || trigger.notify(Trigger::RuntimeEvent))
                .await;
        }
    });

    // Periodic probe feeding the readiness endpoint
    let probe_loop = tokio::spawn({
        let runtime = runtime.clone();
        let state = health_state.clone();
        let mut shutdown = shutdown_rx.clone();
        async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    () = tokio::time::sleep(Duration::from_secs(RUNTIME_PROBE_INTERVAL_SECS)) => {
                        state.set_runtime_ok(runtime.ping().await.is_ok());
                    }
                }
            }
        }
    });

    // File discovery poller
    let file_watcher = Arc::new(FileWatcher::new(
        registry.discovery_sources(),
        config.file_poll_interval,
        Arc::new({
            let trigger = trigger.clone();
            move || trigger.notify(Trigger::FileChange)
        }),
    ));
    file_watcher.start().await;

    // First pass
    trigger.notify(Trigger::Startup);

    // Wait for a shutdown signal
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result?;
        }
        result = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                sigterm.recv().await;
                Ok::<(), anyhow::Error>(())
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
                Ok::<(), anyhow::Error>(())
            }
        } => {
            info!("Received SIGTERM, initiating graceful shutdown...");
            result?;
        }
    }

    // Unwind: stop timers, drain in-flight work, close streams
    let _ = shutdown_tx.send(true);
    file_watcher.stop().await;
    let _ = reconcile_loop.await;
    let _ = retry_loop.await;
    let _ = event_loop.await;
    let _ = probe_loop.await;

    // The health server gets a bounded drain window of its own
    if tokio::time::timeout(
        Duration::from_secs(HEALTH_SHUTDOWN_TIMEOUT_SECS),
        health_handle,
    )
    .await
    .is_err()
    {
        warn!("health server did not drain in time");
    }

    info!("Graceful shutdown completed successfully");
    Ok(())
}
