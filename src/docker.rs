// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Docker runtime integration: workload listing and the change event stream.
//!
//! Workloads are containers (standalone engines) or services (swarm
//! managers); either way they reduce to an id, a name, and a label map
//! before the rest of the system sees them. In `auto` mode the engine is
//! probed and swarm is selected when the local node participates actively
//! in a cluster.
//!
//! The event stream is long-lived: container lifecycle events fire the
//! supplied callback, and a dropped connection is re-established after a
//! configured delay followed by one synthetic firing so the reconciler runs
//! a full catch-up pass.

use anyhow::{Context, Result};
use bollard::container::ListContainersOptions;
use bollard::models::ContainerSummary;
use bollard::service::{ListServicesOptions, Service};
use bollard::system::EventsOptions;
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::constants::DOCKER_CONNECT_TIMEOUT_SECS;

/// A unit of work advertised by the container runtime.
///
/// Created from runtime state at the start of a reconcile pass, never
/// mutated, and discarded when the pass ends.
#[derive(Debug, Clone)]
pub struct Workload {
    /// Runtime identifier (container or service id)
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Label map the hostname sources read
    pub labels: HashMap<String, String>,
}

/// Anything that can enumerate workloads.
#[async_trait::async_trait]
pub trait WorkloadLister: Send + Sync {
    /// Current workloads, per the runtime's mode.
    async fn list(&self) -> Result<Vec<Workload>>;
}

/// How workloads are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeMode {
    /// Probe the engine and pick standalone or swarm
    #[default]
    Auto,
    /// List containers on a single engine
    Standalone,
    /// List services on a swarm manager
    Swarm,
}

impl FromStr for RuntimeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "standalone" => Ok(Self::Standalone),
            "swarm" | "orchestrated" => Ok(Self::Swarm),
            other => anyhow::bail!("unknown docker mode '{other}' (auto, standalone, swarm)"),
        }
    }
}

/// Connection to one Docker engine.
pub struct DockerRuntime {
    docker: Docker,
    mode: RuntimeMode,
    include_stopped: bool,
    reconnect: Duration,
}

impl DockerRuntime {
    /// Connect to the engine at `host` (`unix://`, `tcp://`/`http://`, or
    /// empty for platform defaults).
    ///
    /// `include_stopped` keeps stopped-but-present containers advertising
    /// their hostnames; clearing it treats a stop as removal.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint cannot be parsed; connectivity problems only
    /// surface on the first call.
    pub fn connect(
        host: Option<&str>,
        mode: RuntimeMode,
        include_stopped: bool,
        reconnect: Duration,
    ) -> Result<Self> {
        let docker = match host.filter(|h| !h.is_empty()) {
            None => Docker::connect_with_local_defaults()
                .context("failed to connect to Docker with local defaults")?,
            Some(host) if host.starts_with("unix://") => Docker::connect_with_unix(
                host,
                DOCKER_CONNECT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
            .with_context(|| format!("failed to connect to Docker at {host}"))?,
            Some(host) => Docker::connect_with_http(
                host,
                DOCKER_CONNECT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
            .with_context(|| format!("failed to connect to Docker at {host}"))?,
        };

        Ok(Self {
            docker,
            mode,
            include_stopped,
            reconnect,
        })
    }

    /// Check engine reachability.
    ///
    /// # Errors
    ///
    /// Propagates the engine ping failure.
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await.context("Docker ping failed")?;
        Ok(())
    }

    /// The configured enumeration mode.
    #[must_use]
    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Resolve `auto` by probing the engine's swarm state.
    async fn resolved_mode(&self) -> RuntimeMode {
        if self.mode != RuntimeMode::Auto {
            return self.mode;
        }
        let swarm_active = match self.docker.info().await {
            Ok(info) => info
                .swarm
                .and_then(|s| s.local_node_state)
                .is_some_and(|state| {
                    state == bollard::models::LocalNodeState::ACTIVE
                }),
            Err(e) => {
                warn!(error = %e, "engine probe failed, assuming standalone mode");
                false
            }
        };
        let resolved = if swarm_active {
            RuntimeMode::Swarm
        } else {
            RuntimeMode::Standalone
        };
        debug!(?resolved, "auto mode resolved");
        resolved
    }

    async fn list_containers(&self) -> Result<Vec<Workload>> {
        let options = ListContainersOptions::<String> {
            all: self.include_stopped,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .context("failed to list containers")?;
        Ok(containers.into_iter().map(container_workload).collect())
    }

    async fn list_services(&self) -> Result<Vec<Workload>> {
        let services = self
            .docker
            .list_services(None::<ListServicesOptions<String>>)
            .await
            .context("failed to list swarm services")?;
        Ok(services.into_iter().map(service_workload).collect())
    }

    /// Long-lived event reader. `on_change` fires on every relevant runtime
    /// event, and once more after each reconnect so a full resync pass runs.
    pub async fn run_event_stream<F>(&self, mut shutdown: watch::Receiver<bool>, on_change: F)
    where
        F: Fn() + Send + Sync,
    {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert(
            "type".to_string(),
            vec!["container".to_string(), "service".to_string()],
        );
        filters.insert(
            "event".to_string(),
            ["create", "start", "stop", "die", "destroy", "update", "remove"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        );
        let options = EventsOptions::<String> {
            filters,
            ..Default::default()
        };

        loop {
            let mut stream = self.docker.events(Some(options.clone()));
            info!("docker event stream established");

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        debug!("docker event reader stopping");
                        return;
                    }
                    item = stream.next() => match item {
                        Some(Ok(event)) => {
                            debug!(
                                kind = ?event.typ,
                                action = event.action.as_deref().unwrap_or(""),
                                "runtime event received"
                            );
                            on_change();
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "docker event stream error");
                            break;
                        }
                        None => {
                            warn!("docker event stream ended");
                            break;
                        }
                    }
                }
            }

            // Back off, then force a full pass: events were lost while the
            // stream was down.
            tokio::select! {
                _ = shutdown.changed() => return,
                () = tokio::time::sleep(self.reconnect) => {}
            }
            info!("docker event stream reconnecting, scheduling resync");
            on_change();
        }
    }
}

#[async_trait::async_trait]
impl WorkloadLister for DockerRuntime {
    async fn list(&self) -> Result<Vec<Workload>> {
        match self.resolved_mode().await {
            RuntimeMode::Swarm => self.list_services().await,
            _ => self.list_containers().await,
        }
    }
}

/// Reduce a container summary to a workload.
fn container_workload(container: ContainerSummary) -> Workload {
    let name = container
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();
    Workload {
        id: container.id.unwrap_or_default(),
        name,
        labels: container.labels.unwrap_or_default(),
    }
}

/// Reduce a swarm service to a workload; hostname labels live on the
/// service spec.
fn service_workload(service: Service) -> Workload {
    let spec = service.spec.unwrap_or_default();
    Workload {
        id: service.id.unwrap_or_default(),
        name: spec.name.unwrap_or_default(),
        labels: spec.labels.unwrap_or_default(),
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod docker_tests;
