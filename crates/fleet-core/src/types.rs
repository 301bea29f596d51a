//! Domain types shared across Fleet crates.
//!
//! These types describe workload requests ([`Image`]), the workloads an
//! engine reports ([`Container`]), the static description of an engine
//! ([`EngineInfo`]) and the aggregate view of the cluster
//! ([`ClusterSummary`]). All of them are serializable to JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for an engine in the cluster.
pub type EngineId = String;

/// Identifier assigned to a container by its owning engine.
pub type ContainerId = String;

// ── Image ─────────────────────────────────────────────────────────

/// Declarative request for a workload: what to run and how much of the
/// engine it reserves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Image {
    /// Image reference (e.g. `nginx:1.25`).
    pub name: String,
    /// Requested container name. Empty lets the engine pick one.
    pub container_name: String,
    pub hostname: String,
    pub domainname: String,
    /// Command arguments passed to the entrypoint.
    pub args: Vec<String>,
    /// Requested CPU units.
    pub cpus: f64,
    /// Requested memory in bytes.
    pub memory_bytes: u64,
    /// Pin to specific host CPUs (engine syntax, e.g. `0-3`).
    pub cpuset: String,
    pub environment: HashMap<String, String>,
    /// Volume specs, either `container-path` or `host-path:container-path`.
    pub volumes: Vec<String>,
    pub bind_ports: Vec<PortBinding>,
    /// Links to other containers: name → alias.
    pub links: HashMap<String, String>,
    pub restart_policy: RestartPolicy,
    pub network_mode: String,
    /// Publish every exposed port on a random host port.
    pub publish: bool,
    pub privileged: bool,
    /// Placement hints.
    pub labels: Vec<String>,
    /// Free-form workload kind (e.g. `service`, `batch`).
    pub kind: String,
}

impl Image {
    /// Build an image request with just a name and a resource request.
    pub fn new(name: impl Into<String>, cpus: f64, memory_bytes: u64) -> Self {
        Self {
            name: name.into(),
            cpus,
            memory_bytes,
            ..Self::default()
        }
    }

    /// The resource request carried by this image.
    pub fn request(&self) -> ResourceRequest {
        ResourceRequest {
            cpus: self.cpus,
            memory_bytes: self.memory_bytes,
        }
    }
}

/// A CPU/memory pair requested by one workload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ResourceRequest {
    pub cpus: f64,
    pub memory_bytes: u64,
}

impl ResourceRequest {
    /// Whether the request can be scheduled at all: CPUs must be a finite,
    /// non-negative amount.
    pub fn is_valid(&self) -> bool {
        self.cpus.is_finite() && self.cpus >= 0.0
    }
}

impl std::fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cpus={} memory={}B", self.cpus, self.memory_bytes)
    }
}

/// A host port bound to a container port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortBinding {
    #[serde(default)]
    pub host_ip: String,
    /// Host port. Zero lets the engine choose.
    #[serde(default)]
    pub port: u16,
    pub container_port: u16,
    #[serde(default = "default_proto")]
    pub proto: String,
}

fn default_proto() -> String {
    "tcp".to_string()
}

/// Restart policy applied by the engine when the container exits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RestartPolicy {
    /// `""`, `always`, `unless-stopped` or `on-failure`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub maximum_retry_count: u32,
}

// ── Container ─────────────────────────────────────────────────────

/// Lifecycle state of a container as reported by its engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    #[default]
    Created,
    Running,
    Exited,
}

/// A workload bound to exactly one engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Container {
    /// Identity assigned by the owning engine. Empty until started.
    pub id: ContainerId,
    pub name: String,
    /// The request this container was created from.
    pub image: Image,
    /// Identity of the engine this container runs on.
    pub engine_id: EngineId,
    pub state: ContainerState,
    /// Host ports actually bound by the engine.
    #[serde(default)]
    pub ports: Vec<PortBinding>,
}

impl Container {
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }
}

/// Filter for listing containers on an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Include containers that are not running.
    pub all: bool,
    /// Ask the engine to compute container sizes.
    pub size: bool,
    /// Engine-specific filter expression.
    pub filter: Option<String>,
}

impl ListQuery {
    /// Running containers only.
    pub fn running() -> Self {
        Self::default()
    }

    /// Every container regardless of state.
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }
}

// ── Engine ────────────────────────────────────────────────────────

/// Static description of an engine: identity, address and advertised
/// capacity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineInfo {
    pub id: EngineId,
    /// Network address of the engine API (e.g. `tcp://10.0.0.1:2375`).
    pub addr: String,
    /// Advertised CPU units.
    pub cpus: f64,
    /// Advertised memory in bytes.
    pub memory_bytes: u64,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "engine {} addr {}", self.id, self.addr)
    }
}

/// Reachability of an engine as seen by a ping probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineHealth {
    Up,
    Down,
}

// ── Cluster ───────────────────────────────────────────────────────

/// Aggregate capacity and counts across every reachable engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClusterSummary {
    /// Advertised CPU units of reachable engines.
    pub cpus: f64,
    /// Advertised memory of reachable engines.
    pub memory_bytes: u64,
    pub reserved_cpus: f64,
    pub reserved_memory_bytes: u64,
    /// Running containers on reachable engines.
    pub container_count: usize,
    pub image_count: usize,
    /// Every registered engine, reachable or not.
    pub engine_count: usize,
    /// Engines left out because a listing call failed.
    pub unreachable_engines: Vec<EngineId>,
}
