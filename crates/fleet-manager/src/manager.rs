//! Manager: the workload-facing facade over a cluster.
//!
//! The `Manager`:
//! - Bootstraps the cluster from the configured engine roster
//! - Launches batches of identical workloads
//! - Destroys containers (kill, then remove)
//! - Answers container, engine and health queries

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info};

use fleet_cluster::probe::{self, DEFAULT_PING_TIMEOUT};
use fleet_cluster::{Cluster, ClusterConfig, EngineConnector, EngineHandle};
use fleet_core::{ClusterSummary, Container, EngineHealth, EngineId, EngineInfo, FleetConfig, Image, ListQuery};

use crate::error::{ManagerError, ManagerResult};
use crate::launch::{LaunchOutcome, launch_batch};

/// Signal sent by [`Manager::destroy`] before removing a container.
const SIGKILL: i32 = 9;

pub struct Manager {
    cluster: Arc<Cluster>,
    ping_timeout: Duration,
}

impl Manager {
    pub fn new(cluster: Arc<Cluster>) -> Self {
        Self {
            cluster,
            ping_timeout: DEFAULT_PING_TIMEOUT,
        }
    }

    /// Connect every roster engine and build the cluster.
    ///
    /// Engines the connector cannot reach are logged and left out; a
    /// handle that comes back disconnected fails the bootstrap.
    pub fn bootstrap(config: &FleetConfig, connector: &dyn EngineConnector) -> ManagerResult<Self> {
        let mut handles: Vec<Arc<dyn EngineHandle>> = Vec::with_capacity(config.engines.len());
        for info in config.engine_infos() {
            match connector.connect(&info) {
                Ok(handle) => {
                    info!(engine = %info.id, addr = %info.addr, "loaded engine");
                    handles.push(handle);
                }
                Err(e) => {
                    error!(engine = %info.id, addr = %info.addr, error = %e, "error connecting to engine");
                }
            }
        }

        let cluster = Cluster::with_engines(ClusterConfig::from_fleet(config), handles)?;
        Ok(Self::new(Arc::new(cluster)))
    }

    /// Set the timeout used by health probes.
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    /// Launch `count` independent placements of `image`.
    pub async fn run(&self, image: Image, count: usize, pull: bool) -> LaunchOutcome {
        launch_batch(self.cluster.clone(), Arc::new(image), count, pull).await
    }

    /// Kill a container with SIGKILL, then remove it.
    pub async fn destroy(&self, container: &Container) -> ManagerResult<()> {
        self.cluster.kill(container, SIGKILL).await?;
        self.cluster.remove(container).await?;
        info!(container = %container.id, engine = %container.engine_id, "container destroyed");
        Ok(())
    }

    /// First container, in any state, whose id starts with `id_prefix`.
    pub async fn container(&self, id_prefix: &str) -> Option<Container> {
        if id_prefix.is_empty() {
            return None;
        }
        self.containers(true)
            .await
            .into_iter()
            .find(|c| c.id.starts_with(id_prefix))
    }

    pub async fn containers(&self, all: bool) -> Vec<Container> {
        let query = ListQuery {
            all,
            ..ListQuery::default()
        };
        self.cluster.list_containers(&query).await
    }

    /// Containers whose image name contains `name`.
    pub async fn containers_by_image(&self, name: &str, all: bool) -> Vec<Container> {
        self.containers(all)
            .await
            .into_iter()
            .filter(|c| c.image.name.contains(name))
            .collect()
    }

    /// Containers launched from an equivalent request: same image family,
    /// same memory request, same argument count, same kind.
    pub async fn identical_containers(&self, container: &Container, all: bool) -> Vec<Container> {
        let reference = &container.image;
        self.containers_by_image(&reference.name, all)
            .await
            .into_iter()
            .filter(|c| {
                c.image.memory_bytes == reference.memory_bytes
                    && c.image.args.len() == reference.args.len()
                    && c.image.kind == reference.kind
            })
            .collect()
    }

    pub async fn cluster_info(&self) -> ManagerResult<ClusterSummary> {
        Ok(self.cluster.summary().await?)
    }

    pub async fn engines(&self) -> Vec<EngineInfo> {
        self.cluster.engines().await
    }

    pub async fn engine(&self, engine_id: &str) -> Option<EngineInfo> {
        self.cluster.engine(engine_id).await.map(|e| e.info().clone())
    }

    /// Ping one registered engine.
    pub async fn engine_health(&self, engine_id: &str) -> ManagerResult<EngineHealth> {
        let info = self
            .engine(engine_id)
            .await
            .ok_or_else(|| ManagerError::EngineNotFound(engine_id.to_string()))?;
        Ok(probe::ping(&info.addr, self.ping_timeout).await)
    }

    /// Ping every registered engine concurrently. Sorted by engine id.
    pub async fn health(&self) -> Vec<(EngineId, EngineHealth)> {
        let mut probes = JoinSet::new();
        for info in self.engines().await {
            let timeout = self.ping_timeout;
            probes.spawn(async move {
                let health = probe::ping(&info.addr, timeout).await;
                (info.id, health)
            });
        }

        let mut out = Vec::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(pair) => out.push(pair),
                Err(e) => error!(error = %e, "health probe task failed"),
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
