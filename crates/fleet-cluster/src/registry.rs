//! Cluster registry: the engine map and the placement sequence.
//!
//! One async mutex guards the id → handle map *and* every placement
//! (snapshot all engines, score, start on the winner). A second placement
//! cannot take its snapshot until the first has dispatched its start, so
//! reservation headroom is never handed out twice. Lifecycle verbs hold
//! the lock only for the lookup; the remote call runs after release.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fleet_core::{
    ClusterSummary, Container, EngineId, EngineInfo, FleetConfig, Image, ListQuery,
    UnreachablePolicy,
};
use fleet_placement::{EngineSnapshot, ScoringWeights, select_engine};

use crate::engine::{EngineHandle, Lifecycle, keyed};
use crate::error::{ClusterError, ClusterResult};

/// Tunables for the registry's read paths and scorer.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// What `place` does when an engine's workloads cannot be listed.
    pub placement_unreachable: UnreachablePolicy,
    /// What `summary` does when an engine's workloads or images cannot be listed.
    pub summary_unreachable: UnreachablePolicy,
    pub weights: ScoringWeights,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            placement_unreachable: UnreachablePolicy::Abort,
            summary_unreachable: UnreachablePolicy::Skip,
            weights: ScoringWeights::default(),
        }
    }
}

impl ClusterConfig {
    pub fn from_fleet(config: &FleetConfig) -> Self {
        Self {
            placement_unreachable: config.cluster.placement_unreachable,
            summary_unreachable: config.cluster.summary_unreachable,
            weights: ScoringWeights {
                cpu: config.scoring.cpu_weight,
                memory: config.scoring.memory_weight,
            },
        }
    }
}

/// The set of live engines and the serialized placement path over them.
pub struct Cluster {
    engines: Mutex<BTreeMap<EngineId, Arc<dyn EngineHandle>>>,
    config: ClusterConfig,
}

impl Cluster {
    /// Create an empty cluster.
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            engines: Mutex::new(BTreeMap::new()),
            config,
        }
    }

    /// Create a cluster from a startup roster.
    ///
    /// Every engine must already be connected. Later duplicates of an id
    /// replace earlier ones.
    pub fn with_engines<I>(config: ClusterConfig, engines: I) -> ClusterResult<Self>
    where
        I: IntoIterator<Item = Arc<dyn EngineHandle>>,
    {
        let mut map = BTreeMap::new();
        for engine in engines {
            if !engine.is_connected() {
                return Err(ClusterError::EngineNotConnected(engine.id().to_string()));
            }
            let (id, engine) = keyed(engine);
            map.insert(id, engine);
        }

        Ok(Self {
            engines: Mutex::new(map),
            config,
        })
    }

    /// Add an engine, replacing any engine with the same id.
    ///
    /// Returns the replaced handle, if any.
    pub async fn register(&self, engine: Arc<dyn EngineHandle>) -> Option<Arc<dyn EngineHandle>> {
        let (id, engine) = keyed(engine);
        let mut engines = self.engines.lock().await;
        let replaced = engines.insert(id.clone(), engine);
        info!(engine = %id, replaced = replaced.is_some(), "engine registered");
        replaced
    }

    /// Remove an engine. Removing an unknown id is a no-op.
    ///
    /// Returns whether an engine was removed.
    pub async fn unregister(&self, engine_id: &str) -> bool {
        let mut engines = self.engines.lock().await;
        let existed = engines.remove(engine_id).is_some();
        if existed {
            info!(engine = %engine_id, "engine unregistered");
        }
        existed
    }

    /// Static info of every registered engine, sorted by id.
    pub async fn engines(&self) -> Vec<EngineInfo> {
        let engines = self.engines.lock().await;
        engines.values().map(|e| e.info().clone()).collect()
    }

    pub async fn engine(&self, engine_id: &str) -> Option<Arc<dyn EngineHandle>> {
        self.engines.lock().await.get(engine_id).cloned()
    }

    pub async fn contains(&self, engine_id: &str) -> bool {
        self.engines.lock().await.contains_key(engine_id)
    }

    pub async fn len(&self) -> usize {
        self.engines.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.engines.lock().await.is_empty()
    }

    /// Choose an engine for `image` and start it there.
    ///
    /// The whole snapshot → score → start sequence runs under the
    /// registry lock.
    pub async fn place(&self, image: &Image, pull: bool) -> ClusterResult<Container> {
        let request = image.request();
        if !request.is_valid() {
            warn!(image = %image.name, %request, "rejecting invalid resource request");
            return Err(ClusterError::InvalidRequest(request));
        }

        let engines = self.engines.lock().await;

        let mut snapshots = Vec::with_capacity(engines.len());
        for (id, engine) in engines.iter() {
            match engine.list_containers(&ListQuery::running()).await {
                Ok(containers) => {
                    snapshots.push(EngineSnapshot::from_containers(engine.info(), &containers));
                }
                Err(source) => match self.config.placement_unreachable {
                    UnreachablePolicy::Abort => {
                        return Err(ClusterError::EngineUnreachable {
                            engine_id: id.clone(),
                            source,
                        });
                    }
                    UnreachablePolicy::Skip => {
                        warn!(engine = %id, error = %source, "skipping unreachable engine for placement");
                    }
                },
            }
        }

        debug!(
            image = %image.name,
            container = %image.container_name,
            candidates = snapshots.len(),
            %request,
            "placing container"
        );

        let best = select_engine(&snapshots, &request, &self.config.weights)?;
        let engine = engines
            .get(&best.engine_id)
            .ok_or_else(|| ClusterError::EngineNotRegistered(best.engine_id.clone()))?;

        let container = engine
            .start(image, pull)
            .await
            .map_err(|source| ClusterError::RemoteOperationFailed {
                engine_id: best.engine_id.clone(),
                operation: "start",
                source,
            })?;

        info!(
            engine = %best.engine_id,
            container = %container.id,
            image = %image.name,
            score = best.total,
            "container placed"
        );
        Ok(container)
    }

    /// Route a lifecycle verb to the engine that owns `container`.
    pub async fn dispatch(&self, verb: Lifecycle, container: &Container) -> ClusterResult<()> {
        let engine = {
            let engines = self.engines.lock().await;
            engines.get(&container.engine_id).cloned()
        }
        .ok_or_else(|| ClusterError::EngineNotRegistered(container.engine_id.clone()))?;

        debug!(
            engine = %container.engine_id,
            container = %container.id,
            verb = verb.name(),
            "dispatching lifecycle verb"
        );

        verb.apply(engine.as_ref(), container)
            .await
            .map_err(|source| ClusterError::RemoteOperationFailed {
                engine_id: container.engine_id.clone(),
                operation: verb.name(),
                source,
            })
    }

    pub async fn stop(&self, container: &Container) -> ClusterResult<()> {
        self.dispatch(Lifecycle::Stop, container).await
    }

    pub async fn restart(&self, container: &Container, timeout: std::time::Duration) -> ClusterResult<()> {
        self.dispatch(Lifecycle::Restart { timeout }, container).await
    }

    pub async fn kill(&self, container: &Container, signal: i32) -> ClusterResult<()> {
        self.dispatch(Lifecycle::Kill { signal }, container).await
    }

    pub async fn remove(&self, container: &Container) -> ClusterResult<()> {
        self.dispatch(Lifecycle::Remove, container).await
    }

    /// Containers across the cluster. Engines that fail to list are skipped.
    pub async fn list_containers(&self, query: &ListQuery) -> Vec<Container> {
        let engines = self.engines.lock().await;
        let mut out = Vec::new();
        for (id, engine) in engines.iter() {
            match engine.list_containers(query).await {
                Ok(containers) => out.extend(containers),
                Err(e) => warn!(engine = %id, error = %e, "skipping engine in container listing"),
            }
        }
        out
    }

    /// Aggregate capacity, reservation and counts over reachable engines.
    ///
    /// With the default `Skip` policy an engine whose workload or image
    /// listing fails is left out of every total except `engine_count`.
    pub async fn summary(&self) -> ClusterResult<ClusterSummary> {
        let engines = self.engines.lock().await;
        let mut summary = ClusterSummary {
            engine_count: engines.len(),
            ..ClusterSummary::default()
        };

        for (id, engine) in engines.iter() {
            let listed = match engine.list_containers(&ListQuery::running()).await {
                Ok(containers) => engine.list_images().await.map(|images| (containers, images)),
                Err(e) => Err(e),
            };

            let (containers, images) = match listed {
                Ok(pair) => pair,
                Err(source) => match self.config.summary_unreachable {
                    UnreachablePolicy::Abort => {
                        return Err(ClusterError::EngineUnreachable {
                            engine_id: id.clone(),
                            source,
                        });
                    }
                    UnreachablePolicy::Skip => {
                        warn!(engine = %id, error = %source, "excluding unreachable engine from summary");
                        summary.unreachable_engines.push(id.clone());
                        continue;
                    }
                },
            };

            let snapshot = EngineSnapshot::from_containers(engine.info(), &containers);
            summary.cpus += snapshot.cpus;
            summary.memory_bytes = summary.memory_bytes.saturating_add(snapshot.memory_bytes);
            summary.reserved_cpus += snapshot.reserved_cpus;
            summary.reserved_memory_bytes = summary
                .reserved_memory_bytes
                .saturating_add(snapshot.reserved_memory_bytes);
            summary.container_count += containers.len();
            summary.image_count += images.len();
        }

        Ok(summary)
    }
}
