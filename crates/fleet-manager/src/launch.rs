//! Batch launch: N independent placements issued at once.
//!
//! Each placement runs as its own task and reports into a slot indexed by
//! its request number. Nothing is appended to a shared list, and the
//! first error observed is kept even if later placements succeed.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, warn};

use fleet_cluster::Cluster;
use fleet_core::{Container, Image};

use crate::error::{ManagerError, ManagerResult};

/// Result of a batch launch.
#[derive(Debug)]
pub struct LaunchOutcome {
    slots: Vec<Option<Container>>,
    error: Option<ManagerError>,
}

impl LaunchOutcome {
    /// Number of placements that were requested.
    pub fn requested(&self) -> usize {
        self.slots.len()
    }

    /// Per-request results; `None` where that placement failed.
    pub fn slots(&self) -> &[Option<Container>] {
        &self.slots
    }

    /// Successfully launched containers in request order.
    pub fn launched(&self) -> Vec<&Container> {
        self.slots.iter().flatten().collect()
    }

    /// The first error observed, if any placement failed.
    pub fn error(&self) -> Option<&ManagerError> {
        self.error.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.slots.iter().all(Option::is_some)
    }

    /// Every launched container, or the first error observed.
    pub fn into_result(self) -> ManagerResult<Vec<Container>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.slots.into_iter().flatten().collect()),
        }
    }

    /// Split into launched containers and the first error.
    pub fn into_parts(self) -> (Vec<Container>, Option<ManagerError>) {
        (self.slots.into_iter().flatten().collect(), self.error)
    }
}

/// Place `count` copies of `image` concurrently.
pub async fn launch_batch(
    cluster: Arc<Cluster>,
    image: Arc<Image>,
    count: usize,
    pull: bool,
) -> LaunchOutcome {
    let mut tasks = JoinSet::new();
    for index in 0..count {
        let cluster = cluster.clone();
        let image = image.clone();
        tasks.spawn(async move { (index, cluster.place(&image, pull).await) });
    }

    let mut slots: Vec<Option<Container>> = vec![None; count];
    let mut error: Option<ManagerError> = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(container))) => {
                slots[index] = Some(container);
            }
            Ok((index, Err(e))) => {
                warn!(index, image = %image.name, error = %e, "placement failed");
                if error.is_none() {
                    error = Some(ManagerError::Cluster(e));
                }
            }
            Err(e) => {
                warn!(error = %e, image = %image.name, "launch task aborted");
                if error.is_none() {
                    error = Some(ManagerError::LaunchAborted(e.to_string()));
                }
            }
        }
    }

    let outcome = LaunchOutcome { slots, error };
    info!(
        image = %image.name,
        requested = count,
        launched = outcome.launched().len(),
        failed = outcome.error.is_some(),
        "batch launch finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_cluster::{ClusterConfig, ClusterError, MemoryEngine};
    use std::collections::HashSet;

    const GIB: u64 = 1024 * 1024 * 1024;

    async fn cluster(engines: Vec<MemoryEngine>) -> Arc<Cluster> {
        let cluster = Cluster::new(ClusterConfig::default());
        for e in engines {
            cluster.register(Arc::new(e)).await;
        }
        Arc::new(cluster)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn five_concurrent_placements_all_land() {
        let cluster = cluster(vec![
            MemoryEngine::with_capacity("a", 4.0, 4 * GIB),
            MemoryEngine::with_capacity("b", 4.0, 4 * GIB),
        ])
        .await;

        let outcome = launch_batch(cluster, Arc::new(Image::new("app", 1.0, GIB)), 5, false).await;

        assert!(outcome.is_complete());
        let containers = outcome.into_result().unwrap();
        assert_eq!(containers.len(), 5);
        let ids: HashSet<&str> = containers.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 5, "no container may be duplicated");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn partial_capacity_keeps_successes_and_first_error() {
        // Room for exactly 3.
        let cluster = cluster(vec![MemoryEngine::with_capacity("a", 3.0, 3 * GIB)]).await;

        let outcome = launch_batch(cluster, Arc::new(Image::new("app", 1.0, GIB)), 5, false).await;

        assert_eq!(outcome.requested(), 5);
        assert_eq!(outcome.launched().len(), 3);
        assert!(matches!(
            outcome.error(),
            Some(ManagerError::Cluster(ClusterError::NoCapacityAvailable { .. }))
        ));

        let (launched, error) = outcome.into_parts();
        assert_eq!(launched.len(), 3);
        assert!(error.is_some());
    }

    #[tokio::test]
    async fn zero_count_is_empty_success() {
        let cluster = cluster(vec![]).await;
        let outcome = launch_batch(cluster, Arc::new(Image::new("app", 1.0, GIB)), 0, false).await;

        assert!(outcome.is_complete());
        assert!(outcome.into_result().unwrap().is_empty());
    }

    #[tokio::test]
    async fn every_failure_reports_one_error() {
        let cluster = cluster(vec![]).await;
        let outcome = launch_batch(cluster, Arc::new(Image::new("app", 1.0, GIB)), 3, false).await;

        assert!(outcome.launched().is_empty());
        assert!(matches!(
            outcome.into_result(),
            Err(ManagerError::Cluster(ClusterError::NoEligibleEngines))
        ));
    }
}
