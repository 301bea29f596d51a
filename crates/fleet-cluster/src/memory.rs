//! In-process engine.
//!
//! `MemoryEngine` implements [`EngineHandle`] without any remote engine
//! behind it. `fleetd plan` uses it for dry runs, and tests use its
//! failure switches to simulate unreachable engines and failed starts.
//! It never enforces capacity; that is the scheduler's job.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use fleet_core::{Container, ContainerState, EngineInfo, Image, ListQuery, PortBinding};

use crate::engine::{EngineConnector, EngineFuture, EngineHandle};
use crate::error::{EngineError, EngineResult};

/// First host port handed out for `port = 0` bindings.
const EPHEMERAL_PORT_BASE: u16 = 32768;

#[derive(Debug, Default)]
struct MemoryState {
    containers: Vec<Container>,
    images: BTreeSet<String>,
    next_seq: u64,
    fail_next_start: Option<String>,
}

/// An engine that keeps its containers in memory.
#[derive(Debug)]
pub struct MemoryEngine {
    info: EngineInfo,
    connected: AtomicBool,
    reachable: AtomicBool,
    state: Mutex<MemoryState>,
}

impl MemoryEngine {
    pub fn new(info: EngineInfo) -> Self {
        Self {
            info,
            connected: AtomicBool::new(true),
            reachable: AtomicBool::new(true),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Shorthand for tests and rosters built in code.
    pub fn with_capacity(id: &str, cpus: f64, memory_bytes: u64) -> Self {
        Self::new(EngineInfo {
            id: id.to_string(),
            addr: format!("mem://{id}"),
            cpus,
            memory_bytes,
            labels: Vec::new(),
        })
    }

    /// Pre-populate the image cache.
    pub fn with_images<I, S>(self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().images.extend(images.into_iter().map(Into::into));
        self
    }

    /// Simulate losing (or regaining) the network path to the engine.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make the next `start` fail with `EngineError::Rejected(reason)`.
    pub fn fail_next_start(&self, reason: impl Into<String>) {
        self.state().fail_next_start = Some(reason.into());
    }

    /// Containers in any state.
    pub fn container_count(&self) -> usize {
        self.state().containers.len()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_reachable(&self) -> EngineResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(EngineError::NotConnected);
        }
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(EngineError::Unreachable(format!(
                "{}: connection refused",
                self.info.addr
            )));
        }
        Ok(())
    }

    /// Apply `f` to the container with the given id.
    fn with_container<F>(&self, container: &Container, f: F) -> EngineResult<()>
    where
        F: FnOnce(&mut Container),
    {
        self.check_reachable()?;
        let mut state = self.state();
        let found = state
            .containers
            .iter_mut()
            .find(|c| c.id == container.id)
            .ok_or_else(|| EngineError::NoSuchContainer(container.id.clone()))?;
        f(found);
        Ok(())
    }

    fn create(&self, image: &Image, pull: bool) -> EngineResult<Container> {
        self.check_reachable()?;
        let mut state = self.state();

        if let Some(reason) = state.fail_next_start.take() {
            return Err(EngineError::Rejected(reason));
        }
        if image.name.is_empty() {
            return Err(EngineError::Rejected("image name is empty".to_string()));
        }

        if pull {
            debug!(engine = %self.info.id, image = %image.name, "pulling image");
        }
        state.images.insert(image.name.clone());

        state.next_seq += 1;
        let seq = state.next_seq;
        let name = if image.container_name.is_empty() {
            format!("{}_{seq}", short_name(&image.name))
        } else {
            image.container_name.clone()
        };

        let ports = image
            .bind_ports
            .iter()
            .enumerate()
            .map(|(i, b)| PortBinding {
                port: if b.port == 0 {
                    ephemeral_port(seq, i)
                } else {
                    b.port
                },
                ..b.clone()
            })
            .collect();

        let container = Container {
            id: format!("{}-{seq:06x}", self.info.id),
            name,
            image: image.clone(),
            engine_id: self.info.id.clone(),
            state: ContainerState::Running,
            ports,
        };
        state.containers.push(container.clone());

        debug!(engine = %self.info.id, container = %container.id, "container started");
        Ok(container)
    }
}

/// Last path segment of an image reference without its tag.
fn short_name(image: &str) -> &str {
    let last = image.rsplit('/').next().unwrap_or(image);
    last.split(':').next().unwrap_or(last)
}

fn ephemeral_port(seq: u64, index: usize) -> u16 {
    let span = u64::from(u16::MAX - EPHEMERAL_PORT_BASE);
    let offset = (seq * 16 + index as u64) % span;
    EPHEMERAL_PORT_BASE + offset as u16
}

fn matches(container: &Container, query: &ListQuery) -> bool {
    if !query.all && !container.is_running() {
        return false;
    }
    match &query.filter {
        Some(f) => container.name.contains(f.as_str()) || container.image.name.contains(f.as_str()),
        None => true,
    }
}

impl EngineHandle for MemoryEngine {
    fn info(&self) -> &EngineInfo {
        &self.info
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn list_containers<'a>(&'a self, query: &'a ListQuery) -> EngineFuture<'a, Vec<Container>> {
        Box::pin(async move {
            self.check_reachable()?;
            let state = self.state();
            Ok(state
                .containers
                .iter()
                .filter(|c| matches(c, query))
                .cloned()
                .collect())
        })
    }

    fn list_images(&self) -> EngineFuture<'_, Vec<String>> {
        Box::pin(async move {
            self.check_reachable()?;
            Ok(self.state().images.iter().cloned().collect())
        })
    }

    fn start<'a>(&'a self, image: &'a Image, pull: bool) -> EngineFuture<'a, Container> {
        Box::pin(async move { self.create(image, pull) })
    }

    fn stop<'a>(&'a self, container: &'a Container) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            self.with_container(container, |c| c.state = ContainerState::Exited)
        })
    }

    fn restart<'a>(&'a self, container: &'a Container, _timeout: Duration) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            self.with_container(container, |c| c.state = ContainerState::Running)
        })
    }

    fn kill<'a>(&'a self, container: &'a Container, signal: i32) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            debug!(engine = %self.info.id, container = %container.id, signal, "kill");
            self.with_container(container, |c| c.state = ContainerState::Exited)
        })
    }

    fn remove<'a>(&'a self, container: &'a Container) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            self.check_reachable()?;
            let mut state = self.state();
            let before = state.containers.len();
            state.containers.retain(|c| c.id != container.id);
            if state.containers.len() == before {
                return Err(EngineError::NoSuchContainer(container.id.clone()));
            }
            Ok(())
        })
    }
}

/// Connector that hands out a fresh [`MemoryEngine`] per roster entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryConnector;

impl EngineConnector for MemoryConnector {
    fn connect(&self, info: &EngineInfo) -> EngineResult<Arc<dyn EngineHandle>> {
        Ok(Arc::new(MemoryEngine::new(info.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> MemoryEngine {
        MemoryEngine::with_capacity("mem-1", 4.0, 4096)
    }

    #[tokio::test]
    async fn start_assigns_identity_and_owner() {
        let engine = engine();
        let c = engine.start(&Image::new("nginx:1.25", 1.0, 128), false).await.unwrap();

        assert_eq!(c.id, "mem-1-000001");
        assert_eq!(c.name, "nginx_1");
        assert_eq!(c.engine_id, "mem-1");
        assert!(c.is_running());
    }

    #[tokio::test]
    async fn explicit_container_name_is_kept() {
        let engine = engine();
        let mut image = Image::new("registry.local/team/api:v2", 1.0, 128);
        image.container_name = "api-primary".to_string();

        let c = engine.start(&image, true).await.unwrap();
        assert_eq!(c.name, "api-primary");
        assert_eq!(engine.list_images().await.unwrap(), vec!["registry.local/team/api:v2"]);
    }

    #[tokio::test]
    async fn zero_host_ports_are_assigned() {
        let engine = engine();
        let mut image = Image::new("web", 0.5, 64);
        image.bind_ports = vec![
            PortBinding { host_ip: String::new(), port: 0, container_port: 80, proto: "tcp".into() },
            PortBinding { host_ip: String::new(), port: 8443, container_port: 443, proto: "tcp".into() },
        ];

        let c = engine.start(&image, false).await.unwrap();
        assert!(c.ports[0].port >= EPHEMERAL_PORT_BASE);
        assert_eq!(c.ports[1].port, 8443);
    }

    #[tokio::test]
    async fn running_listing_hides_stopped_containers() {
        let engine = engine();
        let a = engine.start(&Image::new("a", 1.0, 1), false).await.unwrap();
        engine.start(&Image::new("b", 1.0, 1), false).await.unwrap();

        engine.stop(&a).await.unwrap();

        assert_eq!(engine.list_containers(&ListQuery::running()).await.unwrap().len(), 1);
        assert_eq!(engine.list_containers(&ListQuery::all()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn filter_matches_name_or_image() {
        let engine = engine();
        engine.start(&Image::new("redis:7", 1.0, 1), false).await.unwrap();
        engine.start(&Image::new("postgres:16", 1.0, 1), false).await.unwrap();

        let query = ListQuery {
            filter: Some("redis".to_string()),
            ..ListQuery::default()
        };
        let found = engine.list_containers(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].image.name, "redis:7");
    }

    #[tokio::test]
    async fn unreachable_engine_fails_every_call() {
        let engine = engine();
        let c = engine.start(&Image::new("a", 1.0, 1), false).await.unwrap();
        engine.set_reachable(false);

        assert!(matches!(
            engine.list_containers(&ListQuery::running()).await,
            Err(EngineError::Unreachable(_))
        ));
        assert!(engine.list_images().await.is_err());
        assert!(engine.stop(&c).await.is_err());

        engine.set_reachable(true);
        assert!(engine.stop(&c).await.is_ok());
    }

    #[tokio::test]
    async fn fail_next_start_is_one_shot() {
        let engine = engine();
        engine.fail_next_start("image pull denied");

        let err = engine.start(&Image::new("a", 1.0, 1), false).await.unwrap_err();
        assert_eq!(err, EngineError::Rejected("image pull denied".to_string()));
        assert!(engine.start(&Image::new("a", 1.0, 1), false).await.is_ok());
    }

    #[tokio::test]
    async fn remove_unknown_container_is_an_error() {
        let engine = engine();
        let c = engine.start(&Image::new("a", 1.0, 1), false).await.unwrap();

        engine.remove(&c).await.unwrap();
        assert_eq!(engine.container_count(), 0);
        assert_eq!(
            engine.remove(&c).await,
            Err(EngineError::NoSuchContainer(c.id.clone()))
        );
    }

    #[tokio::test]
    async fn kill_and_restart_flip_state() {
        let engine = engine();
        let c = engine.start(&Image::new("a", 1.0, 1), false).await.unwrap();

        engine.kill(&c, 9).await.unwrap();
        assert!(engine.list_containers(&ListQuery::running()).await.unwrap().is_empty());

        engine.restart(&c, Duration::from_secs(10)).await.unwrap();
        assert_eq!(engine.list_containers(&ListQuery::running()).await.unwrap().len(), 1);
    }

    #[test]
    fn connector_builds_connected_engines() {
        let info = EngineInfo {
            id: "e".to_string(),
            addr: "tcp://127.0.0.1:2375".to_string(),
            cpus: 1.0,
            memory_bytes: 1,
            labels: Vec::new(),
        };
        let handle = MemoryConnector.connect(&info).unwrap();
        assert!(handle.is_connected());
        assert_eq!(handle.id(), "e");
    }
}
