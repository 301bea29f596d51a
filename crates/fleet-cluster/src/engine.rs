//! The engine handle contract.
//!
//! A handle is the sole owner of the connection to one remote container
//! engine. The wire protocol behind it (transport, TLS, auth, image pulls,
//! port translation) belongs to the implementation; the cluster only sees
//! the capability set below.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use fleet_core::{Container, EngineId, EngineInfo, Image, ListQuery};

use crate::error::EngineResult;

/// Boxed future alias for engine handle results.
pub type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = EngineResult<T>> + Send + 'a>>;

/// Capability set of one remote engine.
///
/// All side effects are remote. Implementations return errors unmodified
/// and perform no retries.
pub trait EngineHandle: Send + Sync + std::fmt::Debug {
    /// Static identity, address and advertised capacity.
    fn info(&self) -> &EngineInfo;

    /// Whether a client to the remote engine API has been established.
    fn is_connected(&self) -> bool;

    /// List containers on the engine.
    fn list_containers<'a>(&'a self, query: &'a ListQuery) -> EngineFuture<'a, Vec<Container>>;

    /// List image tags present on the engine.
    fn list_images(&self) -> EngineFuture<'_, Vec<String>>;

    /// Create and start a container from `image`, pulling it first if asked.
    fn start<'a>(&'a self, image: &'a Image, pull: bool) -> EngineFuture<'a, Container>;

    fn stop<'a>(&'a self, container: &'a Container) -> EngineFuture<'a, ()>;

    fn restart<'a>(&'a self, container: &'a Container, timeout: Duration) -> EngineFuture<'a, ()>;

    fn kill<'a>(&'a self, container: &'a Container, signal: i32) -> EngineFuture<'a, ()>;

    fn remove<'a>(&'a self, container: &'a Container) -> EngineFuture<'a, ()>;

    fn id(&self) -> &str {
        &self.info().id
    }
}

/// Factory for engine handles: the seam where a concrete engine
/// protocol plugs in.
pub trait EngineConnector: Send + Sync {
    /// Establish a client for the engine described by `info`.
    fn connect(&self, info: &EngineInfo) -> EngineResult<Arc<dyn EngineHandle>>;
}

/// Lifecycle verbs routed to the engine that owns a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stop,
    Restart { timeout: Duration },
    Kill { signal: i32 },
    Remove,
}

impl Lifecycle {
    pub fn name(&self) -> &'static str {
        match self {
            Lifecycle::Stop => "stop",
            Lifecycle::Restart { .. } => "restart",
            Lifecycle::Kill { .. } => "kill",
            Lifecycle::Remove => "remove",
        }
    }

    /// Run this verb against `engine`.
    pub(crate) fn apply<'a>(
        self,
        engine: &'a dyn EngineHandle,
        container: &'a Container,
    ) -> EngineFuture<'a, ()> {
        match self {
            Lifecycle::Stop => engine.stop(container),
            Lifecycle::Restart { timeout } => engine.restart(container, timeout),
            Lifecycle::Kill { signal } => engine.kill(container, signal),
            Lifecycle::Remove => engine.remove(container),
        }
    }
}

/// Convenience for building handle maps keyed by engine id.
pub(crate) fn keyed(engine: Arc<dyn EngineHandle>) -> (EngineId, Arc<dyn EngineHandle>) {
    (engine.id().to_string(), engine)
}
