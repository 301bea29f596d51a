//! Cluster and engine error types.

use thiserror::Error;

use fleet_core::{EngineId, ResourceRequest};
use fleet_placement::PlacementError;

/// Errors reported by an engine handle. Handles return these unmodified
/// and never retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine is not connected to its container API")]
    NotConnected,

    #[error("engine unreachable: {0}")]
    Unreachable(String),

    #[error("no such container: {0}")]
    NoSuchContainer(String),

    #[error("engine rejected request: {0}")]
    Rejected(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during cluster operations.
///
/// None of these leave the registry in a different state than before the
/// failed call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    /// Listing workloads on an engine failed.
    #[error("engine {engine_id} unreachable: {source}")]
    EngineUnreachable {
        engine_id: EngineId,
        source: EngineError,
    },

    /// The request asks for a negative or non-finite amount of CPU.
    #[error("invalid resource request ({0})")]
    InvalidRequest(ResourceRequest),

    /// Nothing to place on: the registry is empty or every engine was skipped.
    #[error("no eligible engines to run image")]
    NoEligibleEngines,

    /// Engines exist but none has headroom for the request.
    #[error("no resources available to schedule container ({request})")]
    NoCapacityAvailable { request: ResourceRequest },

    /// The container's owning engine is no longer registered.
    #[error("engine with id {0} is not in cluster")]
    EngineNotRegistered(EngineId),

    #[error("engine {0} is not connected to its container API")]
    EngineNotConnected(EngineId),

    /// The engine accepted the dispatch but the remote call failed.
    ///
    /// For `start` a created-but-not-started container may be left behind
    /// on the engine.
    #[error("{operation} on engine {engine_id} failed: {source}")]
    RemoteOperationFailed {
        engine_id: EngineId,
        operation: &'static str,
        source: EngineError,
    },
}

impl From<PlacementError> for ClusterError {
    fn from(err: PlacementError) -> Self {
        match err {
            PlacementError::InvalidRequest { request } => ClusterError::InvalidRequest(request),
            PlacementError::NoEligibleEngines => ClusterError::NoEligibleEngines,
            PlacementError::NoCapacity { request } => ClusterError::NoCapacityAvailable { request },
        }
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;
