//! Manager error types.

use thiserror::Error;

use fleet_cluster::ClusterError;

/// Errors that can occur during manager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("engine not found: {0}")]
    EngineNotFound(String),

    /// A launch task panicked or was cancelled before reporting.
    #[error("launch task aborted: {0}")]
    LaunchAborted(String),
}

pub type ManagerResult<T> = Result<T, ManagerError>;
