//! Placement error types.

use thiserror::Error;

use fleet_core::ResourceRequest;

/// Reasons a placement decision could not be made.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    /// The request asks for a negative or non-finite amount of CPU.
    #[error("invalid resource request ({request})")]
    InvalidRequest { request: ResourceRequest },

    /// There was nothing to score.
    #[error("no eligible engines to run image")]
    NoEligibleEngines,

    /// Engines were scored but none has headroom for the request.
    #[error("no resources available to schedule container ({request})")]
    NoCapacity { request: ResourceRequest },
}

pub type PlacementResult<T> = Result<T, PlacementError>;
