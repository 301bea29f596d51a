//! Fleet placement: engine snapshots and spread scoring.
//!
//! This crate decides *where* a workload should run. It never talks to an
//! engine: callers hand it one [`EngineSnapshot`] per candidate engine and
//! get back the engine to dispatch to (that's `fleet-cluster`).
//!
//! # Components
//!
//! - **`snapshot`**: Reservation view built from an engine's running containers
//! - **`scorer`**: Fit/headroom filtering and lowest-utilization selection
//! - **`error`**: No-eligible-engines and no-capacity outcomes

pub mod error;
pub mod scorer;
pub mod snapshot;

pub use error::{PlacementError, PlacementResult};
pub use scorer::{EngineScore, ScoringWeights, rank_engines, score_engine, select_engine, sort_scores};
pub use snapshot::EngineSnapshot;
