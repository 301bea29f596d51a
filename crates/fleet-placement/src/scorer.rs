//! Engine scoring for placement decisions.
//!
//! Scores each engine by its utilization *after* the hypothetical
//! placement and prefers the least loaded one (spread, not tight
//! bin-packing):
//! - **Fit**: reject engines whose advertised capacity is below the request
//! - **Headroom**: reject engines that would exceed 100% on either dimension
//! - **Spread**: lowest combined utilization wins

use tracing::{debug, info};

use fleet_core::{EngineId, ResourceRequest};

use crate::error::{PlacementError, PlacementResult};
use crate::snapshot::EngineSnapshot;

/// Scored placement result for a single engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineScore {
    pub engine_id: EngineId,
    /// CPU utilization after placement, in percent.
    pub cpu: f64,
    /// Memory utilization after placement, in percent.
    pub memory: f64,
    /// Weighted combination of `cpu` and `memory` (lower = better).
    pub total: f64,
}

/// Relative weights of the two dimensions in the total score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub cpu: f64,
    pub memory: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            cpu: 1.0,
            memory: 1.0,
        }
    }
}

/// Utilization in percent. A zero-capacity dimension is 0% when nothing
/// is asked of it and unbounded otherwise.
fn utilization(used: f64, capacity: f64) -> f64 {
    if capacity > 0.0 {
        used / capacity * 100.0
    } else if used <= 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

/// Score a single engine for the given request.
///
/// Returns `None` if the request is invalid, if the engine can never fit
/// it, or if the engine would be overcommitted on either dimension by it.
pub fn score_engine(
    snapshot: &EngineSnapshot,
    req: &ResourceRequest,
    weights: &ScoringWeights,
) -> Option<EngineScore> {
    if !req.is_valid() {
        return None;
    }
    if snapshot.cpus < req.cpus || snapshot.memory_bytes < req.memory_bytes {
        return None;
    }

    let cpu = utilization(snapshot.reserved_cpus + req.cpus, snapshot.cpus);
    let memory = utilization(
        snapshot.reserved_memory_bytes as f64 + req.memory_bytes as f64,
        snapshot.memory_bytes as f64,
    );
    let total = (cpu * weights.cpu + memory * weights.memory) / (weights.cpu + weights.memory);

    debug!(
        engine = %snapshot.engine_id,
        reserved_cpus = snapshot.reserved_cpus,
        cpus = snapshot.cpus,
        reserved_memory = snapshot.reserved_memory_bytes,
        memory = snapshot.memory_bytes,
        cpu_score = cpu,
        memory_score = memory,
        total,
        "scored engine"
    );

    if cpu <= 100.0 && memory <= 100.0 {
        Some(EngineScore {
            engine_id: snapshot.engine_id.clone(),
            cpu,
            memory,
            total,
        })
    } else {
        None
    }
}

/// Sort scores best first: lowest total, then engine id.
pub fn sort_scores(scores: &mut [EngineScore]) {
    scores.sort_by(|a, b| {
        a.total
            .total_cmp(&b.total)
            .then_with(|| a.engine_id.cmp(&b.engine_id))
    });
}

/// Score all engines and return the survivors sorted best first.
pub fn rank_engines(
    snapshots: &[EngineSnapshot],
    req: &ResourceRequest,
    weights: &ScoringWeights,
) -> Vec<EngineScore> {
    let mut scores: Vec<EngineScore> = snapshots
        .iter()
        .filter_map(|s| score_engine(s, req, weights))
        .collect();
    sort_scores(&mut scores);
    scores
}

/// Pick the engine a new workload should run on.
pub fn select_engine(
    snapshots: &[EngineSnapshot],
    req: &ResourceRequest,
    weights: &ScoringWeights,
) -> PlacementResult<EngineScore> {
    if !req.is_valid() {
        return Err(PlacementError::InvalidRequest { request: *req });
    }
    if snapshots.is_empty() {
        return Err(PlacementError::NoEligibleEngines);
    }

    let ranked = rank_engines(snapshots, req, weights);
    let best = ranked
        .first()
        .cloned()
        .ok_or(PlacementError::NoCapacity { request: *req })?;

    info!(
        engine = %best.engine_id,
        score = best.total,
        candidates = ranked.len(),
        "selected engine"
    );
    Ok(best)
}
