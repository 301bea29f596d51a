//! Point-in-time reservation view of one engine.
//!
//! Bridges `fleet_core::{EngineInfo, Container}` to the scorer's
//! [`EngineSnapshot`]. A snapshot lives for a single placement decision
//! and is never cached.

use serde::{Deserialize, Serialize};

use fleet_core::{Container, EngineId, EngineInfo};

/// Advertised capacity plus currently reserved capacity of one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub engine_id: EngineId,
    /// Advertised CPU units.
    pub cpus: f64,
    /// Advertised memory in bytes.
    pub memory_bytes: u64,
    /// Sum of the CPU requests of the engine's running containers.
    pub reserved_cpus: f64,
    /// Sum of the memory requests of the engine's running containers.
    pub reserved_memory_bytes: u64,
}

impl EngineSnapshot {
    /// Build a snapshot from an engine description and the containers a
    /// running-only listing returned for it.
    ///
    /// Reservation is the sum of declared requests, not measured usage.
    /// Negative or non-finite CPU requests count as zero.
    pub fn from_containers(info: &EngineInfo, containers: &[Container]) -> Self {
        let (reserved_cpus, reserved_memory_bytes) =
            containers.iter().fold((0.0, 0u64), |(cpus, mem), c| {
                (cpus + declared_cpus(c.image.cpus), mem.saturating_add(c.image.memory_bytes))
            });

        Self {
            engine_id: info.id.clone(),
            cpus: info.cpus,
            memory_bytes: info.memory_bytes,
            reserved_cpus,
            reserved_memory_bytes,
        }
    }
}

fn declared_cpus(cpus: f64) -> f64 {
    if cpus.is_finite() { cpus.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{ContainerState, Image};

    fn sample_engine() -> EngineInfo {
        EngineInfo {
            id: "engine-1".to_string(),
            addr: "tcp://10.0.0.1:2375".to_string(),
            cpus: 8.0,
            memory_bytes: 16 * 1024 * 1024 * 1024,
            labels: vec!["ssd".to_string()],
        }
    }

    fn container(id: &str, cpus: f64, memory_bytes: u64) -> Container {
        Container {
            id: id.to_string(),
            name: String::new(),
            image: Image::new("app", cpus, memory_bytes),
            engine_id: "engine-1".to_string(),
            state: ContainerState::Running,
            ports: Vec::new(),
        }
    }

    #[test]
    fn empty_engine_has_no_reservation() {
        let snap = EngineSnapshot::from_containers(&sample_engine(), &[]);

        assert_eq!(snap.engine_id, "engine-1");
        assert_eq!(snap.cpus, 8.0);
        assert_eq!(snap.reserved_cpus, 0.0);
        assert_eq!(snap.reserved_memory_bytes, 0);
    }

    #[test]
    fn sums_declared_requests() {
        let containers = vec![
            container("a", 1.5, 512 * 1024 * 1024),
            container("b", 0.5, 256 * 1024 * 1024),
        ];
        let snap = EngineSnapshot::from_containers(&sample_engine(), &containers);

        assert_eq!(snap.reserved_cpus, 2.0);
        assert_eq!(snap.reserved_memory_bytes, 768 * 1024 * 1024);
    }

    #[test]
    fn negative_declared_cpus_do_not_offset_reservation() {
        let containers = vec![
            container("a", 2.0, 0),
            container("b", -4.0, 0),
            container("c", f64::NAN, 0),
        ];
        let snap = EngineSnapshot::from_containers(&sample_engine(), &containers);

        assert_eq!(snap.reserved_cpus, 2.0);
    }
}
