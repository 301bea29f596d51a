//! fleet.toml configuration parser.
//!
//! The roster of engines is consumed once at startup; everything else in
//! the file tunes how the cluster reacts to unreachable engines and how
//! placement weighs CPU against memory.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::size::deserialize_bytes;
use crate::types::EngineInfo;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub cluster: ClusterSection,
    #[serde(default)]
    pub scoring: ScoringSection,
    #[serde(default)]
    pub engines: Vec<EngineConfig>,
}

/// What a read path does when an engine cannot be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreachablePolicy {
    /// Fail the whole operation with the engine's error.
    Abort,
    /// Leave the engine out and carry on.
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSection {
    #[serde(default = "default_placement_policy")]
    pub placement_unreachable: UnreachablePolicy,
    #[serde(default = "default_summary_policy")]
    pub summary_unreachable: UnreachablePolicy,
}

fn default_placement_policy() -> UnreachablePolicy {
    UnreachablePolicy::Abort
}

fn default_summary_policy() -> UnreachablePolicy {
    UnreachablePolicy::Skip
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            placement_unreachable: default_placement_policy(),
            summary_unreachable: default_summary_policy(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSection {
    #[serde(default = "default_weight")]
    pub cpu_weight: f64,
    #[serde(default = "default_weight")]
    pub memory_weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            cpu_weight: default_weight(),
            memory_weight: default_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub id: String,
    pub addr: String,
    pub cpus: f64,
    /// Integer bytes or a size string such as `"8GiB"`.
    #[serde(deserialize_with = "deserialize_bytes")]
    pub memory: u64,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl EngineConfig {
    pub fn to_info(&self) -> EngineInfo {
        EngineInfo {
            id: self.id.clone(),
            addr: self.addr.clone(),
            cpus: self.cpus,
            memory_bytes: self.memory,
            labels: self.labels.clone(),
        }
    }
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: FleetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject rosters the cluster could not run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for engine in &self.engines {
            if engine.id.trim().is_empty() {
                anyhow::bail!("engine with addr {:?} has an empty id", engine.addr);
            }
            if !seen.insert(engine.id.as_str()) {
                anyhow::bail!("duplicate engine id: {}", engine.id);
            }
            if !engine.cpus.is_finite() || engine.cpus < 0.0 {
                anyhow::bail!("engine {} has invalid cpus: {}", engine.id, engine.cpus);
            }
        }

        for (name, weight) in [
            ("cpu_weight", self.scoring.cpu_weight),
            ("memory_weight", self.scoring.memory_weight),
        ] {
            if !weight.is_finite() || weight <= 0.0 {
                anyhow::bail!("scoring.{name} must be positive, got {weight}");
            }
        }

        Ok(())
    }

    /// Static engine descriptions in roster order.
    pub fn engine_infos(&self) -> Vec<EngineInfo> {
        self.engines.iter().map(EngineConfig::to_info).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: &str = r#"
[cluster]
placement_unreachable = "skip"

[scoring]
memory_weight = 2.0

[[engines]]
id = "engine-a"
addr = "tcp://10.0.0.1:2375"
cpus = 4.0
memory = "8GiB"
labels = ["ssd"]

[[engines]]
id = "engine-b"
addr = "tcp://10.0.0.2:2375"
cpus = 2
memory = 1073741824
"#;

    #[test]
    fn parses_roster() {
        let config = FleetConfig::from_toml_str(ROSTER).unwrap();
        assert_eq!(config.engines.len(), 2);
        assert_eq!(config.engines[0].memory, 8 * 1024 * 1024 * 1024);
        assert_eq!(config.engines[1].memory, 1024 * 1024 * 1024);
        assert_eq!(config.engines[1].cpus, 2.0);
        assert_eq!(config.engines[0].labels, vec!["ssd".to_string()]);
    }

    #[test]
    fn section_defaults_apply() {
        let config = FleetConfig::from_toml_str(ROSTER).unwrap();
        assert_eq!(config.cluster.placement_unreachable, UnreachablePolicy::Skip);
        assert_eq!(config.cluster.summary_unreachable, UnreachablePolicy::Skip);
        assert_eq!(config.scoring.cpu_weight, 1.0);
        assert_eq!(config.scoring.memory_weight, 2.0);
    }

    #[test]
    fn empty_file_is_valid() {
        let config = FleetConfig::from_toml_str("").unwrap();
        assert!(config.engines.is_empty());
        assert_eq!(config.cluster.placement_unreachable, UnreachablePolicy::Abort);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let toml_str = r#"
[[engines]]
id = "a"
addr = "tcp://one"
cpus = 1.0
memory = "1G"

[[engines]]
id = "a"
addr = "tcp://two"
cpus = 1.0
memory = "1G"
"#;
        let err = FleetConfig::from_toml_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("duplicate engine id"));
    }

    #[test]
    fn rejects_bad_memory_string() {
        let toml_str = r#"
[[engines]]
id = "a"
addr = "tcp://one"
cpus = 1.0
memory = "plenty"
"#;
        assert!(FleetConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn rejects_non_positive_weight() {
        let toml_str = "[scoring]\ncpu_weight = 0.0\n";
        assert!(FleetConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = FleetConfig::from_toml_str(ROSTER).unwrap();
        let rendered = config.to_toml_string().unwrap();
        let reparsed = FleetConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(reparsed.engine_infos(), config.engine_infos());
    }
}
