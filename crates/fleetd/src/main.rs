//! fleetd: the fleet placement daemon.
//!
//! Loads an engine roster and drives the manager against it. Engines are
//! backed by in-process `MemoryEngine`s, so `plan` is a dry run of the
//! scheduler against the roster's advertised capacity.
//!
//! # Usage
//!
//! ```text
//! fleetd check   --config fleet.toml
//! fleetd plan    --config fleet.toml --image nginx:1.25 --cpus 0.5 --memory 256MiB --count 4
//! fleetd summary --config fleet.toml
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use fleet_cluster::MemoryConnector;
use fleet_core::{ClusterSummary, ContainerId, EngineId, FleetConfig, Image, parse_bytes};
use fleet_manager::Manager;

const DEFAULT_FILTER: &str = "info,fleetd=debug,fleet=debug";

#[derive(Parser)]
#[command(name = "fleetd", about = "Fleet placement daemon", version)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and validate a roster.
    Check {
        #[arg(short, long, default_value = "fleet.toml")]
        config: PathBuf,
    },
    /// Place a batch of identical workloads against the roster.
    Plan {
        #[arg(short, long, default_value = "fleet.toml")]
        config: PathBuf,

        /// Image reference to launch.
        #[arg(long)]
        image: String,

        /// CPUs requested per container.
        #[arg(long, default_value = "1", value_parser = parse_cpus)]
        cpus: f64,

        /// Memory requested per container (e.g. 512MiB, 2GiB, 1048576).
        #[arg(long, default_value = "0", value_parser = parse_memory)]
        memory: u64,

        /// Number of containers to place.
        #[arg(long, default_value = "1")]
        count: usize,

        /// Pull the image before starting.
        #[arg(long)]
        pull: bool,
    },
    /// Print cluster totals and reservations.
    Summary {
        #[arg(short, long, default_value = "fleet.toml")]
        config: PathBuf,
    },
}

fn parse_cpus(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(cpus) if cpus.is_finite() && cpus >= 0.0 => Ok(cpus),
        _ => Err(format!("invalid cpu count: {s}")),
    }
}

fn parse_memory(s: &str) -> Result<u64, String> {
    parse_bytes(s).ok_or_else(|| format!("invalid memory size: {s}"))
}

#[derive(Serialize)]
struct PlanReport {
    image: String,
    requested: usize,
    launched: usize,
    assignments: BTreeMap<EngineId, Vec<ContainerId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    summary: ClusterSummary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Command::Check { config } => check(&config),
        Command::Plan {
            config,
            image,
            cpus,
            memory,
            count,
            pull,
        } => plan(&config, Image::new(&image, cpus, memory), count, pull).await,
        Command::Summary { config } => summary(&config).await,
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load(path: &Path) -> anyhow::Result<FleetConfig> {
    FleetConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

/// Advertised CPUs and memory summed over the roster.
fn roster_totals(config: &FleetConfig) -> (f64, u64) {
    config.engines.iter().fold((0.0, 0u64), |(cpus, memory), e| {
        (cpus + e.cpus, memory.saturating_add(e.memory))
    })
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    let (cpus, memory) = roster_totals(&config);

    for engine in config.engine_infos() {
        println!("{engine}");
    }
    println!(
        "{} engines, {cpus} cpus, {memory} bytes memory",
        config.engines.len()
    );
    Ok(())
}

async fn plan(path: &Path, image: Image, count: usize, pull: bool) -> anyhow::Result<()> {
    let config = load(path)?;
    let manager = Manager::bootstrap(&config, &MemoryConnector)?;

    info!(image = %image.name, request = %image.request(), count, "planning batch");
    let name = image.name.clone();
    let outcome = manager.run(image, count, pull).await;
    let requested = outcome.requested();
    let (containers, error) = outcome.into_parts();

    let mut assignments: BTreeMap<EngineId, Vec<ContainerId>> = BTreeMap::new();
    for container in &containers {
        assignments
            .entry(container.engine_id.clone())
            .or_default()
            .push(container.id.clone());
    }

    let report = PlanReport {
        image: name,
        requested,
        launched: containers.len(),
        assignments,
        error: error.as_ref().map(ToString::to_string),
        summary: manager.cluster_info().await?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(e) = error {
        warn!(error = %e, "batch incomplete");
        return Err(e.into());
    }
    Ok(())
}

async fn summary(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    let manager = Manager::bootstrap(&config, &MemoryConnector)?;
    let summary = manager.cluster_info().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpus_must_be_non_negative() {
        assert_eq!(parse_cpus("1.5"), Ok(1.5));
        assert_eq!(parse_cpus("0"), Ok(0.0));
        assert!(parse_cpus("-4").is_err());
        assert!(parse_cpus("NaN").is_err());
        assert!(parse_cpus("inf").is_err());
        assert!(parse_cpus("two").is_err());
    }

    #[test]
    fn plan_rejects_negative_cpus_on_the_command_line() {
        let parsed = Cli::try_parse_from(["fleetd", "plan", "--image", "app", "--cpus=-4"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn roster_totals_saturate() {
        let config = FleetConfig::from_toml_str(
            r#"
[[engines]]
id = "a"
addr = "mem://a"
cpus = 2.0
memory = 9223372036854775807

[[engines]]
id = "b"
addr = "mem://b"
cpus = 3.0
memory = 9223372036854775807

[[engines]]
id = "c"
addr = "mem://c"
cpus = 0.5
memory = 9223372036854775807
"#,
        )
        .unwrap();

        assert_eq!(roster_totals(&config), (5.5, u64::MAX));
    }
}
