//! fleet-core: domain types and configuration shared by every Fleet crate.

pub mod config;
pub mod size;
pub mod types;

pub use config::{FleetConfig, UnreachablePolicy};
pub use size::parse_bytes;
pub use types::*;
