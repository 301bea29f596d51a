//! fleet-manager: workload operations over a fleet of engines.
//!
//! # Architecture
//!
//! ```text
//! Manager
//!   ├── bootstrap(config, connector) → Cluster with the connected roster
//!   ├── run(image, count)            → launch_batch → N × Cluster::place
//!   ├── destroy(container)           → kill(9) then remove
//!   ├── container / containers*      → aggregated engine listings
//!   ├── cluster_info                 → Cluster::summary
//!   └── health                       → probe::ping per engine
//! ```

pub mod error;
pub mod launch;
pub mod manager;

pub use error::{ManagerError, ManagerResult};
pub use launch::{LaunchOutcome, launch_batch};
pub use manager::Manager;
