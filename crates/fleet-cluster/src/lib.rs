//! fleet-cluster: the engine registry and lifecycle dispatch.
//!
//! Holds the set of live engines, runs the serialized placement sequence
//! over them, and routes lifecycle verbs to the engine that owns a
//! container.
//!
//! # Architecture
//!
//! ```text
//! Cluster (one async mutex)
//!   ├── register / unregister      → id → Arc<dyn EngineHandle>
//!   ├── place(image)               → list running on every engine
//!   │                                → EngineSnapshot per engine
//!   │                                → fleet_placement::select_engine
//!   │                                → start on the winner
//!   ├── dispatch(verb, container)  → lookup owner, call outside the lock
//!   └── summary()                  → aggregate, unreachable engines skipped
//!
//! EngineHandle (trait)             → implemented per engine protocol
//!   └── MemoryEngine               → in-process engine for dry runs and tests
//! ```

pub mod engine;
pub mod error;
pub mod memory;
pub mod probe;
pub mod registry;

pub use engine::{EngineConnector, EngineFuture, EngineHandle, Lifecycle};
pub use error::{ClusterError, ClusterResult, EngineError, EngineResult};
pub use memory::{MemoryConnector, MemoryEngine};
pub use registry::{Cluster, ClusterConfig};
