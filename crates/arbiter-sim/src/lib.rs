//! Concurrent workload driver for the resource arbiter.
//!
//! Spawns one task per symphony instance and drives acquire, advanced
//! resolution and release traffic against a shared `ResourceManager`, then
//! verifies the ownership indexes are still consistent.

pub mod config;
pub mod workload;

pub use config::SimulationConfig;
pub use workload::{SimulationReport, run_simulation};
