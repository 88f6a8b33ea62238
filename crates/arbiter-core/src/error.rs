//! Error types shared across the arbiter crates.
//!
//! Contention between symphonies is never reported through these types;
//! rejection and queuing are ordinary return values of the ownership engine.

use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum ArbiterError {
    /// A priority name could not be parsed.
    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    /// A configuration value is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A simulation run could not be completed.
    #[error("simulation error: {0}")]
    Simulation(String),
}
