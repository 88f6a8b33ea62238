//! Simulation configuration.

use arbiter_core::config::parse_var;
use arbiter_core::error::ArbiterError;
use serde::Serialize;

/// Environment variable holding the number of symphonies.
pub const SYMPHONIES_VAR: &str = "SIM_SYMPHONIES";
/// Environment variable holding the number of instances per symphony.
pub const INSTANCES_VAR: &str = "SIM_INSTANCES";
/// Environment variable holding the number of contended resources.
pub const RESOURCES_VAR: &str = "SIM_RESOURCES";
/// Environment variable holding the rounds each instance plays.
pub const ROUNDS_VAR: &str = "SIM_ROUNDS";
/// Environment variable holding the workload seed.
pub const SEED_VAR: &str = "SIM_SEED";

/// Shape of a simulated workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationConfig {
    /// Distinct symphonies competing for resources.
    pub symphonies: usize,
    /// Concurrent instances per symphony.
    pub instances: usize,
    /// Resources under contention.
    pub resources: usize,
    /// Acquire/release rounds per instance.
    pub rounds: usize,
    /// Seed for the workload script.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            symphonies: 4,
            instances: 2,
            resources: 3,
            rounds: 50,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ArbiterError::Configuration` if a variable is malformed.
    pub fn from_env() -> Result<Self, ArbiterError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ArbiterError::Configuration` if a value cannot be parsed or
    /// `SIM_RESOURCES` is zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ArbiterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            symphonies: parse_var(&lookup, SYMPHONIES_VAR)?.unwrap_or(defaults.symphonies),
            instances: parse_var(&lookup, INSTANCES_VAR)?.unwrap_or(defaults.instances),
            resources: parse_var(&lookup, RESOURCES_VAR)?.unwrap_or(defaults.resources),
            rounds: parse_var(&lookup, ROUNDS_VAR)?.unwrap_or(defaults.rounds),
            seed: parse_var(&lookup, SEED_VAR)?.unwrap_or(defaults.seed),
        };
        if config.resources == 0 {
            return Err(ArbiterError::Configuration(format!(
                "{RESOURCES_VAR} must be at least 1"
            )));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lookup_defaults() {
        let config = SimulationConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        // Arrange
        let lookup = |key: &str| match key {
            SYMPHONIES_VAR => Some("6".to_owned()),
            ROUNDS_VAR => Some("10".to_owned()),
            SEED_VAR => Some("7".to_owned()),
            _ => None,
        };

        // Act
        let config = SimulationConfig::from_lookup(lookup).unwrap();

        // Assert
        assert_eq!(config.symphonies, 6);
        assert_eq!(config.rounds, 10);
        assert_eq!(config.seed, 7);
        assert_eq!(config.instances, 2);
    }

    #[test]
    fn test_from_lookup_rejects_zero_resources() {
        let result = SimulationConfig::from_lookup(|key| {
            (key == RESOURCES_VAR).then(|| "0".to_owned())
        });
        match result.unwrap_err() {
            ArbiterError::Configuration(msg) => assert!(msg.contains(RESOURCES_VAR)),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }
}
