//! Engine configuration.

use std::str::FromStr;

use serde::Serialize;

use crate::error::ArbiterError;

/// Environment variable holding the per-resource queue capacity.
pub const QUEUE_CAPACITY_VAR: &str = "ARBITER_QUEUE_CAPACITY";

/// Environment variable toggling queue replay on release.
pub const REPLAY_ON_RELEASE_VAR: &str = "ARBITER_REPLAY_ON_RELEASE";

/// Default number of pending requests retained per resource.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Tunables for the ownership engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArbiterConfig {
    /// Maximum pending requests retained per resource. Zero disables queuing.
    pub queue_capacity: usize,
    /// Grant the head of a resource's queue whenever that resource is released.
    pub replay_on_release: bool,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            replay_on_release: true,
        }
    }
}

impl ArbiterConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ArbiterError::Configuration` if a variable is set but cannot
    /// be parsed.
    pub fn from_env() -> Result<Self, ArbiterError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup. Unset keys fall
    /// back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ArbiterError::Configuration` if a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ArbiterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            queue_capacity: parse_var(&lookup, QUEUE_CAPACITY_VAR)?
                .unwrap_or(defaults.queue_capacity),
            replay_on_release: parse_flag(&lookup, REPLAY_ON_RELEASE_VAR)?
                .unwrap_or(defaults.replay_on_release),
        })
    }
}

/// Parses an optional variable with `FromStr`.
///
/// # Errors
///
/// Returns `ArbiterError::Configuration` naming the variable on parse failure.
pub fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ArbiterError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ArbiterError::Configuration(format!("{key} must be valid: {e}")))
        })
        .transpose()
}

/// Parses an optional boolean flag. Accepts `true/false`, `1/0`, `yes/no`,
/// `on/off` in any case.
///
/// # Errors
///
/// Returns `ArbiterError::Configuration` for any other value.
pub fn parse_flag<F>(lookup: &F, key: &str) -> Result<Option<bool>, ArbiterError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(ArbiterError::Configuration(format!(
                "{key} must be a boolean, got '{other}'"
            ))),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_uses_defaults_when_unset() {
        // Arrange
        let lookup = lookup_from(&[]);

        // Act
        let config = ArbiterConfig::from_lookup(lookup).unwrap();

        // Assert
        assert_eq!(config, ArbiterConfig::default());
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.replay_on_release);
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        // Arrange
        let lookup = lookup_from(&[(QUEUE_CAPACITY_VAR, " 3 "), (REPLAY_ON_RELEASE_VAR, "off")]);

        // Act
        let config = ArbiterConfig::from_lookup(lookup).unwrap();

        // Assert
        assert_eq!(config.queue_capacity, 3);
        assert!(!config.replay_on_release);
    }

    #[test]
    fn test_from_lookup_rejects_malformed_capacity() {
        // Arrange
        let lookup = lookup_from(&[(QUEUE_CAPACITY_VAR, "lots")]);

        // Act
        let result = ArbiterConfig::from_lookup(lookup);

        // Assert
        match result.unwrap_err() {
            ArbiterError::Configuration(msg) => assert!(msg.contains(QUEUE_CAPACITY_VAR)),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_from_lookup_rejects_malformed_flag() {
        // Arrange
        let lookup = lookup_from(&[(REPLAY_ON_RELEASE_VAR, "maybe")]);

        // Act
        let result = ArbiterConfig::from_lookup(lookup);

        // Assert
        match result.unwrap_err() {
            ArbiterError::Configuration(msg) => assert!(msg.contains("maybe")),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }
}
