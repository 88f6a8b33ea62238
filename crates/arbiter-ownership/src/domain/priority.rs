//! Request priority levels.

use std::fmt;
use std::str::FromStr;

use arbiter_core::error::ArbiterError;
use serde::{Deserialize, Serialize};

/// Ordinal priority of an ownership request.
///
/// Declaration order is the arbitration order: `Low < Normal < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Background work; yields to everything.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// User-facing work.
    High,
    /// Preempts every other level.
    Critical,
}

impl Priority {
    /// All levels in ascending order.
    pub const ALL: [Self; 4] = [Self::Low, Self::Normal, Self::High, Self::Critical];

    /// Upper-case name of the level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ArbiterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ArbiterError::InvalidPriority(s.to_owned()))
    }
}
