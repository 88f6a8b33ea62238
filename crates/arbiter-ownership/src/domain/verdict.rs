//! Conflict classification and resolution reporting.

use serde::{Deserialize, Serialize};

use super::owner::ResourceOwner;

/// What kind of conflict a request ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    /// The resource is free, or already held by the requesting instance.
    None,
    /// Another instance of the same symphony holds the resource.
    InstanceConflict,
    /// A different symphony holds the resource; priorities decide.
    PriorityConflict,
}

/// How a request must be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    /// Grant immediately.
    Allow,
    /// Refuse without changing state.
    Reject,
    /// Retain the request until the resource is free.
    Queue,
    /// Release the current holder and grant the requester.
    Interrupt,
}

/// The resolver's classification of a request, computed before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictVerdict {
    /// Whether the request conflicts with the current holder.
    pub has_conflict: bool,
    /// Kind of conflict.
    pub conflict_type: ConflictType,
    /// Required handling.
    pub resolution: Resolution,
    /// Holder at the time of classification, if any.
    pub current_owner: Option<ResourceOwner>,
    /// Diagnostic text. Never used for control flow.
    pub message: String,
}

impl ConflictVerdict {
    /// Verdict for a request that can be granted outright.
    #[must_use]
    pub fn allow(current_owner: Option<ResourceOwner>, message: impl Into<String>) -> Self {
        Self {
            has_conflict: false,
            conflict_type: ConflictType::None,
            resolution: Resolution::Allow,
            current_owner,
            message: message.into(),
        }
    }

    /// Verdict for a conflicting request.
    #[must_use]
    pub fn conflict(
        conflict_type: ConflictType,
        resolution: Resolution,
        current_owner: ResourceOwner,
        message: impl Into<String>,
    ) -> Self {
        Self {
            has_conflict: true,
            conflict_type,
            resolution,
            current_owner: Some(current_owner),
            message: message.into(),
        }
    }
}

/// Strategy that produced a `ResolutionReport`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// No conflict; the resource was granted directly.
    DirectAcquisition,
    /// The request was refused.
    Reject,
    /// The request was retained for later replay.
    Queue,
    /// The holder was preempted and the requester granted.
    Interrupt,
    /// The verdict could not be interpreted; nothing was changed.
    Unknown,
}

/// A queued request that has been granted after the resource became free.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayedGrant {
    /// The new holder.
    pub owner: ResourceOwner,
    /// The payload the request was queued with, returned verbatim.
    pub payload: serde_json::Value,
}

/// Outcome of the full resolution path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionReport {
    /// Whether the requester now holds the resource, or (for `Queue`) whether
    /// the request was retained.
    pub success: bool,
    /// Diagnostic text.
    pub message: String,
    /// Strategy applied.
    pub strategy: Strategy,
    /// Holder after resolution.
    pub owner: Option<ResourceOwner>,
    /// Holder that lost the resource to an interrupt.
    pub preempted: Option<ResourceOwner>,
    /// Zero-based position in the resource queue, for queued requests.
    pub queue_position: Option<usize>,
}

impl ResolutionReport {
    /// Report for a path that changed nothing.
    #[must_use]
    pub fn failure(
        strategy: Strategy,
        owner: Option<ResourceOwner>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            strategy,
            owner,
            preempted: None,
            queue_position: None,
        }
    }
}

/// Outcome of a release request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReleaseOutcome {
    /// The resource had no holder.
    NotOwned,
    /// The supplied execution id did not match the holder; nothing changed.
    Refused {
        /// The holder that was left in place.
        current_owner: ResourceOwner,
    },
    /// The holder was removed.
    Released {
        /// The record that was removed.
        previous: ResourceOwner,
        /// Queued request granted as a consequence, if any.
        replayed: Option<ReplayedGrant>,
    },
}

impl ReleaseOutcome {
    /// Whether a holder was removed.
    #[must_use]
    pub fn is_released(&self) -> bool {
        matches!(self, Self::Released { .. })
    }
}
