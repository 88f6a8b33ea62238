//! Domain events for resource ownership.

use arbiter_core::event::{DomainEvent, EventMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::owner::{OwnershipRequest, ResourceOwner};
use super::verdict::ConflictType;

/// Event type for `ResourceAcquired`.
pub const RESOURCE_ACQUIRED_EVENT_TYPE: &str = "ownership.resource_acquired";
/// Event type for `ResourceReleased`.
pub const RESOURCE_RELEASED_EVENT_TYPE: &str = "ownership.resource_released";
/// Event type for `ReleaseRefused`.
pub const RELEASE_REFUSED_EVENT_TYPE: &str = "ownership.release_refused";
/// Event type for `RequestRejected`.
pub const REQUEST_REJECTED_EVENT_TYPE: &str = "ownership.request_rejected";
/// Event type for `RequestQueued`.
pub const REQUEST_QUEUED_EVENT_TYPE: &str = "ownership.request_queued";
/// Event type for `OwnerPreempted`.
pub const OWNER_PREEMPTED_EVENT_TYPE: &str = "ownership.owner_preempted";
/// Event type for `QueuedRequestGranted`.
pub const QUEUED_REQUEST_GRANTED_EVENT_TYPE: &str = "ownership.queued_request_granted";

/// Emitted when a resource is granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAcquired {
    /// The new holder.
    pub owner: ResourceOwner,
}

/// Emitted when a holder releases its resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReleased {
    /// The removed record.
    pub previous: ResourceOwner,
}

/// Emitted when a release names an execution that does not hold the resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRefused {
    /// The holder left in place.
    pub current_owner: ResourceOwner,
    /// The execution id supplied with the release.
    pub requested_execution_id: String,
}

/// Emitted when a request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRejected {
    /// The refused request.
    pub request: OwnershipRequest,
    /// Holder that caused the refusal.
    pub current_owner: Option<ResourceOwner>,
    /// Conflict classification.
    pub conflict_type: ConflictType,
}

/// Emitted when a request is retained for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestQueued {
    /// The retained request.
    pub request: OwnershipRequest,
    /// Service position at insertion time.
    pub position: usize,
}

/// Emitted when a holder loses its resource to a higher-priority request.
///
/// The preempted execution must be treated as cancelled by its dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerPreempted {
    /// The holder that lost the resource.
    pub preempted: ResourceOwner,
    /// The holder that took it.
    pub preempted_by: ResourceOwner,
}

/// Emitted when a queued request is granted after a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequestGranted {
    /// The new holder.
    pub owner: ResourceOwner,
    /// The payload the request was queued with.
    pub payload: serde_json::Value,
}

/// Event payload variants for resource ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OwnershipEventKind {
    /// A resource was granted.
    ResourceAcquired(ResourceAcquired),
    /// A resource was released.
    ResourceReleased(ResourceReleased),
    /// A foreign release was refused.
    ReleaseRefused(ReleaseRefused),
    /// A request was refused.
    RequestRejected(RequestRejected),
    /// A request was queued.
    RequestQueued(RequestQueued),
    /// A holder was preempted.
    OwnerPreempted(OwnerPreempted),
    /// A queued request was granted.
    QueuedRequestGranted(QueuedRequestGranted),
}

impl OwnershipEventKind {
    fn event_type(&self) -> &'static str {
        match self {
            Self::ResourceAcquired(_) => RESOURCE_ACQUIRED_EVENT_TYPE,
            Self::ResourceReleased(_) => RESOURCE_RELEASED_EVENT_TYPE,
            Self::ReleaseRefused(_) => RELEASE_REFUSED_EVENT_TYPE,
            Self::RequestRejected(_) => REQUEST_REJECTED_EVENT_TYPE,
            Self::RequestQueued(_) => REQUEST_QUEUED_EVENT_TYPE,
            Self::OwnerPreempted(_) => OWNER_PREEMPTED_EVENT_TYPE,
            Self::QueuedRequestGranted(_) => QUEUED_REQUEST_GRANTED_EVENT_TYPE,
        }
    }

    /// Resource and execution the event is attributed to.
    fn subject(&self) -> (&str, &str) {
        match self {
            Self::ResourceAcquired(ResourceAcquired { owner })
            | Self::QueuedRequestGranted(QueuedRequestGranted { owner, .. }) => {
                (owner.resource_id.as_str(), owner.execution_id.as_str())
            }
            Self::ResourceReleased(ResourceReleased { previous }) => {
                (previous.resource_id.as_str(), previous.execution_id.as_str())
            }
            Self::ReleaseRefused(refused) => (
                refused.current_owner.resource_id.as_str(),
                refused.requested_execution_id.as_str(),
            ),
            Self::RequestRejected(RequestRejected { request, .. })
            | Self::RequestQueued(RequestQueued { request, .. }) => {
                (request.resource_id.as_str(), request.execution_id.as_str())
            }
            Self::OwnerPreempted(OwnerPreempted { preempted, .. }) => {
                (preempted.resource_id.as_str(), preempted.execution_id.as_str())
            }
        }
    }
}

/// Domain event envelope for resource ownership.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: OwnershipEventKind,
}

impl OwnershipEvent {
    /// Wraps a payload in an envelope stamped at `occurred_at`.
    #[must_use]
    pub fn new(kind: OwnershipEventKind, occurred_at: DateTime<Utc>) -> Self {
        let (resource_id, execution_id) = kind.subject();
        Self {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                resource_id: resource_id.to_owned(),
                execution_id: execution_id.to_owned(),
                occurred_at,
            },
            kind,
        }
    }
}

impl DomainEvent for OwnershipEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("OwnershipEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
