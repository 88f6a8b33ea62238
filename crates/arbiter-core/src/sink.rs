//! Event publication seam.
//!
//! The ownership engine announces what it did through an `EventSink`. The
//! execution dispatcher implements this to learn about preemptions and
//! replayed queue grants; the default sink only logs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::event::DomainEvent;

/// Flattened representation of a published domain event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Event type name.
    pub event_type: String,
    /// Resource the event concerns.
    pub resource_id: String,
    /// Execution that caused the event.
    pub execution_id: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

impl PublishedEvent {
    /// Flattens any domain event into its published form.
    pub fn from_event(event: &dyn DomainEvent) -> Self {
        let meta = event.metadata();
        Self {
            event_id: meta.event_id,
            event_type: event.event_type().to_owned(),
            resource_id: meta.resource_id.clone(),
            execution_id: meta.execution_id.clone(),
            payload: event.to_payload(),
            occurred_at: meta.occurred_at,
        }
    }
}

/// Receiver of published domain events.
///
/// Events are published after the engine has released its locks, so an
/// implementation may query or call back into the engine from `publish`.
pub trait EventSink: Send + Sync {
    /// Accepts one event. Delivery is best-effort.
    fn publish(&self, event: PublishedEvent);
}

/// Sink that writes every event to the `tracing` pipeline at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: PublishedEvent) {
        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            resource_id = %event.resource_id,
            execution_id = %event.execution_id,
            payload = %event.payload,
            "ownership event"
        );
    }
}
