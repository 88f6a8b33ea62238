//! Test sink — records every published event.

use std::sync::Mutex;

use arbiter_core::sink::{EventSink, PublishedEvent};

/// An event sink that keeps every published event in arrival order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<PublishedEvent>>,
}

impl RecordingEventSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all published events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn events(&self) -> Vec<PublishedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Returns the event types in publication order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.event_type.clone())
            .collect()
    }

    /// Returns the events of one type.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn events_of_type(&self, event_type: &str) -> Vec<PublishedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.event_type == event_type)
            .cloned()
            .collect()
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: PublishedEvent) {
        self.events.lock().unwrap().push(event);
    }
}
