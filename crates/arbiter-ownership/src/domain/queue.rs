//! Per-resource queue of pending ownership requests.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::owner::OwnershipRequest;

/// A request retained until its resource becomes free.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedRequest {
    /// The original request.
    pub request: OwnershipRequest,
    /// Caller-supplied payload, kept verbatim for replay.
    pub payload: serde_json::Value,
    /// Arrival sequence number, unique per tracker.
    pub sequence: u64,
    /// When the request was queued.
    pub queued_at: DateTime<Utc>,
}

/// Pending requests for one resource in service order: higher priority
/// first, arrival order among equals.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: VecDeque<QueuedRequest>,
}

impl PendingQueue {
    /// Inserts a request at its service position and returns that position.
    /// Among equal priorities the lower `sequence` is served first.
    pub fn push(&mut self, entry: QueuedRequest) -> usize {
        let priority = entry.request.priority;
        let position = self.entries.partition_point(|queued| {
            queued.request.priority > priority
                || (queued.request.priority == priority && queued.sequence < entry.sequence)
        });
        self.entries.insert(position, entry);
        position
    }

    /// Removes and returns the next request to serve.
    pub fn pop(&mut self) -> Option<QueuedRequest> {
        self.entries.pop_front()
    }

    /// Service position of the request queued by `execution_id`.
    #[must_use]
    pub fn position_of(&self, execution_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|queued| queued.request.execution_id == execution_id)
    }

    /// Removes the request queued by `execution_id`, if present.
    pub fn remove_execution(&mut self, execution_id: &str) -> Option<QueuedRequest> {
        let index = self.position_of(execution_id)?;
        self.entries.remove(index)
    }

    /// Number of pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requests are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies the pending requests in service order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueuedRequest> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::priority::Priority;

    fn queued(execution_id: &str, priority: Priority, sequence: u64) -> QueuedRequest {
        QueuedRequest {
            request: OwnershipRequest::new("canvas-1", "SymphonyQ", "iq", priority, execution_id),
            payload: serde_json::json!({ "exec": execution_id }),
            sequence,
            queued_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    fn drain(queue: &mut PendingQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.pop())
            .map(|entry| entry.request.execution_id)
            .collect()
    }

    #[test]
    fn test_pop_serves_higher_priority_first_then_arrival_order() {
        // Arrange
        let mut queue = PendingQueue::default();
        queue.push(queued("n1", Priority::Normal, 1));
        queue.push(queued("l1", Priority::Low, 2));
        queue.push(queued("h1", Priority::High, 3));
        queue.push(queued("n2", Priority::Normal, 4));
        queue.push(queued("h2", Priority::High, 5));

        // Act
        let order = drain(&mut queue);

        // Assert
        assert_eq!(order, vec!["h1", "h2", "n1", "n2", "l1"]);
    }

    #[test]
    fn test_push_reports_service_position() {
        // Arrange
        let mut queue = PendingQueue::default();
        assert_eq!(queue.push(queued("n1", Priority::Normal, 1)), 0);
        assert_eq!(queue.push(queued("n2", Priority::Normal, 2)), 1);

        // Act
        let position = queue.push(queued("c1", Priority::Critical, 3));

        // Assert
        assert_eq!(position, 0);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_push_orders_equal_priorities_by_sequence() {
        // Arrange
        let mut queue = PendingQueue::default();
        queue.push(queued("a", Priority::Normal, 1));
        queue.push(queued("c", Priority::Normal, 3));

        // Act
        let position = queue.push(queued("b", Priority::Normal, 2));

        // Assert
        assert_eq!(position, 1);
        assert_eq!(drain(&mut queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_execution_keeps_remaining_order() {
        // Arrange
        let mut queue = PendingQueue::default();
        queue.push(queued("a", Priority::Normal, 1));
        queue.push(queued("b", Priority::Normal, 2));
        queue.push(queued("c", Priority::Normal, 3));

        // Act
        let removed = queue.remove_execution("b");

        // Assert
        assert_eq!(removed.unwrap().request.execution_id, "b");
        assert!(queue.remove_execution("missing").is_none());
        assert_eq!(drain(&mut queue), vec!["a", "c"]);
        assert!(queue.is_empty());
    }
}
