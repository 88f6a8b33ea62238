//! Conflict resolver — classifies requests and applies resolution strategies.
//!
//! Classification is pure. The strategies act on a single locked resource
//! through the `OwnershipSlot` capability and never reach the rest of the
//! tracker.

use std::cmp::Ordering;

use crate::application::tracker::{OwnershipSlot, OwnershipTracker, SlotRelease};
use crate::domain::owner::{OwnershipRequest, ResourceOwner};
use crate::domain::verdict::{
    ConflictType, ConflictVerdict, Resolution, ResolutionReport, Strategy,
};

/// Decides how a request for an already-held resource is handled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Classifies `request` against the tracker's current holder. Read-only.
    pub fn check(
        &self,
        tracker: &OwnershipTracker,
        request: &OwnershipRequest,
    ) -> ConflictVerdict {
        let current = tracker.get_resource_owner(&request.resource_id);
        self.analyze(request, current.as_ref())
    }

    /// Classifies `request` against `current`.
    ///
    /// 1. No holder: allow.
    /// 2. Same symphony and instance: allow (idempotent re-acquisition).
    /// 3. Same symphony, other instance: reject, whatever the priorities.
    /// 4. Other symphony: priority analysis.
    #[must_use]
    pub fn analyze(
        &self,
        request: &OwnershipRequest,
        current: Option<&ResourceOwner>,
    ) -> ConflictVerdict {
        let Some(current) = current else {
            return ConflictVerdict::allow(None, "resource is free");
        };

        if current.owner_name == request.owner_name {
            if current.is_same_instance(request) {
                return ConflictVerdict::allow(
                    Some(current.clone()),
                    format!(
                        "instance '{}' of '{}' already holds the resource",
                        current.instance_id, current.owner_name
                    ),
                );
            }
            return ConflictVerdict::conflict(
                ConflictType::InstanceConflict,
                Resolution::Reject,
                current.clone(),
                format!(
                    "resource '{}' is held by instance '{}' of '{}'; instance '{}' may not share it",
                    current.resource_id,
                    current.instance_id,
                    current.owner_name,
                    request.instance_id
                ),
            );
        }

        self.analyze_priority(request, current)
    }

    /// Compares priorities of two different symphonies: higher interrupts,
    /// equal queues, lower is rejected.
    #[must_use]
    pub fn analyze_priority(
        &self,
        request: &OwnershipRequest,
        current: &ResourceOwner,
    ) -> ConflictVerdict {
        let (resolution, relation) = match request.priority.cmp(&current.priority) {
            Ordering::Greater => (Resolution::Interrupt, "outranks"),
            Ordering::Equal => (Resolution::Queue, "matches"),
            Ordering::Less => (Resolution::Reject, "is below"),
        };
        ConflictVerdict::conflict(
            ConflictType::PriorityConflict,
            resolution,
            current.clone(),
            format!(
                "'{}' at {} {} holder '{}' at {} on resource '{}'",
                request.owner_name,
                request.priority,
                relation,
                current.owner_name,
                current.priority,
                current.resource_id
            ),
        )
    }

    /// Refuses the request. Changes nothing.
    #[must_use]
    pub fn resolve_reject(&self, verdict: &ConflictVerdict) -> ResolutionReport {
        ResolutionReport::failure(
            Strategy::Reject,
            verdict.current_owner.clone(),
            format!("request rejected: {}", verdict.message),
        )
    }

    /// Retains the request and its payload for replay once the resource is
    /// free. Does not grant anything.
    pub fn resolve_queue(
        &self,
        slot: &mut dyn OwnershipSlot,
        request: &OwnershipRequest,
        payload: serde_json::Value,
        verdict: &ConflictVerdict,
    ) -> ResolutionReport {
        let owner = slot.current_owner().cloned();
        match slot.enqueue(request, payload) {
            Some(position) => ResolutionReport {
                success: true,
                message: format!(
                    "request queued at position {position} on resource '{}': {}",
                    slot.resource_id(),
                    verdict.message
                ),
                strategy: Strategy::Queue,
                owner,
                preempted: None,
                queue_position: Some(position),
            },
            None => ResolutionReport::failure(
                Strategy::Queue,
                owner,
                format!("queue full on resource '{}'", slot.resource_id()),
            ),
        }
    }

    /// Releases the holder named by the verdict, verified by its execution id,
    /// then grants the requester.
    pub fn resolve_interrupt(
        &self,
        slot: &mut dyn OwnershipSlot,
        request: &OwnershipRequest,
        verdict: &ConflictVerdict,
    ) -> ResolutionReport {
        let Some(expected) = &verdict.current_owner else {
            return ResolutionReport::failure(
                Strategy::Interrupt,
                slot.current_owner().cloned(),
                "interrupt verdict names no holder",
            );
        };

        let preempted = match slot.release(Some(expected.execution_id.as_str())) {
            SlotRelease::Released(previous) => Some(previous),
            SlotRelease::NotOwned => None,
            SlotRelease::Refused(current) => {
                return ResolutionReport::failure(
                    Strategy::Interrupt,
                    Some(current),
                    format!(
                        "holder of '{}' changed since classification; interrupt abandoned",
                        slot.resource_id()
                    ),
                );
            }
        };

        let owner = slot.grant(request);
        ResolutionReport {
            success: true,
            message: format!("holder preempted: {}", verdict.message),
            strategy: Strategy::Interrupt,
            owner: Some(owner),
            preempted,
            queue_position: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use arbiter_test_support::fixed_time;

    use super::*;
    use crate::domain::priority::Priority;

    /// In-memory slot standing in for a locked tracker slot.
    #[derive(Debug, Default)]
    struct MockSlot {
        owner: Option<ResourceOwner>,
        queued: Vec<(OwnershipRequest, serde_json::Value)>,
        capacity: usize,
    }

    impl OwnershipSlot for MockSlot {
        fn resource_id(&self) -> &str {
            "canvas-1"
        }

        fn current_owner(&self) -> Option<&ResourceOwner> {
            self.owner.as_ref()
        }

        fn release(&mut self, execution_id: Option<&str>) -> SlotRelease {
            match self.owner.take() {
                None => SlotRelease::NotOwned,
                Some(current) if execution_id.is_some_and(|id| id != current.execution_id) => {
                    self.owner = Some(current.clone());
                    SlotRelease::Refused(current)
                }
                Some(current) => SlotRelease::Released(current),
            }
        }

        fn grant(&mut self, request: &OwnershipRequest) -> ResourceOwner {
            let owner = request.clone().into_owner(fixed_time());
            self.owner = Some(owner.clone());
            owner
        }

        fn enqueue(
            &mut self,
            request: &OwnershipRequest,
            payload: serde_json::Value,
        ) -> Option<usize> {
            if self.queued.len() >= self.capacity {
                return None;
            }
            self.queued.push((request.clone(), payload));
            Some(self.queued.len() - 1)
        }
    }

    fn holder(priority: Priority) -> ResourceOwner {
        OwnershipRequest::new("canvas-1", "SymphonyA", "i1", priority, "e1")
            .into_owner(fixed_time())
    }

    fn requester(owner: &str, instance: &str, priority: Priority) -> OwnershipRequest {
        OwnershipRequest::new("canvas-1", owner, instance, priority, "e2")
    }

    #[test]
    fn test_analyze_allows_free_resource() {
        // Arrange
        let request = requester("SymphonyB", "i2", Priority::Low);

        // Act
        let verdict = ConflictResolver::new().analyze(&request, None);

        // Assert
        assert!(!verdict.has_conflict);
        assert_eq!(verdict.conflict_type, ConflictType::None);
        assert_eq!(verdict.resolution, Resolution::Allow);
        assert!(verdict.current_owner.is_none());
    }

    #[test]
    fn test_analyze_allows_same_instance_reacquire() {
        // Arrange
        let current = holder(Priority::High);

        // Act
        let verdict = ConflictResolver::new()
            .analyze(&requester("SymphonyA", "i1", Priority::Low), Some(&current));

        // Assert
        assert!(!verdict.has_conflict);
        assert_eq!(verdict.resolution, Resolution::Allow);
        assert_eq!(verdict.current_owner, Some(current));
    }

    #[test]
    fn test_analyze_rejects_other_instance_at_every_priority() {
        let resolver = ConflictResolver::new();
        for held in Priority::ALL {
            for asked in Priority::ALL {
                let request = requester("SymphonyA", "i2", asked);
                let verdict = resolver.analyze(&request, Some(&holder(held)));
                assert!(verdict.has_conflict);
                assert_eq!(verdict.conflict_type, ConflictType::InstanceConflict);
                assert_eq!(verdict.resolution, Resolution::Reject, "held {held}, asked {asked}");
            }
        }
    }

    #[test]
    fn test_analyze_priority_orders_strategies() {
        let resolver = ConflictResolver::new();
        for held in Priority::ALL {
            for asked in Priority::ALL {
                let request = requester("SymphonyB", "i2", asked);
                let verdict = resolver.analyze(&request, Some(&holder(held)));
                let expected = match asked.cmp(&held) {
                    Ordering::Greater => Resolution::Interrupt,
                    Ordering::Equal => Resolution::Queue,
                    Ordering::Less => Resolution::Reject,
                };
                assert_eq!(verdict.conflict_type, ConflictType::PriorityConflict);
                assert_eq!(verdict.resolution, expected, "held {held}, asked {asked}");
            }
        }
    }

    #[test]
    fn test_resolve_reject_changes_nothing() {
        // Arrange
        let resolver = ConflictResolver::new();
        let current = holder(Priority::Normal);
        let request = requester("SymphonyB", "i2", Priority::Low);
        let verdict = resolver.analyze(&request, Some(&current));

        // Act
        let report = resolver.resolve_reject(&verdict);

        // Assert
        assert!(!report.success);
        assert_eq!(report.strategy, Strategy::Reject);
        assert_eq!(report.owner, Some(current));
    }

    #[test]
    fn test_resolve_queue_retains_payload() {
        // Arrange
        let resolver = ConflictResolver::new();
        let mut slot = MockSlot {
            owner: Some(holder(Priority::Normal)),
            capacity: 4,
            ..MockSlot::default()
        };
        let request = requester("SymphonyB", "i2", Priority::Normal);
        let verdict = resolver.analyze(&request, slot.current_owner());
        let payload = serde_json::json!({ "sequence": "render", "beats": 3 });

        // Act
        let report = resolver.resolve_queue(&mut slot, &request, payload.clone(), &verdict);

        // Assert
        assert!(report.success);
        assert_eq!(report.strategy, Strategy::Queue);
        assert_eq!(report.queue_position, Some(0));
        assert_eq!(slot.queued, vec![(request, payload)]);
        assert_eq!(slot.owner.unwrap().execution_id, "e1");
    }

    #[test]
    fn test_resolve_queue_reports_full_queue() {
        // Arrange
        let resolver = ConflictResolver::new();
        let mut slot = MockSlot {
            owner: Some(holder(Priority::Normal)),
            capacity: 0,
            ..MockSlot::default()
        };
        let request = requester("SymphonyB", "i2", Priority::Normal);
        let verdict = resolver.analyze(&request, slot.current_owner());

        // Act
        let report =
            resolver.resolve_queue(&mut slot, &request, serde_json::Value::Null, &verdict);

        // Assert
        assert!(!report.success);
        assert_eq!(report.strategy, Strategy::Queue);
        assert!(report.message.contains("queue full"));
        assert!(slot.queued.is_empty());
    }

    #[test]
    fn test_resolve_interrupt_releases_then_grants() {
        // Arrange
        let resolver = ConflictResolver::new();
        let original = holder(Priority::Normal);
        let mut slot = MockSlot {
            owner: Some(original.clone()),
            ..MockSlot::default()
        };
        let request = requester("SymphonyB", "i2", Priority::High);
        let verdict = resolver.analyze(&request, slot.current_owner());

        // Act
        let report = resolver.resolve_interrupt(&mut slot, &request, &verdict);

        // Assert
        assert!(report.success);
        assert_eq!(report.strategy, Strategy::Interrupt);
        assert_eq!(report.preempted, Some(original));
        let owner = slot.owner.unwrap();
        assert_eq!(owner.owner_name, "SymphonyB");
        assert_eq!(owner.instance_id, "i2");
        assert_eq!(owner.execution_id, "e2");
    }

    #[test]
    fn test_resolve_interrupt_abandons_when_holder_changed() {
        // Arrange: classify against one holder, then swap it out.
        let resolver = ConflictResolver::new();
        let request = requester("SymphonyB", "i2", Priority::High);
        let verdict = resolver.analyze(&request, Some(&holder(Priority::Normal)));
        let replacement =
            OwnershipRequest::new("canvas-1", "SymphonyC", "i3", Priority::Low, "e3")
                .into_owner(fixed_time());
        let mut slot = MockSlot {
            owner: Some(replacement.clone()),
            ..MockSlot::default()
        };

        // Act
        let report = resolver.resolve_interrupt(&mut slot, &request, &verdict);

        // Assert
        assert!(!report.success);
        assert_eq!(report.owner, Some(replacement.clone()));
        assert_eq!(slot.owner, Some(replacement));
    }
}
