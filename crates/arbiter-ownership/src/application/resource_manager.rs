//! Resource manager — the public façade over tracker and resolver.
//!
//! Every operation that reads then writes ownership state runs inside one
//! `OwnershipTracker::with_slot` call, so classification and mutation are a
//! single critical section per resource. Events are collected while the slot
//! is held and published after it is released.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arbiter_core::clock::{Clock, SystemClock};
use arbiter_core::config::ArbiterConfig;
use arbiter_core::sink::{EventSink, PublishedEvent, TracingEventSink};

use crate::application::conflict_resolver::ConflictResolver;
use crate::application::tracker::{
    OwnershipSlot, OwnershipStatistics, OwnershipTracker, SlotHandle, SlotRelease,
};
use crate::domain::events::{
    OwnerPreempted, OwnershipEvent, OwnershipEventKind, QueuedRequestGranted, ReleaseRefused,
    RequestQueued, RequestRejected, ResourceAcquired, ResourceReleased,
};
use crate::domain::owner::{OwnershipRequest, ResourceOwner};
use crate::domain::queue::QueuedRequest;
use crate::domain::verdict::{
    ConflictVerdict, ReleaseOutcome, Resolution, ResolutionReport, ReplayedGrant, Strategy,
};

/// Public entry point for resource arbitration.
pub struct ResourceManager {
    tracker: Arc<OwnershipTracker>,
    resolver: ConflictResolver,
    sink: Arc<dyn EventSink>,
    config: ArbiterConfig,
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("tracker", &self.tracker)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResourceManager {
    /// Creates a manager over an injected tracker.
    #[must_use]
    pub fn new(
        tracker: Arc<OwnershipTracker>,
        sink: Arc<dyn EventSink>,
        config: ArbiterConfig,
    ) -> Self {
        Self {
            tracker,
            resolver: ConflictResolver::new(),
            sink,
            config,
        }
    }

    /// Creates a manager with its own tracker on `clock`.
    #[must_use]
    pub fn with_clock(
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        config: ArbiterConfig,
    ) -> Self {
        let tracker = Arc::new(OwnershipTracker::new(clock, &config));
        Self::new(tracker, sink, config)
    }

    /// Creates a manager on the system clock that logs events through `tracing`.
    #[must_use]
    pub fn from_config(config: ArbiterConfig) -> Self {
        Self::with_clock(
            Arc::new(SystemClock::new()),
            Arc::new(TracingEventSink),
            config,
        )
    }

    /// The underlying tracker.
    #[must_use]
    pub fn tracker(&self) -> &Arc<OwnershipTracker> {
        &self.tracker
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    /// Classifies `request` without changing anything. Safe to call
    /// speculatively; the answer may be stale by the time it is acted on.
    pub fn check_resource_conflict(&self, request: &OwnershipRequest) -> ConflictVerdict {
        self.resolver.check(&self.tracker, request)
    }

    /// Acquires `request.resource_id` for the requester.
    ///
    /// `Allow` grants directly, `Interrupt` preempts the holder first. A
    /// `Queue` verdict is treated as a rejection here: nothing is queued and
    /// `false` is returned. Use `resolve_resource_conflict_advanced` to queue.
    pub fn acquire_resource_ownership(&self, request: &OwnershipRequest) -> bool {
        let mut events = Vec::new();
        let granted = self.tracker.with_slot(&request.resource_id, |slot| {
            let verdict = self.resolver.analyze(request, slot.current_owner());
            match verdict.resolution {
                Resolution::Allow => {
                    let owner = slot.grant(request);
                    log_owner(&owner, "resource acquired");
                    events.push(OwnershipEventKind::ResourceAcquired(ResourceAcquired {
                        owner,
                    }));
                    true
                }
                Resolution::Interrupt => {
                    let report = self.resolver.resolve_interrupt(slot, request, &verdict);
                    record_interrupt(&report, &mut events);
                    report.success
                }
                Resolution::Reject | Resolution::Queue => {
                    tracing::debug!(
                        resource_id = %request.resource_id,
                        owner_name = %request.owner_name,
                        execution_id = %request.execution_id,
                        resolution = ?verdict.resolution,
                        "acquisition refused: {}",
                        verdict.message
                    );
                    events.push(rejected(request, &verdict));
                    false
                }
            }
        });
        self.publish(events);
        granted
    }

    /// Releases `resource_id`.
    ///
    /// No-op when the resource is free. When `execution_id` is given and
    /// does not match the holder, the release is refused and logged. After a
    /// successful release the head of the resource's queue is granted when
    /// replay is enabled.
    pub fn release_resource_ownership(
        &self,
        resource_id: &str,
        execution_id: Option<&str>,
    ) -> ReleaseOutcome {
        if self.tracker.get_resource_owner(resource_id).is_none() {
            return ReleaseOutcome::NotOwned;
        }
        let mut events = Vec::new();
        let outcome = self.tracker.with_slot(resource_id, |slot| {
            self.release_in_slot(slot, execution_id, &mut events)
        });
        self.publish(events);
        self.tracker.prune_slot(resource_id);
        outcome
    }

    /// Runs the full decision path: direct acquisition, reject, queue (with
    /// `payload` retained for replay) or interrupt. The report is tagged with
    /// the strategy applied.
    pub fn resolve_resource_conflict_advanced(
        &self,
        request: &OwnershipRequest,
        payload: serde_json::Value,
    ) -> ResolutionReport {
        let mut events = Vec::new();
        let report = self.tracker.with_slot(&request.resource_id, |slot| {
            let verdict = self.resolver.analyze(request, slot.current_owner());
            self.apply_verdict(slot, request, payload, &verdict, &mut events)
        });
        self.publish(events);
        report
    }

    /// Releases every resource held by `execution_id` and drops its queued
    /// requests. Returns the records removed, in resource order.
    pub fn release_execution(&self, execution_id: &str) -> Vec<ResourceOwner> {
        for resource_id in self.tracker.discard_queued_execution(execution_id) {
            tracing::debug!(resource_id = %resource_id, execution_id, "queued request dropped");
            self.tracker.prune_slot(&resource_id);
        }
        self.tracker
            .resources_of_execution(execution_id)
            .into_iter()
            .filter_map(|resource_id| {
                match self.release_resource_ownership(&resource_id, Some(execution_id)) {
                    ReleaseOutcome::Released { previous, .. } => Some(previous),
                    ReleaseOutcome::NotOwned | ReleaseOutcome::Refused { .. } => None,
                }
            })
            .collect()
    }

    /// Grants the head of `resource_id`'s queue if the resource is free.
    pub fn grant_next_queued(&self, resource_id: &str) -> Option<ReplayedGrant> {
        let mut events = Vec::new();
        let replayed = self.tracker.with_slot(resource_id, |slot| {
            if slot.current_owner().is_some() {
                return None;
            }
            replay_head(slot, &mut events)
        });
        self.publish(events);
        self.tracker.prune_slot(resource_id);
        replayed
    }

    /// Pending requests for `resource_id` in service order.
    pub fn queued_requests(&self, resource_id: &str) -> Vec<QueuedRequest> {
        self.tracker.queued_requests(resource_id)
    }

    /// Drops a pending request. Returns whether one was found.
    pub fn discard_queued(&self, resource_id: &str, execution_id: &str) -> bool {
        if self.tracker.queued_requests(resource_id).is_empty() {
            return false;
        }
        let discarded = self
            .tracker
            .with_slot(resource_id, |slot| slot.discard_queued(execution_id))
            .is_some();
        self.tracker.prune_slot(resource_id);
        discarded
    }

    /// Current holder of `resource_id`.
    pub fn get_resource_owner(&self, resource_id: &str) -> Option<ResourceOwner> {
        self.tracker.get_resource_owner(resource_id)
    }

    /// Every held resource and its holder.
    pub fn get_resource_ownership(&self) -> BTreeMap<String, ResourceOwner> {
        self.tracker.get_all_resource_owners()
    }

    /// Resources held per symphony.
    pub fn get_symphony_resource_map(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.tracker.get_symphony_resource_map()
    }

    /// Instances holding resources per symphony.
    pub fn get_sequence_instances(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.tracker.get_sequence_instances()
    }

    /// Aggregate ownership statistics.
    pub fn get_resource_statistics(&self) -> OwnershipStatistics {
        self.tracker.get_statistics()
    }

    /// Clears all ownership state. Test isolation only.
    pub fn reset(&self) {
        self.tracker.reset();
    }

    /// Dispatches a verdict to its strategy. A verdict whose conflict flag
    /// and resolution disagree is reported as `Unknown` and changes nothing.
    fn apply_verdict(
        &self,
        slot: &mut SlotHandle<'_>,
        request: &OwnershipRequest,
        payload: serde_json::Value,
        verdict: &ConflictVerdict,
        events: &mut Vec<OwnershipEventKind>,
    ) -> ResolutionReport {
        match (verdict.has_conflict, verdict.resolution) {
            (false, Resolution::Allow) => {
                let owner = slot.grant(request);
                log_owner(&owner, "resource acquired directly");
                events.push(OwnershipEventKind::ResourceAcquired(ResourceAcquired {
                    owner: owner.clone(),
                }));
                ResolutionReport {
                    success: true,
                    message: verdict.message.clone(),
                    strategy: Strategy::DirectAcquisition,
                    owner: Some(owner),
                    preempted: None,
                    queue_position: None,
                }
            }
            (true, Resolution::Reject) => {
                events.push(rejected(request, verdict));
                self.resolver.resolve_reject(verdict)
            }
            (true, Resolution::Queue) => {
                let report = self.resolver.resolve_queue(slot, request, payload, verdict);
                match report.queue_position {
                    Some(position) => {
                        tracing::debug!(
                            resource_id = %request.resource_id,
                            execution_id = %request.execution_id,
                            position,
                            "request queued"
                        );
                        events.push(OwnershipEventKind::RequestQueued(RequestQueued {
                            request: request.clone(),
                            position,
                        }));
                    }
                    None => {
                        tracing::warn!(
                            resource_id = %request.resource_id,
                            execution_id = %request.execution_id,
                            capacity = self.config.queue_capacity,
                            "queue full; request dropped"
                        );
                        events.push(rejected(request, verdict));
                    }
                }
                report
            }
            (true, Resolution::Interrupt) => {
                let report = self.resolver.resolve_interrupt(slot, request, verdict);
                record_interrupt(&report, events);
                report
            }
            (has_conflict, resolution) => {
                tracing::warn!(
                    resource_id = %request.resource_id,
                    has_conflict,
                    resolution = ?resolution,
                    "unrecognized verdict; nothing changed"
                );
                ResolutionReport::failure(
                    Strategy::Unknown,
                    slot.current_owner().cloned(),
                    format!("unrecognized resolution {resolution:?} (conflict: {has_conflict})"),
                )
            }
        }
    }

    fn release_in_slot(
        &self,
        slot: &mut SlotHandle<'_>,
        execution_id: Option<&str>,
        events: &mut Vec<OwnershipEventKind>,
    ) -> ReleaseOutcome {
        match slot.release(execution_id) {
            SlotRelease::NotOwned => ReleaseOutcome::NotOwned,
            SlotRelease::Refused(current_owner) => {
                let requested = execution_id.unwrap_or_default().to_owned();
                tracing::warn!(
                    resource_id = %current_owner.resource_id,
                    execution_id = %requested,
                    holder_execution_id = %current_owner.execution_id,
                    "release refused: execution does not hold the resource"
                );
                events.push(OwnershipEventKind::ReleaseRefused(ReleaseRefused {
                    current_owner: current_owner.clone(),
                    requested_execution_id: requested,
                }));
                ReleaseOutcome::Refused { current_owner }
            }
            SlotRelease::Released(previous) => {
                log_owner(&previous, "resource released");
                events.push(OwnershipEventKind::ResourceReleased(ResourceReleased {
                    previous: previous.clone(),
                }));
                let replayed = if self.config.replay_on_release {
                    replay_head(slot, events)
                } else {
                    None
                };
                ReleaseOutcome::Released { previous, replayed }
            }
        }
    }

    fn publish(&self, events: Vec<OwnershipEventKind>) {
        for kind in events {
            let event = OwnershipEvent::new(kind, self.tracker.now());
            self.sink.publish(PublishedEvent::from_event(&event));
        }
    }
}

/// Grants the head of the slot's queue. The slot must be free.
fn replay_head(
    slot: &mut SlotHandle<'_>,
    events: &mut Vec<OwnershipEventKind>,
) -> Option<ReplayedGrant> {
    let queued = slot.pop_queued()?;
    let owner = slot.grant(&queued.request);
    log_owner(&owner, "queued request granted");
    events.push(OwnershipEventKind::QueuedRequestGranted(QueuedRequestGranted {
        owner: owner.clone(),
        payload: queued.payload.clone(),
    }));
    Some(ReplayedGrant {
        owner,
        payload: queued.payload,
    })
}

fn record_interrupt(report: &ResolutionReport, events: &mut Vec<OwnershipEventKind>) {
    if !report.success {
        tracing::warn!("interrupt abandoned: {}", report.message);
        return;
    }
    let Some(owner) = &report.owner else {
        return;
    };
    if let Some(preempted) = &report.preempted {
        tracing::info!(
            resource_id = %owner.resource_id,
            preempted_owner = %preempted.owner_name,
            preempted_execution_id = %preempted.execution_id,
            owner_name = %owner.owner_name,
            execution_id = %owner.execution_id,
            priority = %owner.priority,
            "holder preempted"
        );
        events.push(OwnershipEventKind::OwnerPreempted(OwnerPreempted {
            preempted: preempted.clone(),
            preempted_by: owner.clone(),
        }));
    }
    events.push(OwnershipEventKind::ResourceAcquired(ResourceAcquired {
        owner: owner.clone(),
    }));
}

fn rejected(request: &OwnershipRequest, verdict: &ConflictVerdict) -> OwnershipEventKind {
    OwnershipEventKind::RequestRejected(RequestRejected {
        request: request.clone(),
        current_owner: verdict.current_owner.clone(),
        conflict_type: verdict.conflict_type,
    })
}

fn log_owner(owner: &ResourceOwner, message: &'static str) {
    tracing::info!(
        resource_id = %owner.resource_id,
        owner_name = %owner.owner_name,
        instance_id = %owner.instance_id,
        execution_id = %owner.execution_id,
        priority = %owner.priority,
        "{message}"
    );
}
