//! Ownership tracker — the sole mutator of ownership state.
//!
//! The primary store maps each resource to a `ResourceSlot` holding its
//! current owner and its pending queue. Every slot sits behind its own
//! mutex, so check-then-act sequences on one resource are serialized while
//! different resources proceed independently. The outer map lock is only
//! held long enough to look a slot up or create it.
//!
//! Two derived indexes (owner name → resources, execution id → resources)
//! live behind a separate mutex. Lock order is always slot, then index.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arbiter_core::clock::Clock;
use arbiter_core::config::ArbiterConfig;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;

use crate::domain::invariant::{InvariantViolation, fail_fast};
use crate::domain::owner::{OwnershipRequest, ResourceOwner};
use crate::domain::queue::{PendingQueue, QueuedRequest};

/// Result of releasing a slot's holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRelease {
    /// The resource had no holder.
    NotOwned,
    /// The execution id did not match; the holder is unchanged.
    Refused(ResourceOwner),
    /// The holder was removed.
    Released(ResourceOwner),
}

/// Narrow capability over one locked resource.
///
/// This is all the conflict resolver may touch: it can inspect the holder,
/// release it with execution-id verification, grant a request, or queue one.
pub trait OwnershipSlot {
    /// The resource this slot guards.
    fn resource_id(&self) -> &str;

    /// The current holder.
    fn current_owner(&self) -> Option<&ResourceOwner>;

    /// Removes the holder. When `execution_id` is given it must match the
    /// holder's, otherwise nothing changes.
    fn release(&mut self, execution_id: Option<&str>) -> SlotRelease;

    /// Makes `request` the holder, replacing any existing record. Any queued
    /// request from the same execution is dropped.
    fn grant(&mut self, request: &OwnershipRequest) -> ResourceOwner;

    /// Retains `request` for replay and returns its service position, or
    /// `None` when the queue is full. Re-queuing an execution that is already
    /// pending replaces its request and payload but keeps its arrival order.
    fn enqueue(&mut self, request: &OwnershipRequest, payload: serde_json::Value)
    -> Option<usize>;
}

#[derive(Debug, Default)]
struct ResourceSlot {
    owner: Option<ResourceOwner>,
    queue: PendingQueue,
}

impl ResourceSlot {
    fn is_idle(&self) -> bool {
        self.owner.is_none() && self.queue.is_empty()
    }
}

#[derive(Debug, Default)]
struct DerivedIndex {
    by_owner: HashMap<String, HashSet<String>>,
    by_execution: HashMap<String, HashSet<String>>,
}

impl DerivedIndex {
    fn insert(&mut self, owner: &ResourceOwner) {
        self.by_owner
            .entry(owner.owner_name.clone())
            .or_default()
            .insert(owner.resource_id.clone());
        self.by_execution
            .entry(owner.execution_id.clone())
            .or_default()
            .insert(owner.resource_id.clone());
    }

    fn remove(&mut self, owner: &ResourceOwner) -> Result<(), InvariantViolation> {
        remove_entry(&mut self.by_owner, &owner.owner_name, &owner.resource_id)
            .map_err(|()| {
                InvariantViolation::new(
                    &owner.resource_id,
                    format!("owner index has no entry for '{}'", owner.owner_name),
                )
            })?;
        remove_entry(
            &mut self.by_execution,
            &owner.execution_id,
            &owner.resource_id,
        )
        .map_err(|()| {
            InvariantViolation::new(
                &owner.resource_id,
                format!("execution index has no entry for '{}'", owner.execution_id),
            )
        })
    }

    fn clear(&mut self) {
        self.by_owner.clear();
        self.by_execution.clear();
    }
}

fn remove_entry(
    index: &mut HashMap<String, HashSet<String>>,
    key: &str,
    resource_id: &str,
) -> Result<(), ()> {
    let set = index.get_mut(key).ok_or(())?;
    if !set.remove(resource_id) {
        return Err(());
    }
    if set.is_empty() {
        index.remove(key);
    }
    Ok(())
}

/// Aggregate counts over the ownership index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OwnershipStatistics {
    /// Resources currently held.
    pub total_resources: usize,
    /// Distinct symphonies holding at least one resource.
    pub total_owners: usize,
    /// Distinct executions holding at least one resource.
    pub total_executions: usize,
    /// Resources held per symphony.
    pub per_owner: BTreeMap<String, usize>,
    /// Pending requests across all resource queues.
    pub queued_requests: usize,
    /// Age of the longest-held grant, in milliseconds.
    pub oldest_acquisition_age_ms: Option<i64>,
}

/// Authoritative store of who owns which resource.
pub struct OwnershipTracker {
    slots: RwLock<HashMap<String, Arc<Mutex<ResourceSlot>>>>,
    index: Mutex<DerivedIndex>,
    clock: Arc<dyn Clock>,
    queue_capacity: usize,
    next_sequence: AtomicU64,
}

impl std::fmt::Debug for OwnershipTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipTracker")
            .field("resources", &self.tracked_resources())
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}

impl OwnershipTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, config: &ArbiterConfig) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            index: Mutex::new(DerivedIndex::default()),
            clock,
            queue_capacity: config.queue_capacity,
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Reads the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns the current holder of `resource_id`.
    pub fn get_resource_owner(&self, resource_id: &str) -> Option<ResourceOwner> {
        let slot = self.existing_slot(resource_id)?;
        let guard = slot.lock();
        guard.owner.clone()
    }

    /// Stores `owner` as the holder of `resource_id`, replacing any previous
    /// record and updating both derived indexes.
    ///
    /// Returns `false` without writing when the record names a different
    /// resource than `resource_id`.
    pub fn set_resource_owner(&self, resource_id: &str, owner: ResourceOwner) -> bool {
        if owner.resource_id != resource_id {
            tracing::warn!(
                resource_id,
                record_resource_id = %owner.resource_id,
                "refusing owner record for a different resource"
            );
            return false;
        }
        self.with_slot(resource_id, |slot| {
            slot.install(owner);
        });
        true
    }

    /// Removes the holder of `resource_id` without verification. No-op when
    /// the resource is free.
    pub fn release_resource(&self, resource_id: &str) -> Option<ResourceOwner> {
        self.existing_slot(resource_id)?;
        match self.with_slot(resource_id, |slot| slot.release(None)) {
            SlotRelease::Released(previous) => Some(previous),
            SlotRelease::NotOwned | SlotRelease::Refused(_) => None,
        }
    }

    /// Snapshot of every held resource.
    pub fn get_all_resource_owners(&self) -> BTreeMap<String, ResourceOwner> {
        self.slot_snapshot()
            .into_iter()
            .filter_map(|(resource_id, slot)| {
                let owner = slot.lock().owner.clone()?;
                Some((resource_id, owner))
            })
            .collect()
    }

    /// Snapshot of the owner-name index.
    pub fn get_symphony_resource_map(&self) -> BTreeMap<String, BTreeSet<String>> {
        sorted_index(&self.index.lock().by_owner)
    }

    /// Resources held by one execution, sorted.
    pub fn resources_of_execution(&self, execution_id: &str) -> Vec<String> {
        let index = self.index.lock();
        let mut resources: Vec<String> = index
            .by_execution
            .get(execution_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        resources.sort();
        resources
    }

    /// Instances currently holding at least one resource, per symphony.
    pub fn get_sequence_instances(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut instances: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for owner in self.get_all_resource_owners().into_values() {
            instances
                .entry(owner.owner_name)
                .or_default()
                .insert(owner.instance_id);
        }
        instances
    }

    /// Aggregate counts over held resources and pending queues.
    pub fn get_statistics(&self) -> OwnershipStatistics {
        let mut stats = OwnershipStatistics::default();
        let mut executions = HashSet::new();
        let mut oldest: Option<DateTime<Utc>> = None;

        for (_, slot) in self.slot_snapshot() {
            let guard = slot.lock();
            stats.queued_requests += guard.queue.len();
            let Some(owner) = &guard.owner else {
                continue;
            };
            stats.total_resources += 1;
            *stats.per_owner.entry(owner.owner_name.clone()).or_default() += 1;
            executions.insert(owner.execution_id.clone());
            oldest = Some(oldest.map_or(owner.acquired_at, |t| t.min(owner.acquired_at)));
        }

        stats.total_owners = stats.per_owner.len();
        stats.total_executions = executions.len();
        stats.oldest_acquisition_age_ms =
            oldest.map(|acquired_at| (self.now() - acquired_at).num_milliseconds().max(0));
        stats
    }

    /// Pending requests for `resource_id` in service order.
    pub fn queued_requests(&self, resource_id: &str) -> Vec<QueuedRequest> {
        self.existing_slot(resource_id)
            .map(|slot| {
                let guard = slot.lock();
                guard.queue.snapshot()
            })
            .unwrap_or_default()
    }

    /// Drops every queued request made by `execution_id`. Returns the
    /// resources it was waiting for, sorted.
    pub fn discard_queued_execution(&self, execution_id: &str) -> Vec<String> {
        let mut resources: Vec<String> = self
            .slot_snapshot()
            .into_iter()
            .filter_map(|(resource_id, slot)| {
                let mut guard = slot.lock();
                guard.queue.remove_execution(execution_id)?;
                Some(resource_id)
            })
            .collect();
        resources.sort();
        resources
    }

    /// Number of resources with a slot, held or not.
    pub fn tracked_resources(&self) -> usize {
        self.slots.read().len()
    }

    /// Runs `f` with exclusive access to one resource. Everything `f` does is
    /// atomic with respect to every other caller touching the same resource.
    pub(crate) fn with_slot<R>(
        &self,
        resource_id: &str,
        f: impl FnOnce(&mut SlotHandle<'_>) -> R,
    ) -> R {
        let slot = self.slot(resource_id);
        let mut guard = slot.lock();
        let mut handle = SlotHandle {
            tracker: self,
            resource_id,
            slot: &mut *guard,
        };
        f(&mut handle)
    }

    /// Compares the primary store with both derived indexes.
    ///
    /// Locks every slot in key order, then the index, so the comparison sees
    /// one consistent state.
    ///
    /// # Errors
    ///
    /// Returns the first disagreement found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut snapshot = self.slot_snapshot();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        let guards: Vec<(String, MutexGuard<'_, ResourceSlot>)> = snapshot
            .iter()
            .map(|(resource_id, slot)| (resource_id.clone(), slot.lock()))
            .collect();
        let index = self.index.lock();

        let mut expected = DerivedIndex::default();
        for (resource_id, guard) in &guards {
            if let Some(owner) = &guard.owner {
                if &owner.resource_id != resource_id {
                    return Err(InvariantViolation::new(
                        resource_id,
                        format!("slot holds a record for '{}'", owner.resource_id),
                    ));
                }
                expected.insert(owner);
            }
        }

        compare_index("owner", &expected.by_owner, &index.by_owner)?;
        compare_index("execution", &expected.by_execution, &index.by_execution)
    }

    /// Drops slots that have no holder, no queue, and no other user.
    /// Returns how many were removed.
    pub fn prune_idle_slots(&self) -> usize {
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|_, slot| {
            Arc::strong_count(slot) > 1 || slot.try_lock().is_none_or(|guard| !guard.is_idle())
        });
        before - slots.len()
    }

    /// Drops the slot of `resource_id` if it is idle and unused. Returns
    /// whether it was removed.
    pub(crate) fn prune_slot(&self, resource_id: &str) -> bool {
        let mut slots = self.slots.write();
        let idle = slots.get(resource_id).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_some_and(|guard| guard.is_idle())
        });
        if idle {
            slots.remove(resource_id);
        }
        idle
    }

    /// Clears all ownership state. Test isolation only; must not race with
    /// in-flight acquisitions.
    pub fn reset(&self) {
        let mut slots = self.slots.write();
        slots.clear();
        self.index.lock().clear();
        self.next_sequence.store(0, Ordering::SeqCst);
    }

    fn existing_slot(&self, resource_id: &str) -> Option<Arc<Mutex<ResourceSlot>>> {
        self.slots.read().get(resource_id).cloned()
    }

    fn slot(&self, resource_id: &str) -> Arc<Mutex<ResourceSlot>> {
        if let Some(slot) = self.existing_slot(resource_id) {
            return slot;
        }
        Arc::clone(
            self.slots
                .write()
                .entry(resource_id.to_owned())
                .or_default(),
        )
    }

    fn slot_snapshot(&self) -> Vec<(String, Arc<Mutex<ResourceSlot>>)> {
        self.slots
            .read()
            .iter()
            .map(|(resource_id, slot)| (resource_id.clone(), Arc::clone(slot)))
            .collect()
    }

    fn index_insert(&self, owner: &ResourceOwner) {
        self.index.lock().insert(owner);
    }

    fn index_remove(&self, owner: &ResourceOwner) {
        if let Err(violation) = self.index.lock().remove(owner) {
            fail_fast(&violation);
        }
    }
}

fn sorted_index(index: &HashMap<String, HashSet<String>>) -> BTreeMap<String, BTreeSet<String>> {
    index
        .iter()
        .map(|(key, set)| (key.clone(), set.iter().cloned().collect()))
        .collect()
}

fn compare_index(
    name: &str,
    expected: &HashMap<String, HashSet<String>>,
    actual: &HashMap<String, HashSet<String>>,
) -> Result<(), InvariantViolation> {
    for (key, resources) in actual {
        let wanted = expected.get(key);
        if let Some(stray) = resources
            .iter()
            .find(|resource_id| !wanted.is_some_and(|set| set.contains(*resource_id)))
        {
            return Err(InvariantViolation::new(
                stray,
                format!("{name} index lists '{key}' but the store does not"),
            ));
        }
    }
    for (key, resources) in expected {
        let present = actual.get(key);
        if let Some(missing) = resources
            .iter()
            .find(|resource_id| !present.is_some_and(|set| set.contains(*resource_id)))
        {
            return Err(InvariantViolation::new(
                missing,
                format!("{name} index is missing '{key}'"),
            ));
        }
    }
    Ok(())
}

/// Exclusive handle on one resource slot, alive for one `with_slot` call.
pub(crate) struct SlotHandle<'a> {
    tracker: &'a OwnershipTracker,
    resource_id: &'a str,
    slot: &'a mut ResourceSlot,
}

impl SlotHandle<'_> {
    /// Reads the tracker clock.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.tracker.now()
    }

    /// Removes and returns the next queued request.
    pub(crate) fn pop_queued(&mut self) -> Option<QueuedRequest> {
        self.slot.queue.pop()
    }

    /// Removes the request queued by `execution_id`.
    pub(crate) fn discard_queued(&mut self, execution_id: &str) -> Option<QueuedRequest> {
        self.slot.queue.remove_execution(execution_id)
    }

    fn install(&mut self, owner: ResourceOwner) {
        if let Some(previous) = self.slot.owner.take() {
            self.tracker.index_remove(&previous);
        }
        self.tracker.index_insert(&owner);
        self.slot.owner = Some(owner);
    }
}

impl OwnershipSlot for SlotHandle<'_> {
    fn resource_id(&self) -> &str {
        self.resource_id
    }

    fn current_owner(&self) -> Option<&ResourceOwner> {
        self.slot.owner.as_ref()
    }

    fn release(&mut self, execution_id: Option<&str>) -> SlotRelease {
        let Some(current) = self.slot.owner.take() else {
            return SlotRelease::NotOwned;
        };
        if execution_id.is_some_and(|id| id != current.execution_id) {
            self.slot.owner = Some(current.clone());
            return SlotRelease::Refused(current);
        }
        self.tracker.index_remove(&current);
        SlotRelease::Released(current)
    }

    fn grant(&mut self, request: &OwnershipRequest) -> ResourceOwner {
        // A holder must not also wait for the resource it holds.
        self.slot.queue.remove_execution(&request.execution_id);
        let owner = request.clone().into_owner(self.now());
        self.install(owner.clone());
        owner
    }

    fn enqueue(
        &mut self,
        request: &OwnershipRequest,
        payload: serde_json::Value,
    ) -> Option<usize> {
        if let Some(previous) = self.slot.queue.remove_execution(&request.execution_id) {
            tracing::debug!(
                resource_id = %self.resource_id,
                execution_id = %request.execution_id,
                previous_priority = %previous.request.priority,
                priority = %request.priority,
                "queued request replaced by a newer request from the same execution"
            );
            return Some(self.slot.queue.push(QueuedRequest {
                request: request.clone(),
                payload,
                ..previous
            }));
        }
        if self.slot.queue.len() >= self.tracker.queue_capacity {
            return None;
        }
        let entry = QueuedRequest {
            request: request.clone(),
            payload,
            sequence: self.tracker.next_sequence.fetch_add(1, Ordering::SeqCst),
            queued_at: self.now(),
        };
        Some(self.slot.queue.push(entry))
    }
}
