//! # Timer Registry
//!
//! The set of all live timer entities, keyed by identifier, plus the
//! monotonic identifier allocator. Touched only from dispatch context, so
//! it carries no lock. Iteration order is unspecified and carries no
//! firing-order meaning: firing order is governed purely by alarm expiry,
//! mediated by the job queue.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::timer::{TimerEntry, TimerId};

pub struct TimerRegistry {
    timers: BTreeMap<TimerId, TimerEntry>,
    next_id: u32,
}

impl TimerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            timers: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Hand out the next identifier. Never 0; on 32-bit wrap, skips any
    /// identifier still alive.
    pub(crate) fn allocate_id(&mut self) -> TimerId {
        loop {
            let raw = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if raw == 0 {
                continue;
            }
            let id = TimerId::from_raw(raw);
            if !self.timers.contains_key(&id) {
                return id;
            }
        }
    }

    pub(crate) fn insert(&mut self, entry: TimerEntry) {
        self.timers.insert(entry.id, entry);
    }

    pub(crate) fn remove(&mut self, id: TimerId) -> Option<TimerEntry> {
        self.timers.remove(&id)
    }

    pub(crate) fn contains(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    /// Live entities, housekeeping included.
    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }

    /// Live application-created entities.
    pub(crate) fn external_len(&self) -> usize {
        self.timers.values().filter(|e| !e.is_internal()).count()
    }

    /// Remove and return every application-created entity, leaving
    /// housekeeping timers in place.
    pub(crate) fn drain_external(&mut self) -> Vec<TimerEntry> {
        let ids: Vec<TimerId> = self
            .timers
            .iter()
            .filter(|(_, e)| !e.is_internal())
            .map(|(&id, _)| id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.timers.remove(&id))
            .collect()
    }

    /// Remove and return everything, housekeeping included.
    pub(crate) fn drain_all(&mut self) -> Vec<TimerEntry> {
        let drained = core::mem::take(&mut self.timers);
        drained.into_values().collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
