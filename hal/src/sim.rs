//! # Virtual-Time Alarm Driver
//!
//! A deterministic [`AlarmSource`] over a simulated millisecond clock.
//! Nothing fires on its own: the embedding test (or simulation harness)
//! calls [`SimAlarms::advance`] to move time forward, and due hooks fire
//! in deadline order, exactly once per arm.
//!
//! The driver is a faithful stand-in for the interrupt-side contract:
//! `advance` may be called from a different thread than the one running
//! the dispatch loop, and hooks run outside the driver lock so they can
//! enqueue into the scheduler's job queue without lock nesting.
//!
//! It also supports fault injection for the failure paths the core must
//! honor: a channel capacity limit (claim exhaustion) and forced `start`
//! failures (arm/rearm refusal).

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;
use static_assertions::assert_impl_all;

use crate::{Alarm, AlarmSource, ExpiryHook};

// =============================================================================
// SHARED STATE
// =============================================================================

struct Channel {
    hook: ExpiryHook,
    deadline: Option<u64>,
}

struct SimState {
    now_ms: u64,
    channels: BTreeMap<u64, Channel>,
    next_channel: u64,
    capacity: usize,
    fail_starts: u32,
}

impl SimState {
    /// Earliest (deadline, channel) due at or before `target`.
    fn next_due(&self, target: u64) -> Option<(u64, u64)> {
        self.channels
            .iter()
            .filter_map(|(&id, ch)| ch.deadline.filter(|&d| d <= target).map(|d| (d, id)))
            .min()
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// Virtual-time alarm driver. Cloning yields another handle onto the same
/// clock, so a test can hand one clone to the scheduler as its
/// [`AlarmSource`] and keep another to drive time.
#[derive(Clone)]
pub struct SimAlarms {
    state: Arc<Mutex<SimState>>,
}

assert_impl_all!(SimAlarms: Send, Sync);

impl SimAlarms {
    /// Unlimited channels.
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    /// At most `capacity` concurrently claimed channels.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                now_ms: 0,
                channels: BTreeMap::new(),
                next_channel: 1,
                capacity,
                fail_starts: 0,
            })),
        }
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.state.lock().now_ms
    }

    /// Number of channels currently armed.
    pub fn armed(&self) -> usize {
        self.state
            .lock()
            .channels
            .values()
            .filter(|ch| ch.deadline.is_some())
            .count()
    }

    /// Snapshot of pending deadlines (absolute virtual time, unordered).
    pub fn pending_deadlines(&self) -> Vec<u64> {
        self.state
            .lock()
            .channels
            .values()
            .filter_map(|ch| ch.deadline)
            .collect()
    }

    /// Make the next `n` calls to [`Alarm::start`] report failure.
    pub fn fail_next_starts(&self, n: u32) {
        self.state.lock().fail_starts = n;
    }

    /// Advance virtual time by `ms`, firing every hook whose deadline
    /// falls within the window, in deadline order. Each arm delivers at
    /// most once: the deadline is cleared before its hook runs.
    pub fn advance(&self, ms: u64) {
        let target = self.state.lock().now_ms.saturating_add(ms);
        loop {
            let mut st = self.state.lock();
            let Some((deadline, id)) = st.next_due(target) else {
                st.now_ms = target;
                return;
            };
            if deadline > st.now_ms {
                st.now_ms = deadline;
            }
            // Take the hook out so it runs without the driver lock held.
            let hook = st.channels.get_mut(&id).map(|ch| {
                ch.deadline = None;
                core::mem::replace(&mut ch.hook, Box::new(|| {}))
            });
            drop(st);
            let Some(mut hook) = hook else { continue };
            hook();
            let mut st = self.state.lock();
            if let Some(ch) = st.channels.get_mut(&id) {
                ch.hook = hook;
            }
        }
    }
}

impl Default for SimAlarms {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmSource for SimAlarms {
    fn claim(&mut self, hook: ExpiryHook) -> Option<Box<dyn Alarm>> {
        let mut st = self.state.lock();
        if st.channels.len() >= st.capacity {
            return None;
        }
        let id = st.next_channel;
        st.next_channel += 1;
        st.channels.insert(
            id,
            Channel {
                hook,
                deadline: None,
            },
        );
        Some(Box::new(SimAlarm {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

// =============================================================================
// CHANNEL HANDLE
// =============================================================================

/// A claimed channel on a [`SimAlarms`] clock. Dropping it frees the slot.
pub struct SimAlarm {
    id: u64,
    state: Arc<Mutex<SimState>>,
}

impl Alarm for SimAlarm {
    fn start(&mut self, interval_ms: u32) -> bool {
        let mut st = self.state.lock();
        if st.fail_starts > 0 {
            st.fail_starts -= 1;
            return false;
        }
        let deadline = st.now_ms + u64::from(interval_ms);
        if let Some(ch) = st.channels.get_mut(&self.id) {
            ch.deadline = Some(deadline);
            true
        } else {
            false
        }
    }

    fn stop(&mut self) {
        if let Some(ch) = self.state.lock().channels.get_mut(&self.id) {
            ch.deadline = None;
        }
    }
}

impl Drop for SimAlarm {
    fn drop(&mut self) {
        self.state.lock().channels.remove(&self.id);
    }
}

// =============================================================================
// TESTS
// =============================================================================
