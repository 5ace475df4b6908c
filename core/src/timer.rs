//! # Timer Entity
//!
//! The scheduling unit: one (possibly randomized) interval, one primary
//! callback, an optional completion callback, a continuation rule, and
//! the hardware alarm channel it wraps. Entities are exclusively owned by
//! the scheduler; they never invoke their own callbacks. Dispatch does,
//! to preserve serialization.

use core::fmt;

use alloc::boxed::Box;
use bitflags::bitflags;
use cadence_hal::{Alarm, EntropySource};
use log::trace;

use crate::continuation::Continuation;
use crate::TimerFn;

// =============================================================================
// IDENTIFIER
// =============================================================================

/// Opaque timer identifier.
///
/// Process-unique and monotonically assigned; never reused while its
/// entity is alive. Raw value 0 is reserved as the invalid sentinel, and
/// factory operations return it on failure. Once a timer retires or is
/// cancelled its identifier becomes meaningless: cancelling it again is a
/// silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u32);

impl TimerId {
    /// The "no timer" sentinel.
    pub const INVALID: Self = Self(0);

    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `false` for the invalid sentinel.
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// FLAGS
// =============================================================================

bitflags! {
    /// Per-timer flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimerFlags: u8 {
        /// Interval is redrawn uniformly from `[min, max)` on every arm.
        const RANDOMIZED = 1 << 0;
        /// Scheduler housekeeping timer; survives `cancel_all`.
        const INTERNAL = 1 << 1;
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// A live timer owned by the scheduler's registry.
pub struct TimerEntry {
    pub(crate) id: TimerId,
    pub(crate) interval_min: u32,
    pub(crate) interval_max: u32,
    pub(crate) flags: TimerFlags,
    pub(crate) alarm: Box<dyn Alarm>,
    pub(crate) on_fire: TimerFn,
    pub(crate) on_complete: Option<TimerFn>,
    pub(crate) continuation: Continuation,
}

impl TimerEntry {
    /// Build an entity. A degenerate range (`interval_max <=
    /// interval_min`) normalizes to a fixed interval of `interval_min`.
    pub(crate) fn new(
        id: TimerId,
        interval_min: u32,
        interval_max: u32,
        alarm: Box<dyn Alarm>,
        on_fire: TimerFn,
        continuation: Continuation,
        on_complete: Option<TimerFn>,
        mut flags: TimerFlags,
    ) -> Self {
        if interval_max > interval_min {
            flags |= TimerFlags::RANDOMIZED;
        } else {
            flags &= !TimerFlags::RANDOMIZED;
        }
        Self {
            id,
            interval_min,
            interval_max,
            flags,
            alarm,
            on_fire,
            on_complete,
            continuation,
        }
    }

    /// Compute the interval (fresh draw if randomized) and start the
    /// underlying one-shot alarm. Never blocks. `false` means the alarm
    /// refused to arm and the entity must be treated as dead.
    pub(crate) fn arm(&mut self, entropy: &mut dyn EntropySource) -> bool {
        let interval = if self.flags.contains(TimerFlags::RANDOMIZED) {
            entropy.uniform(self.interval_min, self.interval_max)
        } else {
            self.interval_min
        };
        trace!("timer {} arming for {} ms", self.id, interval);
        self.alarm.start(interval)
    }

    /// Restart after a firing whose continuation signalled continue.
    /// Redraws the interval when randomized.
    pub(crate) fn rearm(&mut self, entropy: &mut dyn EntropySource) -> bool {
        self.arm(entropy)
    }

    /// Disarm the underlying alarm. Idempotent.
    pub(crate) fn stop(&mut self) {
        self.alarm.stop();
    }

    pub(crate) fn is_internal(&self) -> bool {
        self.flags.contains(TimerFlags::INTERNAL)
    }
}

// =============================================================================
// TESTS
// =============================================================================
