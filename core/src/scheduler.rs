//! # Scheduler
//!
//! Orchestrates timer creation, the serialized dispatch loop, and
//! cancellation. One scheduler instance is owned by the embedding
//! application; there is no global state. The application's main loop
//! calls [`Scheduler::dispatch_once`] frequently and regularly: timing
//! accuracy degrades proportionally to call latency, and no callback may
//! block, since there is exactly one dispatch context.
//!
//! Per-timer state machine:
//!
//! ```text
//! Armed ──expiry──▶ Queued ──dispatched──▶ Armed      (continuation non-zero)
//!                                      ├─▶ Retired    (zero: stop, remove, on_complete)
//!                                      └─▶ Cancelled  (stop, remove, no on_complete)
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use alloc::boxed::Box;
use alloc::sync::Arc;

use cadence_hal::{AlarmSource, EntropySource, ExpiryHook};
use log::{debug, trace, warn};
use static_assertions::assert_impl_all;

use crate::continuation::Continuation;
use crate::queue::{Job, JobInjector, JobQueue};
use crate::registry::TimerRegistry;
use crate::timer::{TimerEntry, TimerFlags, TimerId};
use crate::TimerFn;

/// Poll cadence for `when` / `whenever` watchpoints, in milliseconds.
pub const WATCHPOINT_POLL_MS: u32 = 1;

/// Sampling window of the creation-rate load metric, in milliseconds.
const LOAD_WINDOW_MS: u32 = 1_000;

// =============================================================================
// LOAD METER
// =============================================================================

/// Coarse creation-rate counter. `created` accumulates within the current
/// window; the housekeeping sampler timer snapshots it into `load` once
/// per window. Best-effort diagnostic, not a contract.
struct LoadMeter {
    created: AtomicU32,
    load: AtomicU32,
}

impl LoadMeter {
    const fn new() -> Self {
        Self {
            created: AtomicU32::new(0),
            load: AtomicU32::new(0),
        }
    }
}

// =============================================================================
// DISPATCH GUARD
// =============================================================================

/// Re-entrancy guard for the dispatch loop. Held for the duration of a
/// pass; released on drop so a panicking callback cannot wedge dispatch.
struct DispatchGuard(Arc<AtomicBool>);

impl DispatchGuard {
    fn try_enter(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::Acquire) {
            None
        } else {
            Some(Self(Arc::clone(flag)))
        }
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Marks the timer currently executing its callback; cleared on drop so
/// a panicking callback cannot leave a stale mark behind.
struct InFlightGuard {
    in_flight: Arc<AtomicU32>,
    cancelled: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn enter(in_flight: &Arc<AtomicU32>, cancelled: &Arc<AtomicBool>, id: TimerId) -> Self {
        in_flight.store(id.raw(), Ordering::Relaxed);
        cancelled.store(false, Ordering::Relaxed);
        Self {
            in_flight: Arc::clone(in_flight),
            cancelled: Arc::clone(cancelled),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.store(TimerId::INVALID.raw(), Ordering::Relaxed);
        self.cancelled.store(false, Ordering::Relaxed);
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// The cooperative timer scheduler.
///
/// Owns the timer registry, the job queue, and the two external
/// collaborators (alarm source, entropy source). Every factory operation
/// returns an opaque [`TimerId`]; [`TimerId::INVALID`] signals a rejected
/// configuration or alarm exhaustion.
pub struct Scheduler {
    alarms: Box<dyn AlarmSource>,
    entropy: Box<dyn EntropySource>,
    registry: TimerRegistry,
    queue: Arc<JobQueue>,
    load: Arc<LoadMeter>,
    dispatch_busy: Arc<AtomicBool>,
    in_flight: Arc<AtomicU32>,
    in_flight_cancelled: Arc<AtomicBool>,
}

assert_impl_all!(Scheduler: Send);

impl Scheduler {
    /// Build a scheduler over the platform's alarm and entropy
    /// capabilities, and arm the internal load sampler.
    pub fn new(alarms: Box<dyn AlarmSource>, entropy: Box<dyn EntropySource>) -> Self {
        let mut sched = Self {
            alarms,
            entropy,
            registry: TimerRegistry::new(),
            queue: Arc::new(JobQueue::new()),
            load: Arc::new(LoadMeter::new()),
            dispatch_busy: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicU32::new(TimerId::INVALID.raw())),
            in_flight_cancelled: Arc::new(AtomicBool::new(false)),
        };

        let meter = Arc::clone(&sched.load);
        let sampler = sched.create(
            LOAD_WINDOW_MS,
            LOAD_WINDOW_MS,
            Box::new(move |_| {
                let window = meter.created.swap(0, Ordering::Relaxed);
                meter.load.store(window, Ordering::Relaxed);
            }),
            Continuation::Forever,
            None,
            TimerFlags::INTERNAL,
        );
        if !sampler.is_valid() {
            warn!("load sampler unavailable; current_load() will read 0");
        }
        sched
    }

    // =========================================================================
    // FACTORY OPERATIONS
    // =========================================================================

    /// Fire `f` every `ms` milliseconds, forever (until cancelled).
    /// `ms = 0` fires as fast as alarm delivery and dispatch allow.
    pub fn every(
        &mut self,
        ms: u32,
        f: impl FnMut(&mut Scheduler) + Send + 'static,
    ) -> TimerId {
        self.create(ms, ms, Box::new(f), Continuation::Forever, None, TimerFlags::empty())
    }

    /// Fire `f` forever, redrawing the interval uniformly from
    /// `[min, max)` before every arm. `max <= min` degrades to a fixed
    /// interval of `min`.
    pub fn every_random(
        &mut self,
        min: u32,
        max: u32,
        f: impl FnMut(&mut Scheduler) + Send + 'static,
    ) -> TimerId {
        self.create(min, max, Box::new(f), Continuation::Forever, None, TimerFlags::empty())
    }

    /// Fire `f` once after `ms` milliseconds, then run `chain`.
    pub fn once(
        &mut self,
        ms: u32,
        f: impl FnMut(&mut Scheduler) + Send + 'static,
        chain: Option<TimerFn>,
    ) -> TimerId {
        self.n_times(1, ms, f, chain)
    }

    /// Like [`once`](Self::once), with the delay drawn uniformly from
    /// `[min, max)` once at creation.
    pub fn once_random(
        &mut self,
        min: u32,
        max: u32,
        f: impl FnMut(&mut Scheduler) + Send + 'static,
        chain: Option<TimerFn>,
    ) -> TimerId {
        let ms = self.entropy.uniform(min, max);
        self.n_times(1, ms, f, chain)
    }

    /// Fire `f` exactly `n` times at a fixed interval, then run `chain`.
    /// `n = 0` is rejected: no timer is created and
    /// [`TimerId::INVALID`] is returned.
    pub fn n_times(
        &mut self,
        n: u32,
        ms: u32,
        f: impl FnMut(&mut Scheduler) + Send + 'static,
        chain: Option<TimerFn>,
    ) -> TimerId {
        if n == 0 {
            warn!("n_times(0) rejected");
            return TimerId::INVALID;
        }
        self.create(ms, ms, Box::new(f), Continuation::Countdown(n), chain, TimerFlags::empty())
    }

    /// Fire `f` exactly `n` times with the interval redrawn from
    /// `[min, max)` on every arm, then run `chain`.
    pub fn n_times_random(
        &mut self,
        n: u32,
        min: u32,
        max: u32,
        f: impl FnMut(&mut Scheduler) + Send + 'static,
        chain: Option<TimerFn>,
    ) -> TimerId {
        if n == 0 {
            warn!("n_times_random(0) rejected");
            return TimerId::INVALID;
        }
        self.create(min, max, Box::new(f), Continuation::Countdown(n), chain, TimerFlags::empty())
    }

    /// Fire `f` a random number of times drawn from `[tmin, tmax)` at a
    /// fixed interval, then run `chain`. A draw of zero is rejected like
    /// `n_times(0)`.
    pub fn random_times(
        &mut self,
        tmin: u32,
        tmax: u32,
        ms: u32,
        f: impl FnMut(&mut Scheduler) + Send + 'static,
        chain: Option<TimerFn>,
    ) -> TimerId {
        let n = self.entropy.uniform(tmin, tmax);
        self.n_times(n, ms, f, chain)
    }

    /// Fire `f` a random number of times drawn from `[tmin, tmax)`, with
    /// the interval redrawn from `[min, max)` on every arm.
    pub fn random_times_random(
        &mut self,
        tmin: u32,
        tmax: u32,
        min: u32,
        max: u32,
        f: impl FnMut(&mut Scheduler) + Send + 'static,
        chain: Option<TimerFn>,
    ) -> TimerId {
        let n = self.entropy.uniform(tmin, tmax);
        self.n_times_random(n, min, max, f, chain)
    }

    /// Single-shot watchpoint: poll `pred` once per millisecond tick and
    /// run `f` exactly once, on the first dispatch pass where `pred`
    /// returns zero. The timer then retires.
    pub fn when(
        &mut self,
        pred: impl FnMut(&mut Scheduler) -> u32 + Send + 'static,
        f: impl FnMut(&mut Scheduler) + Send + 'static,
    ) -> TimerId {
        self.create(
            WATCHPOINT_POLL_MS,
            WATCHPOINT_POLL_MS,
            Box::new(|_| {}),
            Continuation::predicate(pred),
            Some(Box::new(f)),
            TimerFlags::empty(),
        )
    }

    /// Free-running watchpoint: run `f` on every poll tick where `pred`
    /// returns zero, indefinitely, until cancelled.
    pub fn whenever(
        &mut self,
        mut pred: impl FnMut(&mut Scheduler) -> u32 + Send + 'static,
        mut f: impl FnMut(&mut Scheduler) + Send + 'static,
    ) -> TimerId {
        self.create(
            WATCHPOINT_POLL_MS,
            WATCHPOINT_POLL_MS,
            Box::new(|_| {}),
            Continuation::predicate(move |ctx: &mut Scheduler| {
                if pred(ctx) == 0 {
                    f(ctx);
                }
                1
            }),
            None,
            TimerFlags::empty(),
        )
    }

    /// Common construction path for every factory operation.
    fn create(
        &mut self,
        interval_min: u32,
        interval_max: u32,
        on_fire: TimerFn,
        continuation: Continuation,
        on_complete: Option<TimerFn>,
        flags: TimerFlags,
    ) -> TimerId {
        let id = self.registry.allocate_id();
        let queue = Arc::clone(&self.queue);
        let hook: ExpiryHook = Box::new(move || queue.push(Job::Fire(id)));

        let Some(alarm) = self.alarms.claim(hook) else {
            warn!("timer create failed: alarm channels exhausted");
            return TimerId::INVALID;
        };
        let mut entry = TimerEntry::new(
            id,
            interval_min,
            interval_max,
            alarm,
            on_fire,
            continuation,
            on_complete,
            flags,
        );
        if !entry.arm(self.entropy.as_mut()) {
            warn!("timer {} could not arm; dropped", id);
            return TimerId::INVALID;
        }
        if !entry.is_internal() {
            self.load.created.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            "timer {} created ({}..{} ms)",
            id, entry.interval_min, entry.interval_max
        );
        self.registry.insert(entry);
        id
    }

    // =========================================================================
    // CANCELLATION
    // =========================================================================

    /// Disarm and remove a timer without invoking its completion
    /// callback. Unknown, retired, or already-cancelled identifiers are a
    /// silent no-op. A timer may cancel itself from its own callback.
    pub fn cancel(&mut self, id: TimerId) {
        if id.is_valid() && id.raw() == self.in_flight.load(Ordering::Relaxed) {
            self.in_flight_cancelled.store(true, Ordering::Relaxed);
            return;
        }
        if let Some(mut entry) = self.registry.remove(id) {
            entry.stop();
            debug!("timer {} cancelled", id);
        }
    }

    /// Disarm and remove every application timer, without invoking any
    /// completion callback. Housekeeping timers survive.
    pub fn cancel_all(&mut self) {
        if self.in_flight.load(Ordering::Relaxed) != TimerId::INVALID.raw() {
            self.in_flight_cancelled.store(true, Ordering::Relaxed);
        }
        let drained = self.registry.drain_external();
        let count = drained.len();
        for mut entry in drained {
            entry.stop();
        }
        debug!("cancelled {} timers", count);
    }

    /// Cancel everything, housekeeping included, and discard any queued
    /// jobs. Defined end of the scheduler lifecycle.
    pub fn shutdown(&mut self) {
        if self.in_flight.load(Ordering::Relaxed) != TimerId::INVALID.raw() {
            self.in_flight_cancelled.store(true, Ordering::Relaxed);
        }
        for mut entry in self.registry.drain_all() {
            entry.stop();
        }
        self.queue.clear();
        debug!("scheduler shut down");
    }

    // =========================================================================
    // JOB INJECTION
    // =========================================================================

    /// Run `f` on the very next dispatch pass, with no associated timer.
    pub fn queue_immediate(&mut self, f: impl FnOnce(&mut Scheduler) + Send + 'static) {
        self.queue.push(Job::Run(Box::new(f)));
    }

    /// Handle for injecting jobs from interrupt or other high-priority
    /// contexts into the serialized execution stream.
    pub fn injector(&self) -> JobInjector {
        JobInjector::new(Arc::clone(&self.queue))
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// One cooperative tick: drain the job queue under lock into a local
    /// batch, then execute it in FIFO order. Expiries delivered while the
    /// batch executes land in the fresh queue for a later pass. Calling
    /// this from within a callback is a no-op.
    pub fn dispatch_once(&mut self) {
        let Some(_guard) = DispatchGuard::try_enter(&self.dispatch_busy) else {
            return;
        };
        let batch = self.queue.drain();
        for job in batch {
            match job {
                Job::Run(f) => f(self),
                Job::Fire(id) => self.fire(id),
            }
        }
    }

    /// Execute one due timer: primary callback, then continuation; rearm
    /// on non-zero, retire (and chain) on zero.
    fn fire(&mut self, id: TimerId) {
        // A missing entry means the timer was cancelled or retired after
        // its expiry was queued; the stale job is skipped.
        let Some(mut entry) = self.registry.remove(id) else {
            trace!("timer {} expiry skipped (no longer live)", id);
            return;
        };

        let flight = InFlightGuard::enter(&self.in_flight, &self.in_flight_cancelled, id);
        (entry.on_fire)(self);
        let keep = entry.continuation.evaluate(self);
        let cancelled = self.in_flight_cancelled.load(Ordering::Relaxed);
        drop(flight);

        if cancelled {
            entry.stop();
            debug!("timer {} cancelled mid-flight", id);
        } else if keep != 0 {
            if entry.rearm(self.entropy.as_mut()) {
                self.registry.insert(entry);
            } else {
                warn!("timer {} could not rearm; dropped", id);
            }
        } else {
            entry.stop();
            debug!("timer {} retired", id);
            if let Some(mut chain) = entry.on_complete.take() {
                chain(self);
            }
        }
    }

    // =========================================================================
    // DIAGNOSTICS
    // =========================================================================

    /// Creation-rate load signal: timers created during the most recent
    /// completed one-second window. Approximate by design.
    pub fn current_load(&self) -> u32 {
        self.load.load.load(Ordering::Relaxed)
    }

    /// Number of live application timers.
    pub fn active_timers(&self) -> usize {
        self.registry.external_len()
    }

    /// Whether `id` refers to a live timer.
    pub fn is_active(&self, id: TimerId) -> bool {
        self.registry.contains(id)
    }
}

// =============================================================================
// TEST SUPPORT
// =============================================================================


// =============================================================================
// TESTS
// =============================================================================
