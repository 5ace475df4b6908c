//! # Cadence Scheduling Core
//!
//! A cooperative software timer scheduler for resource-constrained
//! targets. Application code registers time-driven callbacks (periodic,
//! randomized-interval, one-shot, counted, or condition-triggered) and
//! the core guarantees they never execute concurrently or re-entrantly
//! with each other or with interrupt context.
//!
//! ## Architecture
//!
//! ```text
//!  factory call          hardware expiry          cooperative tick
//!       │              (interrupt context)              │
//!       ▼                      │                        ▼
//!  ┌──────────┐   arm    ┌───────────┐   push    ┌─────────────┐
//!  │ Registry │◀────────│   Alarm   │──────────▶│  Job Queue  │
//!  │ (entity) │          │ (one-shot)│  (locked)  │   (FIFO)    │
//!  └──────────┘          └───────────┘           └──────┬──────┘
//!       ▲                                               │ drain
//!       │ rearm / retire                                ▼
//!       └────────────────────────────────────── dispatch_once()
//!                                    on_fire → continuation → rearm|retire
//! ```
//!
//! All callbacks are serialized through the job queue: the hardware
//! alarm's expiry hook does nothing but an interrupt-safe enqueue, and a
//! single cooperative [`Scheduler::dispatch_once`] pass drains and
//! executes jobs in arrival order. A single `spin::Mutex` protects the
//! enqueue/drain handoff; the registry is touched only from dispatch
//! context and needs no lock.
//!
//! ## Callbacks
//!
//! Callbacks receive the scheduler as explicit context, so a firing timer
//! can chain new timers, cancel others (or itself), or inject immediate
//! jobs. Callbacks must not block: there is one dispatch context, and a
//! blocked callback starves every other timer.
//!
//! All time values are in milliseconds.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

#[cfg(test)]
extern crate std;

use alloc::boxed::Box;

pub mod continuation;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod timer;

pub use continuation::{Continuation, PredicateFn};
pub use queue::{Job, JobInjector, JobQueue};
pub use scheduler::{Scheduler, WATCHPOINT_POLL_MS};
pub use timer::{TimerFlags, TimerId};

/// Primary / completion timer callback.
///
/// Invoked from dispatch context only; the `&mut Scheduler` argument is
/// the live scheduler, usable for chaining and cancellation.
pub type TimerFn = Box<dyn FnMut(&mut Scheduler) + Send>;

/// A one-shot job injected directly into the job queue.
pub type QueuedFn = Box<dyn FnOnce(&mut Scheduler) + Send>;
