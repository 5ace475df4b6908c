//! # Cadence Hardware Abstraction Layer
//!
//! Capability traits for the two external collaborators the scheduling
//! core depends on:
//!
//! - **Alarm**: a one-shot hardware countdown ("start an alarm for N
//!   milliseconds; deliver one expiry signal"). Expiry may be delivered
//!   from interrupt context, so the hook must be `Send` and must do
//!   nothing beyond an interrupt-safe enqueue.
//! - **Entropy**: a uniform integer source used for randomized intervals
//!   and randomized repeat counts.
//!
//! The HAL deliberately knows nothing about timers, callbacks, or
//! scheduling policy. It provides mechanisms, not policies: the core
//! decides *when* to arm and *what* an expiry means.
//!
//! For host testing and simulation the [`sim`] module provides a
//! deterministic virtual-time alarm driver; [`entropy::Pcg32`] is a small
//! software PRNG suitable as a default entropy source on platforms
//! without a hardware one.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

#[cfg(test)]
extern crate std;

use alloc::boxed::Box;

pub mod entropy;

#[cfg(feature = "sim")]
pub mod sim;

pub use entropy::{EntropySource, Pcg32};

// =============================================================================
// ALARM CAPABILITY
// =============================================================================

/// Expiry notification hook.
///
/// Invoked exactly once per [`Alarm::start`], possibly from interrupt
/// context. Implementations must restrict themselves to interrupt-safe
/// work (in practice: pushing into a lock-protected queue).
pub type ExpiryHook = Box<dyn FnMut() + Send>;

/// A one-shot hardware alarm channel.
///
/// Each `start` arms a single countdown; the hook supplied when the
/// channel was claimed fires once when it elapses. Re-arming before
/// expiry restarts the countdown.
pub trait Alarm: Send {
    /// Arm the alarm to expire `interval_ms` milliseconds from now.
    ///
    /// An interval of zero is legal and expires at the next delivery
    /// opportunity. Returns `false` if the hardware refused to arm; the
    /// caller must treat the channel as dead.
    fn start(&mut self, interval_ms: u32) -> bool;

    /// Disarm the alarm. Idempotent; safe to call after expiry.
    fn stop(&mut self);
}

/// Provider of alarm channels.
///
/// `claim` binds an expiry hook to a fresh channel. Returns `None` when
/// no more channels are available (hardware comparators are a finite
/// resource on most targets); callers surface this as a failed create
/// rather than panicking.
pub trait AlarmSource: Send {
    /// Claim a new alarm channel delivering expiries through `hook`.
    fn claim(&mut self, hook: ExpiryHook) -> Option<Box<dyn Alarm>>;
}
