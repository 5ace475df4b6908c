//! # Continuation
//!
//! The callable evaluated after each firing to decide whether a timer
//! lives (non-zero) or retires (zero). A countdown seeded with 1 yields a
//! one-shot, seeded with `n` exactly n firings; an arbitrary predicate
//! turns the timer into a watchpoint that retires (or keeps polling) on
//! whatever condition the predicate encodes.

use alloc::boxed::Box;

use crate::scheduler::Scheduler;

/// Watchpoint predicate. Returns the keep-going signal: zero retires the
/// timer (or, for free-running watchpoints, marks the condition as met).
pub type PredicateFn = Box<dyn FnMut(&mut Scheduler) -> u32 + Send>;

/// Decides after each firing whether the timer is rearmed or retired.
pub enum Continuation {
    /// Never retires.
    Forever,
    /// Decrements on each evaluation; zero retires. A randomized repeat
    /// count is a `Countdown` seeded with a uniform draw at creation.
    Countdown(u32),
    /// Arbitrary user predicate.
    Predicate(PredicateFn),
}

impl Continuation {
    /// Wrap a closure as a predicate continuation.
    pub fn predicate(pred: impl FnMut(&mut Scheduler) -> u32 + Send + 'static) -> Self {
        Self::Predicate(Box::new(pred))
    }

    /// Evaluate once, after a firing. Non-zero means rearm.
    pub(crate) fn evaluate(&mut self, ctx: &mut Scheduler) -> u32 {
        match self {
            Self::Forever => 1,
            Self::Countdown(n) => {
                *n = n.saturating_sub(1);
                *n
            },
            Self::Predicate(pred) => pred(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::testutil::sim_scheduler;

    #[test]
    fn test_forever_never_reaches_zero() {
        let (mut sched, _sim) = sim_scheduler();
        let mut c = Continuation::Forever;
        for _ in 0..1_000 {
            assert_ne!(c.evaluate(&mut sched), 0);
        }
    }

    #[test]
    fn test_countdown_returns_new_value() {
        let (mut sched, _sim) = sim_scheduler();
        let mut c = Continuation::Countdown(3);
        assert_eq!(c.evaluate(&mut sched), 2);
        assert_eq!(c.evaluate(&mut sched), 1);
        assert_eq!(c.evaluate(&mut sched), 0);
        // Saturates rather than wrapping.
        assert_eq!(c.evaluate(&mut sched), 0);
    }

    #[test]
    fn test_predicate_sees_scheduler_context() {
        let (mut sched, _sim) = sim_scheduler();
        let mut c = Continuation::predicate(|ctx: &mut Scheduler| {
            u32::from(ctx.active_timers() == 0)
        });
        // The predicate is an arbitrary computation over live state.
        assert_eq!(c.evaluate(&mut sched), 1);
    }
}
