//! # Job Queue
//!
//! The interrupt-safe FIFO buffer decoupling hardware alarm expiry from
//! serialized callback execution. Expiry hooks (possibly in interrupt
//! context) push; the dispatch loop drains. One `spin::Mutex` protects
//! the handoff, and it is held only for the push or the drain swap,
//! never while a callback runs.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use spin::Mutex;
use static_assertions::assert_impl_all;

use crate::timer::TimerId;
use crate::{QueuedFn, Scheduler};

/// One unit of deferred work.
pub enum Job {
    /// A timer whose alarm expired; its callback is due.
    Fire(TimerId),
    /// An injected one-shot callback with no associated timer.
    Run(QueuedFn),
}

/// Serialized job buffer shared between expiry hooks and dispatch.
pub struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
}

assert_impl_all!(JobQueue: Send, Sync);

impl JobQueue {
    pub const fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a job. Callable from any context, interrupt included.
    pub fn push(&self, job: Job) {
        self.jobs.lock().push_back(job);
    }

    /// Swap the queued batch out under the lock. Jobs pushed while the
    /// returned batch executes land in the fresh queue for a later pass.
    pub fn drain(&self) -> VecDeque<Job> {
        core::mem::take(&mut *self.jobs.lock())
    }

    /// Discard everything queued.
    pub fn clear(&self) {
        self.jobs.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// INJECTOR
// =============================================================================

/// Cloneable handle for pushing jobs from interrupt or other
/// high-priority contexts into the serialized execution stream.
#[derive(Clone)]
pub struct JobInjector {
    queue: Arc<JobQueue>,
}

assert_impl_all!(JobInjector: Send, Sync);

impl JobInjector {
    pub(crate) fn new(queue: Arc<JobQueue>) -> Self {
        Self { queue }
    }

    /// Defer `f` into the next dispatch pass.
    pub fn run(&self, f: impl FnOnce(&mut Scheduler) + Send + 'static) {
        self.queue.push(Job::Run(alloc::boxed::Box::new(f)));
    }
}

// =============================================================================
// TESTS
// =============================================================================
