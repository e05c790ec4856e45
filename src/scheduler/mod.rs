//! Single-threaded scheduling
//!
//! The connection registry performs its deferred work (event emission,
//! de-duplication timeouts, proxy notifications) through a [`Scheduler`].
//! [`MessageLoop`] is the in-crate implementation: one OS thread draining a
//! FIFO task queue, with one-shot timers.

pub mod message_loop;

use std::time::Duration;

use crate::error::Result;

pub use message_loop::MessageLoop;

/// A unit of work executed on the scheduler's loop thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Loop-thread-affine task execution
pub trait Scheduler: Send + Sync {
    /// Enqueue a task and return immediately
    fn post(&self, task: Task);

    /// Run a task on the loop thread and block until it has completed
    fn send(&self, task: Task) -> Result<()>;

    /// Run a task once on the loop thread after `delay`
    fn timer(&self, delay: Duration, task: Task);
}
