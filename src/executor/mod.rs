//! Execution contexts: something that can run a callback soon, or after a
//! delay. Consumers never pick a context themselves; anything time-based
//! takes one as a parameter.
use crate::{Consumer, DelayedTask, Error, Producer, Promise};
use std::sync::Arc;
use std::time::Duration;

mod event_loop;
mod manual;

pub use event_loop::{EventLoop, EventLoopBuilder, EventLoopHandle};
pub use manual::ManualExecutor;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync {
    /// Runs `job` as soon as the context gets to it, never inline.
    fn run_soon(&self, job: Job);

    /// Runs `job` once `delay` has elapsed.
    fn run_after(&self, delay: Duration, job: Job);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn run_soon(&self, job: Job) {
        (**self).run_soon(job)
    }

    fn run_after(&self, delay: Duration, job: Job) {
        (**self).run_after(delay, job)
    }
}

/// Helpers available on every [`Executor`].
pub trait ExecutorExt: Executor {
    /// A consumer holding `value`, resolved through `run_soon` rather than
    /// inline, so observers attached right after this call still run from
    /// the context and not from the caller's stack.
    fn succeeded<T>(&self, value: T) -> Consumer<T>
    where
        T: Clone + Send + 'static,
    {
        let (producer, consumer) = Producer::new();
        self.run_soon(Box::new(move || producer.resolve(value)));
        consumer
    }

    /// A consumer holding `err`, resolved through `run_soon`.
    fn failed<T>(&self, err: Error) -> Consumer<T>
    where
        T: Clone + Send + 'static,
    {
        let (producer, consumer) = Producer::new();
        self.run_soon(Box::new(move || producer.reject(err)));
        consumer
    }

    /// Runs `f` soon and exposes its return value.
    fn submit<T, F>(&self, f: F) -> Consumer<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (producer, consumer) = Producer::new();
        self.run_soon(Box::new(move || producer.resolve(f())));
        consumer
    }

    /// Creates a [`DelayedTask`] for `f` and schedules it after `delay`.
    fn schedule<T, F>(&self, delay: Duration, f: F) -> DelayedTask<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let task = DelayedTask::new(f);
        task.schedule(self, delay);
        task
    }
}

impl<E: Executor + ?Sized> ExecutorExt for E {}
