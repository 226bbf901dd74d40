//! Cancellable one-shot callbacks that run after a delay, and the
//! time-bounded combinator built on them.
use crate::{Consumer, Error, Executor, Producer, Promise};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

struct Pending<T>
where
    T: Clone + Send + 'static,
{
    task: Box<dyn FnOnce() -> T + Send>,
    producer: Producer<T>,
}

/// A callback that runs at most once, after a delay, unless cancelled first.
///
/// Cancellation is advisory: a fire already handed to the executor still
/// happens, but finds the callback gone and does nothing.
///
/// # Examples
///
/// ```
/// use promise_loop::{DelayedTask, ManualExecutor};
/// use std::time::Duration;
/// let executor = ManualExecutor::new();
/// let task = DelayedTask::new(|| "fired");
/// task.schedule(&executor, Duration::from_secs(1));
/// executor.advance(Duration::from_secs(1));
/// assert_eq!(task.result().wait().unwrap(), "fired");
/// ```
pub struct DelayedTask<T>
where
    T: Clone + Send + 'static,
{
    slot: Arc<Mutex<Option<Pending<T>>>>,
    result: Consumer<T>,
}

impl<T> Clone for DelayedTask<T>
where
    T: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            result: self.result.clone(),
        }
    }
}

impl<T> fmt::Debug for DelayedTask<T>
where
    T: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedTask")
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl<T> DelayedTask<T>
where
    T: Clone + Send + 'static,
{
    pub fn new<F>(task: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (producer, result) = Producer::new();
        Self {
            slot: Arc::new(Mutex::new(Some(Pending {
                task: Box::new(task),
                producer,
            }))),
            result,
        }
    }

    /// Hands a fire to `executor`, due after `delay`. Scheduling again is
    /// allowed; only the first fire runs the callback.
    pub fn schedule<E>(&self, executor: &E, delay: Duration)
    where
        E: Executor + ?Sized,
    {
        let slot = self.slot.clone();
        executor.run_after(delay, Box::new(move || fire(&slot)));
    }

    /// Drops the callback so a later fire does nothing, and resolves
    /// [`result`](Self::result) with [`Error::Cancelled`]. Returns `false` if
    /// the task had already fired or been cancelled.
    pub fn cancel(&self) -> bool {
        let pending = self.slot.lock().take();
        match pending {
            Some(pending) => {
                tracing::trace!("delayed task cancelled");
                pending.producer.reject(Error::Cancelled);
                true
            }
            None => false,
        }
    }

    /// Whether the callback has neither fired nor been cancelled.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Resolves with the callback's return value once it fires.
    pub fn result(&self) -> Consumer<T> {
        self.result.clone()
    }
}

fn fire<T>(slot: &Mutex<Option<Pending<T>>>)
where
    T: Clone + Send + 'static,
{
    let pending = slot.lock().take();
    match pending {
        Some(Pending { task, producer }) => {
            tracing::trace!("delayed task fired");
            producer.resolve(task());
        }
        None => tracing::trace!("delayed task fire skipped"),
    }
}

impl<T> Consumer<T>
where
    T: Clone + Send + 'static,
{
    /// Resolves with this consumer's outcome, or with [`Error::TimedOut`] if
    /// `after` elapses on `executor` first. The timer is cancelled as soon as
    /// the outcome arrives.
    pub fn timeout<E>(&self, executor: &E, after: Duration) -> Consumer<T>
    where
        E: Executor + ?Sized,
    {
        let (producer, consumer) = Producer::new();
        let gate = Arc::new(Mutex::new(Some(producer)));

        let expired = gate.clone();
        let timer = DelayedTask::new(move || {
            let producer = expired.lock().take();
            if let Some(producer) = producer {
                producer.reject(Error::TimedOut(after));
            }
        });
        timer.schedule(executor, after);

        self.on_complete(move |outcome| {
            timer.cancel();
            let producer = gate.lock().take();
            if let Some(producer) = producer {
                producer.complete(outcome);
            }
        });
        consumer
    }
}
