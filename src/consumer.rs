//! The observing half of a promise. A `Consumer` holds at most one outcome,
//! notifies observers when it arrives, and can be cloned freely; every clone
//! shares the same state.
use crate::{latch::Latch, Error};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

pub(crate) type Observer<T> = Box<dyn FnOnce(Result<T, Error>) + Send>;

pub(crate) struct Shared<T> {
    state: Mutex<State<T>>,
}

struct State<T> {
    outcome: Option<Result<T, Error>>,
    observers: Vec<(u64, Observer<T>)>,
    next_observer: u64,
    wakers: Vec<Waker>,
}

impl<T: Clone> Shared<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                outcome: None,
                observers: Vec::new(),
                next_observer: 0,
                wakers: Vec::new(),
            }),
        }
    }

    pub(crate) fn resolved(outcome: Result<T, Error>) -> Self {
        Self {
            state: Mutex::new(State {
                outcome: Some(outcome),
                observers: Vec::new(),
                next_observer: 0,
                wakers: Vec::new(),
            }),
        }
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.state.lock().outcome.is_some()
    }

    /// Stores the outcome and notifies observers in registration order.
    ///
    /// Returns `false` if an outcome was already stored; the stored outcome
    /// is never replaced.
    pub(crate) fn complete(&self, outcome: Result<T, Error>) -> bool {
        let (observers, wakers) = {
            let mut state = self.state.lock();
            if state.outcome.is_some() {
                drop(state);
                tracing::error!("attempted to resolve an already resolved consumer");
                debug_assert!(false, "consumer already resolved");
                return false;
            }
            state.outcome = Some(outcome.clone());
            (
                std::mem::take(&mut state.observers),
                std::mem::take(&mut state.wakers),
            )
        };
        tracing::trace!(
            observers = observers.len(),
            wakers = wakers.len(),
            ok = outcome.is_ok(),
            "consumer resolved"
        );
        for (_, observer) in observers {
            observer(outcome.clone());
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Queues `observer`, or runs it now if already resolved. Returns the id
    /// of a queued observer so it can be withdrawn with [`Shared::remove`].
    fn register(&self, observer: Observer<T>) -> Option<u64> {
        let outcome = {
            let mut state = self.state.lock();
            match state.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    let id = state.next_observer;
                    state.next_observer += 1;
                    state.observers.push((id, observer));
                    return Some(id);
                }
            }
        };
        observer(outcome);
        None
    }

    /// Withdraws a queued observer. Returns `false` if it already ran.
    fn remove(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        let before = state.observers.len();
        state.observers.retain(|(queued, _)| *queued != id);
        state.observers.len() != before
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }
}

/// A single-assignment value that resolves to `Result<T, Error>` exactly once.
///
/// Created paired with a [`Producer`](crate::Producer), or already resolved
/// with [`Consumer::succeeded`] / [`Consumer::failed`].
pub struct Consumer<T> {
    pub(crate) promise: Arc<Shared<T>>,
}

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.promise.state.lock();
        f.debug_struct("Consumer")
            .field("resolved", &state.outcome.is_some())
            .field("observers", &state.observers.len())
            .finish()
    }
}

impl<T> Consumer<T>
where
    T: Clone + Send + 'static,
{
    /// A consumer that already holds `value`. Observers run immediately.
    pub fn succeeded(value: T) -> Self {
        Self {
            promise: Arc::new(Shared::resolved(Ok(value))),
        }
    }

    /// A consumer that already holds `err`.
    pub fn failed(err: Error) -> Self {
        Self {
            promise: Arc::new(Shared::resolved(Err(err))),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.promise.is_resolved()
    }

    /// Returns a copy of the outcome without blocking, if there is one.
    pub fn peek(&self) -> Option<Result<T, Error>> {
        self.promise.state.lock().outcome.clone()
    }

    /// Registers `observer` to receive the outcome.
    ///
    /// If the consumer is already resolved the observer runs right here on
    /// the calling thread; otherwise it is queued and runs on whichever
    /// thread resolves the producer.
    pub fn on_complete<F>(&self, observer: F)
    where
        F: FnOnce(Result<T, Error>) + Send + 'static,
    {
        self.promise.register(Box::new(observer));
    }

    pub fn on_success<F>(&self, observer: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_complete(move |outcome| {
            if let Ok(value) = outcome {
                observer(value)
            }
        });
    }

    pub fn on_failure<F>(&self, observer: F)
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.on_complete(move |outcome| {
            if let Err(err) = outcome {
                observer(err)
            }
        });
    }

    /// Blocks the calling thread until the consumer resolves.
    ///
    /// Never call this on the thread that is expected to resolve the
    /// producer (for example from inside an [`EventLoop`](crate::EventLoop)
    /// job that the resolution is queued behind): it will block forever.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_loop::{Producer, Promise};
    /// use std::thread;
    /// let (promise, consumer) = Producer::<String>::new();
    /// let task = thread::spawn(move || promise.resolve("🍓".into()));
    /// assert_eq!(consumer.wait().unwrap(), "🍓");
    /// task.join().expect("The task thread has panicked");
    /// ```
    pub fn wait(&self) -> Result<T, Error> {
        if let Some(outcome) = self.peek() {
            return outcome;
        }
        let (latch, slot, _) = self.park();
        latch.wait();
        let outcome = slot.lock().take();
        outcome.unwrap_or(Err(Error::ProducerDropped))
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout` with
    /// [`Error::TimedOut`]. The consumer itself is left untouched and keeps
    /// no trace of the abandoned wait.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, Error> {
        if let Some(outcome) = self.peek() {
            return outcome;
        }
        let (latch, slot, id) = self.park();
        if !latch.wait_timeout(timeout) {
            // Lost the race with resolution if the observer already ran.
            let withdrawn = id.map_or(false, |id| self.promise.remove(id));
            if withdrawn {
                return Err(Error::TimedOut(timeout));
            }
            latch.wait();
        }
        let outcome = slot.lock().take();
        outcome.unwrap_or(Err(Error::ProducerDropped))
    }

    fn park(&self) -> (Latch, Arc<Mutex<Option<Result<T, Error>>>>, Option<u64>) {
        let latch = Latch::new(1);
        let slot = Arc::new(Mutex::new(None));
        let (signal, sink) = (latch.clone(), slot.clone());
        let id = self.promise.register(Box::new(move |outcome| {
            *sink.lock() = Some(outcome);
            signal.count_down();
        }));
        (latch, slot, id)
    }
}

impl<T: Clone> Future for Consumer<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.promise.state.lock();
        if let Some(outcome) = state.outcome.clone() {
            return Poll::Ready(outcome);
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
