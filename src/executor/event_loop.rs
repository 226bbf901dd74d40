//! A dedicated thread that runs jobs one at a time: immediate jobs in FIFO
//! order and delayed jobs from a deadline-ordered heap.
use super::{Executor, Job};
use crate::Error;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

const DEFAULT_NAME: &str = "promise-loop";

/// Configuration for an [`EventLoop`].
#[derive(Debug, Clone)]
pub struct EventLoopBuilder {
    name: String,
    stack_size: Option<usize>,
}

impl Default for EventLoopBuilder {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            stack_size: None,
        }
    }
}

impl EventLoopBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the loop thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Spawns the loop thread.
    pub fn build(self) -> Result<EventLoop, Error> {
        let shared = Arc::new(LoopShared {
            state: Mutex::new(LoopState {
                ready: VecDeque::new(),
                timers: BinaryHeap::new(),
                sequence: 0,
                shutdown: false,
            }),
            condvar: Condvar::new(),
            thread: OnceLock::new(),
        });

        let mut builder = thread::Builder::new().name(self.name.clone());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        let worker = shared.clone();
        let thread = builder.spawn(move || run(worker))?;
        let _ = shared.thread.set(thread.thread().id());
        tracing::debug!(name = %self.name, "event loop started");

        Ok(EventLoop {
            handle: EventLoopHandle { shared },
            thread: Some(thread),
        })
    }
}

/// Owns the loop thread. Dropping it shuts the loop down: jobs already queued
/// with `run_soon` still run, timers that have not fired are dropped.
///
/// # Examples
///
/// ```
/// use promise_loop::{EventLoop, ExecutorExt};
/// let event_loop = EventLoop::new().unwrap();
/// let answer = event_loop.submit(|| 6 * 7);
/// assert_eq!(answer.wait().unwrap(), 42);
/// ```
#[derive(Debug)]
pub struct EventLoop {
    handle: EventLoopHandle,
    thread: Option<JoinHandle<()>>,
}

impl EventLoop {
    pub fn new() -> Result<Self, Error> {
        EventLoopBuilder::default().build()
    }

    pub fn builder() -> EventLoopBuilder {
        EventLoopBuilder::default()
    }

    /// A cloneable handle that submits jobs to this loop.
    pub fn handle(&self) -> EventLoopHandle {
        self.handle.clone()
    }

    pub fn in_event_loop(&self) -> bool {
        self.handle.in_event_loop()
    }

    /// Stops the loop and waits for its thread to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.handle.shared.state.lock().shutdown = true;
        self.handle.shared.condvar.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                tracing::error!("event loop thread panicked");
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Executor for EventLoop {
    fn run_soon(&self, job: Job) {
        self.handle.run_soon(job)
    }

    fn run_after(&self, delay: Duration, job: Job) {
        self.handle.run_after(delay, job)
    }
}

#[derive(Debug, Clone)]
pub struct EventLoopHandle {
    shared: Arc<LoopShared>,
}

impl EventLoopHandle {
    /// Whether the caller is running on the loop thread. Blocking on a
    /// consumer from there deadlocks if the loop is meant to resolve it.
    pub fn in_event_loop(&self) -> bool {
        self.shared.thread.get() == Some(&thread::current().id())
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }
}

impl Executor for EventLoopHandle {
    fn run_soon(&self, job: Job) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            drop(state);
            tracing::warn!("job submitted to a shut down event loop was dropped");
            return;
        }
        state.ready.push_back(job);
        drop(state);
        self.shared.condvar.notify_one();
    }

    fn run_after(&self, delay: Duration, job: Job) {
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now + Duration::from_secs(u32::MAX as u64));
        let mut state = self.shared.state.lock();
        if state.shutdown {
            drop(state);
            tracing::warn!(?delay, "timer submitted to a shut down event loop was dropped");
            return;
        }
        state.sequence += 1;
        let sequence = state.sequence;
        state.timers.push(Timer {
            deadline,
            sequence,
            job,
        });
        drop(state);
        self.shared.condvar.notify_one();
    }
}

struct LoopShared {
    state: Mutex<LoopState>,
    condvar: Condvar,
    thread: OnceLock<ThreadId>,
}

impl std::fmt::Debug for LoopShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LoopShared")
            .field("ready", &state.ready.len())
            .field("timers", &state.timers.len())
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

struct LoopState {
    ready: VecDeque<Job>,
    timers: BinaryHeap<Timer>,
    sequence: u64,
    shutdown: bool,
}

struct Timer {
    deadline: Instant,
    sequence: u64,
    job: Job,
}

// Reversed so the max-heap pops the earliest deadline, oldest first on ties.
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl Eq for Timer {}

fn run(shared: Arc<LoopShared>) {
    let mut state = shared.state.lock();
    loop {
        let now = Instant::now();
        while state.timers.peek().map_or(false, |timer| timer.deadline <= now) {
            if let Some(timer) = state.timers.pop() {
                state.ready.push_back(timer.job);
            }
        }
        if let Some(job) = state.ready.pop_front() {
            MutexGuard::unlocked(&mut state, || run_job(job));
            continue;
        }
        if state.shutdown {
            break;
        }
        match state.timers.peek().map(|timer| timer.deadline) {
            Some(deadline) => {
                shared.condvar.wait_until(&mut state, deadline);
            }
            None => shared.condvar.wait(&mut state),
        }
    }
    // Dropped outside the lock: a timer job may own a producer whose drop
    // notifies observers that submit back to this loop.
    let pending = std::mem::take(&mut state.timers);
    drop(state);
    tracing::debug!(dropped_timers = pending.len(), "event loop stopped");
    drop(pending);
}

fn run_job(job: Job) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
        tracing::error!(panic = panic_message(&*panic), "event loop job panicked");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
