//! Single-assignment futures and promises.
//!
//! A [`Producer`] is the only handle allowed to resolve a value; the paired
//! [`Consumer`] observes it. Consumers can be cloned, chained with
//! combinators, joined with [`join_all`], awaited, or waited on from a
//! blocking thread.
//!
//! # Examples
//!
//! ```
//! use promise_loop::{Producer, Promise};
//! use std::thread;
//!
//! let (promise, consumer) = Producer::<u32>::new();
//! let doubled = consumer.map(|n| n * 2);
//! let task = thread::spawn(move || promise.resolve(21));
//! assert_eq!(doubled.wait().unwrap(), 42);
//! task.join().expect("The task thread has panicked.");
//! ```
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod combinator;
pub mod consumer;
pub mod executor;
mod join;
pub mod latch;
pub mod producer;
pub mod scheduled;

pub use consumer::Consumer;
pub use executor::{
    EventLoop, EventLoopBuilder, EventLoopHandle, Executor, ExecutorExt, Job, ManualExecutor,
};
pub use join::{join_all, join_all_settled};
pub use latch::Latch;
pub use producer::Producer;
pub use scheduled::DelayedTask;

/// The failure side of every outcome.
///
/// Cloneable because a single outcome is handed to every observer.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("producer dropped without resolving")]
    ProducerDropped,
    #[error("task cancelled before it fired")]
    Cancelled,
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Custom(Arc<dyn std::error::Error + Send + Sync + 'static>),
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),
}

impl Error {
    /// Wraps any error type as a domain failure.
    pub fn custom<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Custom(Arc::new(err))
    }

    pub fn msg(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

/// The resolving half of a producer/consumer pair.
pub trait Promise {
    type Output;
    type Waiter;
    fn resolve(self, value: Self::Output);
    fn reject(self, err: Error);
    fn new() -> (Self, Self::Waiter)
    where
        Self: Sized;
}
