use crate::consumer::{Consumer, Shared};
use crate::{Error, Promise};
use std::fmt;
use std::sync::Arc;

/// The only handle that can resolve its paired [`Consumer`]. Every resolving
/// method takes `self`, so a producer resolves at most once.
///
/// # Examples
///
/// ```
/// use promise_loop::{Promise, Producer};
/// use futures::executor::block_on;
/// use std::thread;
/// let (promise, consumer) = Producer::<String>::new();
///
/// let task1 = thread::spawn(move || block_on(async {
///     println!("Received {:?}", consumer.await);
/// }));
/// promise.resolve("Hi".into());
/// task1.join().expect("The task1 thread has panicked.");
/// ```
pub struct Producer<T>
where
    T: Clone + Send + 'static,
{
    promise: Arc<Shared<T>>,
}

impl<T> fmt::Debug for Producer<T>
where
    T: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").finish_non_exhaustive()
    }
}

impl<T> Producer<T>
where
    T: Clone + Send + 'static,
{
    /// Resolves with `outcome`. `complete(Ok(value))` is the same as
    /// [`succeed`](Self::succeed).
    pub fn complete(self, outcome: Result<T, Error>) {
        self.promise.complete(outcome);
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value))
    }

    pub fn fail(self, err: Error) {
        self.complete(Err(err))
    }

    /// Forwards the eventual outcome of `other` into this producer's
    /// consumer. Nothing is resolved synchronously unless `other` already is.
    pub fn complete_with(self, other: &Consumer<T>) {
        other.on_complete(move |outcome| self.complete(outcome));
    }

    /// A new consumer handle for the same value.
    pub fn consumer(&self) -> Consumer<T> {
        Consumer {
            promise: self.promise.clone(),
        }
    }
}

impl<T> Promise for Producer<T>
where
    T: Clone + Send + 'static,
{
    type Output = T;
    type Waiter = Consumer<T>;

    ///promiseOut.resolve
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_loop::{Promise, Producer};
    /// use futures::executor::block_on;
    /// use std::thread;
    /// let (op, op_a) = Producer::<String>::new();
    /// let task1 = thread::spawn(move || block_on(async {
    ///     println!("我等到了{:?}", op_a.await.unwrap());
    /// }));
    /// let task2 = thread::spawn(move || op.resolve(String::from("🍓")));
    /// task1.join().expect("The task1 thread has panicked");
    /// task2.join().expect("The task2 thread has panicked");
    /// ```
    fn resolve(self, value: T) {
        self.succeed(value)
    }

    ///promiseOut.reject
    fn reject(self, err: Error) {
        self.fail(err)
    }

    fn new() -> (Self, Consumer<T>) {
        let promise = Arc::new(Shared::new());
        let consumer = Consumer {
            promise: promise.clone(),
        };
        (Self { promise }, consumer)
    }
}

/// Dropping an unresolved producer is a broken promise. It is reported with a
/// `warn!` and by resolving the consumer with [`Error::ProducerDropped`], in
/// every build profile. It does not panic in debug builds: pending producers
/// are dropped routinely by cancelled timers, shut down event loops and
/// unwinding threads, and their waiters must still be released.
impl<T> Drop for Producer<T>
where
    T: Clone + Send + 'static,
{
    fn drop(&mut self) {
        if !self.promise.is_resolved() {
            tracing::warn!("producer dropped without resolving its consumer");
            self.promise.complete(Err(Error::ProducerDropped));
        }
    }
}
