//! Combinators that derive a new consumer from an existing one. Each creates a
//! fresh producer and resolves it from the receiver's outcome.
use crate::{Consumer, Error, Producer, Promise};

impl<T> Consumer<T>
where
    T: Clone + Send + 'static,
{
    /// Transforms a successful value; failures pass through and `f` is never
    /// called for them.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_loop::Consumer;
    /// let len = Consumer::succeeded(String::from("🍓🍓")).map(|s| s.chars().count());
    /// assert_eq!(len.wait().unwrap(), 2);
    /// ```
    pub fn map<U, F>(&self, f: F) -> Consumer<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let (producer, consumer) = Producer::new();
        self.on_complete(move |outcome| producer.complete(outcome.map(f)));
        consumer
    }

    /// Like [`map`](Self::map) for a fallible transform: an `Err` from `f`
    /// becomes the failure of the returned consumer.
    pub fn try_map<U, E, F>(&self, f: F) -> Consumer<U>
    where
        U: Clone + Send + 'static,
        E: Into<Error>,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        let (producer, consumer) = Producer::new();
        self.on_complete(move |outcome| {
            producer.complete(outcome.and_then(|value| f(value).map_err(Into::into)))
        });
        consumer
    }

    /// Chains a dependent computation. On success `f` produces the next
    /// consumer and its outcome, success or failure, becomes the result. On
    /// failure `f` is skipped.
    pub fn flat_map<U, F>(&self, f: F) -> Consumer<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Consumer<U> + Send + 'static,
    {
        let (producer, consumer) = Producer::new();
        self.on_complete(move |outcome| match outcome {
            Ok(value) => producer.complete_with(&f(value)),
            Err(err) => producer.reject(err),
        });
        consumer
    }

    /// Downgrades the outcome to an `Option`: failures become `None`.
    pub fn ok(&self) -> Consumer<Option<T>> {
        let (producer, consumer) = Producer::new();
        self.on_complete(move |outcome| producer.resolve(outcome.ok()));
        consumer
    }

    /// Replaces a successful value with `value`.
    pub fn replace<U>(&self, value: U) -> Consumer<U>
    where
        U: Clone + Send + 'static,
    {
        self.map(move |_| value)
    }

    /// Replaces a successful value with the eventual outcome of `next`.
    pub fn replace_with<U>(&self, next: Consumer<U>) -> Consumer<U>
    where
        U: Clone + Send + 'static,
    {
        self.flat_map(move |_| next)
    }
}

impl<U> Consumer<Option<U>>
where
    U: Clone + Send + 'static,
{
    /// Unwraps `Some`, turning `None` into `err`. An upstream failure is
    /// also reported as `err`.
    pub fn unwrap_or_fail(&self, err: Error) -> Consumer<U> {
        let (producer, consumer) = Producer::new();
        self.on_complete(move |outcome| match outcome {
            Ok(Some(value)) => producer.resolve(value),
            Ok(None) | Err(_) => producer.reject(err),
        });
        consumer
    }
}

#[cfg(test)]
mod tests {
    use crate::{Consumer, Error, Producer, Promise};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn map_transforms_success() {
        let (op, op_a) = Producer::<u32>::new();
        let mapped = op_a.map(|n| n.to_string());
        assert!(!mapped.is_resolved());
        op.resolve(12);
        assert_eq!(mapped.wait().unwrap(), "12");
    }

    #[test]
    fn map_skips_transform_on_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mapped = Consumer::<u32>::failed(Error::msg("boom")).map(move |n| {
            counter.fetch_add(1, Ordering::SeqCst);
            n + 1
        });
        assert_eq!(mapped.wait().unwrap_err().to_string(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn try_map_captures_transform_error() {
        let parsed = Consumer::succeeded(String::from("not a number"))
            .try_map(|s| s.parse::<u32>().map_err(Error::custom));
        assert!(matches!(parsed.wait(), Err(Error::Custom(_))));

        let parsed = Consumer::succeeded(String::from("42"))
            .try_map(|s| s.parse::<u32>().map_err(Error::custom));
        assert_eq!(parsed.wait().unwrap(), 42);
    }

    #[test]
    fn flat_map_adopts_inner_outcome() {
        let (outer, outer_a) = Producer::<u32>::new();
        let (inner, inner_a) = Producer::<u32>::new();
        let chained = outer_a.flat_map(move |n| inner_a.map(move |m| n + m));
        outer.resolve(1);
        assert!(!chained.is_resolved());
        inner.resolve(2);
        assert_eq!(chained.wait().unwrap(), 3);
    }

    #[test]
    fn flat_map_forwards_inner_failure() {
        let chained = Consumer::succeeded(1u32)
            .flat_map(|_| Consumer::<u32>::failed(Error::msg("inner")));
        assert_eq!(chained.wait().unwrap_err().to_string(), "inner");
    }

    #[test]
    fn flat_map_short_circuits_on_failure() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let chained = Consumer::<u32>::failed(Error::msg("outer")).flat_map(move |n| {
            *counter.lock() += 1;
            Consumer::succeeded(n)
        });
        assert_eq!(chained.wait().unwrap_err().to_string(), "outer");
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn ok_swallows_failure() {
        assert_eq!(Consumer::succeeded(3).ok().wait().unwrap(), Some(3));
        assert_eq!(
            Consumer::<u8>::failed(Error::Cancelled).ok().wait().unwrap(),
            None
        );
    }

    #[test]
    fn replace_keeps_failure() {
        assert!(Consumer::succeeded(17).replace(true).wait().unwrap());
        let replaced = Consumer::<u8>::failed(Error::Cancelled).replace(true);
        assert!(matches!(replaced.wait(), Err(Error::Cancelled)));
    }

    #[test]
    fn replace_with_nested_consumer() {
        let a = Consumer::succeeded(1);
        let b = Consumer::succeeded(2);
        let flag = Consumer::succeeded(true);
        assert!(a.and(&b).replace_with(flag).wait().unwrap());
    }

    #[test]
    fn unwrap_or_fail_cases() {
        assert_eq!(
            Consumer::succeeded(Some(4)).unwrap_or_fail(Error::msg("missing")).wait().unwrap(),
            4
        );
        let none = Consumer::<Option<u8>>::succeeded(None).unwrap_or_fail(Error::msg("missing"));
        assert_eq!(none.wait().unwrap_err().to_string(), "missing");
        let failed =
            Consumer::<Option<u8>>::failed(Error::Cancelled).unwrap_or_fail(Error::msg("missing"));
        assert_eq!(failed.wait().unwrap_err().to_string(), "missing");
    }
}
