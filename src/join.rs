//! Joining several consumers into one.
use crate::{Consumer, Error, Producer, Promise};
use parking_lot::Mutex;
use std::sync::Arc;

struct Aggregation<T>
where
    T: Clone + Send + 'static,
{
    slots: Vec<Option<T>>,
    completed: usize,
    failed: bool,
    producer: Option<Producer<Vec<T>>>,
}

/// Joins `consumers` into one consumer of all their values, in input order.
///
/// The first failure wins: it resolves the result immediately and every
/// outcome that arrives afterwards is ignored. An empty input resolves
/// immediately with an empty `Vec`.
///
/// # Examples
///
/// ```
/// use promise_loop::{join_all, Promise, Producer};
/// let (a, a_out) = Producer::<u32>::new();
/// let (b, b_out) = Producer::<u32>::new();
/// let all = join_all(vec![a_out, b_out]);
/// b.resolve(2);
/// a.resolve(1);
/// assert_eq!(all.wait().unwrap(), vec![1, 2]);
/// ```
pub fn join_all<T, I>(consumers: I) -> Consumer<Vec<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Consumer<T>>,
{
    let consumers: Vec<Consumer<T>> = consumers.into_iter().collect();
    let total = consumers.len();
    if total == 0 {
        return Consumer::succeeded(Vec::new());
    }
    let (producer, output) = Producer::new();
    let state = Arc::new(Mutex::new(Aggregation {
        slots: vec![None; total],
        completed: 0,
        failed: false,
        producer: Some(producer),
    }));
    for (index, consumer) in consumers.iter().enumerate() {
        let state = state.clone();
        consumer.on_complete(move |outcome| {
            let resolution = {
                let mut state = state.lock();
                if state.failed {
                    return;
                }
                match outcome {
                    Ok(value) => {
                        state.slots[index] = Some(value);
                        state.completed += 1;
                        if state.completed < total {
                            return;
                        }
                        let values: Vec<T> = state.slots.iter_mut().filter_map(Option::take).collect();
                        state.producer.take().map(|p| (p, Ok(values)))
                    }
                    Err(err) => {
                        state.failed = true;
                        state.producer.take().map(|p| (p, Err(err)))
                    }
                }
            };
            if let Some((producer, outcome)) = resolution {
                tracing::trace!(total, ok = outcome.is_ok(), "join resolved");
                producer.complete(outcome);
            }
        });
    }
    output
}

/// Joins `consumers` into the ordered list of their individual outcomes.
/// Never fails; resolves once every input has resolved.
pub fn join_all_settled<T, I>(consumers: I) -> Consumer<Vec<Result<T, Error>>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Consumer<T>>,
{
    let settled: Vec<Consumer<Result<T, Error>>> = consumers
        .into_iter()
        .map(|consumer| {
            let (producer, settled) = Producer::new();
            consumer.on_complete(move |outcome| producer.resolve(outcome));
            settled
        })
        .collect();
    join_all(settled)
}

struct Zip<T, U>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
{
    left: Option<T>,
    right: Option<U>,
    producer: Option<Producer<(T, U)>>,
}

impl<T, U> Zip<T, U>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
{
    fn ready(&mut self) -> Option<(Producer<(T, U)>, Result<(T, U), Error>)> {
        if self.left.is_none() || self.right.is_none() {
            return None;
        }
        let producer = self.producer.take()?;
        let pair = (self.left.take()?, self.right.take()?);
        Some((producer, Ok(pair)))
    }

    fn fail(&mut self, err: Error) -> Option<(Producer<(T, U)>, Result<(T, U), Error>)> {
        self.producer.take().map(|p| (p, Err(err)))
    }
}

impl<T> Consumer<T>
where
    T: Clone + Send + 'static,
{
    /// Pairs this value with `other`. Fails as soon as either side fails.
    pub fn and<U>(&self, other: &Consumer<U>) -> Consumer<(T, U)>
    where
        U: Clone + Send + 'static,
    {
        let (producer, output) = Producer::new();
        let state = Arc::new(Mutex::new(Zip {
            left: None,
            right: None,
            producer: Some(producer),
        }));

        let left = state.clone();
        self.on_complete(move |outcome| {
            let resolution = {
                let mut state = left.lock();
                match outcome {
                    Ok(value) if state.producer.is_some() => {
                        state.left = Some(value);
                        state.ready()
                    }
                    Ok(_) => None,
                    Err(err) => state.fail(err),
                }
            };
            if let Some((producer, outcome)) = resolution {
                producer.complete(outcome);
            }
        });

        other.on_complete(move |outcome| {
            let resolution = {
                let mut state = state.lock();
                match outcome {
                    Ok(value) if state.producer.is_some() => {
                        state.right = Some(value);
                        state.ready()
                    }
                    Ok(_) => None,
                    Err(err) => state.fail(err),
                }
            };
            if let Some((producer, outcome)) = resolution {
                producer.complete(outcome);
            }
        });
        output
    }
}
