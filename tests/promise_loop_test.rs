#[cfg(test)]
mod tests {
    use promise_loop::{
        join_all, Consumer, Error, EventLoop, Executor, ExecutorExt, Producer, Promise,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::{thread, time::Duration};
    use tracing_subscriber::EnvFilter;

    fn init_test(name: &str) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        tracing::info!(test = name, "starting");
    }

    #[test]
    fn test_promise_out() {
        init_test("test_promise_out");
        let (promise, consumer) = Producer::<i32>::new();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            promise.resolve(42);
        });

        assert_eq!(consumer.wait().unwrap(), 42);
    }

    #[test]
    fn transforms() {
        init_test("transforms");
        let event_loop = EventLoop::new().unwrap();
        let future = event_loop.succeeded(17);
        assert!(future.replace(true).wait().unwrap());

        let future_a = event_loop.succeeded(3);
        let future_b = event_loop.succeeded(4);
        assert!(future_a.and(&future_b).replace(true).wait().unwrap());

        let future_bool = event_loop.succeeded(true);
        assert!(future.replace_with(future_bool.clone()).wait().unwrap());
        assert!(future_a.and(&future_b).replace_with(future_bool).wait().unwrap());
    }

    #[test]
    fn wrapped_value_notifies_from_the_loop() {
        init_test("wrapped_value_notifies_from_the_loop");
        let event_loop = EventLoop::new().unwrap();
        // Hold the loop so the wrapped value is still pending when observed.
        let (gate, gate_a) = Producer::<()>::new();
        let handle = event_loop.handle();
        event_loop.run_soon(Box::new(move || gate_a.wait().unwrap()));
        let value = event_loop.succeeded(2);
        let on_loop = value.map(move |_| handle.in_event_loop());
        gate.resolve(());
        assert!(on_loop.wait().unwrap());
    }

    #[test]
    fn chain_across_the_event_loop() {
        init_test("chain_across_the_event_loop");
        let event_loop = Arc::new(EventLoop::new().unwrap());
        let executor = event_loop.clone();
        let total = event_loop
            .submit(|| 20)
            .flat_map(move |n| executor.submit(move || n + 1))
            .map(|n| n * 2)
            .try_map(|n| if n == 42 { Ok(n) } else { Err(Error::msg("wrong")) });
        assert_eq!(total.wait().unwrap(), 42);
    }

    #[test]
    fn join_resolved_from_many_threads() {
        init_test("join_resolved_from_many_threads");
        let (producers, consumers): (Vec<_>, Vec<_>) =
            (0..8).map(|_| Producer::<usize>::new()).unzip();
        let all = join_all(consumers);
        let workers: Vec<_> = producers
            .into_iter()
            .enumerate()
            .rev()
            .map(|(index, producer)| {
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5 * (8 - index as u64)));
                    producer.resolve(index * 10);
                })
            })
            .collect();
        assert_eq!(all.wait().unwrap(), (0..8).map(|i| i * 10).collect::<Vec<_>>());
        for worker in workers {
            worker.join().expect("The worker thread has panicked");
        }
    }

    #[test]
    fn timeout_on_the_event_loop() {
        init_test("timeout_on_the_event_loop");
        let event_loop = EventLoop::new().unwrap();
        let (_never, never_a) = Producer::<u8>::new();
        let bounded = never_a.timeout(&event_loop, Duration::from_millis(20));
        assert!(matches!(bounded.wait(), Err(Error::TimedOut(_))));

        let quick = event_loop.submit(|| 1u8).timeout(&event_loop, Duration::from_secs(5));
        assert_eq!(quick.wait().unwrap(), 1);
    }

    #[test]
    fn cancelled_timer_on_the_event_loop() {
        init_test("cancelled_timer_on_the_event_loop");
        let event_loop = EventLoop::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let task = event_loop.schedule(Duration::from_millis(30), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(task.cancel());
        thread::sleep(Duration::from_millis(60));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(task.result().wait(), Err(Error::Cancelled)));
    }

    #[test]
    fn await_inside_async_block() {
        init_test("await_inside_async_block");
        let event_loop = EventLoop::new().unwrap();
        let doubled = event_loop.submit(|| 21).map(|n| n * 2);
        let failed = Consumer::<u8>::failed(Error::msg("nope"));
        let (value, err) = futures::executor::block_on(async { (doubled.await, failed.await) });
        assert_eq!(value.unwrap(), 42);
        assert_eq!(err.unwrap_err().to_string(), "nope");
    }
}
