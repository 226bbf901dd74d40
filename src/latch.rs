//! A count-down latch: threads block in [`Latch::wait`] until `count_down`
//! has been called the configured number of times.
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Latch {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl Latch {
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                count: Mutex::new(count),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Decrements the count, releasing every waiter when it reaches zero.
    /// Extra calls after zero are ignored.
    pub fn count_down(&self) {
        let mut count = self.inner.count.lock();
        if *count == 0 {
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.inner.condvar.notify_all();
        }
    }

    pub fn count(&self) -> usize {
        *self.inner.count.lock()
    }

    pub fn wait(&self) {
        let mut count = self.inner.count.lock();
        while *count > 0 {
            self.inner.condvar.wait(&mut count);
        }
    }

    /// Returns `false` if the timeout elapsed before the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.inner.count.lock();
        while *count > 0 {
            if self
                .inner
                .condvar
                .wait_until(&mut count, deadline)
                .timed_out()
            {
                return *count == 0;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::Latch;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn releases_after_all_counts() {
        let latch = Latch::new(3);
        let workers: Vec<_> = (0..3)
            .map(|_| {
                let latch = latch.clone();
                thread::spawn(move || latch.count_down())
            })
            .collect();
        latch.wait();
        assert_eq!(latch.count(), 0);
        for worker in workers {
            worker.join().expect("The worker thread has panicked");
        }
    }

    #[test]
    fn zero_count_never_blocks() {
        let latch = Latch::new(0);
        latch.wait();
        latch.count_down();
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn wait_timeout_reports_expiry() {
        let latch = Latch::new(1);
        assert!(!latch.wait_timeout(Duration::from_millis(10)));
        latch.count_down();
        assert!(latch.wait_timeout(Duration::from_millis(10)));
    }
}
