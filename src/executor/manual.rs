//! An execution context driven entirely by its caller, on a virtual clock.
//! Nothing runs until [`ManualExecutor::run_until_idle`] or
//! [`ManualExecutor::advance`] is called, which makes ordering deterministic.
use super::{Executor, Job};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

#[derive(Default)]
pub struct ManualExecutor {
    state: Mutex<ManualState>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    sequence: u64,
    ready: VecDeque<Job>,
    timers: BTreeMap<(Duration, u64), Job>,
}

impl std::fmt::Debug for ManualExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualExecutor")
            .field("now", &state.now)
            .field("ready", &state.ready.len())
            .field("timers", &state.timers.len())
            .finish()
    }
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    pub fn pending(&self) -> usize {
        let state = self.state.lock();
        state.ready.len() + state.timers.len()
    }

    /// Runs queued jobs, including any they queue, until none are left.
    /// Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = self.state.lock().ready.pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Moves the virtual clock forward by `by`, firing due timers in deadline
    /// order and draining the immediate queue after each one.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        let mut ran = self.run_until_idle();
        loop {
            let due = {
                let mut state = self.state.lock();
                let next = state.timers.keys().next().map(|&(deadline, _)| deadline);
                match next {
                    Some(deadline) if deadline <= target => {
                        state.now = state.now.max(deadline);
                        state.timers.pop_first().map(|(_, job)| job)
                    }
                    _ => {
                        state.now = target;
                        None
                    }
                }
            };
            match due {
                Some(job) => {
                    job();
                    ran += 1 + self.run_until_idle();
                }
                None => return ran,
            }
        }
    }
}

impl Executor for ManualExecutor {
    fn run_soon(&self, job: Job) {
        self.state.lock().ready.push_back(job);
    }

    fn run_after(&self, delay: Duration, job: Job) {
        let mut state = self.state.lock();
        state.sequence += 1;
        let key = (state.now.saturating_add(delay), state.sequence);
        state.timers.insert(key, job);
    }
}
