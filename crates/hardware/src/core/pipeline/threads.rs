//! Thread arbitration for Fetch1.
//!
//! Fetch1 grants at most one thread per cycle. The arbiter turns the configured
//! [`ThreadPolicy`] into a priority order over thread ids and grants the first eligible one:
//! - **SingleThreaded:** Thread 0 only.
//! - **RoundRobin:** `(last + i) % n` for `i = 1..=n`, where `last` is the previously granted
//!   thread. The cursor moves only when a grant happens.
//! - **Random:** A fresh Fisher-Yates shuffle per grant, driven by a seeded xorshift generator.

use crate::common::ThreadId;
use crate::config::ThreadPolicy;

/// Seed used when none is given.
pub const DEFAULT_SEED: u64 = 123_456_789;

/// Marsaglia xorshift64 generator.
#[derive(Debug, Clone)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// A generator from `seed`. A zero seed is replaced with [`DEFAULT_SEED`].
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { DEFAULT_SEED } else { seed },
        }
    }

    /// Next value.
    pub const fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Value in `0..bound` (`bound` must be non-zero).
    pub const fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

/// Fetch1 thread arbiter.
#[derive(Debug, Clone)]
pub struct ThreadArbiter {
    policy: ThreadPolicy,
    num_threads: usize,
    last_granted: ThreadId,
    rng: XorShift64,
}

impl ThreadArbiter {
    /// An arbiter over `num_threads` threads. Thread 0 has first priority.
    pub fn new(policy: ThreadPolicy, num_threads: usize) -> Self {
        Self::with_seed(policy, num_threads, DEFAULT_SEED)
    }

    /// Like [`ThreadArbiter::new`] with an explicit generator seed.
    pub fn with_seed(policy: ThreadPolicy, num_threads: usize, seed: u64) -> Self {
        let n = num_threads.max(1);
        Self {
            policy,
            num_threads: n,
            last_granted: n - 1,
            rng: XorShift64::new(seed),
        }
    }

    /// Configured policy.
    pub const fn policy(&self) -> ThreadPolicy {
        self.policy
    }

    /// The priority order for the next grant, highest first.
    ///
    /// For the Random policy this advances the generator.
    pub fn priority_list(&mut self) -> Vec<ThreadId> {
        let n = self.num_threads;
        match self.policy {
            ThreadPolicy::SingleThreaded => vec![0],
            ThreadPolicy::RoundRobin => (1..=n).map(|i| (self.last_granted + i) % n).collect(),
            ThreadPolicy::Random => {
                let mut order: Vec<ThreadId> = (0..n).collect();
                for i in (1..n).rev() {
                    let j = self.rng.below(i + 1);
                    order.swap(i, j);
                }
                order
            }
        }
    }

    /// Grants the highest-priority thread for which `eligible` holds.
    pub fn grant<F>(&mut self, eligible: F) -> Option<ThreadId>
    where
        F: Fn(ThreadId) -> bool,
    {
        let chosen = self.priority_list().into_iter().find(|&tid| eligible(tid))?;
        self.last_granted = chosen;
        Some(chosen)
    }
}
