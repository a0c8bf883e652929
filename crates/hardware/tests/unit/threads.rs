//! # Thread Arbitration Tests
//!
//! Property tests for the Fetch1 arbiter across policies and eligibility patterns.

use cva6_core::config::ThreadPolicy;
use cva6_core::core::pipeline::threads::ThreadArbiter;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_grant_is_eligible(
        threads in 1usize..8,
        masks in prop::collection::vec(any::<u8>(), 1..64),
        random in any::<bool>(),
    ) {
        let policy = if random { ThreadPolicy::Random } else { ThreadPolicy::RoundRobin };
        let mut arbiter = ThreadArbiter::new(policy, threads);
        for mask in masks {
            let eligible = |t: usize| mask & (1 << t) != 0;
            let granted = arbiter.grant(eligible);
            let any = (0..threads).any(eligible);
            prop_assert_eq!(granted.is_some(), any);
            if let Some(t) = granted {
                prop_assert!(t < threads);
                prop_assert!(eligible(t));
            }
        }
    }

    #[test]
    fn prop_round_robin_is_fair(threads in 1usize..8, rounds in 1usize..16) {
        let mut arbiter = ThreadArbiter::new(ThreadPolicy::RoundRobin, threads);
        let mut counts = vec![0usize; threads];
        for _ in 0..threads * rounds {
            let t = arbiter.grant(|_| true).unwrap();
            counts[t] += 1;
        }
        prop_assert!(counts.iter().all(|&c| c == rounds));
    }

    #[test]
    fn prop_random_order_is_permutation(threads in 1usize..8, seed in any::<u64>()) {
        let mut arbiter = ThreadArbiter::with_seed(ThreadPolicy::Random, threads, seed);
        for _ in 0..8 {
            let mut order = arbiter.priority_list();
            order.sort_unstable();
            prop_assert_eq!(order, (0..threads).collect::<Vec<_>>());
        }
    }
}

#[test]
fn test_round_robin_sequence_with_gaps() {
    let mut arbiter = ThreadArbiter::new(ThreadPolicy::RoundRobin, 3);
    let only_even = |t: usize| t != 1;
    let grants: Vec<_> = (0..4).filter_map(|_| arbiter.grant(only_even)).collect();
    assert_eq!(grants, vec![0, 2, 0, 2]);
    assert_eq!(arbiter.grant(|_| true), Some(0));
    assert_eq!(arbiter.grant(|_| true), Some(1));
}

#[test]
fn test_single_threaded_ignores_other_threads() {
    let mut arbiter = ThreadArbiter::new(ThreadPolicy::SingleThreaded, 1);
    assert_eq!(arbiter.grant(|_| true), Some(0));
    assert_eq!(arbiter.grant(|t| t != 0), None);
}
