//! Multi-threaded fetch and thread control.

use cva6_core::config::{Config, ThreadPolicy};
use cva6_core::core::pipeline::frontend::FetchStatus;
use cva6_core::sim::StopReason;
use cva6_core::soc::Program;

use crate::common::builder::{ProgramBuilder, instant_fetch_memory, unit_latency_config};
use crate::common::harness::{MAX_CYCLES, TestContext};

fn two_thread_config(policy: ThreadPolicy) -> Config {
    Config {
        num_threads: 2,
        thread_policy: policy,
        fetch1_line_snap_width: 8,
        fetch1_line_width: 8,
        ..unit_latency_config()
    }
}

fn two_threads(n: usize) -> Program {
    Program {
        threads: vec![
            ProgramBuilder::at(0).alus(n).thread(),
            ProgramBuilder::at(0x1000).alus(n).thread(),
        ],
    }
}

#[test]
fn test_round_robin_interleaves_lines() {
    let mut ctx = TestContext::with_memory(
        two_thread_config(ThreadPolicy::RoundRobin),
        two_threads(4),
        instant_fetch_memory(),
    );
    let summary = ctx.run();
    assert_eq!(summary.stop, StopReason::AllHalted);

    let threads: Vec<_> = ctx.committed().iter().map(|r| r.id.thread).collect();
    assert_eq!(threads, vec![0, 0, 1, 1, 0, 0, 1, 1]);
    assert_eq!(ctx.sim.stats().committed_insts, vec![4, 4]);
    assert_eq!(ctx.sim.stats().faults, 2);
}

#[test]
fn test_random_policy_finishes_every_thread() {
    let mut ctx = TestContext::with_memory(
        two_thread_config(ThreadPolicy::Random),
        two_threads(6),
        instant_fetch_memory(),
    );
    let summary = ctx.run();
    assert_eq!(summary.stop, StopReason::AllHalted);
    assert_eq!(ctx.sim.stats().committed_insts, vec![6, 6]);

    for thread in 0..2 {
        let pcs: Vec<u64> = ctx
            .committed()
            .iter()
            .filter(|r| r.id.thread == thread)
            .map(|r| r.pc)
            .collect();
        let base = if thread == 0 { 0 } else { 0x1000 };
        let expected: Vec<u64> = (0..6).map(|i| base + 4 * i).collect();
        assert_eq!(pcs, expected);
    }
}

#[test]
fn test_suspended_thread_quiesces_until_reactivated() {
    let mut ctx = TestContext::with_memory(
        unit_latency_config(),
        ProgramBuilder::new().alus(5).build(),
        instant_fetch_memory(),
    );
    ctx.sim.pipeline_mut().suspend_thread(0);
    assert_eq!(ctx.sim.pipeline().thread_status(0), Some(FetchStatus::Suspended));

    let summary = ctx.sim.run(MAX_CYCLES).unwrap();
    assert_eq!(summary.stop, StopReason::Quiesced);
    assert_eq!(summary.committed, 0);

    ctx.sim.pipeline_mut().activate_thread(0, 0);
    let summary = ctx.run();
    assert_eq!(summary.stop, StopReason::AllHalted);
    assert_eq!(summary.committed, 5);
    assert_eq!(ctx.sim.pipeline().thread_status(0), Some(FetchStatus::Halted));
}

#[test]
fn test_drain_stops_fetch_and_resume_restarts_it() {
    let config = Config {
        fetch1_line_snap_width: 8,
        fetch1_line_width: 8,
        ..unit_latency_config()
    };
    let mut ctx = TestContext::with_memory(
        config,
        ProgramBuilder::new().alus(32).build(),
        instant_fetch_memory(),
    );
    let _ = ctx.sim.run(2).unwrap();
    assert!(!ctx.sim.pipeline_mut().drain());

    let summary = ctx.sim.run(MAX_CYCLES).unwrap();
    assert_eq!(summary.stop, StopReason::Quiesced);
    assert!(ctx.sim.pipeline().is_drained());
    assert!(summary.committed < 32);

    ctx.sim.pipeline_mut().drain_resume();
    let summary = ctx.run();
    assert_eq!(summary.stop, StopReason::AllHalted);
    assert_eq!(summary.committed, 32);

    let pcs = ctx.committed_pcs();
    let expected: Vec<u64> = (0..32).map(|i| 4 * i).collect();
    assert_eq!(pcs, expected);
}

#[test]
fn test_activation_bumps_generation() {
    let mut ctx = TestContext::new(unit_latency_config(), ProgramBuilder::new().alus(1).build());
    let before = ctx.sim.pipeline().generation(0).unwrap();
    ctx.sim.pipeline_mut().activate_thread(0, 0);
    assert_eq!(ctx.sim.pipeline().generation(0), Some(before + 1));
    assert_eq!(ctx.sim.pipeline().generation(5), None);
}

#[test]
fn test_take_commits_hands_over_the_log() {
    let mut ctx = TestContext::with_memory(
        unit_latency_config(),
        ProgramBuilder::new().alus(3).build(),
        instant_fetch_memory(),
    );
    let _ = ctx.run();
    let first = ctx.sim.pipeline_mut().take_commits();
    let pcs: Vec<u64> = first.iter().map(|r| r.pc).collect();
    assert_eq!(pcs, vec![0, 4, 8, 12]);
    assert!(first.last().is_some_and(|r| r.fault.is_some()));
    assert!(ctx.sim.commit_log().is_empty());

    ctx.sim.pipeline_mut().activate_thread(0, 4);
    let summary = ctx.run();
    assert_eq!(summary.stop, StopReason::AllHalted);
    assert_eq!(summary.committed, 5);
    assert_eq!(ctx.committed_pcs(), vec![4, 8]);
}

#[test]
fn test_wakeup_makes_a_halted_pipeline_evaluate_once() {
    let mut ctx = TestContext::with_memory(
        unit_latency_config(),
        ProgramBuilder::new().alus(2).build(),
        instant_fetch_memory(),
    );
    assert_eq!(ctx.run().stop, StopReason::AllHalted);
    assert!(!ctx.sim.tick());

    ctx.sim.pipeline_mut().wakeup_on_event();
    assert!(ctx.sim.tick());
    assert!(!ctx.sim.tick());
    assert!(ctx.sim.pipeline().is_drained());
}
