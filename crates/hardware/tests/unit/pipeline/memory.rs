//! Loads, stores and the store buffer seen through complete runs.

use cva6_core::common::OpClass;
use cva6_core::config::{Config, FuDescription, FuPoolConfig, TimingRule};
use cva6_core::sim::StopReason;
use cva6_core::soc::MemoryConfig;

use crate::common::builder::{ProgramBuilder, instant_fetch_memory, unit_latency_config};
use crate::common::harness::TestContext;

#[test]
fn test_load_reads_initial_memory() {
    let memory = MemoryConfig {
        init: vec![(0x300, 0x0123_4567_89AB_CDEFu64.to_le_bytes().to_vec())],
        ..instant_fetch_memory()
    };
    let program = ProgramBuilder::new().load(1, 0x300, 8).load(2, 0x304, 2).build();
    let mut ctx = TestContext::with_memory(unit_latency_config(), program, memory);
    let _ = ctx.run();

    let values: Vec<_> = ctx.committed().iter().map(|r| r.load_value).collect();
    assert_eq!(values, vec![Some(0x0123_4567_89AB_CDEF), Some(0x4567)]);
    assert_eq!(ctx.sim.stats().loads_sent, 2);
    assert_eq!(ctx.sim.stats().committed_mem_refs, vec![2]);
}

#[test]
fn test_loads_see_older_store() {
    let program = ProgramBuilder::new()
        .store(0x200, 8, 0x1122_3344_5566_7788)
        .load(1, 0x200, 8)
        .load(2, 0x204, 4)
        .build();
    let mut ctx = TestContext::with_memory(unit_latency_config(), program, instant_fetch_memory());
    let summary = ctx.run();
    assert_eq!(summary.stop, StopReason::AllHalted);

    let values: Vec<_> = ctx
        .committed()
        .iter()
        .filter_map(|r| r.load_value)
        .collect();
    assert_eq!(values, vec![0x1122_3344_5566_7788, 0x1122_3344]);
    let stats = ctx.sim.stats();
    assert_eq!(stats.loads_sent + stats.loads_forwarded, 2);
    assert_eq!(stats.stores_drained, 1);
    assert_eq!(stats.store_insts, 1);
    assert_eq!(stats.load_insts, 2);
}

#[test]
fn test_partial_overlap_waits_for_store_to_drain() {
    let program = ProgramBuilder::new()
        .store(0x400, 2, 0xBEEF)
        .load(1, 0x400, 8)
        .build();
    let memory = MemoryConfig {
        init: vec![(0x400, vec![0xFF; 8])],
        ..instant_fetch_memory()
    };
    let mut ctx = TestContext::with_memory(unit_latency_config(), program, memory);
    let _ = ctx.run();

    let load = ctx.committed()[1];
    assert_eq!(load.load_value, Some(0xFFFF_FFFF_FFFF_BEEF));
    assert!(ctx.sim.stats().forward_stalls > 0);
    assert_eq!(ctx.sim.stats().loads_forwarded, 0);
}

#[test]
fn test_stores_drain_before_halt() {
    let program = ProgramBuilder::new()
        .store(0x100, 8, 1)
        .store(0x108, 8, 2)
        .store(0x110, 8, 3)
        .build();
    let config = Config {
        execute_lsq_store_buffer_size: 1,
        ..unit_latency_config()
    };
    let mut ctx = TestContext::with_memory(config, program, instant_fetch_memory());
    let summary = ctx.run();
    assert_eq!(summary.stop, StopReason::AllHalted);
    assert_eq!(ctx.sim.stats().stores_drained, 3);
    assert!(ctx.sim.stats().store_buffer_full_stalls > 0);
    assert_eq!(ctx.committed_pcs(), vec![0, 4, 8]);
    assert!(ctx.sim.pipeline().execute().lsq().is_empty());
}

#[test]
fn test_unpredictable_load_holds_dependent_until_commit() {
    let program = ProgramBuilder::new().load(1, 0x100, 8).alu(2, &[1]).build();
    let mut ctx = TestContext::with_memory(unit_latency_config(), program, instant_fetch_memory());
    let _ = ctx.run();

    let committed = ctx.committed();
    let (load, dependent) = (committed[0], committed[1]);
    assert_eq!(load.op_class, OpClass::MemRead);
    assert!(dependent.issue_cycle >= load.commit_cycle);
}

#[test]
fn test_assumed_latency_lets_dependent_issue_before_load_commits() {
    let config = Config {
        execute_func_units: FuPoolConfig::new(vec![
            FuDescription::new("Int", &[OpClass::IntAlu], 1),
            FuDescription::new("Mem", &[OpClass::MemRead, OpClass::MemWrite], 1).with_timing(
                TimingRule {
                    extra_assumed_lat: 1,
                    ..TimingRule::new("Mem")
                },
            ),
        ]),
        ..Config::default()
    };
    let program = ProgramBuilder::new().load(1, 0x100, 8).alu(2, &[1]).build();
    let mut ctx = TestContext::with_memory(config, program, instant_fetch_memory());
    let _ = ctx.run();

    let committed = ctx.committed();
    let (load, dependent) = (committed[0], committed[1]);
    assert_eq!(dependent.issue_cycle, load.issue_cycle + 2);
    assert!(dependent.issue_cycle < load.commit_cycle);
}

#[test]
fn test_memory_issue_limit() {
    let program = ProgramBuilder::new()
        .load(1, 0x100, 8)
        .load(2, 0x108, 8)
        .build();
    let mut ctx = TestContext::with_memory(unit_latency_config(), program, instant_fetch_memory());
    let _ = ctx.run();

    let committed = ctx.committed();
    assert_eq!(committed[1].issue_cycle, committed[0].issue_cycle + 1);
    assert!(ctx.sim.stats().mem_issue_stalls >= 1);
}
