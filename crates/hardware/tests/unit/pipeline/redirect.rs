//! Mispredictions, traps and stream changes.

use cva6_core::common::Fault;
use cva6_core::config::{BranchPredictorKind, Config};
use cva6_core::sim::StopReason;
use cva6_core::soc::MemoryConfig;

use crate::common::builder::{ProgramBuilder, instant_fetch_memory, unit_latency_config};
use crate::common::harness::TestContext;
use crate::common::mocks::{MockPredictor, RecordingTraps, TrapEvent};

fn taken_branch_program() -> cva6_core::soc::Program {
    ProgramBuilder::new()
        .branch(true, 0x40)
        .pad_to(0x40)
        .alus(2)
        .build()
}

#[test]
fn test_mispredicted_branch_squashes_wrong_path() {
    let mut ctx = TestContext::with_memory(unit_latency_config(), taken_branch_program(), instant_fetch_memory());
    let summary = ctx.run();
    assert_eq!(summary.stop, StopReason::AllHalted);

    assert_eq!(ctx.committed_pcs(), vec![0, 0x40, 0x44]);
    let stats = ctx.sim.stats();
    assert_eq!(stats.mispredictions, 1);
    assert!(stats.insts_discarded + stats.lines_discarded > 0);
    assert!(ctx.committed()[0].mispredicted);
    assert!(!ctx.committed()[1].mispredicted);
}

#[test]
fn test_not_taken_branch_falls_through() {
    let program = ProgramBuilder::new().branch(false, 0x40).alus(1).build();
    let mut ctx = TestContext::with_memory(unit_latency_config(), program, instant_fetch_memory());
    let _ = ctx.run();
    assert_eq!(ctx.committed_pcs(), vec![0, 4]);
    assert_eq!(ctx.sim.stats().mispredictions, 0);
}

#[test]
fn test_btb_learns_loop_branch() {
    let config = Config {
        branch_predictor: BranchPredictorKind::Btb,
        ..unit_latency_config()
    };
    let program = ProgramBuilder::new().alus(1).branch(true, 0).build();
    let mut ctx = TestContext::with_memory(config, program, instant_fetch_memory());

    let summary = ctx.sim.run(200).unwrap();
    assert_eq!(summary.stop, StopReason::MaxCycles);
    assert_eq!(ctx.sim.stats().mispredictions, 1);
    assert!(summary.committed > 20);
    assert!(ctx.committed_pcs().iter().all(|&pc| pc == 0 || pc == 4));
}

#[test]
fn test_predictor_trained_once_per_resolved_branch() {
    let mut predictor = MockPredictor::new();
    let _ = predictor.expect_predict().returning(|_, _| None);
    let _ = predictor
        .expect_resolve()
        .withf(|&thread, &pc, outcome, &mispredicted| {
            thread == 0 && pc == 0 && outcome.taken && outcome.target == 0x40 && mispredicted
        })
        .times(1)
        .return_const(());

    let traps = RecordingTraps::new(0, 1);
    let mut ctx = TestContext::with_components(
        unit_latency_config(),
        taken_branch_program(),
        instant_fetch_memory(),
        Box::new(predictor),
        Box::new(traps),
    );
    let _ = ctx.run();
    assert_eq!(ctx.committed_pcs(), vec![0, 0x40, 0x44]);
}

#[test]
fn test_load_fault_traps_to_vector_then_halts() {
    let memory = MemoryConfig {
        fault_ranges: vec![(0x8000, 0x9000)],
        ..instant_fetch_memory()
    };
    let program = ProgramBuilder::new()
        .load(3, 0x8000, 8)
        .pad_to(0x100)
        .alus(2)
        .build();
    let traps = RecordingTraps::new(0x100, 2);
    let predictor = cva6_core::core::units::bru::BranchPredictorWrapper::new(&unit_latency_config());
    let mut ctx = TestContext::with_components(
        unit_latency_config(),
        program,
        memory,
        Box::new(predictor),
        Box::new(traps.clone()),
    );
    let summary = ctx.run();
    assert_eq!(summary.stop, StopReason::AllHalted);

    assert_eq!(
        traps.events(),
        vec![
            TrapEvent {
                thread: 0,
                pc: 0,
                fault: Fault::LoadAccess { addr: 0x8000 },
            },
            TrapEvent {
                thread: 0,
                pc: 0x108,
                fault: Fault::NoInstruction { pc: 0x108 },
            },
        ]
    );
    assert_eq!(ctx.sim.stats().faults, 2);
    assert_eq!(ctx.committed_pcs(), vec![0x100, 0x104]);
    assert_eq!(ctx.sim.stats().committed_mem_refs, vec![0]);
}

#[test]
fn test_fetch_fault_blocks_thread_until_handled() {
    let memory = MemoryConfig {
        fault_ranges: vec![(0x8000, 0x9000)],
        ..instant_fetch_memory()
    };
    let program = ProgramBuilder::at(0x8000).alus(4).build();
    let traps = RecordingTraps::new(0, 1);
    let predictor = cva6_core::core::units::bru::BranchPredictorWrapper::new(&unit_latency_config());
    let mut ctx = TestContext::with_components(
        unit_latency_config(),
        program,
        memory,
        Box::new(predictor),
        Box::new(traps.clone()),
    );
    let summary = ctx.run();
    assert_eq!(summary.stop, StopReason::AllHalted);
    assert_eq!(summary.committed, 0);
    assert_eq!(
        traps.events(),
        vec![TrapEvent {
            thread: 0,
            pc: 0x8000,
            fault: Fault::FetchAccess { addr: 0x8000 },
        }]
    );
}
