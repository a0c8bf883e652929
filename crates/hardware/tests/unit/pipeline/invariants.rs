//! Randomized workloads and configurations.
//!
//! Every generated workload must halt, commit exactly the instructions a sequential machine
//! would execute (forward branches skip instructions when taken), stay within the per-cycle
//! commit limits and buffer capacities, return the same load values, and produce the same run
//! with idling on and off.

use std::collections::HashMap;

use cva6_core::Simulator;
use cva6_core::config::{BranchPredictorKind, Config, ThreadPolicy};
use cva6_core::core::inst::StaticInst;
use cva6_core::core::pipeline::latches::CommitRecord;
use cva6_core::sim::{RunSummary, StopReason};
use cva6_core::soc::{FlatMemory, MemoryConfig, Program};
use proptest::prelude::*;

use crate::common::builder::{ProgramBuilder, unit_latency_pool};
use crate::common::harness::MAX_CYCLES;

#[derive(Clone, Debug)]
enum Op {
    Alu { dest: u16, src: Option<u16> },
    Load { dest: u16, slot: u64, size: u8, lane: u64 },
    Store { slot: u64, size: u8, lane: u64, data: u64 },
    Branch { taken: bool, skip: u64 },
}

fn size_strategy() -> impl Strategy<Value = u8> {
    prop_oneof![Just(1u8), Just(2), Just(4), Just(8)]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u16..8, prop::option::of(1u16..8)).prop_map(|(dest, src)| Op::Alu { dest, src }),
        2 => (1u16..8, 0u64..4, size_strategy(), 0u64..8)
            .prop_map(|(dest, slot, size, lane)| Op::Load { dest, slot, size, lane }),
        2 => (0u64..4, size_strategy(), 0u64..8, any::<u64>())
            .prop_map(|(slot, size, lane, data)| Op::Store { slot, size, lane, data }),
        1 => (any::<bool>(), 0u64..3).prop_map(|(taken, skip)| Op::Branch { taken, skip }),
    ]
}

/// Naturally aligned address inside `slot`, reached by rounding `lane` down to the access size.
fn address(thread: usize, slot: u64, size: u8, lane: u64) -> u64 {
    let size = u64::from(size);
    0x4000 + thread as u64 * 0x100 + slot * 8 + (lane % 8) / size * size
}

fn mask(size: u8) -> u64 {
    if size == 8 { u64::MAX } else { (1u64 << (u32::from(size) * 8)) - 1 }
}

fn base(thread: usize) -> u64 {
    thread as u64 * 0x2000
}

fn thread_program(thread: usize, ops: &[Op]) -> ProgramBuilder {
    ops.iter()
        .fold(ProgramBuilder::at(base(thread)), |b, op| match *op {
            Op::Alu { dest, src } => b.alu(dest, src.as_slice()),
            Op::Load { dest, slot, size, lane } => b.load(dest, address(thread, slot, size, lane), size),
            Op::Store { slot, size, lane, data } => {
                b.inst(StaticInst::store(address(thread, slot, size, lane), size, data & mask(size)))
            }
            Op::Branch { taken, skip } => {
                let target = b.pc() + 4 * (1 + skip);
                b.branch(taken, target)
            }
        })
}

/// What a machine executing `ops` one at a time produces.
#[derive(Debug, Default)]
struct Reference {
    /// Addresses of the executed instructions, in order.
    pcs: Vec<u64>,
    /// Values returned to the executed loads.
    loads: Vec<u64>,
    /// Address the thread runs off the end of its workload at.
    end_pc: u64,
}

fn reference(thread: usize, ops: &[Op]) -> Reference {
    let mut bytes: HashMap<u64, u8> = HashMap::new();
    let mut out = Reference::default();
    let mut index = 0usize;
    while let Some(op) = ops.get(index) {
        out.pcs.push(base(thread) + 4 * index as u64);
        index += 1;
        match *op {
            Op::Store { slot, size, lane, data } => {
                let addr = address(thread, slot, size, lane);
                for (i, byte) in data.to_le_bytes().iter().take(usize::from(size)).enumerate() {
                    let _ = bytes.insert(addr + i as u64, *byte);
                }
            }
            Op::Load { slot, size, lane, .. } => {
                let addr = address(thread, slot, size, lane);
                let value = (0..u64::from(size)).fold(0u64, |acc, i| {
                    acc | (u64::from(bytes.get(&(addr + i)).copied().unwrap_or(0)) << (i * 8))
                });
                out.loads.push(value);
            }
            Op::Branch { taken: true, skip } => index += skip as usize,
            Op::Alu { .. } | Op::Branch { taken: false, .. } => {}
        }
    }
    out.end_pc = base(thread) + 4 * index as u64;
    out
}

fn config_strategy() -> impl Strategy<Value = Config> {
    let frontend = (1u64..3, 1u64..3, 1u64..3, 1usize..4, 1usize..4, 1usize..5, any::<bool>());
    let execute = (1usize..4, 1usize..4, 1usize..3, 1usize..4, 1usize..3, 2usize..8, any::<bool>());
    let lsq = (1usize..3, 1usize..4, 1usize..4, 1usize..3, 1usize..3);
    let shape = (
        prop_oneof![Just(8u64), Just(16), Just(64)],
        any::<bool>(),
        any::<bool>(),
        1usize..3,
        0u64..3,
        1u64..3,
        any::<bool>(),
    );
    (frontend, execute, lsq, shape).prop_map(
        |(
            (f1f2, f2d, de, fetch_limit, f2_buffer, decode_width, cycle_input),
            (exec_width, issue, mem_issue, commit, mem_commit, exec_buffer, early_mem),
            (requests, transfers, store_buffer, stores_per_cycle, max_accesses),
            (line, unit_pool, random_policy, threads, backward, branch_delay, btb),
        )| Config {
            num_threads: threads,
            thread_policy: if random_policy { ThreadPolicy::Random } else { ThreadPolicy::RoundRobin },
            fetch1_fetch_limit: fetch_limit,
            fetch1_line_snap_width: line,
            fetch1_line_width: line,
            fetch1_to_fetch2_forward_delay: f1f2,
            fetch1_to_fetch2_backward_delay: backward,
            fetch2_input_buffer_size: f2_buffer,
            fetch2_to_decode_forward_delay: f2d,
            fetch2_cycle_input: cycle_input,
            decode_input_buffer_size: f2_buffer + 1,
            decode_to_execute_forward_delay: de,
            decode_input_width: decode_width,
            decode_cycle_input: !cycle_input,
            execute_input_width: exec_width,
            execute_issue_limit: issue,
            execute_memory_issue_limit: mem_issue,
            execute_commit_limit: commit,
            execute_memory_commit_limit: mem_commit,
            execute_input_buffer_size: exec_buffer,
            execute_allow_early_memory_issue: early_mem,
            execute_branch_delay: branch_delay,
            execute_lsq_requests_queue_size: requests,
            execute_lsq_transfers_queue_size: transfers,
            execute_lsq_store_buffer_size: store_buffer,
            execute_lsq_max_store_buffer_stores_per_cycle: stores_per_cycle,
            execute_max_accesses_in_memory: max_accesses,
            execute_func_units: if unit_pool {
                unit_latency_pool()
            } else {
                cva6_core::config::FuPoolConfig::default()
            },
            branch_predictor: if btb { BranchPredictorKind::Btb } else { BranchPredictorKind::Static },
            ..Config::default()
        },
    )
}

fn memory_strategy() -> impl Strategy<Value = MemoryConfig> {
    (0u64..4, 1u64..4, 1u64..5, 1u64..5).prop_map(|(fetch, translation, read, write)| MemoryConfig {
        fetch_latency: fetch,
        translation_latency: translation,
        read_latency: read,
        write_latency: write,
        ..MemoryConfig::default()
    })
}

fn run(config: &Config, memory: &MemoryConfig, program: &Program, idling: bool) -> (Simulator, RunSummary) {
    let config = Config {
        enable_idling: idling,
        ..config.clone()
    };
    let mut sim = Simulator::new(config, program.clone(), FlatMemory::new(memory.clone())).unwrap();
    let summary = sim.run(MAX_CYCLES).unwrap();
    (sim, summary)
}

/// Highest occupancy against capacity of every bounded stage input buffer.
fn occupancy(sim: &Simulator) -> [(&'static str, usize, usize); 3] {
    let pipeline = sim.pipeline();
    let frontend = pipeline.frontend();
    [
        ("fetch2", frontend.fetch2_input.high_water(), frontend.fetch2_input.capacity()),
        ("decode", frontend.decode_input.high_water(), frontend.decode_input.capacity()),
        ("execute", pipeline.execute_input().high_water(), pipeline.execute_input().capacity()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_pipeline_matches_sequential_reference(
        config in config_strategy(),
        memory in memory_strategy(),
        workloads in prop::collection::vec(prop::collection::vec(op_strategy(), 1..24), 2),
    ) {
        let threads = config.num_threads;
        let workloads = &workloads[..threads];
        let program = Program {
            threads: workloads
                .iter()
                .enumerate()
                .map(|(t, ops)| thread_program(t, ops).thread())
                .collect(),
        };

        let (sim, summary) = run(&config, &memory, &program, true);
        prop_assert_eq!(summary.stop, StopReason::AllHalted);
        prop_assert!(sim.pipeline().is_drained());
        prop_assert!(sim.pipeline().execute().lsq().is_empty());
        for (buffer, high_water, capacity) in occupancy(&sim) {
            prop_assert!(high_water <= capacity, "{} held {} of {}", buffer, high_water, capacity);
        }
        let log = sim.commit_log().to_vec();

        let mut per_cycle: HashMap<u64, (usize, usize)> = HashMap::new();
        for record in &log {
            let entry = per_cycle.entry(record.commit_cycle).or_default();
            entry.0 += 1;
            if record.op_class.is_mem() && record.fault.is_none() {
                entry.1 += 1;
            }
        }
        for (cycle, (all, mem)) in per_cycle {
            prop_assert!(all <= config.execute_commit_limit, "cycle {} committed {}", cycle, all);
            prop_assert!(mem <= config.execute_memory_commit_limit, "cycle {} committed {} mem", cycle, mem);
        }

        for (thread, ops) in workloads.iter().enumerate() {
            let expected = reference(thread, ops);
            let records: Vec<&CommitRecord> = log.iter().filter(|r| r.id.thread == thread).collect();
            let committed: Vec<u64> = records.iter().filter(|r| r.fault.is_none()).map(|r| r.pc).collect();
            prop_assert_eq!(committed, expected.pcs);

            prop_assert_eq!(records.iter().filter(|r| r.fault.is_some()).count(), 1);

            let last = records.last().copied();
            prop_assert_eq!(last.map(|r| r.pc), Some(expected.end_pc));
            prop_assert!(last.is_some_and(|r| r.fault.is_some()));

            let loads: Vec<u64> = records.iter().filter_map(|r| r.load_value).collect();
            prop_assert_eq!(loads, expected.loads);
        }

        let (stepped, stepped_summary) = run(&config, &memory, &program, false);
        prop_assert_eq!(stepped_summary, summary);
        prop_assert_eq!(stepped.commit_log(), log.as_slice());
        for (buffer, high_water, capacity) in occupancy(&stepped) {
            prop_assert!(high_water <= capacity, "{} held {} of {}", buffer, high_water, capacity);
        }
    }
}
